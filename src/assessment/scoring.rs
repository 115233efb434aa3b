use serde::{Deserialize, Serialize};

use crate::parser::Sections;

use super::MissingContent;

/// 四个评分维度的权重
const STRUCTURAL_WEIGHT: f64 = 0.25;
const QUALITY_WEIGHT: f64 = 0.25;
const CITATION_WEIGHT: f64 = 0.15;
const MISSING_WEIGHT: f64 = 0.35;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawScores {
    pub structural_section_score: f64,
    pub section_quality_score: f64,
    pub citation_score: f64,
    pub missing_content_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedEntry {
    pub score_out_of_weight: String,
    pub percentage_of_weight: String,
    pub bracket: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedBreakdown {
    pub structural_completeness: WeightedEntry,
    pub content_quality: WeightedEntry,
    pub citation_adequacy: WeightedEntry,
    pub missing_content_analysis: WeightedEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentageEntry {
    pub percentage: f64,
    pub bracket: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentageBreakdown {
    pub structural_completeness: PercentageEntry,
    pub content_quality: PercentageEntry,
    pub citation_adequacy: PercentageEntry,
    pub missing_content_analysis: PercentageEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weights {
    pub structural_completeness: f64,
    pub content_quality: f64,
    pub citation_adequacy: f64,
    pub missing_content_analysis: f64,
}

/// 完整的评分明细，随评估结果一并返回
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub raw_scores: RawScores,
    pub weighted_score_breakdown: WeightedBreakdown,
    pub percentage_breakdown: PercentageBreakdown,
    pub final_score: f64,
    pub weights: Weights,
}

/// 综合完备性评分：四个维度加权求和后收敛到 [20, 100]。
/// quality_scores 为已有的章节分析得分，为空时取中性分50。
pub fn completeness_score(
    sections: &Sections,
    citation_count: usize,
    missing_content: &[MissingContent],
    quality_scores: &[f64],
) -> ScoreBreakdown {
    let structural_raw = structural_section_score(sections);
    let quality_raw = section_quality_score(quality_scores);
    let citation_raw = citation_score(citation_count);
    let missing_raw = missing_content_score(missing_content);

    let final_score = (structural_raw * STRUCTURAL_WEIGHT
        + quality_raw * QUALITY_WEIGHT
        + citation_raw * CITATION_WEIGHT
        + missing_raw * MISSING_WEIGHT)
        .clamp(20.0, 100.0);

    let structural_pct = structural_section_percentage(sections);
    let quality_pct = section_quality_score(quality_scores);
    let citation_pct = citation_percentage(citation_count);
    let missing_pct = missing_content_score(missing_content);

    ScoreBreakdown {
        raw_scores: RawScores {
            structural_section_score: structural_raw,
            section_quality_score: quality_raw,
            citation_score: citation_raw,
            missing_content_score: missing_raw,
        },
        weighted_score_breakdown: WeightedBreakdown {
            structural_completeness: weighted_entry(
                structural_pct,
                STRUCTURAL_WEIGHT * 100.0,
                "Structural Sections (25% weight)",
            ),
            content_quality: weighted_entry(
                quality_pct,
                QUALITY_WEIGHT * 100.0,
                "Content Quality (25% weight)",
            ),
            citation_adequacy: weighted_entry(
                citation_pct,
                CITATION_WEIGHT * 100.0,
                "Citation Adequacy (15% weight)",
            ),
            missing_content_analysis: weighted_entry(
                missing_pct,
                MISSING_WEIGHT * 100.0,
                "Completeness Analysis (35% weight)",
            ),
        },
        percentage_breakdown: PercentageBreakdown {
            structural_completeness: percentage_entry(
                structural_pct,
                "Structural Sections (25% weight)",
                "structural completeness",
            ),
            content_quality: percentage_entry(
                quality_pct,
                "Content Quality (25% weight)",
                "content quality",
            ),
            citation_adequacy: percentage_entry(
                citation_pct,
                "Citation Adequacy (15% weight)",
                "citation adequacy",
            ),
            missing_content_analysis: percentage_entry(
                missing_pct,
                "Completeness Analysis (35% weight)",
                "completeness",
            ),
        },
        final_score,
        weights: Weights {
            structural_completeness: STRUCTURAL_WEIGHT,
            content_quality: QUALITY_WEIGHT,
            citation_adequacy: CITATION_WEIGHT,
            missing_content_analysis: MISSING_WEIGHT,
        },
    }
}

fn weighted_entry(percentage: f64, weight_points: f64, bracket: &str) -> WeightedEntry {
    let contribution = (percentage / 100.0) * weight_points;
    let pct_of_weight = (contribution / weight_points) * 100.0;
    WeightedEntry {
        score_out_of_weight: format!("{:.1}/{:.1}", contribution, weight_points),
        percentage_of_weight: format!("{:.1}%", pct_of_weight),
        bracket: bracket.to_string(),
        description: format!(
            "Scored {:.1} out of {:.1} points ({:.1}% of assigned weight)",
            contribution, weight_points, pct_of_weight
        ),
    }
}

fn percentage_entry(percentage: f64, bracket: &str, label: &str) -> PercentageEntry {
    PercentageEntry {
        percentage,
        bracket: bracket.to_string(),
        description: format!("Scored {:.1}% of possible {}", percentage, label),
    }
}

fn essential_sections(sections: &Sections) -> [&str; 6] {
    [
        sections.abstract_text.as_str(),
        sections.introduction.as_str(),
        sections.methodology.as_str(),
        sections.results.as_str(),
        sections.discussion.as_str(),
        sections.conclusion.as_str(),
    ]
}

/// 结构完备性（0-100）：章节在场（>50字符）占60分，长度分级加分，封顶100
pub fn structural_section_score(sections: &Sections) -> f64 {
    let essentials = essential_sections(sections);
    let total = essentials.len() as f64;

    let present = essentials
        .iter()
        .filter(|s| s.trim().len() > 50)
        .count() as f64;
    let presence_score = (present / total) * 60.0;

    let mut quality_score = 0.0;
    for content in essentials {
        let length = content.trim().len();
        if length > 500 {
            quality_score += 6.0;
        } else if length > 200 {
            quality_score += 4.0;
        } else if length > 100 {
            quality_score += 2.0;
        }
    }

    (presence_score + quality_score).min(100.0)
}

/// 结构完备性的百分比口径：在场占60%，长度质量按份额占40%
pub fn structural_section_percentage(sections: &Sections) -> f64 {
    let essentials = essential_sections(sections);
    let total = essentials.len() as f64;

    let mut present = 0.0;
    let mut quality_points = 0.0;
    for content in essentials {
        let length = content.trim().len();
        if length > 50 {
            present += 1.0;
            quality_points += if length > 500 {
                1.0
            } else if length > 200 {
                0.7
            } else if length > 100 {
                0.4
            } else {
                0.2
            };
        }
    }

    (present / total) * 60.0 + (quality_points / total) * 40.0
}

/// 可用章节分析得分的平均值，没有任何得分时取中性分
pub fn section_quality_score(quality_scores: &[f64]) -> f64 {
    if quality_scores.is_empty() {
        return 50.0;
    }
    quality_scores.iter().sum::<f64>() / quality_scores.len() as f64
}

/// 引用充分性（0-100）：阶梯函数
pub fn citation_score(citation_count: usize) -> f64 {
    match citation_count {
        n if n >= 30 => 100.0,
        n if n >= 20 => 90.0,
        n if n >= 15 => 80.0,
        n if n >= 10 => 70.0,
        n if n >= 5 => 50.0,
        n if n >= 1 => 30.0,
        _ => 10.0,
    }
}

/// 引用充分性的百分比口径：阶梯之间线性插值
pub fn citation_percentage(citation_count: usize) -> f64 {
    let n = citation_count as f64;
    match citation_count {
        c if c >= 30 => 100.0,
        c if c >= 20 => 90.0 + ((n - 20.0) / 10.0) * 10.0,
        c if c >= 15 => 80.0 + ((n - 15.0) / 5.0) * 10.0,
        c if c >= 10 => 70.0 + ((n - 10.0) / 5.0) * 10.0,
        c if c >= 5 => 50.0 + ((n - 5.0) / 5.0) * 20.0,
        c if c >= 1 => 30.0 + ((n - 1.0) / 4.0) * 20.0,
        _ => 10.0,
    }
}

/// 缺失内容评分（0-100）：按重要性分级扣分，边际递减
pub fn missing_content_score(missing_content: &[MissingContent]) -> f64 {
    if missing_content.is_empty() {
        return 100.0;
    }

    let count_of = |level: &str| {
        missing_content
            .iter()
            .filter(|c| c.importance == level)
            .count()
    };
    let critical = count_of("Critical");
    let important = count_of("Important");
    let beneficial = count_of("Beneficial");

    let mut critical_deduction = 0.0;
    if critical >= 1 {
        critical_deduction += 15.0;
    }
    if critical >= 2 {
        critical_deduction += 12.0;
    }
    if critical >= 3 {
        critical_deduction += 10.0;
    }
    if critical >= 4 {
        critical_deduction += (critical - 3) as f64 * 8.0;
    }

    let mut important_deduction = 0.0;
    if important >= 1 {
        important_deduction += 10.0;
    }
    if important >= 2 {
        important_deduction += 8.0;
    }
    if important >= 3 {
        important_deduction += (important - 2) as f64 * 6.0;
    }

    let beneficial_deduction = (beneficial as f64 * 3.0).min(15.0);

    (100.0 - critical_deduction - important_deduction - beneficial_deduction).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(importance: &str, n: usize) -> Vec<MissingContent> {
        (0..n)
            .map(|i| MissingContent {
                category: "Test".into(),
                topic: format!("topic {}", i),
                importance: importance.to_string(),
                description: String::new(),
                suggestion: String::new(),
                related_sections: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn empty_paper_scores_exactly_49() {
        // 结构0 + 质量中性50 + 引用10 + 无缺失100，加权 = 49.0
        let breakdown = completeness_score(&Sections::default(), 0, &[], &[]);
        assert_eq!(breakdown.raw_scores.structural_section_score, 0.0);
        assert_eq!(breakdown.raw_scores.section_quality_score, 50.0);
        assert_eq!(breakdown.raw_scores.citation_score, 10.0);
        assert_eq!(breakdown.raw_scores.missing_content_score, 100.0);
        assert_eq!(breakdown.final_score, 49.0);
    }

    #[test]
    fn citation_steps_match_brackets() {
        assert_eq!(citation_score(0), 10.0);
        assert_eq!(citation_score(1), 30.0);
        assert_eq!(citation_score(5), 50.0);
        assert_eq!(citation_score(10), 70.0);
        assert_eq!(citation_score(15), 80.0);
        assert_eq!(citation_score(20), 90.0);
        assert_eq!(citation_score(30), 100.0);
        assert_eq!(citation_score(200), 100.0);
    }

    #[test]
    fn citation_percentage_interpolates_within_brackets() {
        assert_eq!(citation_percentage(20), 90.0);
        assert_eq!(citation_percentage(25), 95.0);
        assert_eq!(citation_percentage(3), 40.0);
        assert_eq!(citation_percentage(0), 10.0);
    }

    #[test]
    fn missing_content_penalties_diminish() {
        assert_eq!(missing_content_score(&[]), 100.0);
        assert_eq!(missing_content_score(&missing("Critical", 1)), 85.0);
        assert_eq!(missing_content_score(&missing("Critical", 2)), 73.0);
        assert_eq!(missing_content_score(&missing("Critical", 3)), 63.0);
        assert_eq!(missing_content_score(&missing("Critical", 4)), 55.0);
        assert_eq!(missing_content_score(&missing("Important", 2)), 82.0);
        // Beneficial 扣分封顶15
        assert_eq!(missing_content_score(&missing("Beneficial", 10)), 85.0);
    }

    #[test]
    fn missing_content_score_is_monotonic_in_critical_count() {
        let mut last = 101.0;
        for n in 0..12 {
            let score = missing_content_score(&missing("Critical", n));
            assert!(score <= last);
            last = score;
        }
    }

    #[test]
    fn final_score_never_drops_below_floor() {
        let breakdown =
            completeness_score(&Sections::default(), 0, &missing("Critical", 20), &[0.0, 0.0]);
        assert_eq!(breakdown.final_score, 20.0);
    }

    #[test]
    fn structural_score_counts_presence_and_length() {
        let long = "x".repeat(600);
        let sections = Sections {
            abstract_text: long.clone(),
            introduction: long.clone(),
            methodology: long.clone(),
            results: long.clone(),
            discussion: long.clone(),
            conclusion: long,
            main_body: String::new(),
        };
        // 全部在场(60) + 每节长度加分6*6=36
        assert_eq!(structural_section_score(&sections), 96.0);
        assert_eq!(structural_section_percentage(&sections), 100.0);
    }

    #[test]
    fn quality_score_averages_available_analyses() {
        assert_eq!(section_quality_score(&[]), 50.0);
        assert_eq!(section_quality_score(&[80.0, 60.0]), 70.0);
    }

    #[test]
    fn breakdown_strings_use_one_decimal() {
        let breakdown = completeness_score(&Sections::default(), 20, &[], &[]);
        assert_eq!(
            breakdown
                .weighted_score_breakdown
                .citation_adequacy
                .score_out_of_weight,
            "13.5/15.0"
        );
        assert_eq!(
            breakdown
                .weighted_score_breakdown
                .citation_adequacy
                .percentage_of_weight,
            "90.0%"
        );
    }
}
