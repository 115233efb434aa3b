use regex::{Match, Regex};

use super::Sections;

/// 基于标题模式的顺序边界查找分段器。
/// abstract/introduction/main_body 与四个具名章节是两组独立的提取，
/// 源文本中乱序的标题会产生空或截断的章节，这是启发式的既定行为。
pub struct SectionSegmenter {
    abstract_pattern: Regex,
    intro_pattern: Regex,
    next_heading_pattern: Regex,
    methodology_pattern: Regex,
    results_pattern: Regex,
    discussion_pattern: Regex,
    conclusion_pattern: Regex,
}

impl SectionSegmenter {
    pub fn new() -> Self {
        Self {
            abstract_pattern: Regex::new(r"(?im)^[ \t]*\d*\.?[ \t]*\babstract\b[: \t]*").unwrap(),
            intro_pattern: Regex::new(r"(?im)^[ \t]*\d*\.?[ \t]*\bintroduction\b[: \t]*").unwrap(),
            next_heading_pattern: Regex::new(
                r"(?im)^[ \t]*\d*\.?[ \t]*(related work|literature review|background|methodology|methods?|approach|results?|experiments?|evaluation|discussion|analysis|conclusions?|references|bibliography|acknowledgments?|future work|limitations)\b[: \t]*",
            )
            .unwrap(),
            methodology_pattern: Regex::new(
                r"(?im)^[ \t]*\d*\.?[ \t]*(?:methodology|methods?|approach)\b[: \t]*",
            )
            .unwrap(),
            results_pattern: Regex::new(
                r"(?im)^[ \t]*\d*\.?[ \t]*(?:results?|experiments?|evaluation)\b[: \t]*",
            )
            .unwrap(),
            discussion_pattern: Regex::new(
                r"(?im)^[ \t]*\d*\.?[ \t]*(?:discussion|analysis)\b[: \t]*",
            )
            .unwrap(),
            conclusion_pattern: Regex::new(r"(?im)^[ \t]*\d*\.?[ \t]*(?:conclusions?)\b[: \t]*")
                .unwrap(),
        }
    }

    /// 切分全文。未命中的章节保持空字符串。
    pub fn segment(&self, text: &str) -> Sections {
        let normalized = text.replace('\r', "\n");

        let abstract_match = self.abstract_pattern.find(&normalized);
        let intro_match = self.intro_pattern.find(&normalized);

        let mut sections = Sections::default();

        match (abstract_match, intro_match) {
            (Some(abs_m), Some(intro_m)) if abs_m.end() <= intro_m.start() => {
                sections.abstract_text =
                    normalized[abs_m.end()..intro_m.start()].trim().to_string();
                self.split_after_intro(&normalized, intro_m, &mut sections);
            }
            (_, Some(intro_m)) => {
                // 没有摘要（或摘要出现在引言之后，视为未命中）
                self.split_after_intro(&normalized, intro_m, &mut sections);
            }
            (_, None) => {
                sections.main_body = normalized.trim().to_string();
            }
        }

        // 四个具名章节的独立提取：每个按固定优先序被下一个命中的章节截断
        let methodology_match = self.methodology_pattern.find(&normalized);
        let results_match = self.results_pattern.find(&normalized);
        let discussion_match = self.discussion_pattern.find(&normalized);
        let conclusion_match = self.conclusion_pattern.find(&normalized);

        if let Some(m) = methodology_match {
            let next = results_match.or(discussion_match).or(conclusion_match);
            sections.methodology = slice_until(&normalized, m, next);
        }
        if let Some(m) = results_match {
            let next = discussion_match.or(conclusion_match);
            sections.results = slice_until(&normalized, m, next);
        }
        if let Some(m) = discussion_match {
            sections.discussion = slice_until(&normalized, m, conclusion_match);
        }
        if let Some(m) = conclusion_match {
            sections.conclusion = normalized[m.end()..].trim().to_string();
        }

        sections
    }

    /// 引言之后的第一个标题同时作为 introduction 的终点和 main_body 的起点
    fn split_after_intro(&self, normalized: &str, intro_m: Match, sections: &mut Sections) {
        match self.next_heading_pattern.find_at(normalized, intro_m.end()) {
            Some(next_m) => {
                sections.introduction =
                    normalized[intro_m.end()..next_m.start()].trim().to_string();
                sections.main_body = normalized[next_m.start()..].trim().to_string();
            }
            None => {
                sections.introduction = normalized[intro_m.end()..].trim().to_string();
            }
        }
    }
}

/// 从标题结束到下一个标题开始（乱序时切片为空）
fn slice_until(text: &str, m: Match, next: Option<Match>) -> String {
    match next {
        Some(next_m) if next_m.start() >= m.end() => {
            text[m.end()..next_m.start()].trim().to_string()
        }
        Some(_) => String::new(),
        None => text[m.end()..].trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAPER: &str = "Title Line\n\
Abstract\nThis paper studies things.\n\
1. Introduction\nWe introduce the problem.\n\
2. Methodology\nWe do experiments.\n\
3. Results\nNumbers went up.\n\
4. Discussion\nIt worked.\n\
5. Conclusion\nDone.\n";

    #[test]
    fn abstract_and_introduction_are_sliced_between_headings() {
        let segmenter = SectionSegmenter::new();
        let sections = segmenter.segment(PAPER);

        assert_eq!(sections.abstract_text, "This paper studies things.");
        assert_eq!(sections.introduction, "We introduce the problem.");
        // main_body 从终结 introduction 的标题本身开始
        assert!(sections.main_body.starts_with("2. Methodology"));
        assert!(sections.main_body.ends_with("Done."));
    }

    #[test]
    fn named_sections_claim_text_up_to_next_heading() {
        let segmenter = SectionSegmenter::new();
        let sections = segmenter.segment(PAPER);

        assert_eq!(sections.methodology, "We do experiments.");
        assert_eq!(sections.results, "Numbers went up.");
        assert_eq!(sections.discussion, "It worked.");
        assert_eq!(sections.conclusion, "Done.");
    }

    #[test]
    fn missing_headings_put_everything_in_main_body() {
        let segmenter = SectionSegmenter::new();
        let sections = segmenter.segment("just some text\nwith no headings at all");
        assert!(sections.abstract_text.is_empty());
        assert!(sections.introduction.is_empty());
        assert_eq!(sections.main_body, "just some text\nwith no headings at all");
    }

    #[test]
    fn introduction_without_later_heading_takes_rest() {
        let segmenter = SectionSegmenter::new();
        let sections = segmenter.segment("Abstract\nshort\nIntroduction\nrest of the text");
        assert_eq!(sections.abstract_text, "short");
        assert_eq!(sections.introduction, "rest of the text");
        assert!(sections.main_body.is_empty());
    }

    #[test]
    fn out_of_order_headings_yield_empty_slices() {
        let text = "Conclusion\nthe end\nResults\nnumbers\n";
        let segmenter = SectionSegmenter::new();
        let sections = segmenter.segment(text);
        // conclusion 在 results 之前：conclusion 拿到剩余全部，results 的切片为空
        assert_eq!(sections.conclusion, "the end\nResults\nnumbers");
        assert_eq!(sections.results, "");
    }
}
