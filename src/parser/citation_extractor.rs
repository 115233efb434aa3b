use std::collections::BTreeMap;

use regex::Regex;
use tracing::{debug, info};

use super::{Citation, CitationType};

/// 四类引用的正则通道：匹配结果合并后按位置全局排序
pub struct CitationExtractor {
    citation_patterns: Vec<(CitationType, Regex)>,
    reference_heading_pattern: Regex,
    numbered_bracket_pattern: Regex,
    numbered_dot_pattern: Regex,
}

impl CitationExtractor {
    pub fn new() -> Self {
        let citation_patterns = vec![
            (
                CitationType::AuthorYear,
                Regex::new(r"(?i)\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\s*\((\d{4})\)").unwrap(),
            ),
            (
                // 合理的引用序号范围是1-999
                CitationType::Numbered,
                Regex::new(r"\[(\d{1,3}(?:,\s*\d{1,3})*)\]").unwrap(),
            ),
            (
                CitationType::Footnote,
                Regex::new(r"\^(\d+)\b").unwrap(),
            ),
            (
                CitationType::EtAl,
                Regex::new(r"(?i)\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\s+et\s+al\.?\s*\((\d{4})\)")
                    .unwrap(),
            ),
        ];

        Self {
            citation_patterns,
            reference_heading_pattern: Regex::new(r"(?i)^(references|bibliography)$").unwrap(),
            numbered_bracket_pattern: Regex::new(r"^\s*\[(\d+)\]\s*(.+)").unwrap(),
            numbered_dot_pattern: Regex::new(r"^\s*(\d+)[.)]\s+(.+)").unwrap(),
        }
    }

    /// 提取全文中的引用，按出现位置升序
    pub fn extract(&self, text: &str) -> Vec<Citation> {
        let mut citations: Vec<Citation> = Vec::new();

        for (citation_type, pattern) in &self.citation_patterns {
            for caps in pattern.captures_iter(text) {
                let whole = caps.get(0).unwrap();
                let citation_text = whole.as_str().to_string();
                let position = whole.start();

                let mut authors = Vec::new();
                let mut year = None;
                let mut reference_numbers = Vec::new();

                match citation_type {
                    CitationType::Numbered => {
                        let group = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                        // 过大的序号多半是年份或数据，含非正数的括号组整体丢弃
                        let numbers: Vec<u32> = group
                            .split(',')
                            .filter_map(|n| n.trim().parse::<u32>().ok())
                            .collect();
                        if numbers.is_empty()
                            || numbers.iter().any(|&n| n == 0)
                            || numbers.first().is_some_and(|&n| n > 999)
                        {
                            continue;
                        }
                        reference_numbers = numbers;
                    }
                    CitationType::AuthorYear | CitationType::EtAl => {
                        if let Some(m) = caps.get(1) {
                            authors.push(m.as_str().to_string());
                        }
                        year = caps.get(2).map(|m| m.as_str().to_string());
                    }
                    CitationType::Footnote => {}
                }

                citations.push(Citation {
                    text: citation_text,
                    position,
                    citation_type: *citation_type,
                    authors,
                    year,
                    title: None,
                    reference_numbers,
                    resolved_references: Vec::new(),
                });
            }
        }

        citations.sort_by_key(|c| c.position);
        citations
    }

    /// 解析参考文献表：定位 References/Bibliography 整行标题后逐行收集编号条目。
    /// 空行终止当前条目；不是编号条目的全大写短行（≤6个词）终止整个收集。
    pub fn extract_references(&self, text: &str) -> BTreeMap<u32, String> {
        let mut references: BTreeMap<u32, String> = BTreeMap::new();
        let mut collecting = false;
        let mut current_number: Option<u32> = None;
        let mut current_parts: Vec<String> = Vec::new();

        for raw_line in text.lines() {
            let line = raw_line.trim();

            if !collecting {
                if self.reference_heading_pattern.is_match(line) {
                    collecting = true;
                }
                continue;
            }

            if line.is_empty() {
                if let Some(number) = current_number.take() {
                    if !current_parts.is_empty() {
                        references.insert(number, current_parts.join(" ").trim().to_string());
                    }
                    current_parts.clear();
                }
                continue;
            }

            if is_all_caps(line)
                && line.split_whitespace().count() <= 6
                && !self.numbered_bracket_pattern.is_match(line)
            {
                if let Some(number) = current_number {
                    if !current_parts.is_empty() {
                        references.insert(number, current_parts.join(" ").trim().to_string());
                    }
                }
                debug!("参考文献收集在标题行终止: {}", line);
                return references;
            }

            let caps = self
                .numbered_bracket_pattern
                .captures(line)
                .or_else(|| self.numbered_dot_pattern.captures(line));

            if let Some(caps) = caps {
                if let Some(number) = current_number {
                    if !current_parts.is_empty() {
                        references.insert(number, current_parts.join(" ").trim().to_string());
                    }
                }

                match caps.get(1).unwrap().as_str().parse::<u32>() {
                    Ok(number) => {
                        current_number = Some(number);
                        current_parts =
                            vec![caps.get(2).unwrap().as_str().trim().to_string()];
                    }
                    Err(_) => {
                        current_number = None;
                        current_parts.clear();
                    }
                }
            } else if current_number.is_some() {
                current_parts.push(line.to_string());
            }
        }

        if let Some(number) = current_number {
            if !current_parts.is_empty() {
                references.insert(number, current_parts.join(" ").trim().to_string());
            }
        }

        info!("解析到 {} 条参考文献", references.len());
        references
    }
}

/// 等价于 Python str.isupper：存在大小写字符且无小写字符
fn is_all_caps(line: &str) -> bool {
    let mut has_cased = false;
    for c in line.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_numbers_are_parsed() {
        let extractor = CitationExtractor::new();
        let citations = extractor.extract("As shown in [12], results improve.");
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].citation_type, CitationType::Numbered);
        assert_eq!(citations[0].reference_numbers, vec![12]);
        assert_eq!(citations[0].text, "[12]");
    }

    #[test]
    fn zero_and_large_numbers_are_discarded() {
        let extractor = CitationExtractor::new();
        assert!(extractor.extract("bad data [0] here").is_empty());
        // 四位数不可能是引用序号，模式本身就不匹配
        assert!(extractor.extract("year [1000] here").is_empty());
        // 组内含0则整组丢弃
        assert!(extractor.extract("range [0, 3] here").is_empty());
    }

    #[test]
    fn multi_number_brackets_keep_all_numbers() {
        let extractor = CitationExtractor::new();
        let citations = extractor.extract("see [3, 4, 17]");
        assert_eq!(citations[0].reference_numbers, vec![3, 4, 17]);
    }

    #[test]
    fn author_year_and_et_al_capture_author_and_year() {
        let extractor = CitationExtractor::new();
        let citations = extractor.extract("Smith (2020) and Jones et al. (2021) agree.");

        let author_year = citations
            .iter()
            .find(|c| c.citation_type == CitationType::AuthorYear)
            .unwrap();
        assert_eq!(author_year.authors, vec!["Smith"]);
        assert_eq!(author_year.year.as_deref(), Some("2020"));

        let et_al = citations
            .iter()
            .find(|c| c.citation_type == CitationType::EtAl)
            .unwrap();
        assert_eq!(et_al.authors, vec!["Jones"]);
        assert_eq!(et_al.year.as_deref(), Some("2021"));
    }

    #[test]
    fn pooled_matches_are_sorted_by_position() {
        let extractor = CitationExtractor::new();
        let citations = extractor.extract("Smith (2020) then [4] then ^2 note");
        let positions: Vec<usize> = citations.iter().map(|c| c.position).collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
        assert!(citations.len() >= 3);
    }

    #[test]
    fn references_are_collected_until_blank_or_heading() {
        let extractor = CitationExtractor::new();
        let text = "intro text\nReferences\n[1] Smith, J. (2020). Title A.\n\n[2] Jones, K. (2021). Title B.\n";
        let refs = extractor.extract_references(text);
        assert_eq!(refs.get(&1).map(String::as_str), Some("Smith, J. (2020). Title A."));
        assert_eq!(refs.get(&2).map(String::as_str), Some("Jones, K. (2021). Title B."));
    }

    #[test]
    fn multiline_entries_join_with_spaces() {
        let extractor = CitationExtractor::new();
        let text = "References\n1. Smith, J. Long title\nspanning two lines.\n2) Jones, K. Other.\n";
        let refs = extractor.extract_references(text);
        assert_eq!(
            refs.get(&1).map(String::as_str),
            Some("Smith, J. Long title spanning two lines.")
        );
        assert_eq!(refs.get(&2).map(String::as_str), Some("Jones, K. Other."));
    }

    #[test]
    fn all_caps_heading_stops_collection() {
        let extractor = CitationExtractor::new();
        let text = "References\n[1] Smith, J. Title.\nAPPENDIX A\n[2] Ghost entry.\n";
        let refs = extractor.extract_references(text);
        assert_eq!(refs.len(), 1);
        assert!(refs.contains_key(&1));
    }

    #[test]
    fn no_heading_means_no_references() {
        let extractor = CitationExtractor::new();
        assert!(extractor
            .extract_references("[1] Not in a references section.")
            .is_empty());
    }
}
