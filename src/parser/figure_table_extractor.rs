use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, info};

use super::{page_at_position, ContentType, FigureTable, Page};

/// 图表标题定义块提取器。
/// 只匹配行首的标题定义（前面必须是换行+可选空白），从而排除
/// "as shown in Figure 2" 这类正文引用；标题正文延伸到下一个
/// 图表关键词出现处或文本末尾（regex不支持前瞻，改为先收集全部
/// 定义起点再在相邻起点之间切片）。
pub struct FigureTableExtractor {
    caption_patterns: Vec<(ContentType, Regex)>,
    boundary_pattern: Regex,
}

/// 短于这个长度的"标题"多半只是引用而非定义
const MIN_CAPTION_LEN: usize = 20;

impl FigureTableExtractor {
    pub fn new() -> Self {
        Self {
            caption_patterns: vec![
                (
                    ContentType::Figure,
                    Regex::new(r"(?i)\n[ \t]*(?:Figure|Fig\.?)[ \t]*(\d+(?:\.\d+)?)[:.][ \t]*")
                        .unwrap(),
                ),
                (
                    ContentType::Table,
                    Regex::new(r"(?i)\n[ \t]*(?:Table|Tab\.?)[ \t]*(\d+(?:\.\d+)?)[:.][ \t]*")
                        .unwrap(),
                ),
            ],
            boundary_pattern: Regex::new(r"(?i)\n[ \t]*(?:Figure|Table|Fig\.?|Tab\.?)[ \t]*\d")
                .unwrap(),
        }
    }

    pub fn extract(&self, text: &str, pages: &[Page]) -> Vec<FigureTable> {
        let mut figures_tables: Vec<FigureTable> = Vec::new();
        let mut seen_labels: HashSet<String> = HashSet::new();

        for (content_type, pattern) in &self.caption_patterns {
            for caps in pattern.captures_iter(text) {
                let whole = caps.get(0).unwrap();
                let position = whole.start();
                let number = caps.get(1).unwrap().as_str();
                let label = match content_type {
                    ContentType::Figure => format!("Figure {}", number),
                    ContentType::Table => format!("Table {}", number),
                };

                // 标签级去重：首个出现者胜出，后续同标签一律丢弃
                if !seen_labels.insert(label.clone()) {
                    debug!("跳过重复标签 {} (位置 {})", label, position);
                    continue;
                }

                let caption_end = self
                    .boundary_pattern
                    .find_at(text, whole.end())
                    .map(|m| m.start())
                    .unwrap_or(text.len());
                let caption = text[whole.end()..caption_end].trim();

                if caption.len() < MIN_CAPTION_LEN {
                    debug!("跳过过短标题 {}: '{}'", label, caption);
                    continue;
                }

                figures_tables.push(FigureTable {
                    caption: caption.to_string(),
                    label,
                    content_type: *content_type,
                    position,
                    page_number: page_at_position(pages, position),
                    ai_explanation: None,
                    image: None,
                });
            }
        }

        figures_tables.sort_by_key(|ft| ft.position);
        info!("图表提取完成，共 {} 个", figures_tables.len());
        figures_tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::page_fixture;

    fn pages_for(text: &str) -> Vec<Page> {
        page_fixture(&[text])
    }

    #[test]
    fn caption_definitions_are_extracted() {
        let text = "intro\nFigure 1: Accuracy over training epochs for all model variants.\nmore text\nTable 2. Comparison of datasets used in the evaluation suite.\nend";
        let extractor = FigureTableExtractor::new();
        let items = extractor.extract(text, &pages_for(text));

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, "Figure 1");
        assert_eq!(items[0].content_type, ContentType::Figure);
        assert!(items[0]
            .caption
            .starts_with("Accuracy over training epochs"));
        assert_eq!(items[1].label, "Table 2");
        assert_eq!(items[1].content_type, ContentType::Table);
    }

    #[test]
    fn caption_runs_until_next_definition() {
        let text = "\nFigure 1: First caption with plenty of descriptive text.\ncontinued line\nFigure 2: Second caption that is long enough to keep.\n";
        let extractor = FigureTableExtractor::new();
        let items = extractor.extract(text, &pages_for(text));

        assert_eq!(items.len(), 2);
        assert!(items[0].caption.contains("continued line"));
        assert!(!items[0].caption.contains("Second caption"));
    }

    #[test]
    fn in_text_references_are_ignored() {
        let text = "\nAs shown in Figure 2: the accuracy improves with scale over time.\n";
        let extractor = FigureTableExtractor::new();
        assert!(extractor.extract(text, &pages_for(text)).is_empty());
    }

    #[test]
    fn duplicate_labels_keep_first_occurrence() {
        let text = "\nFigure 1: The first definition of this figure wins outright.\nfiller\nFigure 1: A later duplicate definition that should be dropped.\n";
        let extractor = FigureTableExtractor::new();
        let items = extractor.extract(text, &pages_for(text));

        assert_eq!(items.len(), 1);
        assert!(items[0].caption.contains("first definition"));
    }

    #[test]
    fn short_captions_are_rejected() {
        let text = "\nFigure 3: too short.\n";
        let extractor = FigureTableExtractor::new();
        assert!(extractor.extract(text, &pages_for(text)).is_empty());
    }

    #[test]
    fn page_numbers_follow_cumulative_offsets() {
        let page1 = "first page padding text".to_string();
        let page2 = "\nTable 1: A table caption that easily clears the length bar.".to_string();
        let full_text = format!("{}\n{}", page1, page2);
        let pages = page_fixture(&[&page1, &page2]);

        let extractor = FigureTableExtractor::new();
        let items = extractor.extract(&full_text, &pages);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].page_number, 2);
    }

    #[test]
    fn output_is_sorted_by_position() {
        let text = "\nTable 1: An early table caption with enough length to pass.\nmiddle\nFigure 1: A later figure caption with enough length to pass.\n";
        let extractor = FigureTableExtractor::new();
        let items = extractor.extract(text, &pages_for(text));

        assert_eq!(items.len(), 2);
        assert!(items[0].position < items[1].position);
        assert_eq!(items[0].content_type, ContentType::Table);
    }
}
