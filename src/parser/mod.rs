pub mod pdf_parser;
pub mod title_extractor;
pub mod section_segmenter;
pub mod citation_extractor;
pub mod figure_table_extractor;
pub mod image_analyzer;
pub mod math_extractor;
pub mod keyword_ranker;

pub use pdf_parser::PdfParser;
pub use section_segmenter::SectionSegmenter;
pub use citation_extractor::CitationExtractor;
pub use figure_table_extractor::FigureTableExtractor;
pub use image_analyzer::{ImageAnalyzer, PageRasterizer};
pub use math_extractor::MathExtractor;
pub use keyword_ranker::KeywordRanker;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ParserConfig;
use crate::oracle::OracleClient;
use crate::utils::PaperResult;

pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// 布局片段：一段连续文本及其字体信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutSpan {
    pub text: String,
    pub font_size: f32,
    pub bold: bool,
    pub block_index: usize,
}

/// 单页内容（页码从1开始）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub page_number: usize,
    pub text: String,
    pub spans: Vec<LayoutSpan>,
}

/// 识别出的章节标题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heading {
    pub text: String,
    pub page: usize,
    #[serde(rename = "type")]
    pub kind: String,
}

/// 文本与布局提取结果
#[derive(Debug, Clone)]
pub struct PaperLayout {
    pub full_text: String,
    pub pages: Vec<Page>,
    pub total_pages: usize,
    pub title: String,
    pub headings: Vec<Heading>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationType {
    AuthorYear,
    Numbered,
    Footnote,
    EtAl,
}

/// 正文中的一处引用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub text: String,
    pub position: usize,
    pub citation_type: CitationType,
    pub authors: Vec<String>,
    pub year: Option<String>,
    pub title: Option<String>,
    /// 编号引用解析出的参考文献序号
    pub reference_numbers: Vec<u32>,
    /// 序号在参考文献表中解析到的条目
    pub resolved_references: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Figure,
    Table,
}

/// 图/表的标题定义块
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigureTable {
    pub caption: String,
    pub label: String,
    pub content_type: ContentType,
    pub position: usize,
    pub page_number: usize,
    pub ai_explanation: Option<String>,
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquationType {
    DisplayMath,
    NumberedEquation,
    InlineMath,
    SimpleEquation,
}

/// 提取的数学内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MathContent {
    pub equation: String,
    pub equation_type: EquationType,
    pub position: usize,
    pub page_number: usize,
    pub context: Option<String>,
    pub summary: Option<String>,
    pub impact: Option<String>,
}

/// 分段结果：未命中的章节为空字符串
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sections {
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub introduction: String,
    pub methodology: String,
    pub results: String,
    pub discussion: String,
    pub conclusion: String,
    pub main_body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub total_pages: usize,
    pub title: String,
    pub headings: Vec<Heading>,
    pub total_citations: usize,
    pub total_figures: usize,
    pub total_tables: usize,
}

/// 聚合全部提取结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedPaper {
    pub sections: Sections,
    pub citations: Vec<Citation>,
    pub figures_tables: Vec<FigureTable>,
    pub mathematical_content: Vec<MathContent>,
    pub keywords: Vec<String>,
    pub references: BTreeMap<u32, String>,
    pub metadata: PaperMetadata,
}

/// 根据字符偏移定位页码：按页累计文本长度（页间分隔符占1字符）
pub(crate) fn page_at_position(pages: &[Page], position: usize) -> usize {
    let mut current_pos = 0usize;
    for page in pages {
        if position < current_pos + page.text.len() {
            return page.page_number;
        }
        current_pos += page.text.len() + 1;
    }
    1
}

/// 统一提取管道
pub struct ExtractionPipeline {
    pdf_parser: PdfParser,
    segmenter: SectionSegmenter,
    citation_extractor: CitationExtractor,
    figure_table_extractor: FigureTableExtractor,
    image_analyzer: ImageAnalyzer,
    math_extractor: MathExtractor,
    keyword_ranker: KeywordRanker,
    oracle: Option<OracleClient>,
    config: ParserConfig,
}

impl ExtractionPipeline {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            pdf_parser: PdfParser::new(),
            segmenter: SectionSegmenter::new(),
            citation_extractor: CitationExtractor::new(),
            figure_table_extractor: FigureTableExtractor::new(),
            image_analyzer: ImageAnalyzer::new(),
            math_extractor: MathExtractor::new(),
            keyword_ranker: KeywordRanker::new(),
            oracle: None,
            config,
        }
    }

    /// 标题提取的Oracle回退阶段需要一个已配置的客户端
    pub fn with_oracle(mut self, oracle: OracleClient) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// 处理一篇论文的PDF，返回全部提取结果
    pub async fn process(&self, pdf_path: &str) -> PaperResult<ParsedPaper> {
        info!("开始提取管道: {}", pdf_path);

        // 1. 文本与布局提取（标题为启发式链的前两级）
        let mut layout = self.pdf_parser.extract_with_layout(pdf_path)?;

        // 2. 标题回退链：Oracle -> 文件名
        if layout.title == UNKNOWN_TITLE {
            if let Some(oracle) = self.oracle.as_ref().filter(|o| o.is_configured()) {
                let first_page_text = layout
                    .pages
                    .first()
                    .map(|p| p.text.as_str())
                    .unwrap_or_default();
                match title_extractor::extract_title_with_oracle(oracle, first_page_text).await {
                    Ok(title) => layout.title = title,
                    Err(e) => warn!("Oracle 标题提取失败: {}", e),
                }
            }
        }
        if layout.title == UNKNOWN_TITLE {
            if let Some(title) = title_extractor::title_from_filename(pdf_path) {
                info!("使用文件名标题: {}", title);
                layout.title = title;
            }
        }

        // 3. 引用与参考文献
        let mut citations = self.citation_extractor.extract(&layout.full_text);
        let references = self.citation_extractor.extract_references(&layout.full_text);
        for citation in citations.iter_mut() {
            if citation.citation_type == CitationType::Numbered {
                citation.resolved_references = citation
                    .reference_numbers
                    .iter()
                    .filter_map(|n| references.get(n).cloned())
                    .collect();
            }
        }
        info!("提取到 {} 处引用, {} 条参考文献", citations.len(), references.len());

        // 4. 图表提取（图像附加为尽力而为）
        let mut figures_tables = self
            .figure_table_extractor
            .extract(&layout.full_text, &layout.pages);
        if self.config.attach_images {
            self.attach_images(pdf_path, &mut figures_tables);
        }
        info!("提取到 {} 个图表", figures_tables.len());

        // 5. 数学内容
        let mut math_content = self.math_extractor.extract(&layout.full_text, &layout.pages);
        if self.config.enrich_math {
            self.math_extractor.enrich(
                &mut math_content,
                &layout.full_text,
                &layout.pages,
                &layout.headings,
            );
        }
        info!("提取到 {} 个公式", math_content.len());

        // 6. 分段
        let sections = self.segmenter.segment(&layout.full_text);

        // 7. 关键词
        let keywords = self.keyword_ranker.extract(
            &layout.full_text,
            &layout.title,
            &sections,
            self.config.max_keywords,
        );
        info!("提取到 {} 个关键词", keywords.len());

        let total_figures = figures_tables
            .iter()
            .filter(|ft| ft.content_type == ContentType::Figure)
            .count();
        let total_tables = figures_tables
            .iter()
            .filter(|ft| ft.content_type == ContentType::Table)
            .count();

        Ok(ParsedPaper {
            metadata: PaperMetadata {
                total_pages: layout.total_pages,
                title: layout.title,
                headings: layout.headings,
                total_citations: citations.len(),
                total_figures,
                total_tables,
            },
            sections,
            citations,
            figures_tables,
            mathematical_content: math_content,
            keywords,
            references,
        })
    }

    /// 失败只降级为无图像，不中断管道
    fn attach_images(&self, pdf_path: &str, items: &mut [FigureTable]) {
        for item in items.iter_mut() {
            let image = match self.image_analyzer.extract_largest_image(pdf_path, item.page_number) {
                Ok(Some(bytes)) => Some(bytes),
                Ok(None) => match self.image_analyzer.render_page(pdf_path, item.page_number, 2.0) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        warn!("{} 渲染页面失败: {}", item.label, e);
                        None
                    }
                },
                Err(e) => {
                    warn!("{} 图像提取失败: {}", item.label, e);
                    None
                }
            };
            item.image = image;
        }
    }
}

#[cfg(test)]
pub(crate) fn page_fixture(texts: &[&str]) -> Vec<Page> {
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| Page {
            page_number: i + 1,
            text: t.to_string(),
            spans: Vec::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_attribution_walks_cumulative_lengths() {
        let pages = page_fixture(&["aaaa", "bbbb", "cccc"]);
        // 页文本长4，分隔符占1：页1覆盖 [0,4)，页2覆盖 [5,9)
        assert_eq!(page_at_position(&pages, 0), 1);
        assert_eq!(page_at_position(&pages, 3), 1);
        assert_eq!(page_at_position(&pages, 5), 2);
        assert_eq!(page_at_position(&pages, 10), 3);
    }

    #[test]
    fn page_attribution_defaults_to_first_page() {
        let pages = page_fixture(&["ab"]);
        assert_eq!(page_at_position(&pages, 999), 1);
        assert_eq!(page_at_position(&[], 0), 1);
    }

    #[test]
    fn citation_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&CitationType::EtAl).unwrap(),
            "\"et_al\""
        );
        assert_eq!(
            serde_json::to_string(&EquationType::DisplayMath).unwrap(),
            "\"display_math\""
        );
    }
}
