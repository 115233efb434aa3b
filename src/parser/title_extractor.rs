use std::path::Path;

use tracing::{debug, info};

use crate::oracle::OracleClient;
use crate::utils::{truncate_chars, PaperResult};

use super::{Page, UNKNOWN_TITLE};

const EXCLUDED_PREFIXES: &[&str] = &[
    "abstract",
    "introduction",
    "author",
    "university",
    "journal",
    "proceedings",
    "conference",
    "workshop",
    "symposium",
    "arxiv:",
    "submitted",
    "received",
    "accepted",
    "published",
    "volume",
    "issue",
    "doi:",
    "issn:",
    "email:",
    "address:",
    "department",
    "institute",
    "college",
    "school",
];

const MONTHS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const TOPIC_WORDS: &[&str] = &[
    "analysis", "study", "method", "approach", "system", "model", "framework", "learning",
    "algorithm", "neural", "deep", "machine",
];

/// 标题提取链的前两级：字体候选 -> 行启发式。
/// 都失败时返回 "Unknown Title"，由管道继续Oracle/文件名两级。
pub fn extract_title(pages: &[Page]) -> String {
    let Some(first_page) = pages.first() else {
        return UNKNOWN_TITLE.to_string();
    };

    if let Some(title) = try_span_candidates(first_page) {
        info!("从布局候选中选定标题: {}", title);
        return title;
    }

    if let Some(title) = try_line_heuristics(first_page) {
        info!("从行启发式中选定标题: {}", title);
        return title;
    }

    UNKNOWN_TITLE.to_string()
}

/// 第一级：首页前10个文本块中，字体≥12且通过硬过滤的片段取最大字号
fn try_span_candidates(first_page: &Page) -> Option<String> {
    let mut candidates: Vec<(&str, f32)> = Vec::new();

    // block_index 从1起（每个BT自增一次），<=10 即首页前10个文本块
    for span in first_page.spans.iter().filter(|s| s.block_index <= 10) {
        let text = span.text.trim();
        let lower = text.to_lowercase();

        let is_excluded = EXCLUDED_PREFIXES.iter().any(|p| lower.starts_with(p));
        let has_date = text.chars().any(|c| c.is_ascii_digit())
            && MONTHS.iter().any(|m| lower.contains(m));
        let has_arxiv_id =
            lower.contains("arxiv:") || lower.contains("[cs.") || lower.contains("v1");

        if span.font_size >= 12.0
            && text.len() > 10
            && text.len() < 200
            && !is_excluded
            && !has_date
            && !has_arxiv_id
        {
            debug!("标题候选: '{}' (字号 {})", text, span.font_size);
            candidates.push((text, span.font_size));
        }
    }

    // 字号并列时取先出现的候选
    candidates
        .into_iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.1.total_cmp(&b.1).then(ib.cmp(ia)))
        .map(|(_, (text, _))| text.to_string())
}

/// 第二级：依次尝试首个有效行、前10行中最长有效行、主题词匹配行
fn try_line_heuristics(first_page: &Page) -> Option<String> {
    let lines: Vec<&str> = first_page
        .text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    for line in lines.iter().take(5) {
        if is_valid_title(line) {
            return Some(line.to_string());
        }
    }

    if let Some(longest) = lines
        .iter()
        .take(10)
        .filter(|l| is_valid_title(l) && l.len() > 20)
        .max_by_key(|l| l.len())
    {
        return Some(longest.to_string());
    }

    for line in lines.iter().take(10) {
        let lower = line.to_lowercase();
        if is_valid_title(line)
            && line.len() > 15
            && line.len() < 150
            && TOPIC_WORDS.iter().any(|w| lower.contains(w))
        {
            return Some(line.to_string());
        }
    }

    None
}

/// 硬过滤：长度、排除前缀、arXiv标识、日期、字母数字占比、词形
pub fn is_valid_title(text: &str) -> bool {
    if text.len() < 10 || text.len() > 200 {
        return false;
    }

    let lower = text.to_lowercase();

    if EXCLUDED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return false;
    }

    if lower.contains("arxiv:")
        || lower.contains("[cs.")
        || lower.contains("v1")
        || lower.contains("v2")
    {
        return false;
    }

    let has_digit = text.chars().any(|c| c.is_ascii_digit());
    let has_month = MONTHS.iter().any(|m| lower.contains(m));
    if has_digit && has_month {
        return false;
    }

    // 字母数字占比不足70%的多为元数据行
    let alnum = text.chars().filter(|c| c.is_alphanumeric()).count();
    if (alnum as f64) < text.chars().count() as f64 * 0.7 {
        return false;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 2 || words.iter().any(|w| w.len() > 50) {
        return false;
    }

    true
}

/// 第三级：Oracle从首页文本中抽取标题
pub async fn extract_title_with_oracle(
    oracle: &OracleClient,
    first_page_text: &str,
) -> PaperResult<String> {
    let sample = truncate_chars(first_page_text, 2000);

    let prompt = format!(
        "Extract the title of this research paper from the following text.\n\n\
         IMPORTANT:\n\
         - Return ONLY the actual paper title, not arXiv identifiers, dates, or metadata\n\
         - Do not include \"Title:\", \"arXiv:\", dates, or author information\n\
         - The title should be the main research topic/study name\n\
         - Exclude lines that start with \"arXiv:\", contain dates like \"Mar 2025\", or have identifiers like \"[cs.LG]\"\n\n\
         Text: {}",
        sample
    );

    let title = oracle
        .complete(
            "You are an expert at extracting research paper titles. Return only the title text, nothing else.",
            &prompt,
            0.0,
            200,
        )
        .await?;

    let title = title.trim().to_string();
    if title.len() > 5 {
        Ok(title)
    } else {
        Ok(UNKNOWN_TITLE.to_string())
    }
}

/// 第四级：从文件名推导标题
pub fn title_from_filename(pdf_path: &str) -> Option<String> {
    let stem = Path::new(pdf_path).file_stem()?.to_string_lossy();

    let mut title = stem.replace(['_', '-'], " ");
    for noise in ["paper", "research", "study", ".pdf", ".PDF"] {
        title = title.replace(noise, "");
    }
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");

    if title.len() > 10 && title.len() < 200 {
        Some(title)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{page_fixture, LayoutSpan};

    fn span(text: &str, font_size: f32, block_index: usize) -> LayoutSpan {
        LayoutSpan {
            text: text.to_string(),
            font_size,
            bold: false,
            block_index,
        }
    }

    #[test]
    fn largest_font_candidate_wins() {
        let mut pages = page_fixture(&["ignored"]);
        pages[0].spans = vec![
            span("A Survey of Graph Neural Networks", 18.0, 0),
            span("Some University Department", 14.0, 1),
            span("Training Dynamics of Transformers", 14.0, 2),
        ];
        assert_eq!(extract_title(&pages), "A Survey of Graph Neural Networks");
    }

    #[test]
    fn tied_font_sizes_prefer_the_earlier_span() {
        let mut pages = page_fixture(&["ignored"]);
        pages[0].spans = vec![
            span("Contrastive Pretraining For Speech", 16.0, 1),
            span("Another Large Heading On The Page", 16.0, 2),
        ];
        assert_eq!(extract_title(&pages), "Contrastive Pretraining For Speech");
    }

    #[test]
    fn span_candidates_only_scan_the_first_ten_blocks() {
        let mut pages = page_fixture(&["ignored"]);
        pages[0].spans = vec![span("A Heading Deep Inside The Body", 20.0, 11)];
        assert_eq!(extract_title(&pages), UNKNOWN_TITLE);

        pages[0].spans = vec![span("Graph Learning At Block Ten", 14.0, 10)];
        assert_eq!(extract_title(&pages), "Graph Learning At Block Ten");
    }

    #[test]
    fn arxiv_and_date_lines_are_excluded() {
        assert!(!is_valid_title("arXiv:2103.00020v1 [cs.LG] 1 Mar 2021"));
        assert!(!is_valid_title("Submitted 3 Mar 2025"));
        assert!(!is_valid_title("Abstract"));
        assert!(is_valid_title("Attention Is All You Need"));
    }

    #[test]
    fn low_alnum_density_is_rejected() {
        assert!(!is_valid_title("***** ------ ===== *****"));
    }

    #[test]
    fn line_fallback_takes_first_substantial_line() {
        let pages = page_fixture(&[
            "arXiv:2103.00020v1 [cs.LG]\nRobust Speech Recognition via Large-Scale Weak Supervision\nAuthor Name\n",
        ]);
        assert_eq!(
            extract_title(&pages),
            "Robust Speech Recognition via Large-Scale Weak Supervision"
        );
    }

    #[test]
    fn unknown_when_nothing_matches() {
        let pages = page_fixture(&["x\ny\n"]);
        assert_eq!(extract_title(&pages), UNKNOWN_TITLE);
    }

    #[test]
    fn filename_title_strips_noise() {
        assert_eq!(
            title_from_filename("uploads/deep_learning_survey.pdf").as_deref(),
            Some("deep learning survey")
        );
        assert_eq!(title_from_filename("uploads/a.pdf"), None);
    }
}
