pub mod logger;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaperError {
    #[error("文件不存在: {0}")]
    NotFound(String),

    #[error("PDF处理错误: {0}")]
    PdfError(String),

    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("Oracle API错误: {0}")]
    OracleError(String),

    #[error("网络请求错误: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type PaperResult<T> = Result<T, PaperError>;

/// 按字符数截断，保证不切在UTF-8边界内
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }
}
