use std::collections::HashMap;
use std::path::Path;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::utils::{PaperError, PaperResult};

use super::title_extractor;
use super::{Heading, LayoutSpan, Page, PaperLayout};

pub struct PdfParser {
    heading_patterns: Vec<Regex>,
}

impl PdfParser {
    pub fn new() -> Self {
        // 常见章节标题形式："1. INTRODUCTION"、"INTRODUCTION"、"1.1 RELATED WORK"
        let heading_patterns = vec![
            Regex::new(r"(?m)^\d+\.?\s+([A-Z][^a-z\n]*(?:[ \t]+[A-Z][^a-z\n]*)*)").unwrap(),
            Regex::new(r"(?m)^([A-Z][A-Z \t]+)$").unwrap(),
            Regex::new(r"(?m)^\d+\.\d+\s+([A-Z][^a-z\n]*(?:[ \t]+[A-Z][^a-z\n]*)*)").unwrap(),
        ];
        Self { heading_patterns }
    }

    /// 提取全文、逐页文本与布局片段，并运行标题/章节标题启发式
    pub fn extract_with_layout(&self, pdf_path: &str) -> PaperResult<PaperLayout> {
        info!("解析PDF: {}", pdf_path);

        if !Path::new(pdf_path).exists() {
            return Err(PaperError::NotFound(pdf_path.to_string()));
        }

        let doc = Document::load(pdf_path)
            .map_err(|e| PaperError::PdfError(format!("{}: {}", pdf_path, e)))?;

        let mut pages: Vec<Page> = Vec::new();
        for (page_number, page_id) in doc.get_pages() {
            let text = doc.extract_text(&[page_number]).unwrap_or_default();
            let spans = extract_spans(&doc, page_id);
            pages.push(Page {
                page_number: page_number as usize,
                text,
                spans,
            });
        }

        // 个别PDF的逐页提取会得到空文本，退回pdf-extract整体提取
        if pages.iter().all(|p| p.text.trim().is_empty()) {
            warn!("逐页提取为空，回退到整体文本提取");
            match pdf_extract::extract_text(pdf_path) {
                Ok(text) => {
                    if pages.is_empty() {
                        pages.push(Page {
                            page_number: 1,
                            text,
                            spans: Vec::new(),
                        });
                    } else {
                        pages[0].text = text;
                    }
                }
                Err(e) => warn!("整体文本提取失败: {}", e),
            }
        }

        // 页间以单个换行分隔；只修剪尾部以保持字符偏移与页归属一致
        let full_text = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .trim_end()
            .to_string();

        info!("提取文本长度: {} 字符, {} 页", full_text.len(), pages.len());

        let title = title_extractor::extract_title(&pages);
        let headings = self.extract_headings(&pages);
        let total_pages = pages.len();

        Ok(PaperLayout {
            full_text,
            pages,
            total_pages,
            title,
            headings,
        })
    }

    /// 在每页文本上匹配章节标题模式
    fn extract_headings(&self, pages: &[Page]) -> Vec<Heading> {
        let mut headings = Vec::new();

        for page in pages {
            for pattern in &self.heading_patterns {
                for caps in pattern.captures_iter(&page.text) {
                    let heading_text = caps
                        .get(1)
                        .map(|m| m.as_str().trim())
                        .unwrap_or_default();

                    // 过滤明显的误报
                    if heading_text.len() > 3
                        && heading_text.len() < 100
                        && !matches!(
                            heading_text.to_lowercase().as_str(),
                            "abstract" | "references" | "bibliography"
                        )
                    {
                        headings.push(Heading {
                            text: heading_text.to_string(),
                            page: page.page_number,
                            kind: "section_heading".to_string(),
                        });
                    }
                }
            }
        }

        debug!("识别到 {} 个章节标题", headings.len());
        headings
    }
}

/// 扫描页面内容流，按字体状态切分出布局片段。
/// 覆盖不了的编码一律尽力解码；片段文本只用于标题启发式。
fn extract_spans(doc: &Document, page_id: ObjectId) -> Vec<LayoutSpan> {
    let fonts = page_fonts(doc, page_id);

    let content_data = match doc.get_page_content(page_id) {
        Ok(data) => data,
        Err(_) => return Vec::new(),
    };
    let content = match Content::decode(&content_data) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    let mut spans: Vec<LayoutSpan> = Vec::new();
    let mut block_index = 0usize;
    let mut font_size = 0.0f32;
    let mut bold = false;
    let mut buffer = String::new();

    let mut flush = |buffer: &mut String, font_size: f32, bold: bool, block_index: usize| {
        let text = buffer.trim().to_string();
        buffer.clear();
        if !text.is_empty() {
            spans.push(LayoutSpan {
                text,
                font_size,
                bold,
                block_index,
            });
        }
    };

    for op in &content.operations {
        match op.operator.as_str() {
            "BT" => {
                flush(&mut buffer, font_size, bold, block_index);
                block_index += 1;
            }
            "ET" | "Td" | "TD" | "T*" => {
                flush(&mut buffer, font_size, bold, block_index);
            }
            "Tf" => {
                flush(&mut buffer, font_size, bold, block_index);
                if let Some(Object::Name(key)) = op.operands.first() {
                    bold = fonts
                        .get(key)
                        .map(|base| base.to_lowercase().contains("bold"))
                        .unwrap_or(false);
                }
                if let Some(size) = op.operands.get(1).and_then(as_number) {
                    font_size = size as f32;
                }
            }
            "Tj" | "'" | "\"" => {
                for operand in &op.operands {
                    if let Object::String(bytes, _) = operand {
                        buffer.push_str(&decode_pdf_string(bytes));
                    }
                }
            }
            "TJ" => {
                if let Some(Object::Array(elements)) = op.operands.first() {
                    for element in elements {
                        if let Object::String(bytes, _) = element {
                            buffer.push_str(&decode_pdf_string(bytes));
                        }
                    }
                }
            }
            _ => {}
        }
    }
    flush(&mut buffer, font_size, bold, block_index);

    spans
}

/// 字体资源键 -> BaseFont 名称
fn page_fonts(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, String> {
    let mut fonts = HashMap::new();

    let (resource_dict, resource_ids) = doc.get_page_resources(page_id);
    let mut dicts: Vec<&Dictionary> = Vec::new();
    if let Some(dict) = resource_dict {
        dicts.push(dict);
    }
    for id in resource_ids {
        if let Ok(dict) = doc.get_object(id).and_then(|o| o.as_dict()) {
            dicts.push(dict);
        }
    }

    for dict in dicts {
        let font_dict = match dict.get(b"Font") {
            Ok(obj) => resolve_dict(doc, obj),
            Err(_) => None,
        };
        let Some(font_dict) = font_dict else { continue };

        for (key, value) in font_dict.iter() {
            if let Some(font) = resolve_dict(doc, value) {
                if let Ok(base) = font.get(b"BaseFont").and_then(|o| o.as_name()) {
                    fonts.insert(key.clone(), String::from_utf8_lossy(base).to_string());
                }
            }
        }
    }

    fonts
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok().and_then(|o| o.as_dict().ok()),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn as_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

/// PDF字符串按简单编码尽力解码，去掉控制字符
fn decode_pdf_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::page_fixture;

    #[test]
    fn missing_file_is_not_found() {
        let parser = PdfParser::new();
        let err = parser.extract_with_layout("/no/such/file.pdf").unwrap_err();
        assert!(matches!(err, PaperError::NotFound(_)));
    }

    #[test]
    fn headings_match_numbered_and_caps_lines() {
        let parser = PdfParser::new();
        let pages = page_fixture(&[
            "1. INTRODUCTION\nsome text\nRELATED WORK\nmore text\n2.1 MODEL DETAILS\n",
        ]);
        let headings = parser.extract_headings(&pages);
        let texts: Vec<&str> = headings.iter().map(|h| h.text.as_str()).collect();
        assert!(texts.contains(&"INTRODUCTION"));
        assert!(texts.contains(&"RELATED WORK"));
        assert!(texts.contains(&"MODEL DETAILS"));
        assert!(headings.iter().all(|h| h.page == 1));
        assert!(headings.iter().all(|h| h.kind == "section_heading"));
    }

    #[test]
    fn headings_filter_excluded_and_short() {
        let parser = PdfParser::new();
        let pages = page_fixture(&["ABSTRACT\nREFERENCES\nAB\nEVALUATION SETUP\n"]);
        let headings = parser.extract_headings(&pages);
        let texts: Vec<&str> = headings.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["EVALUATION SETUP"]);
    }

    #[test]
    fn pdf_strings_drop_control_chars() {
        assert_eq!(decode_pdf_string(b"Deep\x01 Learning"), "Deep Learning");
    }
}
