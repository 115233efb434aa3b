use std::io::Cursor;
use std::io::Read;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::{debug, warn};

use crate::utils::{PaperError, PaperResult};

/// 页面图像来源的抽象：嵌入图像提取与整页光栅化两条路径
pub trait PageRasterizer {
    /// 提取指定页面积最大的嵌入图像，无图像时返回 None
    fn extract_largest_image(
        &self,
        pdf_path: &str,
        page_number: usize,
    ) -> PaperResult<Option<Vec<u8>>>;

    /// 将整页渲染为位图
    fn render_page(&self, pdf_path: &str, page_number: usize, zoom: f32) -> PaperResult<Vec<u8>>;
}

/// 基于页面资源XObject扫描的图像提取器。
/// DCTDecode流直接作为JPEG字节返回，FlateDecode流解压后按
/// 色彩空间重新编码为PNG；其余过滤器跳过。
pub struct ImageAnalyzer;

/// 小于该边长的图像视为装饰元素
const MIN_DIMENSION: i64 = 10;

impl ImageAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl PageRasterizer for ImageAnalyzer {
    fn extract_largest_image(
        &self,
        pdf_path: &str,
        page_number: usize,
    ) -> PaperResult<Option<Vec<u8>>> {
        let doc = Document::load(pdf_path)
            .map_err(|e| PaperError::PdfError(format!("{}: {}", pdf_path, e)))?;

        let page_id = doc
            .get_pages()
            .get(&(page_number as u32))
            .copied()
            .ok_or_else(|| PaperError::PdfError(format!("页面不存在: {}", page_number)))?;

        let mut largest: Option<Vec<u8>> = None;

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
            let Ok(xobjects) = dict.get(b"XObject") else {
                continue;
            };
            let Some(xobjects) = resolve_dict(&doc, xobjects) else {
                continue;
            };

            for (name, value) in xobjects.iter() {
                let Some(stream) = resolve_stream(&doc, value) else {
                    continue;
                };
                match decode_image_stream(stream) {
                    Some(bytes) => {
                        debug!(
                            "页 {} XObject {} 解出 {} 字节图像",
                            page_number,
                            String::from_utf8_lossy(name),
                            bytes.len()
                        );
                        if largest.as_ref().map(|l| bytes.len() > l.len()).unwrap_or(true) {
                            largest = Some(bytes);
                        }
                    }
                    None => continue,
                }
            }
        }

        Ok(largest)
    }

    fn render_page(&self, _pdf_path: &str, page_number: usize, _zoom: f32) -> PaperResult<Vec<u8>> {
        // 没有内置光栅化后端，调用方降级为无图像
        Err(PaperError::PdfError(format!(
            "页面 {} 无法光栅化: 未配置渲染后端",
            page_number
        )))
    }
}

/// 解码单个图像XObject；尺寸过小、过滤器不支持或数据不完整时返回 None
fn decode_image_stream(stream: &Stream) -> Option<Vec<u8>> {
    let dict = &stream.dict;

    let subtype = dict.get(b"Subtype").and_then(|o| o.as_name()).ok()?;
    if subtype != b"Image" {
        return None;
    }

    let width = dict.get(b"Width").and_then(|o| o.as_i64()).ok()?;
    let height = dict.get(b"Height").and_then(|o| o.as_i64()).ok()?;
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return None;
    }

    let filter = primary_filter(dict);

    match filter.as_deref() {
        Some(b"DCTDecode") => Some(stream.content.clone()),
        Some(b"FlateDecode") | None => {
            let data = match stream.decompressed_content() {
                Ok(data) => data,
                Err(_) => inflate(&stream.content)?,
            };
            encode_png(&data, width as u32, height as u32)
        }
        Some(other) => {
            debug!("跳过不支持的图像过滤器: {}", String::from_utf8_lossy(other));
            None
        }
    }
}

/// Filter 可以是单个名称或名称数组，取第一个
fn primary_filter(dict: &Dictionary) -> Option<Vec<u8>> {
    match dict.get(b"Filter").ok()? {
        Object::Name(name) => Some(name.clone()),
        Object::Array(elements) => match elements.first() {
            Some(Object::Name(name)) => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// 按样本长度推断色彩布局并编码为PNG
fn encode_png(data: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    let pixels = (width as usize) * (height as usize);

    let dynamic = if data.len() >= pixels * 3 {
        let rgb = RgbImage::from_raw(width, height, data[..pixels * 3].to_vec())?;
        DynamicImage::ImageRgb8(rgb)
    } else if data.len() >= pixels {
        let gray = GrayImage::from_raw(width, height, data[..pixels].to_vec())?;
        DynamicImage::ImageLuma8(gray)
    } else {
        return None;
    };

    let mut buffer = Vec::new();
    if let Err(e) = dynamic.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png) {
        warn!("PNG编码失败: {}", e);
        return None;
    }
    Some(buffer)
}

fn inflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).ok()?;
    Some(out)
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok().and_then(|o| o.as_dict().ok()),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn resolve_stream<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Stream> {
    match obj {
        Object::Reference(id) => doc
            .get_object(*id)
            .ok()
            .and_then(|o| o.as_stream().ok()),
        Object::Stream(stream) => Some(stream),
        _ => None,
    }
}
