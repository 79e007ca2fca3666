//! 截图数据与压缩
//!
//! Screenshot 持有编码后的图片字节（PNG / JPEG），Arc 共享，克隆廉价；
//! compress 生成低分辨率 JPEG 变体，用于控制发往 LLM 的上下文体积。

use std::io::Cursor;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use crate::core::EvolveError;

/// 图片编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// 一张已编码的截图
#[derive(Clone, PartialEq, Eq)]
pub struct Screenshot {
    data: Arc<[u8]>,
    format: ImageFormat,
}

impl std::fmt::Debug for Screenshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screenshot")
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Screenshot {
    pub fn new(data: impl Into<Arc<[u8]>>, format: ImageFormat) -> Self {
        Self {
            data: data.into(),
            format,
        }
    }

    pub fn png(data: Vec<u8>) -> Self {
        Self::new(data, ImageFormat::Png)
    }

    pub fn jpeg(data: Vec<u8>) -> Self {
        Self::new(data, ImageFormat::Jpeg)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// data:image/...;base64,... 形式，供 OpenAI image_url 使用
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.to_base64())
    }
}

/// 压缩截图：宽度超过 max_width 时等比缩小，重新编码为指定质量的 JPEG
pub fn compress(shot: &Screenshot, max_width: u32, quality: u8) -> Result<Screenshot, EvolveError> {
    let img = image::load_from_memory(shot.bytes())
        .map_err(|e| EvolveError::Capture(format!("decode screenshot failed: {}", e)))?;

    let img = if max_width > 0 && img.width() > max_width {
        let height = ((img.height() as u64 * max_width as u64) / img.width() as u64).max(1) as u32;
        img.resize_exact(max_width, height, FilterType::Triangle)
    } else {
        img
    };

    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| EvolveError::Capture(format!("encode screenshot failed: {}", e)))?;

    Ok(Screenshot::jpeg(out.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample_png(width: u32, height: u32) -> Screenshot {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 255) as u8, (y % 255) as u8, 128]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        Screenshot::png(buf.into_inner())
    }

    #[test]
    fn test_compress_downscales_wide_image() {
        let shot = sample_png(800, 400);
        let small = compress(&shot, 200, 60).unwrap();
        assert_eq!(small.format(), ImageFormat::Jpeg);

        let decoded = image::load_from_memory(small.bytes()).unwrap();
        assert_eq!(decoded.width(), 200);
        assert_eq!(decoded.height(), 100);
    }

    #[test]
    fn test_compress_keeps_narrow_image_size() {
        let shot = sample_png(64, 32);
        let small = compress(&shot, 200, 60).unwrap();
        let decoded = image::load_from_memory(small.bytes()).unwrap();
        assert_eq!(decoded.width(), 64);
    }

    #[test]
    fn test_compress_rejects_garbage() {
        let shot = Screenshot::png(vec![1, 2, 3]);
        assert!(matches!(compress(&shot, 200, 60), Err(EvolveError::Capture(_))));
    }

    #[test]
    fn test_data_url_prefix() {
        let shot = Screenshot::jpeg(vec![0xff, 0xd8]);
        assert!(shot.data_url().starts_with("data:image/jpeg;base64,"));
    }
}
