//! # 位图模型模块
//!
//! ## 设计思路
//!
//! 将"字节 → 图像 → RGBA"的过程集中管理，并在关键节点校验长度一致性。
//! `Bitmap` 在发布后不可变：每次变换都产生新的位图，通过 `Arc` 在快照、
//! 历史记录与展示层之间共享引用，避免大像素缓冲被反复拷贝。
//!
//! ## 实现思路
//!
//! 1. 解码统一经 `image::load_from_memory`，输出固定为 RGBA8
//! 2. 构造时校验 `width * height * 4 == data.len()`
//! 3. PNG 编码与 Base64 编解码集中在此处，供传输层复用
//! 4. Base64 解析兼容 Data URL 前缀（`data:image/png;base64,...`）

use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::EngineError;

/// 每像素通道数（RGBA）。
pub const CHANNELS: usize = 4;

/// 内存位图：RGBA8，行优先。
///
/// 尺寸在构造时固定，像素数据发布后不再原地修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// 从 RGBA 字节构造位图，校验长度一致性。
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, EngineError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(CHANNELS))
            .ok_or_else(|| EngineError::Decode("图片尺寸导致内存溢出风险".to_string()))?;

        if data.len() != expected {
            return Err(EngineError::Decode(format!(
                "像素数据长度异常：期望 {} 字节，实际 {} 字节",
                expected,
                data.len()
            )));
        }

        Ok(Self { width, height, data })
    }

    /// 将原始图片字节解码为 RGBA 位图。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use cipher_studio::Bitmap;
    ///
    /// let bitmap = Bitmap::decode(&png_bytes)?;
    /// # Ok::<(), cipher_studio::EngineError>(())
    /// ```
    pub fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| EngineError::Decode(format!("图片解码失败：{}", e)))?;

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba(width, height, rgba.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 像素总数（`width * height`）。
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// RGBA 字节视图（`width * height * 4`）。
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 拷贝出可变像素缓冲，供变换流水线产出新位图。
    pub(crate) fn data_clone(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// 编码为 PNG 字节，用于传输与落盘。
    pub fn encode_png(&self) -> Result<Vec<u8>, EngineError> {
        let buffer = RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| EngineError::Decode("像素缓冲长度与尺寸不一致".to_string()))?;

        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(buffer)
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| EngineError::Decode(format!("PNG 编码失败：{}", e)))?;

        Ok(cursor.into_inner())
    }

    /// 编码为免前缀的 Base64 PNG 负载（远端契约要求无 URI 前缀）。
    pub fn encode_png_base64(&self) -> Result<String, EngineError> {
        Ok(general_purpose::STANDARD.encode(self.encode_png()?))
    }
}

/// 解析 Base64 字符串为原始字节，兼容 Data URL 前缀。
///
/// # 示例
/// ```rust
/// use cipher_studio::bitmap::parse_base64;
///
/// let bytes = parse_base64("data:image/png;base64,aGVsbG8=")?;
/// assert_eq!(bytes, b"hello");
/// # Ok::<(), cipher_studio::EngineError>(())
/// ```
pub fn parse_base64(data: &str) -> Result<Vec<u8>, EngineError> {
    let payload = strip_data_url_prefix(data);

    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| EngineError::Decode(format!("Base64 解码失败：{}", e)))
}

/// 剥离 `data:<mime>;base64,` 前缀，返回纯 Base64 负载。
pub fn strip_data_url_prefix(data: &str) -> &str {
    if data.starts_with("data:") {
        match data.find(',') {
            Some(index) => &data[index + 1..],
            None => data,
        }
    } else {
        data
    }
}
