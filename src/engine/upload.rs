//! # 上传校验模块
//!
//! ## 设计思路
//!
//! 统一处理上传入口的输入校验，并在"尽可能早"的阶段执行。目标是尽快
//! 失败：类型与体积不符的文件在解码之前就被拒绝，引擎的变换流水线
//! 永远不会看到非法输入。
//!
//! ## 实现思路
//!
//! 1. 体积上限检查（先于任何内容探测）
//! 2. 按字节签名嗅探真实 MIME 类型（不信任文件扩展名），比对白名单
//! 3. 完整解码为 RGBA 位图，解码失败同样在入口处拒绝

use crate::bitmap::Bitmap;
use crate::engine::config::{EngineConfig, ALLOWED_MIME_TYPES};
use crate::error::EngineError;

/// 校验并解码上传的图片字节。
///
/// 校验失败属于输入校验错误（用户修正后可重试），不会进入任何操作流程。
pub(crate) fn validate_and_decode(
    file_name: &str,
    bytes: &[u8],
    config: &EngineConfig,
) -> Result<Bitmap, EngineError> {
    if bytes.len() as u64 > config.max_upload_bytes {
        return Err(EngineError::Validation(format!(
            "文件过大：{:.2} MB（限制：{:.2} MB）",
            bytes.len() as f64 / 1024.0 / 1024.0,
            config.max_upload_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    let mime = infer::get(bytes)
        .map(|kind| kind.mime_type())
        .ok_or_else(|| EngineError::Validation("无法识别文件类型".to_string()))?;

    if !ALLOWED_MIME_TYPES.contains(&mime) {
        return Err(EngineError::Validation(format!(
            "不支持的文件类型：{}（可选：{}）",
            mime,
            ALLOWED_MIME_TYPES.join(" / ")
        )));
    }

    let bitmap = Bitmap::decode(bytes)?;

    log::info!(
        "✅ 图片上传校验通过 - 文件: {} 类型: {} 尺寸: {}x{} 体积: {:.2} KB",
        file_name,
        mime,
        bitmap.width(),
        bitmap.height(),
        bytes.len() as f64 / 1024.0
    );

    Ok(bitmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;

    fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
        });

        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    #[test]
    fn accepts_valid_png() {
        let png = create_png_bytes(32, 32);
        let bitmap = validate_and_decode("test.png", &png, &EngineConfig::default())
            .expect("valid png should pass");
        assert_eq!(bitmap.width(), 32);
        assert_eq!(bitmap.height(), 32);
    }

    #[test]
    fn rejects_oversized_file() {
        let mut config = EngineConfig::default();
        config.max_upload_bytes = 64;

        let png = create_png_bytes(32, 32);
        let result = validate_and_decode("big.png", &png, &config);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn rejects_unknown_mime() {
        let result = validate_and_decode("note.txt", b"plain text content", &EngineConfig::default());
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn rejects_disallowed_image_type() {
        // GIF 签名可被识别，但不在白名单内
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";
        let result = validate_and_decode("anim.gif", gif, &EngineConfig::default());
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn size_check_runs_before_type_sniffing() {
        let mut config = EngineConfig::default();
        config.max_upload_bytes = 4;

        let result = validate_and_decode("note.txt", b"plain text content", &config);
        let err = result.expect_err("oversized input must be rejected");
        assert!(err.to_string().contains("文件过大"));
    }
}
