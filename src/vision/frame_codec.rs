//! フレームのデコード・エンコード

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, RgbImage};

/// JPEGエンコード品質
pub const JPEG_QUALITY: u8 = 90;

/// 画像バイト列（PNG/JPEG等）をRGB画像にデコード
pub fn decode_frame(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes).context("画像のデコードに失敗しました")?;
    Ok(image.to_rgb8())
}

/// RGB画像をJPEGにエンコード
pub fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .encode_image(frame)
        .context("JPEGエンコードに失敗しました")?;
    Ok(buffer)
}

/// RGB画像をJPEG + Base64にエンコード（外部サービスへの送信用）
pub fn encode_jpeg_base64(frame: &RgbImage) -> Result<String> {
    Ok(STANDARD.encode(encode_jpeg(frame)?))
}

/// `data:image/...;base64,<payload>` 形式の文字列から payload を取り出す
///
/// `data:image` で始まらない、またはカンマが無い場合は `None`。
pub fn data_url_payload(text: &str) -> Option<&str> {
    if !text.starts_with("data:image") {
        return None;
    }
    text.split_once(',').map(|(_, payload)| payload)
}

/// data URL をデコードして画像バイト列を返す
pub fn decode_data_url(text: &str) -> Option<Result<Vec<u8>>> {
    let payload = data_url_payload(text)?;
    Some(
        STANDARD
            .decode(payload.trim())
            .context("Base64のデコードに失敗しました"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_data_url_payload() {
        assert_eq!(data_url_payload("data:image/jpeg;base64,AAAA"), Some("AAAA"));
        assert_eq!(data_url_payload("data:image/png;base64"), None);
        assert_eq!(data_url_payload("hello"), None);
        assert_eq!(data_url_payload("data:text/plain;base64,AAAA"), None);
    }

    #[test]
    fn test_data_url_frame_decodes() {
        let frame = RgbImage::from_pixel(8, 6, Rgb([200, 10, 10]));
        let url = format!("data:image/jpeg;base64,{}", encode_jpeg_base64(&frame).unwrap());

        let bytes = decode_data_url(&url).unwrap().unwrap();
        let decoded = decode_frame(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (8, 6));
    }

    #[test]
    fn test_invalid_base64_is_error() {
        assert!(decode_data_url("data:image/png;base64,@@@").unwrap().is_err());
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        assert!(decode_frame(b"not an image").is_err());
    }
}
