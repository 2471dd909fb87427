// src/services/convert.rs

//! JPEG normalization for downloaded images.

use std::io::Cursor;

use image::{ImageError, ImageFormat, ImageResult};

/// Encoder quality for converted images.
const JPEG_QUALITY: u8 = 92;

/// Decode any supported format and re-encode it as JPEG.
///
/// Alpha is flattened by dropping the channel. Runs on the blocking pool.
pub async fn to_jpeg(bytes: Vec<u8>) -> ImageResult<Vec<u8>> {
    tokio::task::spawn_blocking(move || encode_jpeg(&bytes))
        .await
        .map_err(|e| ImageError::IoError(std::io::Error::other(e)))?
}

fn encode_jpeg(bytes: &[u8]) -> ImageResult<Vec<u8>> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();

    let mut out = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(out.into_inner())
}

/// Sniff the container format of raw bytes.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn png_bytes() -> Vec<u8> {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_fn(8, 6, |x, y| Rgba([x as u8 * 30, y as u8 * 40, 128, 200]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_png_becomes_jpeg() {
        let jpeg = to_jpeg(png_bytes()).await.unwrap();
        assert_eq!(detect_format(&jpeg), Some(ImageFormat::Jpeg));
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[tokio::test]
    async fn test_garbage_is_rejected() {
        assert!(to_jpeg(b"<html>not an image</html>".to_vec()).await.is_err());
    }
}
