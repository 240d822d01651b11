use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::TranscodeError;
use crate::types::TranscodeConfig;

pub const TARGET_EXTENSION: &str = "webp";

#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Size an image of `width` x `height` ends up with under `max_height`.
/// Both sides are scaled by the same factor and truncated, never rounded.
pub fn target_dimensions(width: u32, height: u32, max_height: Option<u32>) -> (u32, u32) {
    match max_height {
        Some(max) if height > max => {
            let scale = max as f64 / height as f64;
            ((width as f64 * scale) as u32, (height as f64 * scale) as u32)
        }
        _ => (width, height),
    }
}

pub fn transcode(data: &[u8], config: &TranscodeConfig) -> Result<EncodedImage, TranscodeError> {
    let decoded = image::load_from_memory(data)?;

    let (width, height) = target_dimensions(decoded.width(), decoded.height(), config.max_height);
    if width == 0 || height == 0 {
        return Err(TranscodeError::Encode(format!(
            "{}x{} scales down to an empty {}x{} image",
            decoded.width(),
            decoded.height(),
            width,
            height
        )));
    }

    let bytes = if (width, height) == (decoded.width(), decoded.height()) {
        encode_webp(&decoded, config.quality)?
    } else {
        let resized = decoded.resize_exact(width, height, FilterType::Triangle);
        encode_webp(&resized, config.quality)?
    };

    Ok(EncodedImage {
        bytes,
        width,
        height,
    })
}

fn encode_webp(img: &DynamicImage, quality: i32) -> Result<Vec<u8>, TranscodeError> {
    let (width, height) = (img.width(), img.height());

    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_simple(false, quality as f32)
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_simple(false, quality as f32)
    };

    encoded
        .map(|memory| memory.to_vec())
        .map_err(|e| TranscodeError::Encode(format!("{:?}", e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    pub(crate) fn encode_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn webp_dimensions(bytes: &[u8]) -> (u32, u32) {
        let decoded = webp::Decoder::new(bytes).decode().unwrap();
        (decoded.width(), decoded.height())
    }

    fn config(quality: i32, max_height: Option<u32>) -> TranscodeConfig {
        TranscodeConfig {
            quality,
            max_height,
        }
    }

    #[test]
    fn test_target_dimensions_truncates() {
        assert_eq!(target_dimensions(500, 800, Some(600)), (375, 600));
        assert_eq!(target_dimensions(333, 1000, Some(500)), (166, 500));
        assert_eq!(target_dimensions(1001, 1600, Some(400)), (250, 400));
        assert_eq!(target_dimensions(3, 8, Some(2)), (0, 2));
    }

    #[test]
    fn test_target_dimensions_without_downscale() {
        assert_eq!(target_dimensions(500, 800, None), (500, 800));
        assert_eq!(target_dimensions(500, 800, Some(800)), (500, 800));
        assert_eq!(target_dimensions(500, 800, Some(1200)), (500, 800));
    }

    #[test]
    fn test_transcode_downscales_jpeg() {
        let jpeg = encode_test_image(500, 800, ImageFormat::Jpeg);
        let encoded = transcode(&jpeg, &config(80, Some(600))).unwrap();

        assert_eq!((encoded.width, encoded.height), (375, 600));
        assert_eq!(&encoded.bytes[0..4], b"RIFF");
        assert_eq!(&encoded.bytes[8..12], b"WEBP");
        assert_eq!(webp_dimensions(&encoded.bytes), (375, 600));
    }

    #[test]
    fn test_transcode_keeps_size_without_limit() {
        let png = encode_test_image(64, 96, ImageFormat::Png);
        let encoded = transcode(&png, &config(75, None)).unwrap();
        assert_eq!((encoded.width, encoded.height), (64, 96));
        assert_eq!(webp_dimensions(&encoded.bytes), (64, 96));
    }

    #[test]
    fn test_transcode_bmp_and_alpha() {
        let bmp = encode_test_image(40, 30, ImageFormat::Bmp);
        let encoded = transcode(&bmp, &config(50, Some(30))).unwrap();
        assert_eq!((encoded.width, encoded.height), (40, 30));

        let rgba = RgbaImage::from_pixel(20, 20, Rgba([10, 20, 30, 128]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        let encoded = transcode(buf.get_ref(), &config(50, Some(10))).unwrap();
        assert_eq!((encoded.width, encoded.height), (10, 10));
    }

    #[test]
    fn test_transcode_rejects_garbage() {
        let err = transcode(b"definitely not an image", &config(75, None)).unwrap_err();
        assert!(matches!(err, TranscodeError::Decode(_)));
        assert_eq!(err.stage(), "decode");
    }

    #[test]
    fn test_transcode_rejects_truncated_png() {
        let png = encode_test_image(64, 64, ImageFormat::Png);
        let err = transcode(&png[..png.len() / 2], &config(75, None)).unwrap_err();
        assert!(matches!(err, TranscodeError::Decode(_)));
    }

    #[test]
    fn test_transcode_empty_scale_is_encode_error() {
        let png = encode_test_image(3, 700, ImageFormat::Png);
        let err = transcode(&png, &config(75, Some(100))).unwrap_err();
        assert!(matches!(err, TranscodeError::Encode(_)));
        assert_eq!(err.stage(), "encode");
    }

    #[test]
    fn test_transcode_quality_out_of_range_fails_encode() {
        let png = encode_test_image(16, 16, ImageFormat::Png);
        let err = transcode(&png, &config(250, None)).unwrap_err();
        assert!(matches!(err, TranscodeError::Encode(_)));
    }

    #[test]
    fn test_transcode_quality_changes_size() {
        let png = encode_test_image(128, 128, ImageFormat::Png);
        let low = transcode(&png, &config(5, None)).unwrap();
        let high = transcode(&png, &config(95, None)).unwrap();
        assert!(low.bytes.len() < high.bytes.len());
    }
}
