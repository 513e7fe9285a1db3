//! Image preparation before recognition.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use super::error::SolverError;

/// Extracts the bytes of a `data:<mime>;base64,<payload>` URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, SolverError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| SolverError::InvalidImage("not a data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| SolverError::InvalidImage("data URL has no payload".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(SolverError::InvalidImage(format!(
            "unsupported data URL encoding: {}",
            header
        )));
    }

    STANDARD
        .decode(payload.trim())
        .map_err(|e| SolverError::InvalidImage(e.to_string()))
}

/// Decodes `bytes`, flattens it onto an opaque white background and re-encodes it as PNG.
///
/// Challenge images use transparency for their background, which most
/// recognizers read as black.
pub fn flatten_to_png(bytes: &[u8]) -> Result<Vec<u8>, SolverError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| SolverError::InvalidImage(e.to_string()))?;
    let foreground = decoded.to_rgba8();
    let (width, height) = foreground.dimensions();
    if width == 0 || height == 0 {
        return Err(SolverError::InvalidImage("image has no pixels".to_string()));
    }

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    image::imageops::overlay(&mut canvas, &foreground, 0, 0);

    let mut out = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| SolverError::Encode(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transparent_png() -> Vec<u8> {
        let mut img = RgbaImage::from_pixel(4, 2, Rgba([0, 0, 0, 0]));
        img.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_flatten_whitens_transparent_pixels() {
        let png = flatten_to_png(&transparent_png()).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgba8();

        assert_eq!(img.dimensions(), (4, 2));
        assert_eq!(img.get_pixel(1, 1), &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_flatten_rejects_garbage() {
        let result = flatten_to_png(b"definitely not an image");
        assert!(matches!(result, Err(SolverError::InvalidImage(_))));
    }

    #[test]
    fn test_decode_data_url() {
        let png = transparent_png();
        let url = format!("data:image/png;base64,{}", STANDARD.encode(&png));
        assert_eq!(decode_data_url(&url).unwrap(), png);
    }

    #[test]
    fn test_decode_data_url_rejects_other_forms() {
        assert!(decode_data_url("https://example.com/captcha.png").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("data:image/svg+xml,<svg/>").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }
}
