use std::io::Cursor;

use banana_shared::{data_url, Dimensions};
use image::{ImageFormat, Rgb, RgbImage};

/// A channel below this value marks a pixel as drawn content.
pub const NEAR_WHITE_THRESHOLD: u8 = 253;
/// Canvases with fewer content pixels than this are treated as empty.
pub const MIN_CONTENT_PIXELS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("not a base64 data URL")]
    NotDataUrl,
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("pixel buffer is not RGBA")]
    Layout,
}

fn is_content(pixel: &[u8]) -> bool {
    pixel[3] != 0 && pixel[..3].iter().any(|&channel| channel < NEAR_WHITE_THRESHOLD)
}

pub fn count_content_pixels(rgba: &[u8]) -> usize {
    rgba.chunks_exact(4).filter(|pixel| is_content(pixel)).count()
}

/// Stops scanning as soon as enough content has been seen.
pub fn is_effectively_blank(rgba: &[u8]) -> bool {
    rgba.chunks_exact(4)
        .filter(|pixel| is_content(pixel))
        .take(MIN_CONTENT_PIXELS)
        .count()
        < MIN_CONTENT_PIXELS
}

pub fn decode_rgba(url: &str) -> Result<(Dimensions, Vec<u8>), RasterError> {
    let (_, bytes) = data_url::decode(url).ok_or(RasterError::NotDataUrl)?;
    let image = image::load_from_memory(&bytes)?.to_rgba8();
    let dimensions = Dimensions::new(image.width(), image.height());
    Ok((dimensions, image.into_raw()))
}

pub fn data_url_is_blank(url: &str) -> Result<bool, RasterError> {
    let (_, rgba) = decode_rgba(url)?;
    if rgba.len() % 4 != 0 {
        return Err(RasterError::Layout);
    }
    Ok(is_effectively_blank(&rgba))
}

pub fn blank_reference_png(dimensions: Dimensions) -> Result<Vec<u8>, RasterError> {
    let image = RgbImage::from_pixel(
        dimensions.width.max(1),
        dimensions.height.max(1),
        Rgb([255, 255, 255]),
    );
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

pub fn blank_reference_data_url(dimensions: Dimensions) -> Result<String, RasterError> {
    let png = blank_reference_png(dimensions)?;
    Ok(data_url::encode("image/png", &png))
}
