use crate::config::PadConfig;
use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;
use image::{GrayImage, Luma};

/// Surround the image with a constant border of `size` pixels
pub fn apply(image: &PixelBuffer, config: &PadConfig) -> Result<PixelBuffer, PreprocessError> {
    Ok(pad_constant(image, config.size, config.value))
}

/// Constant-value border on all four sides, applied to every channel
pub fn pad_constant(image: &PixelBuffer, size: u32, value: u8) -> PixelBuffer {
    if size == 0 {
        return image.clone();
    }
    image.map_planes(|plane| {
        let mut out = GrayImage::from_pixel(plane.width() + 2 * size, plane.height() + 2 * size, Luma([value]));
        image::imageops::replace(&mut out, plane, size as i64, size as i64);
        out
    })
}
