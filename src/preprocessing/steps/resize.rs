use crate::config::{Interpolation, ResizeConfig};
use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;
use image::imageops::{self, FilterType};

/// Resize a crop to satisfy the configured size bounds
///
/// Small crops are scaled up until both minimums hold; the maximums, when
/// set, take precedence over the minimums.
pub fn apply(image: &PixelBuffer, config: &ResizeConfig) -> Result<PixelBuffer, PreprocessError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessError::PreprocessingError(
            "cannot resize an empty image".to_string(),
        ));
    }

    let (new_width, new_height) = target_dimensions(width, height, config);
    if (new_width, new_height) == (width, height) {
        return Ok(image.clone());
    }

    tracing::debug!(width, height, new_width, new_height, "Resizing crop");
    let filter = filter_type(config.interpolation);
    Ok(match image {
        PixelBuffer::Gray(img) => PixelBuffer::Gray(imageops::resize(img, new_width, new_height, filter)),
        PixelBuffer::Color(img) => PixelBuffer::Color(imageops::resize(img, new_width, new_height, filter)),
    })
}

fn filter_type(interpolation: Interpolation) -> FilterType {
    match interpolation {
        Interpolation::Nearest => FilterType::Nearest,
        Interpolation::Linear => FilterType::Triangle,
        Interpolation::Cubic => FilterType::CatmullRom,
        Interpolation::Lanczos => FilterType::Lanczos3,
    }
}

fn target_dimensions(width: u32, height: u32, config: &ResizeConfig) -> (u32, u32) {
    if !config.maintain_aspect {
        let bound = |value: u32, min: u32, max: Option<u32>| value.max(min).min(max.unwrap_or(u32::MAX)).max(1);
        return (
            bound(width, config.min_width, config.max_width),
            bound(height, config.min_height, config.max_height),
        );
    }

    let (w, h) = (width as f32, height as f32);
    let scale_up = (config.min_height as f32 / h).max(config.min_width as f32 / w);
    let mut scale = scale_up.max(1.0);
    if let Some(max_height) = config.max_height {
        scale = scale.min(max_height as f32 / h);
    }
    if let Some(max_width) = config.max_width {
        scale = scale.min(max_width as f32 / w);
    }

    (
        ((w * scale).round() as u32).max(1),
        ((h * scale).round() as u32).max(1),
    )
}
