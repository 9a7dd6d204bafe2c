use crate::config::InvertConfig;
use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;

/// Invert light-on-dark crops.
///
/// The dark fraction is measured on whatever the buffer holds at this point,
/// including already-binarized data.
pub fn apply(image: &PixelBuffer, config: &InvertConfig) -> Result<PixelBuffer, PreprocessError> {
    let ratio = dark_ratio(image);
    if ratio > config.dark_ratio {
        tracing::debug!(ratio, "Dark background detected, inverting");
        Ok(image.inverted())
    } else {
        Ok(image.clone())
    }
}

/// Fraction of luma values below mid-gray
pub fn dark_ratio(image: &PixelBuffer) -> f32 {
    let gray = image.to_gray();
    let total = gray.width() as usize * gray.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let dark = gray.pixels().filter(|p| p.0[0] < 128).count();
    dark as f32 / total as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_dark_background_is_inverted() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([10]));
        img.put_pixel(5, 5, Luma([240]));
        let result = apply(&PixelBuffer::Gray(img), &InvertConfig::default()).unwrap().into_gray();
        assert_eq!(result.get_pixel(0, 0).0[0], 245);
        assert_eq!(result.get_pixel(5, 5).0[0], 15);
    }

    #[test]
    fn test_light_background_is_kept() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([230]));
        img.put_pixel(5, 5, Luma([0]));
        let buffer = PixelBuffer::Gray(img);
        assert_eq!(apply(&buffer, &InvertConfig::default()).unwrap(), buffer);
    }

    #[test]
    fn test_ratio_at_threshold_is_kept() {
        // Exactly 60% dark does not exceed the default ratio
        let img = GrayImage::from_fn(10, 1, |x, _| if x < 6 { Luma([0]) } else { Luma([255]) });
        let buffer = PixelBuffer::Gray(img);
        assert!((dark_ratio(&buffer) - 0.6).abs() < 1e-6);
        assert_eq!(apply(&buffer, &InvertConfig::default()).unwrap(), buffer);
    }
}
