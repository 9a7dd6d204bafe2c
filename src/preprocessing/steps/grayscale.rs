use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;

/// Convert image to grayscale; single-channel input passes through
pub fn apply(image: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
    Ok(PixelBuffer::Gray(image.to_gray()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn test_grayscale_converts_color() {
        let mut img = RgbImage::new(10, 10);
        img.put_pixel(0, 0, Rgb([255, 0, 0])); // Red
        img.put_pixel(1, 0, Rgb([0, 255, 0])); // Green
        img.put_pixel(2, 0, Rgb([0, 0, 255])); // Blue

        let result = apply(&PixelBuffer::Color(img)).unwrap();
        assert_eq!(result.channels(), 1);
        let gray = result.to_gray();

        // Green carries the most luma weight
        assert!(gray.get_pixel(1, 0).0[0] > gray.get_pixel(0, 0).0[0]);
        assert!(gray.get_pixel(0, 0).0[0] > gray.get_pixel(2, 0).0[0]);
        assert!(gray.get_pixel(2, 0).0[0] > 0);
    }

    #[test]
    fn test_grayscale_is_identity_on_gray_input() {
        let img = GrayImage::from_fn(8, 4, |x, y| Luma([(x * 10 + y) as u8]));
        let result = apply(&PixelBuffer::Gray(img.clone())).unwrap();
        assert_eq!(result, PixelBuffer::Gray(img));
    }
}
