use crate::config::{ShadowConfig, ShadowMethod};
use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;
use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

use super::{morphology, sigma_for_kernel};

/// Flatten uneven illumination by dividing out a smooth background estimate.
///
/// The background is either a large-window closing (dark strokes thinner than
/// the window vanish from it) or a wide Gaussian blur. Pixels darker than the
/// background keep their difference; the result is stretched to `0..=255`.
pub fn apply(image: &PixelBuffer, config: &ShadowConfig) -> Result<PixelBuffer, PreprocessError> {
    let gray = image.to_gray();
    let background = match config.method {
        ShadowMethod::MorphOpen => morphology::close(&gray, config.kernel_size),
        ShadowMethod::BlurSubtract => gaussian_blur_f32(&gray, sigma_for_kernel(config.kernel_size)),
    };

    let flattened = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let bg = background.get_pixel(x, y).0[0];
        let px = gray.get_pixel(x, y).0[0];
        Luma([255 - bg.saturating_sub(px)])
    });

    Ok(PixelBuffer::Gray(stretch(&flattened)))
}

/// Min-max stretch to the full range; uniform images are returned as is
pub(crate) fn stretch(gray: &GrayImage) -> GrayImage {
    let (min_val, max_val) = find_min_max(gray);
    if max_val <= min_val {
        return gray.clone();
    }

    let range = (max_val - min_val) as f32;
    let mut out = gray.clone();
    for p in out.pixels_mut() {
        p.0[0] = ((p.0[0] - min_val) as f32 / range * 255.0).round() as u8;
    }
    out
}

fn find_min_max(img: &GrayImage) -> (u8, u8) {
    img.pixels()
        .fold((255u8, 0u8), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shaded_stroke() -> GrayImage {
        let mut img = GrayImage::from_fn(120, 30, |x, _| Luma([100 + x as u8]));
        for x in 20..100 {
            for y in 14..17 {
                img.put_pixel(x, y, Luma([30]));
            }
        }
        img
    }

    #[test]
    fn test_morph_open_flattens_gradient() {
        let result = apply(&PixelBuffer::Gray(shaded_stroke()), &ShadowConfig::default())
            .unwrap()
            .into_gray();

        let left = result.get_pixel(15, 3).0[0] as i32;
        let right = result.get_pixel(110, 3).0[0] as i32;
        assert!((left - right).abs() <= 10, "background not flat: {} vs {}", left, right);
        assert!(result.get_pixel(60, 15).0[0] < 200);
    }

    #[test]
    fn test_blur_subtract_keeps_dimensions() {
        let config = ShadowConfig {
            method: ShadowMethod::BlurSubtract,
            ..ShadowConfig::default()
        };
        let result = apply(&PixelBuffer::Gray(shaded_stroke()), &config).unwrap();
        assert!(result.is_gray());
        assert_eq!(result.dimensions(), (120, 30));
    }

    #[test]
    fn test_stretch_uses_full_range() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([50 + (x as u8 * 15).min(150)]));
        let (min, max) = find_min_max(&stretch(&img));
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn test_stretch_handles_uniform_image() {
        let img = GrayImage::from_pixel(10, 10, Luma([128]));
        assert_eq!(stretch(&img).get_pixel(0, 0).0[0], 128);
    }
}
