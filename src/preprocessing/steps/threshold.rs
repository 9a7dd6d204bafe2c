use crate::config::{ThresholdConfig, ThresholdMethod};
use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;
use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;

use super::sigma_for_kernel;

/// Binarize to strictly `{0, 255}`.
pub fn apply(image: &PixelBuffer, config: &ThresholdConfig) -> Result<PixelBuffer, PreprocessError> {
    let gray = image.to_gray();
    let binary = match config.method {
        ThresholdMethod::Otsu => otsu_binarize(&gray, false),
        ThresholdMethod::Fixed => fixed_threshold(&gray, config.value),
        ThresholdMethod::AdaptiveMean => adaptive_mean(&gray, config.block_size, config.c),
        ThresholdMethod::AdaptiveGaussian => adaptive_gaussian(&gray, config.block_size, config.c),
    };
    Ok(PixelBuffer::Gray(binary))
}

/// Global Otsu threshold.
///
/// With `inverted`, pixels at or below the level become foreground (255), so
/// dark text ends up white. A uniform image has no foreground either way.
pub fn otsu_binarize(gray: &GrayImage, inverted: bool) -> GrayImage {
    let background = if inverted { 0u8 } else { 255u8 };
    let (min, max) = gray
        .pixels()
        .fold((255u8, 0u8), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if min >= max {
        return GrayImage::from_pixel(gray.width(), gray.height(), Luma([background]));
    }

    let level = otsu_level(gray);
    tracing::debug!(level, inverted, "Otsu threshold computed");
    binarize_with(gray, |v| (v > level) != inverted)
}

fn fixed_threshold(gray: &GrayImage, value: u8) -> GrayImage {
    binarize_with(gray, |v| v > value)
}

fn binarize_with<F: Fn(u8) -> bool>(gray: &GrayImage, is_white: F) -> GrayImage {
    let mut out = gray.clone();
    out.pixels_mut()
        .for_each(|p| p.0[0] = if is_white(p.0[0]) { 255 } else { 0 });
    out
}

/// Local mean thresholding: `pixel > mean(block) - c`
fn adaptive_mean(gray: &GrayImage, block_size: u32, c: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let half_window = (block_size / 2) as i64;
    let integral = compute_integral_image(gray);

    GrayImage::from_fn(width, height, |x, y| {
        let x1 = (x as i64 - half_window).max(0) as u32;
        let y1 = (y as i64 - half_window).max(0) as u32;
        let x2 = (x as i64 + half_window).min(width as i64 - 1) as u32;
        let y2 = (y as i64 + half_window).min(height as i64 - 1) as u32;

        let mean = window_mean(&integral, width, x1, y1, x2, y2);
        let pixel = gray.get_pixel(x, y).0[0] as f32;
        if pixel > mean - c {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Gaussian-weighted local mean thresholding
fn adaptive_gaussian(gray: &GrayImage, block_size: u32, c: f32) -> GrayImage {
    let weighted = gaussian_blur_f32(gray, sigma_for_kernel(block_size));
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let mean = weighted.get_pixel(x, y).0[0] as f32;
        let pixel = gray.get_pixel(x, y).0[0] as f32;
        if pixel > mean - c {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Summed-area table with a zero first row and column
fn compute_integral_image(img: &GrayImage) -> Vec<u64> {
    let (width, height) = img.dimensions();
    let stride = width as usize + 1;
    let mut table = vec![0u64; stride * (height as usize + 1)];

    for y in 0..height as usize {
        let mut row_sum = 0u64;
        for x in 0..width as usize {
            row_sum += img.get_pixel(x as u32, y as u32).0[0] as u64;
            table[(y + 1) * stride + x + 1] = row_sum + table[y * stride + x + 1];
        }
    }

    table
}

/// Mean over the inclusive window `[x1, x2] x [y1, y2]`
fn window_mean(integral: &[u64], width: u32, x1: u32, y1: u32, x2: u32, y2: u32) -> f32 {
    let stride = width as usize + 1;
    let (x1, y1, x2, y2) = (x1 as usize, y1 as usize, x2 as usize + 1, y2 as usize + 1);
    let area = ((x2 - x1) * (y2 - y1)) as f64;

    let sum = integral[y2 * stride + x2] as f64 - integral[y1 * stride + x2] as f64
        - integral[y2 * stride + x1] as f64
        + integral[y1 * stride + x1] as f64;

    (sum / area) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_binary(img: &GrayImage) -> bool {
        img.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255)
    }

    fn text_like() -> GrayImage {
        let mut img = GrayImage::from_fn(60, 30, |x, y| Luma([200 + ((x + y) % 20) as u8]));
        for x in 10..50 {
            for y in 12..16 {
                img.put_pixel(x, y, Luma([30]));
            }
        }
        img
    }

    #[test]
    fn test_every_method_produces_binary_output() {
        let gradient = GrayImage::from_fn(50, 50, |x, _| Luma([(x as u8 * 5).min(255)]));
        for method in [
            ThresholdMethod::Otsu,
            ThresholdMethod::Fixed,
            ThresholdMethod::AdaptiveMean,
            ThresholdMethod::AdaptiveGaussian,
        ] {
            let config = ThresholdConfig {
                method,
                ..ThresholdConfig::default()
            };
            let result = apply(&PixelBuffer::Gray(gradient.clone()), &config).unwrap();
            assert!(is_binary(&result.to_gray()), "{:?} is not binary", method);
        }
    }

    #[test]
    fn test_otsu_separates_text_from_background() {
        let result = otsu_binarize(&text_like(), false);
        assert_eq!(result.get_pixel(25, 13).0[0], 0);
        assert_eq!(result.get_pixel(25, 4).0[0], 255);

        let inverted = otsu_binarize(&text_like(), true);
        assert_eq!(inverted.get_pixel(25, 13).0[0], 255);
        assert_eq!(inverted.get_pixel(25, 4).0[0], 0);
    }

    #[test]
    fn test_otsu_uniform_image_has_no_foreground() {
        let blank = GrayImage::from_pixel(20, 20, Luma([255]));
        assert!(otsu_binarize(&blank, true).pixels().all(|p| p.0[0] == 0));
        assert!(otsu_binarize(&blank, false).pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_global_methods_are_idempotent_on_binary_input() {
        for method in [ThresholdMethod::Otsu, ThresholdMethod::Fixed] {
            let config = ThresholdConfig {
                method,
                ..ThresholdConfig::default()
            };
            let once = apply(&PixelBuffer::Gray(text_like()), &config).unwrap();
            let twice = apply(&once, &config).unwrap();
            assert_eq!(once, twice, "{:?} is not idempotent", method);
        }
    }

    #[test]
    fn test_adaptive_mean_handles_uneven_lighting() {
        // Dark stroke on a background that brightens left to right
        let mut img = GrayImage::from_fn(80, 20, |x, _| Luma([100 + x as u8]));
        for x in 5..75 {
            img.put_pixel(x, 10, Luma([(60 + x) as u8]));
        }
        let result = adaptive_mean(&img, 11, 5.0);
        assert_eq!(result.get_pixel(10, 10).0[0], 0);
        assert_eq!(result.get_pixel(70, 10).0[0], 0);
        assert_eq!(result.get_pixel(70, 3).0[0], 255);
    }
}
