//! Color normalization, plus the LAB and YCrCb conversions other steps share.
//!
//! All conversions use the 8-bit encodings common to imaging libraries:
//! `L` scaled to 0..=255 and `a`/`b` offset by 128; `Cr`/`Cb` offset by 128.

use crate::config::{ColorConfig, ColorMethod};
use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::equalize_histogram;

/// Normalize colors of a three-channel crop; grayscale input is returned as is
pub fn apply(image: &PixelBuffer, config: &ColorConfig) -> Result<PixelBuffer, PreprocessError> {
    let rgb = match image {
        PixelBuffer::Gray(_) => {
            tracing::debug!("Color normalization skipped for single-channel input");
            return Ok(image.clone());
        }
        PixelBuffer::Color(rgb) => rgb,
    };

    let normalized = match config.method {
        ColorMethod::SimpleWhiteBalance => simple_white_balance(rgb, config.strength),
        ColorMethod::GrayWorld => gray_world(rgb),
        ColorMethod::HistogramEqualization => equalize_luma(rgb),
    };
    Ok(PixelBuffer::Color(normalized))
}

/// Pull the a/b chroma channels toward neutral, weighted by lightness
fn simple_white_balance(rgb: &RgbImage, strength: f32) -> RgbImage {
    let lab: Vec<[f32; 3]> = rgb.pixels().map(|p| rgb_to_lab(p.0)).collect();
    let count = lab.len().max(1) as f32;
    let avg_a = lab.iter().map(|v| v[1]).sum::<f32>() / count;
    let avg_b = lab.iter().map(|v| v[2]).sum::<f32>() / count;
    tracing::debug!(avg_a, avg_b, "White balance chroma offsets");

    let mut out = RgbImage::new(rgb.width(), rgb.height());
    for (pixel, [l, a, b]) in out.pixels_mut().zip(lab) {
        let weight = l / 255.0 * strength;
        let a = a - (avg_a - 128.0) * weight;
        let b = b - (avg_b - 128.0) * weight;
        *pixel = Rgb(lab_to_rgb([l, a, b]));
    }
    out
}

/// Scale each channel so its mean matches the mean over all channels
fn gray_world(rgb: &RgbImage) -> RgbImage {
    let mut sums = [0f64; 3];
    for p in rgb.pixels() {
        for c in 0..3 {
            sums[c] += p.0[c] as f64;
        }
    }
    let count = (rgb.width() as f64 * rgb.height() as f64).max(1.0);
    let means = sums.map(|s| s / count);
    let overall = means.iter().sum::<f64>() / 3.0;
    let gains = means.map(|m| if m > 0.0 { overall / m } else { 1.0 });

    let mut out = rgb.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            p.0[c] = (p.0[c] as f64 * gains[c]).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Histogram-equalize the luma channel of YCrCb, leaving chroma untouched
fn equalize_luma(rgb: &RgbImage) -> RgbImage {
    let ycrcb: Vec<[f32; 3]> = rgb.pixels().map(|p| rgb_to_ycrcb(p.0)).collect();
    let luma = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let idx = (y * rgb.width() + x) as usize;
        Luma([ycrcb[idx][0].round().clamp(0.0, 255.0) as u8])
    });
    let equalized = equalize_histogram(&luma);

    RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let idx = (y * rgb.width() + x) as usize;
        let [_, cr, cb] = ycrcb[idx];
        Rgb(ycrcb_to_rgb([equalized.get_pixel(x, y).0[0] as f32, cr, cb]))
    })
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

const WHITE_X: f32 = 0.950_456;
const WHITE_Z: f32 = 1.088_754;
const LAB_EPSILON: f32 = 0.008_856;

pub(crate) fn rgb_to_lab(rgb: [u8; 3]) -> [f32; 3] {
    let [r, g, b] = rgb.map(|v| srgb_to_linear(v as f32 / 255.0));
    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / WHITE_X;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / WHITE_Z;

    let f = |t: f32| {
        if t > LAB_EPSILON {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    };
    let l = if y > LAB_EPSILON {
        116.0 * y.cbrt() - 16.0
    } else {
        903.3 * y
    };
    let a = 500.0 * (f(x) - f(y));
    let b = 200.0 * (f(y) - f(z));
    [l * 255.0 / 100.0, a + 128.0, b + 128.0]
}

pub(crate) fn lab_to_rgb(lab: [f32; 3]) -> [u8; 3] {
    let l = lab[0] * 100.0 / 255.0;
    let (a, b) = (lab[1] - 128.0, lab[2] - 128.0);

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let finv = |t: f32| {
        let cube = t * t * t;
        if cube > LAB_EPSILON {
            cube
        } else {
            (t - 16.0 / 116.0) / 7.787
        }
    };
    let y = if l > 7.9996 { fy * fy * fy } else { l / 903.3 };
    let x = finv(fx) * WHITE_X;
    let z = finv(fz) * WHITE_Z;

    let r = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
    let g = -0.969_256 * x + 1.875_991 * y + 0.041_556 * z;
    let b = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;
    [r, g, b].map(|c| (linear_to_srgb(c.clamp(0.0, 1.0)) * 255.0).round().clamp(0.0, 255.0) as u8)
}

pub(crate) fn rgb_to_ycrcb(rgb: [u8; 3]) -> [f32; 3] {
    let [r, g, b] = rgb.map(|v| v as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    [y, (r - y) * 0.713 + 128.0, (b - y) * 0.564 + 128.0]
}

pub(crate) fn ycrcb_to_rgb(ycrcb: [f32; 3]) -> [u8; 3] {
    let [y, cr, cb] = ycrcb;
    let (cr, cb) = (cr - 128.0, cb - 128.0);
    [y + 1.403 * cr, y - 0.714 * cr - 0.344 * cb, y + 1.773 * cb]
        .map(|c| c.round().clamp(0.0, 255.0) as u8)
}
