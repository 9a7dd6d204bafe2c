use crate::config::{DenoiseConfig, DenoiseMethod};
use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;
use image::{GrayImage, Luma};
use imageproc::filter::{bilateral_filter, gaussian_blur_f32, median_filter};

use super::{morphology, sigma_for_kernel};

/// Reduce noise on every channel with the configured filter
pub fn apply(image: &PixelBuffer, config: &DenoiseConfig) -> Result<PixelBuffer, PreprocessError> {
    if image.is_empty() {
        return Ok(image.clone());
    }
    let k = config.kernel_size;
    let denoised = match config.method {
        DenoiseMethod::NonLocalMeans => image.map_planes(|plane| {
            non_local_means(plane, config.h, config.template_window, config.search_window)
        }),
        DenoiseMethod::Bilateral => image
            .map_planes(|plane| bilateral_filter(plane, k.max(3), config.sigma_color, config.sigma_space)),
        DenoiseMethod::Gaussian => image.map_planes(|plane| gaussian_blur_f32(plane, sigma_for_kernel(k))),
        // Median preserves edges better than Gaussian blur
        DenoiseMethod::Median => image.map_planes(|plane| median_filter(plane, k / 2, k / 2)),
        DenoiseMethod::MorphClose => image.map_planes(|plane| morphology::close(plane, k)),
    };
    Ok(denoised)
}

/// Copy `img` into a row-major float plane with `border` replicated edge
/// pixels on every side. Returns the plane and its stride.
fn replicate_border(img: &GrayImage, border: usize) -> (Vec<f32>, usize) {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let stride = width + 2 * border;
    let mut padded = Vec::with_capacity(stride * (height + 2 * border));
    for py in 0..height + 2 * border {
        let y = py.saturating_sub(border).min(height - 1) as u32;
        for px in 0..stride {
            let x = px.saturating_sub(border).min(width - 1) as u32;
            padded.push(img.get_pixel(x, y).0[0] as f32);
        }
    }
    (padded, stride)
}

/// Non-local means: average pixels whose surrounding patches look alike.
///
/// Patch distance is the mean squared difference over a `template` window;
/// candidates come from a `search` window and are weighted by `exp(-d / h^2)`.
fn non_local_means(img: &GrayImage, h: f32, template: u32, search: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }
    let t = (template / 2) as usize;
    let s = (search / 2) as i64;
    let side = 2 * t + 1;
    let patch_len = (side * side) as f32;
    let inv_h2 = 1.0 / (h * h).max(f32::EPSILON);
    let (padded, stride) = replicate_border(img, t);

    // Top-left corner of the patch centred on (x, y), in padded coordinates
    let patch_at = |x: usize, y: usize| y * stride + x;

    GrayImage::from_fn(width, height, |x, y| {
        let p = patch_at(x as usize, y as usize);
        let (mut sum, mut norm) = (0f32, 0f32);
        for sy in -s..=s {
            for sx in -s..=s {
                let (qx, qy) = (x as i64 + sx, y as i64 + sy);
                if qx < 0 || qy < 0 || qx >= width as i64 || qy >= height as i64 {
                    continue;
                }
                let q = patch_at(qx as usize, qy as usize);
                let mut dist = 0f32;
                for row in 0..side {
                    let a = &padded[p + row * stride..p + row * stride + side];
                    let b = &padded[q + row * stride..q + row * stride + side];
                    dist += a.iter().zip(b).map(|(u, v)| (u - v) * (u - v)).sum::<f32>();
                }
                let w = (-(dist / patch_len) * inv_h2).exp();
                sum += w * padded[q + t * stride + t];
                norm += w;
            }
        }
        Luma([(sum / norm).round().clamp(0.0, 255.0) as u8])
    })
}
