//! Deconvolution against a horizontal motion-blur kernel.
//!
//! The assumed point-spread function is a `1 x kernel_size` box, so both
//! methods work row by row. The numerical backend is behind the `deblur`
//! cargo feature; without it [`apply`] reports
//! [`PreprocessError::CapabilityUnavailable`] and the pipeline keeps its input.

use crate::config::DeblurConfig;
use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;

/// Whether this build carries the deconvolution backend
pub fn available() -> bool {
    cfg!(feature = "deblur")
}

#[cfg(feature = "deblur")]
pub fn apply(image: &PixelBuffer, config: &DeblurConfig) -> Result<PixelBuffer, PreprocessError> {
    use crate::config::DeblurMethod;

    let k = config.kernel_size.max(1) as usize;
    Ok(match config.method {
        DeblurMethod::Wiener => image.map_planes(|plane| backend::wiener(plane, k, config.snr)),
        DeblurMethod::RichardsonLucy => {
            image.map_planes(|plane| backend::richardson_lucy(plane, k, config.iterations))
        }
    })
}

#[cfg(not(feature = "deblur"))]
pub fn apply(_image: &PixelBuffer, _config: &DeblurConfig) -> Result<PixelBuffer, PreprocessError> {
    Err(PreprocessError::CapabilityUnavailable("deblur"))
}

#[cfg(feature = "deblur")]
mod backend {
    use image::GrayImage;
    use ndarray::Array2;
    use rustfft::num_complex::Complex;
    use rustfft::FftPlanner;

    const EPS: f32 = 1e-6;

    /// Per-row Wiener filter: `X = Y * conj(H) / (|H|^2 + 1/snr)`
    pub(super) fn wiener(plane: &GrayImage, k: usize, snr: f32) -> GrayImage {
        let (width, height) = (plane.width() as usize, plane.height() as usize);
        if width == 0 || height == 0 {
            return plane.clone();
        }

        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(width);
        let inverse = planner.plan_fft_inverse(width);

        let mut psf = vec![Complex::new(0.0, 0.0); width];
        for i in 0..k {
            let idx = (i as i64 - (k / 2) as i64).rem_euclid(width as i64) as usize;
            psf[idx].re += 1.0 / k as f32;
        }
        forward.process(&mut psf);
        let noise = 1.0 / snr.max(EPS);
        let filter: Vec<Complex<f32>> = psf.iter().map(|h| h.conj() / (h.norm_sqr() + noise)).collect();

        let mut out = plane.clone();
        let mut row = vec![Complex::new(0.0, 0.0); width];
        for y in 0..height {
            for (x, v) in row.iter_mut().enumerate() {
                *v = Complex::new(plane.get_pixel(x as u32, y as u32).0[0] as f32, 0.0);
            }
            forward.process(&mut row);
            row.iter_mut().zip(&filter).for_each(|(v, f)| *v *= f);
            inverse.process(&mut row);
            for (x, v) in row.iter().enumerate() {
                let value = (v.re / width as f32).round().clamp(0.0, 255.0) as u8;
                out.get_pixel_mut(x as u32, y as u32).0[0] = value;
            }
        }
        out
    }

    /// Richardson-Lucy iterations starting from a flat mid-gray estimate
    pub(super) fn richardson_lucy(plane: &GrayImage, k: usize, iterations: u32) -> GrayImage {
        let (width, height) = (plane.width() as usize, plane.height() as usize);
        if width == 0 || height == 0 {
            return plane.clone();
        }

        let observed = Array2::from_shape_fn((height, width), |(y, x)| {
            plane.get_pixel(x as u32, y as u32).0[0] as f32 / 255.0
        });
        let mut estimate = Array2::<f32>::from_elem((height, width), 0.5);

        for _ in 0..iterations {
            let blurred = convolve_rows(&estimate, k).mapv(|v| v + EPS);
            let ratio = &observed / &blurred;
            // Symmetric kernel: correlation equals convolution
            estimate *= &convolve_rows(&ratio, k);
        }

        let mut out = plane.clone();
        for ((y, x), v) in estimate.indexed_iter() {
            out.get_pixel_mut(x as u32, y as u32).0[0] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        out
    }

    /// Box filter along each row with replicated edges
    fn convolve_rows(data: &Array2<f32>, k: usize) -> Array2<f32> {
        let (height, width) = data.dim();
        let half = (k / 2) as i64;
        Array2::from_shape_fn((height, width), |(y, x)| {
            let sum: f32 = (0..k as i64)
                .map(|i| {
                    let xx = (x as i64 + i - half).clamp(0, width as i64 - 1) as usize;
                    data[[y, xx]]
                })
                .sum();
            sum / k as f32
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[cfg(feature = "deblur")]
    use crate::config::DeblurMethod;

    #[cfg(feature = "deblur")]
    fn bars() -> GrayImage {
        GrayImage::from_fn(60, 4, |x, _| if (x / 6) % 2 == 0 { Luma([40]) } else { Luma([220]) })
    }

    /// Horizontal box blur; `wrap` selects circular or replicated edges
    #[cfg(feature = "deblur")]
    fn motion_blur(img: &GrayImage, k: i64, wrap: bool) -> GrayImage {
        let w = img.width() as i64;
        GrayImage::from_fn(img.width(), img.height(), |x, y| {
            let sum: f32 = (0..k)
                .map(|i| {
                    let xx = x as i64 + i - k / 2;
                    let xx = if wrap { xx.rem_euclid(w) } else { xx.clamp(0, w - 1) };
                    img.get_pixel(xx as u32, y).0[0] as f32
                })
                .sum();
            Luma([(sum / k as f32).round() as u8])
        })
    }

    #[cfg(feature = "deblur")]
    fn mean_abs_error(a: &GrayImage, b: &GrayImage) -> f64 {
        let total: f64 = a
            .pixels()
            .zip(b.pixels())
            .map(|(p, q)| (p.0[0] as f64 - q.0[0] as f64).abs())
            .sum();
        total / (a.width() * a.height()) as f64
    }

    #[cfg(feature = "deblur")]
    #[test]
    fn test_wiener_restores_motion_blur() {
        let sharp = bars();
        let blurred = motion_blur(&sharp, 5, true);
        let config = DeblurConfig::default();
        let restored = apply(&PixelBuffer::Gray(blurred.clone()), &config).unwrap().into_gray();
        assert!(mean_abs_error(&restored, &sharp) < mean_abs_error(&blurred, &sharp));
    }

    #[cfg(feature = "deblur")]
    #[test]
    fn test_richardson_lucy_restores_motion_blur() {
        let sharp = bars();
        let blurred = motion_blur(&sharp, 5, false);
        let config = DeblurConfig {
            method: DeblurMethod::RichardsonLucy,
            iterations: 30,
            ..DeblurConfig::default()
        };
        let restored = apply(&PixelBuffer::Gray(blurred.clone()), &config).unwrap().into_gray();
        assert!(mean_abs_error(&restored, &sharp) < mean_abs_error(&blurred, &sharp));
    }

    #[cfg(feature = "deblur")]
    #[test]
    fn test_capability_reported() {
        assert!(available());
    }

    #[cfg(not(feature = "deblur"))]
    #[test]
    fn test_missing_backend_is_reported() {
        assert!(!available());
        let buffer = PixelBuffer::Gray(GrayImage::from_pixel(4, 4, Luma([1])));
        let err = apply(&buffer, &DeblurConfig::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::CapabilityUnavailable("deblur")));
    }
}
