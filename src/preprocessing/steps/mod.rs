//! Individual preprocessing steps
//!
//! Each step is a pure function `(&PixelBuffer, &StepConfig) -> Result<PixelBuffer>`.

pub mod color;
pub mod contrast;
pub mod deblur;
pub mod denoise;
pub mod deskew;
pub mod grayscale;
pub mod invert;
pub mod morphology;
pub mod pad;
pub mod perspective;
pub mod resize;
pub mod shadow;
pub mod sharpen;
pub mod threshold;

/// Gaussian sigma equivalent to a square kernel of the given (odd) size
pub(crate) fn sigma_for_kernel(kernel_size: u32) -> f32 {
    let k = kernel_size.max(1) as f32;
    (0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8).max(0.1)
}
