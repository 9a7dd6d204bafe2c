use crate::config::{SharpenConfig, SharpenMethod};
use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;
use image::GrayImage;
use imageproc::filter::{filter3x3, gaussian_blur_f32};

/// Sharpen every channel with an unsharp mask or a scaled high-pass kernel
pub fn apply(image: &PixelBuffer, config: &SharpenConfig) -> Result<PixelBuffer, PreprocessError> {
    let (strength, sigma) = (config.strength, config.sigma);
    Ok(match config.method {
        SharpenMethod::UnsharpMask => image.map_planes(|plane| unsharp_mask(plane, sigma, strength)),
        SharpenMethod::Kernel => image.map_planes(|plane| high_pass(plane, strength)),
    })
}

/// `p + strength * (p - blur(p))`, clipped
fn unsharp_mask(plane: &GrayImage, sigma: f32, strength: f32) -> GrayImage {
    let blurred = gaussian_blur_f32(plane, sigma);
    let mut out = plane.clone();
    for (p, b) in out.pixels_mut().zip(blurred.pixels()) {
        let v = p.0[0] as f32;
        p.0[0] = (v + strength * (v - b.0[0] as f32)).round().clamp(0.0, 255.0) as u8;
    }
    out
}

fn high_pass(plane: &GrayImage, strength: f32) -> GrayImage {
    // Center 9, neighbors -1; sums to 1 at strength 1
    let kernel: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0].map(|k| k * strength);
    let sharpened: GrayImage = filter3x3(plane, &kernel);
    sharpened
}
