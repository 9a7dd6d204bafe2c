use crate::config::{MorphOperation, MorphologyConfig};
use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;
use image::GrayImage;
use imageproc::morphology::{grayscale_close, grayscale_dilate, grayscale_erode, grayscale_open, Mask};

/// Grayscale morphology with a square structuring element, per channel
pub fn apply(image: &PixelBuffer, config: &MorphologyConfig) -> Result<PixelBuffer, PreprocessError> {
    let size = config.kernel_size;
    let op = config.operation;
    Ok(image.map_planes(|plane| match op {
        MorphOperation::Open => open(plane, size),
        MorphOperation::Close => close(plane, size),
        MorphOperation::Dilate => dilate(plane, size),
        MorphOperation::Erode => erode(plane, size),
    }))
}

/// Minimum over a `size` x `size` window
pub fn erode(img: &GrayImage, size: u32) -> GrayImage {
    with_square(img, size, grayscale_erode)
}

/// Maximum over a `size` x `size` window
pub fn dilate(img: &GrayImage, size: u32) -> GrayImage {
    with_square(img, size, grayscale_dilate)
}

/// Erode then dilate; removes bright specks smaller than the window
pub fn open(img: &GrayImage, size: u32) -> GrayImage {
    with_square(img, size, grayscale_open)
}

/// Dilate then erode; fills dark gaps smaller than the window
pub fn close(img: &GrayImage, size: u32) -> GrayImage {
    with_square(img, size, grayscale_close)
}

/// Run `op` with a square mask of radius `size / 2`.
///
/// Radii above 255 are clamped; validated configurations never exceed
/// [`MAX_KERNEL_SIZE`](crate::config::MAX_KERNEL_SIZE).
fn with_square(img: &GrayImage, size: u32, op: fn(&GrayImage, &Mask) -> GrayImage) -> GrayImage {
    let radius = (size / 2).min(u8::MAX as u32) as u8;
    if radius == 0 || img.width() == 0 || img.height() == 0 {
        return img.clone();
    }
    op(img, &Mask::square(radius))
}
