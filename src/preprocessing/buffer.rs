//! In-memory 8-bit image, either single-channel or three-channel.

use crate::error::PreprocessError;
use image::{imageops, DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use std::path::Path;

/// The unit of data passed between pipeline steps.
///
/// Steps borrow a buffer and return a fresh one; nothing is mutated in place
/// across a step boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    Gray(GrayImage),
    Color(RgbImage),
}

impl PixelBuffer {
    /// Decode an image file; alpha is dropped and 16-bit data narrowed to 8 bits
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PreprocessError> {
        Ok(Self::from(image::open(path)?))
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Gray(img) => img.width(),
            Self::Color(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Gray(img) => img.height(),
            Self::Color(img) => img.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn channels(&self) -> u8 {
        match self {
            Self::Gray(_) => 1,
            Self::Color(_) => 3,
        }
    }

    pub fn is_gray(&self) -> bool {
        matches!(self, Self::Gray(_))
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Luma view of the buffer (a copy for color input)
    pub fn to_gray(&self) -> GrayImage {
        match self {
            Self::Gray(img) => img.clone(),
            Self::Color(img) => luma_of(img),
        }
    }

    pub fn into_gray(self) -> GrayImage {
        match self {
            Self::Gray(img) => img,
            Self::Color(img) => luma_of(&img),
        }
    }

    pub fn into_dynamic(self) -> DynamicImage {
        match self {
            Self::Gray(img) => DynamicImage::ImageLuma8(img),
            Self::Color(img) => DynamicImage::ImageRgb8(img),
        }
    }

    /// Split into one plane per channel
    pub fn planes(&self) -> Vec<GrayImage> {
        match self {
            Self::Gray(img) => vec![img.clone()],
            Self::Color(img) => (0..3)
                .map(|c| GrayImage::from_fn(img.width(), img.height(), |x, y| Luma([img.get_pixel(x, y).0[c]])))
                .collect(),
        }
    }

    /// Rebuild from one or three planes of identical size.
    pub fn from_planes(mut planes: Vec<GrayImage>) -> Option<Self> {
        match planes.len() {
            1 => planes.pop().map(Self::Gray),
            3 => {
                let (w, h) = planes[0].dimensions();
                if planes.iter().any(|p| p.dimensions() != (w, h)) {
                    return None;
                }
                Some(Self::Color(RgbImage::from_fn(w, h, |x, y| {
                    Rgb([
                        planes[0].get_pixel(x, y).0[0],
                        planes[1].get_pixel(x, y).0[0],
                        planes[2].get_pixel(x, y).0[0],
                    ])
                })))
            }
            _ => None,
        }
    }

    /// Apply a single-channel operation to every channel.
    ///
    /// `op` must return planes of one common size for a given input size.
    pub fn map_planes<F>(&self, op: F) -> Self
    where
        F: Fn(&GrayImage) -> GrayImage,
    {
        match self {
            Self::Gray(img) => Self::Gray(op(img)),
            Self::Color(_) => {
                let planes: Vec<GrayImage> = self.planes().iter().map(&op).collect();
                let (w, h) = planes[0].dimensions();
                Self::Color(RgbImage::from_fn(w, h, |x, y| {
                    Rgb([
                        planes[0].get_pixel(x, y).0[0],
                        planes[1].get_pixel(x, y).0[0],
                        planes[2].get_pixel(x, y).0[0],
                    ])
                }))
            }
        }
    }

    /// Pixel-wise `255 - v` on every channel
    pub fn inverted(&self) -> Self {
        let mut out = self.clone();
        match &mut out {
            Self::Gray(img) => img.pixels_mut().for_each(|p| p.0[0] = 255 - p.0[0]),
            Self::Color(img) => img
                .pixels_mut()
                .for_each(|p| p.0.iter_mut().for_each(|v| *v = 255 - *v)),
        }
        out
    }
}

// `imageops::grayscale` cannot handle a zero-width source
fn luma_of(img: &RgbImage) -> GrayImage {
    if img.width() == 0 || img.height() == 0 {
        return GrayImage::new(img.width(), img.height());
    }
    imageops::grayscale(img)
}

impl From<GrayImage> for PixelBuffer {
    fn from(img: GrayImage) -> Self {
        Self::Gray(img)
    }
}

impl From<RgbImage> for PixelBuffer {
    fn from(img: RgbImage) -> Self {
        Self::Color(img)
    }
}

impl From<DynamicImage> for PixelBuffer {
    fn from(img: DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(gray) => Self::Gray(gray),
            gray @ (DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)) => Self::Gray(gray.to_luma8()),
            DynamicImage::ImageRgb8(rgb) => Self::Color(rgb),
            other => Self::Color(other.to_rgb8()),
        }
    }
}
