//! Split a multi-line crop into one crop per text line.

use super::buffer::PixelBuffer;
use super::steps::threshold::otsu_binarize;
use image::imageops;

/// Half-open row range `[start, end)` containing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineBand {
    pub start: u32,
    pub end: u32,
}

impl LineBand {
    pub fn height(&self) -> u32 {
        self.end - self.start
    }
}

/// Rows with foreground, grouped into bands of at least `min_line_height`.
pub fn find_bands(image: &PixelBuffer, min_line_height: u32) -> Vec<LineBand> {
    let binary = otsu_binarize(&image.to_gray(), true);
    let (width, height) = binary.dimensions();
    let profile: Vec<u32> = (0..height)
        .map(|y| (0..width).filter(|&x| binary.get_pixel(x, y).0[0] > 0).count() as u32)
        .collect();

    let mut bands = Vec::new();
    let mut start = None;
    for (y, &count) in profile.iter().enumerate() {
        match (start, count > 0) {
            (None, true) => start = Some(y as u32),
            (Some(s), false) => {
                bands.push(LineBand { start: s, end: y as u32 });
                start = None;
            }
            _ => {}
        }
    }
    // Band running into the last row
    if let Some(s) = start {
        bands.push(LineBand { start: s, end: height });
    }

    bands.retain(|band| band.height() >= min_line_height);
    bands
}

/// Crop each text line, padded vertically by about 1% of the image height.
///
/// Never empty: without any qualifying band the whole image is one line.
pub fn split_lines(image: &PixelBuffer, min_line_height: u32) -> Vec<PixelBuffer> {
    let bands = find_bands(image, min_line_height);
    if bands.is_empty() {
        return vec![image.clone()];
    }

    let (width, height) = image.dimensions();
    let pad = ((height as f32 * 0.01).round() as u32).max(1);
    tracing::debug!(lines = bands.len(), pad, "Line bands found");

    bands
        .into_iter()
        .map(|band| {
            let top = band.start.saturating_sub(pad);
            let bottom = (band.end + pad).min(height);
            crop_rows(image, top, bottom - top, width)
        })
        .collect()
}

fn crop_rows(image: &PixelBuffer, top: u32, rows: u32, width: u32) -> PixelBuffer {
    match image {
        PixelBuffer::Gray(img) => PixelBuffer::Gray(imageops::crop_imm(img, 0, top, width, rows).to_image()),
        PixelBuffer::Color(img) => PixelBuffer::Color(imageops::crop_imm(img, 0, top, width, rows).to_image()),
    }
}
