use crate::config::{ClaheConfig, ClaheMode};
use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;
use image::{GrayImage, Luma, Rgb, RgbImage};

use super::color::{lab_to_rgb, rgb_to_lab};

/// Contrast-limited adaptive histogram equalization.
///
/// `lab` equalizes lightness only and keeps chroma, `rgb` equalizes each
/// channel independently, `gray` converts to one channel first. Single-channel
/// input is equalized directly in every mode.
pub fn apply(image: &PixelBuffer, config: &ClaheConfig) -> Result<PixelBuffer, PreprocessError> {
    let (clip, grid) = (config.clip_limit, config.tile_grid);
    let rgb = match image {
        PixelBuffer::Gray(gray) => return Ok(PixelBuffer::Gray(clahe(gray, grid, clip))),
        PixelBuffer::Color(rgb) => rgb,
    };

    Ok(match config.mode {
        ClaheMode::Gray => PixelBuffer::Gray(clahe(&image.to_gray(), grid, clip)),
        ClaheMode::Rgb => image.map_planes(|plane| clahe(plane, grid, clip)),
        ClaheMode::Lab => PixelBuffer::Color(clahe_lightness(rgb, grid, clip)),
    })
}

fn clahe_lightness(rgb: &RgbImage, grid: u32, clip: f32) -> RgbImage {
    let lab: Vec<[f32; 3]> = rgb.pixels().map(|p| rgb_to_lab(p.0)).collect();
    let width = rgb.width();
    let lightness = GrayImage::from_fn(width, rgb.height(), |x, y| {
        Luma([lab[(y * width + x) as usize][0].round().clamp(0.0, 255.0) as u8])
    });
    let equalized = clahe(&lightness, grid, clip);

    RgbImage::from_fn(width, rgb.height(), |x, y| {
        let [_, a, b] = lab[(y * width + x) as usize];
        Rgb(lab_to_rgb([equalized.get_pixel(x, y).0[0] as f32, a, b]))
    })
}

/// CLAHE on one plane with a `grid` x `grid` tiling.
///
/// Each tile's histogram is clipped at `clip_limit * tile_pixels / 256`, the
/// excess spread evenly, and pixels are mapped by bilinear interpolation of
/// the four nearest tile lookup tables.
pub fn clahe(gray: &GrayImage, grid: u32, clip_limit: f32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let tiles_x = grid.min(w).max(1) as usize;
    let tiles_y = grid.min(h).max(1) as usize;
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let (w, h) = (w as usize, h as usize);
    let tile_w = w / tiles_x;
    let tile_h = h / tiles_y;

    let mut luts = vec![[0u8; 256]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = if tx == tiles_x - 1 { w } else { x0 + tile_w };
            let y1 = if ty == tiles_y - 1 { h } else { y0 + tile_h };

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x as u32, y as u32).0[0] as usize] += 1;
                }
            }
            let tile_pixels = ((x1 - x0) * (y1 - y0)) as u32;
            luts[ty * tiles_x + tx] = tile_lut(hist, tile_pixels, clip_limit);
        }
    }

    let mut out = GrayImage::new(w as u32, h as u32);
    for y in 0..h {
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let ty0 = (fy.floor() as i64).clamp(0, tiles_y as i64 - 1) as usize;
        let ty1 = (fy.floor() as i64 + 1).clamp(0, tiles_y as i64 - 1) as usize;
        let ay = (fy - fy.floor()).clamp(0.0, 1.0);
        for x in 0..w {
            let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
            let tx0 = (fx.floor() as i64).clamp(0, tiles_x as i64 - 1) as usize;
            let tx1 = (fx.floor() as i64 + 1).clamp(0, tiles_x as i64 - 1) as usize;
            let ax = (fx - fx.floor()).clamp(0.0, 1.0);

            let v = gray.get_pixel(x as u32, y as u32).0[0] as usize;
            let top = luts[ty0 * tiles_x + tx0][v] as f32 * (1.0 - ax) + luts[ty0 * tiles_x + tx1][v] as f32 * ax;
            let bottom = luts[ty1 * tiles_x + tx0][v] as f32 * (1.0 - ax) + luts[ty1 * tiles_x + tx1][v] as f32 * ax;
            let value = top * (1.0 - ay) + bottom * ay;
            out.put_pixel(x as u32, y as u32, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

fn tile_lut(mut hist: [u32; 256], tile_pixels: u32, clip_limit: f32) -> [u8; 256] {
    let clip = ((clip_limit * tile_pixels as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }
    let per_bin = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += per_bin + u32::from(i < remainder);
    }

    let scale = 255.0 / tile_pixels.max(1) as f32;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (i, count) in hist.iter().enumerate() {
        cumulative += count;
        lut[i] = (cumulative as f32 * scale).round().min(255.0) as u8;
    }
    lut
}
