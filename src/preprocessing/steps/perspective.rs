use crate::config::PerspectiveConfig;
use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;
use crate::preprocessing::geometry::{external_contours, order_corners, warp_plane, MinAreaRect, Point};
use imageproc::geometric_transformations::Projection;

use super::pad::pad_constant;
use super::threshold::otsu_binarize;

/// Rectified outputs flatter than this are rejected
const MAX_ASPECT: f32 = 8.0;

/// Rectified outputs larger than this multiple of the source are rejected
const MAX_GROWTH: f32 = 3.0;

/// Rectify the region spanned by the significant contours.
///
/// The minimum-area rectangle around all contour points is warped onto an
/// axis-aligned rectangle, then framed with a constant margin. When there is
/// nothing to rectify, or the rectangle fails the plausibility checks, the
/// input is returned unchanged.
pub fn apply(image: &PixelBuffer, config: &PerspectiveConfig) -> Result<PixelBuffer, PreprocessError> {
    match rectify(image, config) {
        Ok(Some(warped)) => Ok(warped),
        Ok(None) => Ok(image.clone()),
        Err(PreprocessError::DegenerateGeometry(reason)) => {
            tracing::warn!("Perspective warp skipped: {}", reason);
            Ok(image.clone())
        }
        Err(e) => Err(e),
    }
}

fn rectify(image: &PixelBuffer, config: &PerspectiveConfig) -> Result<Option<PixelBuffer>, PreprocessError> {
    let binary = otsu_binarize(&image.to_gray(), true);
    let contours = external_contours(&binary, config.min_contour_area);
    if contours.is_empty() {
        tracing::debug!("No contours above the area threshold, skipping perspective warp");
        return Ok(None);
    }

    let points: Vec<Point> = contours.into_iter().flatten().collect();
    let rect = MinAreaRect::from_points(&points)
        .ok_or_else(|| PreprocessError::DegenerateGeometry("empty point set".to_string()))?;
    let [tl, tr, br, bl] = order_corners(&rect.corners());

    let width = tl.distance(&tr).max(bl.distance(&br)).round();
    let height = tl.distance(&bl).max(tr.distance(&br)).round();
    check_plausible(width, height, image.width(), image.height())?;
    let (out_w, out_h) = (width as u32, height as u32);

    let right = out_w as f32 - 1.0;
    let bottom = out_h as f32 - 1.0;
    let target = [(0.0, 0.0), (right, 0.0), (right, bottom), (0.0, bottom)];
    let source = [tl, tr, br, bl].map(|p| (p.x, p.y));
    let to_source = Projection::from_control_points(target, source)
        .ok_or_else(|| PreprocessError::DegenerateGeometry("singular perspective transform".to_string()))?;

    tracing::debug!(out_w, out_h, angle = rect.angle, "Perspective warp");
    let warped = image.map_planes(|plane| warp_plane(plane, out_w, out_h, |x, y| to_source * (x, y)));
    Ok(Some(pad_constant(&warped, config.margin, config.border_value)))
}

fn check_plausible(width: f32, height: f32, src_w: u32, src_h: u32) -> Result<(), PreprocessError> {
    if width < 1.0 || height < 1.0 {
        return Err(PreprocessError::DegenerateGeometry(format!(
            "warp target {}x{} is empty",
            width, height
        )));
    }
    let aspect = (width / height).max(height / width);
    if aspect > MAX_ASPECT {
        return Err(PreprocessError::DegenerateGeometry(format!(
            "warp target {}x{} has aspect ratio {:.1}",
            width, height, aspect
        )));
    }
    if width > MAX_GROWTH * src_w as f32 || height > MAX_GROWTH * src_h as f32 {
        return Err(PreprocessError::DegenerateGeometry(format!(
            "warp target {}x{} exceeds source {}x{}",
            width, height, src_w, src_h
        )));
    }
    Ok(())
}
