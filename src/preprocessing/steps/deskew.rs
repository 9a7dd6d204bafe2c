//! Skew estimation and correction.
//!
//! Angles are in degrees and follow the image-rotation convention used by
//! [`rotate_expanded`]: positive rotates counter-clockwise on screen. Every
//! estimator returns the *correction* angle, i.e. the rotation that levels
//! the text.

use crate::config::{DeskewConfig, DeskewMethod};
use crate::error::PreprocessError;
use crate::preprocessing::buffer::PixelBuffer;
use crate::preprocessing::geometry::{external_contours, median, sample_cubic, warp_plane, MinAreaRect};
use image::GrayImage;
use imageproc::edges::canny;
use imageproc::hough::{detect_lines, LineDetectionOptions};

use super::threshold::otsu_binarize;

/// Angle grid of the projection search
const ANGLE_STEP: f32 = 0.5;

/// Estimates below this magnitude are treated as already level
const MIN_ROTATION: f32 = 0.5;

pub trait SkewEstimator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Correction angle for a single-channel image
    fn estimate(&self, gray: &GrayImage) -> Result<f32, PreprocessError>;
}

/// Picks the rotation that maximizes the variance of the row profile.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionEstimator {
    pub max_angle: f32,
}

/// Median angle of Hough lines found on the Canny edges of the binarized text.
#[derive(Debug, Clone, Copy)]
pub struct HoughEstimator {
    pub max_angle: f32,
    pub vote_threshold: u32,
}

/// Median minimum-area-rectangle angle over the external contours.
#[derive(Debug, Clone, Copy)]
pub struct ContourEstimator {
    pub max_angle: f32,
    pub min_contour_area: f32,
}

pub fn estimator_for(config: &DeskewConfig) -> Box<dyn SkewEstimator> {
    match config.method {
        DeskewMethod::Projection => Box::new(ProjectionEstimator {
            max_angle: config.max_angle,
        }),
        DeskewMethod::Hough => Box::new(HoughEstimator {
            max_angle: config.max_angle,
            vote_threshold: config.hough_threshold,
        }),
        DeskewMethod::Contours => Box::new(ContourEstimator {
            max_angle: config.max_angle,
            min_contour_area: config.min_contour_area,
        }),
    }
}

fn ensure_non_empty(gray: &GrayImage) -> Result<(), PreprocessError> {
    if gray.width() == 0 || gray.height() == 0 {
        return Err(PreprocessError::DegenerateGeometry(
            "cannot estimate skew of an empty image".to_string(),
        ));
    }
    Ok(())
}

impl SkewEstimator for ProjectionEstimator {
    fn name(&self) -> &'static str {
        "projection"
    }

    fn estimate(&self, gray: &GrayImage) -> Result<f32, PreprocessError> {
        ensure_non_empty(gray)?;
        let binary = otsu_binarize(gray, true);

        let steps = (self.max_angle / ANGLE_STEP).floor() as i32;
        let mut candidates: Vec<f32> = (-steps..=steps).map(|k| k as f32 * ANGLE_STEP).collect();
        // Ties go to the smaller correction
        candidates.sort_by(|a, b| a.abs().total_cmp(&b.abs()));

        let mut best_angle = 0.0f32;
        let mut best_variance = 0.0f32;
        for angle in candidates {
            let variance = projection_variance(&binary, angle);
            if variance > best_variance {
                best_variance = variance;
                best_angle = angle;
            }
        }

        if best_variance <= 0.0 {
            return Ok(0.0);
        }
        Ok(best_angle)
    }
}

/// Variance of the row sums of `binary` rotated by `angle` about its center,
/// on a canvas of the same size.
fn projection_variance(binary: &GrayImage, angle: f32) -> f32 {
    let (width, height) = binary.dimensions();
    let (sin, cos) = angle.to_radians().sin_cos();
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);

    let rows: Vec<f32> = (0..height)
        .map(|y| {
            let dy = y as f32 - cy;
            (0..width)
                .map(|x| {
                    let dx = x as f32 - cx;
                    sample_cubic(binary, cos * dx - sin * dy + cx, sin * dx + cos * dy + cy)
                })
                .sum()
        })
        .collect();

    let n = rows.len() as f32;
    let mean = rows.iter().sum::<f32>() / n;
    rows.iter().map(|r| (r - mean).powi(2)).sum::<f32>() / n
}

impl SkewEstimator for HoughEstimator {
    fn name(&self) -> &'static str {
        "hough"
    }

    fn estimate(&self, gray: &GrayImage) -> Result<f32, PreprocessError> {
        ensure_non_empty(gray)?;
        let edges = canny(&otsu_binarize(gray, true), 50.0, 150.0);
        let options = LineDetectionOptions {
            vote_threshold: self.vote_threshold,
            suppression_radius: 8,
        };
        let lines = detect_lines(&edges, options);

        // A horizontal line has its normal at 90 degrees
        let mut angles: Vec<f32> = lines
            .iter()
            .map(|line| line.angle_in_degrees as f32 - 90.0)
            .filter(|angle| angle.abs() < self.max_angle)
            .collect();
        tracing::debug!(lines = lines.len(), kept = angles.len(), "Hough lines detected");
        Ok(median(&mut angles).unwrap_or(0.0))
    }
}

impl SkewEstimator for ContourEstimator {
    fn name(&self) -> &'static str {
        "contours"
    }

    fn estimate(&self, gray: &GrayImage) -> Result<f32, PreprocessError> {
        ensure_non_empty(gray)?;
        let contours = external_contours(&otsu_binarize(gray, true), self.min_contour_area);

        let mut angles: Vec<f32> = contours
            .iter()
            .filter_map(|points| MinAreaRect::from_points(points))
            .map(|rect| rect.skew_angle())
            .filter(|angle| angle.abs() < self.max_angle)
            .collect();
        tracing::debug!(contours = contours.len(), kept = angles.len(), "Contour angles collected");
        Ok(median(&mut angles).unwrap_or(0.0))
    }
}

/// Correction angle for `image` with the configured estimator
pub fn estimate_skew(image: &PixelBuffer, config: &DeskewConfig) -> Result<f32, PreprocessError> {
    estimator_for(config).estimate(&image.to_gray())
}

/// Estimate and correct skew. Estimation failures leave the image unchanged.
pub fn apply(image: &PixelBuffer, config: &DeskewConfig) -> Result<PixelBuffer, PreprocessError> {
    let estimator = estimator_for(config);
    let angle = match estimator.estimate(&image.to_gray()) {
        Ok(angle) => angle,
        Err(e) => {
            tracing::warn!(method = estimator.name(), "Skew estimation failed, keeping input: {}", e);
            return Ok(image.clone());
        }
    };

    tracing::debug!(method = estimator.name(), angle, "Skew estimated");
    if angle.abs() <= MIN_ROTATION {
        return Ok(image.clone());
    }
    Ok(rotate_expanded(image, angle))
}

/// Rotate about the center onto a canvas large enough to hold every corner.
///
/// Bicubic sampling; pixels that fall outside the source replicate its edge.
pub fn rotate_expanded(image: &PixelBuffer, angle: f32) -> PixelBuffer {
    let (width, height) = image.dimensions();
    let (sin, cos) = angle.to_radians().sin_cos();
    let (w, h) = (width as f32, height as f32);
    let new_w = (h * sin.abs() + w * cos.abs()).round().max(1.0) as u32;
    let new_h = (h * cos.abs() + w * sin.abs()).round().max(1.0) as u32;

    let (cx, cy) = (w / 2.0, h / 2.0);
    let (ncx, ncy) = (new_w as f32 / 2.0, new_h as f32 / 2.0);
    image.map_planes(|plane| {
        warp_plane(plane, new_w, new_h, |x, y| {
            let (dx, dy) = (x - ncx, y - ncy);
            (cos * dx - sin * dy + cx, sin * dx + cos * dy + cy)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    /// White canvas with three dark horizontal strokes
    fn text_lines(width: u32, height: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(width, height, Luma([255]));
        let band = height / 7;
        for i in 0..3 {
            let top = (band + 2 * i * band) as i32;
            draw_filled_rect_mut(
                &mut img,
                Rect::at(width as i32 / 8, top).of_size(width * 3 / 4, band.max(2)),
                Luma([0]),
            );
        }
        img
    }

    fn skewed(angle: f32) -> GrayImage {
        rotate_expanded(&PixelBuffer::Gray(text_lines(160, 70)), angle).into_gray()
    }

    #[test]
    fn test_projection_detects_zero_for_level_text() {
        let estimator = ProjectionEstimator { max_angle: 10.0 };
        let angle = estimator.estimate(&text_lines(160, 70)).unwrap();
        assert!(angle.abs() <= 0.5, "expected near-zero angle, got {}", angle);
    }

    #[test]
    fn test_projection_recovers_rotation() {
        let estimator = ProjectionEstimator { max_angle: 15.0 };
        for theta in [6.0f32, -4.0] {
            let angle = estimator.estimate(&skewed(theta)).unwrap();
            assert!((angle + theta).abs() <= 1.0, "rotated by {}, estimated {}", theta, angle);
        }
    }

    #[test]
    fn test_contours_recover_rotation() {
        let estimator = ContourEstimator {
            max_angle: 15.0,
            min_contour_area: 100.0,
        };
        let angle = estimator.estimate(&skewed(7.0)).unwrap();
        assert!((angle + 7.0).abs() <= 1.0, "estimated {}", angle);
    }

    #[test]
    fn test_hough_recovers_rotation() {
        let estimator = HoughEstimator {
            max_angle: 15.0,
            vote_threshold: 60,
        };
        let img = rotate_expanded(&PixelBuffer::Gray(text_lines(300, 120)), 5.0).into_gray();
        let angle = estimator.estimate(&img).unwrap();
        assert!((angle + 5.0).abs() <= 1.5, "estimated {}", angle);
    }

    #[test]
    fn test_blank_image_yields_zero() {
        let blank = GrayImage::from_pixel(40, 20, Luma([255]));
        for method in [DeskewMethod::Projection, DeskewMethod::Hough, DeskewMethod::Contours] {
            let config = DeskewConfig {
                method,
                ..DeskewConfig::default()
            };
            assert_eq!(estimator_for(&config).estimate(&blank).unwrap(), 0.0, "{:?}", method);
        }
    }

    #[test]
    fn test_empty_image_is_returned_unchanged() {
        let empty = PixelBuffer::Gray(GrayImage::new(0, 0));
        let result = apply(&empty, &DeskewConfig::default()).unwrap();
        assert_eq!(result, empty);
    }

    #[test]
    fn test_rotate_expanded_grows_canvas() {
        let img = PixelBuffer::Gray(GrayImage::from_pixel(100, 50, Luma([255])));
        let rotated = rotate_expanded(&img, 90.0);
        assert_eq!(rotated.dimensions(), (50, 100));

        let tilted = rotate_expanded(&img, 10.0);
        assert!(tilted.width() > 100 && tilted.height() > 50);
    }

    #[test]
    fn test_level_image_is_not_resampled() {
        let img = PixelBuffer::Gray(text_lines(160, 70));
        let result = apply(&img, &DeskewConfig::default()).unwrap();
        assert_eq!(result, img);
    }
}
