use expiry_preprocess::config::{DeskewConfig, DeskewMethod, ResizeConfig, ThresholdConfig, ThresholdMethod};
use expiry_preprocess::preprocessing::steps::{deskew, perspective, resize, threshold};
use expiry_preprocess::{Pipeline, PipelineConfig, PixelBuffer};
use image::{GrayImage, Luma, Rgb, RgbImage};

/// White canvas with a row of dark glyph blocks, rotated by `angle` degrees
/// about the center (positive is counter-clockwise).
fn slanted_text(width: u32, height: u32, angle: f32) -> GrayImage {
    let (sin, cos) = angle.to_radians().sin_cos();
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    GrayImage::from_fn(width, height, |x, y| {
        let (dx, dy) = (x as f32 - cx, y as f32 - cy);
        let u = cos * dx - sin * dy;
        let v = sin * dx + cos * dy;
        let in_row = (-80.0..80.0).contains(&u) && (-8.0..8.0).contains(&v);
        let in_glyph = (u + 80.0).rem_euclid(20.0) < 14.0;
        Luma([if in_row && in_glyph { 0 } else { 255 }])
    })
}

fn projection_config(max_angle: f32) -> DeskewConfig {
    DeskewConfig {
        enabled: true,
        method: DeskewMethod::Projection,
        max_angle,
        ..DeskewConfig::default()
    }
}

#[test]
fn test_global_threshold_is_idempotent_on_binary_input() {
    let img = PixelBuffer::Gray(slanted_text(200, 50, 0.0));
    for method in [ThresholdMethod::Otsu, ThresholdMethod::Fixed] {
        let config = ThresholdConfig {
            enabled: true,
            method,
            ..ThresholdConfig::default()
        };
        let once = threshold::apply(&img, &config).unwrap();
        let twice = threshold::apply(&once, &config).unwrap();
        assert_eq!(once, twice, "{:?}", method);
    }
}

#[test]
fn test_projection_deskew_recovers_negated_angle() {
    let config = projection_config(15.0);
    for theta in [-8.0f32, 3.0, 11.0] {
        let img = PixelBuffer::Gray(slanted_text(200, 50, theta));
        let angle = deskew::estimate_skew(&img, &config).unwrap();
        assert!((angle + theta).abs() <= 1.0, "slant {} estimated {}", theta, angle);
    }
}

#[test]
fn test_end_to_end_deskew_levels_text() {
    let pipeline = Pipeline::from_json(
        r#"{"grayscale": {"enabled": true},
            "deskew": {"enabled": true, "method": "projection", "max_angle": 45}}"#,
    )
    .unwrap();
    let text = slanted_text(200, 50, -8.0);
    let img = RgbImage::from_fn(200, 50, |x, y| {
        let v = text.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    });

    let out = pipeline.process(PixelBuffer::Color(img));
    assert!(out.is_gray());
    assert!(out.height() > 50, "deskewed canvas should grow");

    let residual = deskew::estimate_skew(&out, &projection_config(45.0)).unwrap();
    assert!(residual.abs() <= 1.0, "residual skew {}", residual);
}

#[test]
fn test_perspective_on_blank_canvas_is_identity() {
    let blank = PixelBuffer::Color(RgbImage::from_pixel(200, 50, Rgb([255, 255, 255])));
    let out = perspective::apply(&blank, &PipelineConfig::default().perspective_warp).unwrap();
    assert_eq!(out, blank);
}

#[test]
fn test_split_lines_matches_bands() {
    let img = GrayImage::from_fn(120, 80, |x, y| {
        let inked = ((5..25).contains(&y) || (40..60).contains(&y)) && (10..110).contains(&x);
        Luma([if inked { 0 } else { 255 }])
    });
    let lines = expiry_preprocess::preprocessing::split_lines(&PixelBuffer::Gray(img), 6);

    assert_eq!(lines.len(), 2);
    for line in &lines {
        // 20 rows plus at most 1 row of padding each side
        assert!((20..=22).contains(&line.height()), "height {}", line.height());
        assert_eq!(line.width(), 120);
    }
}

#[test]
fn test_resize_preserves_aspect() {
    let img = PixelBuffer::Gray(GrayImage::from_pixel(100, 24, Luma([128])));
    let config = ResizeConfig {
        enabled: true,
        min_height: 48,
        min_width: 200,
        maintain_aspect: true,
        ..ResizeConfig::default()
    };
    let out = resize::apply(&img, &config).unwrap();
    assert!(out.height() >= 48 && out.width() >= 200);
    let ratio = out.width() as f32 / out.height() as f32;
    assert!((ratio - 100.0 / 24.0).abs() < 0.01, "ratio {}", ratio);
}

#[test]
fn test_variants_are_distinct_and_side_effect_free() {
    let pipeline = Pipeline::from_json(r#"{"normalize_colors": {"enabled": true}, "resize": {"enabled": true}}"#)
        .unwrap();
    let text = slanted_text(200, 50, 0.0);
    let crop = PixelBuffer::Color(RgbImage::from_fn(200, 50, |x, y| {
        let v = text.get_pixel(x, y).0[0];
        Rgb([v, v.saturating_sub(20), v.saturating_sub(40)])
    }));

    let before = pipeline.process(crop.clone());
    let variants = pipeline.generate_variants(&crop);
    let again = pipeline.generate_variants(&crop);
    let after = pipeline.process(crop.clone());

    assert!(variants.len() >= 4);
    assert_eq!(variants, again);
    let images = variants.images();
    assert!(images.iter().all(|img| img.channels() == images[0].channels()));
    assert!(images.iter().any(|img| *img != images[0]));
    assert_eq!(before, after);
}
