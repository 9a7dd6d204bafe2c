//! Typed pipeline configuration.
//!
//! Every step has its own parameter struct with documented defaults. A
//! configuration is materialized once (usually from JSON), validated by
//! [`PipelineConfig::validated`], and treated as read-only afterwards.

use crate::error::PreprocessError;
use serde::{Deserialize, Serialize};

/// Step kinds in the only order they may ever run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    NormalizeColors,
    Resize,
    PerspectiveWarp,
    Grayscale,
    ShadowRemoval,
    Deskew,
    Clahe,
    Morphology,
    Sharpen,
    Threshold,
    Denoise,
    Invert,
    Pad,
    Deblur,
}

impl StepKind {
    pub const ORDER: [StepKind; 14] = [
        Self::NormalizeColors,
        Self::Resize,
        Self::PerspectiveWarp,
        Self::Grayscale,
        Self::ShadowRemoval,
        Self::Deskew,
        Self::Clahe,
        Self::Morphology,
        Self::Sharpen,
        Self::Threshold,
        Self::Denoise,
        Self::Invert,
        Self::Pad,
        Self::Deblur,
    ];

    /// Parse a configuration key
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Configuration key of the step
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NormalizeColors => "normalize_colors",
            Self::Resize => "resize",
            Self::PerspectiveWarp => "perspective_warp",
            Self::Grayscale => "grayscale",
            Self::ShadowRemoval => "shadow_removal",
            Self::Deskew => "deskew",
            Self::Clahe => "clahe",
            Self::Morphology => "morphology",
            Self::Sharpen => "sharpen",
            Self::Threshold => "threshold",
            Self::Denoise => "denoise",
            Self::Invert => "invert",
            Self::Pad => "pad",
            Self::Deblur => "deblur",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level keys that are not steps but are still valid configuration.
const AUXILIARY_KEYS: [&str; 1] = ["line_split"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub normalize_colors: ColorConfig,
    pub resize: ResizeConfig,
    pub perspective_warp: PerspectiveConfig,
    pub grayscale: GrayscaleConfig,
    pub shadow_removal: ShadowConfig,
    pub deskew: DeskewConfig,
    pub clahe: ClaheConfig,
    pub morphology: MorphologyConfig,
    pub sharpen: SharpenConfig,
    pub threshold: ThresholdConfig,
    pub denoise: DenoiseConfig,
    pub invert: InvertConfig,
    pub pad: PadConfig,
    pub deblur: DeblurConfig,
    pub line_split: LineSplitConfig,
}

impl PipelineConfig {
    /// Parse and validate a JSON document of the form
    /// `{"deskew": {"enabled": true, "method": "hough"}, ...}`.
    pub fn from_json_str(json: &str) -> Result<Self, PreprocessError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, PreprocessError> {
        if let Some(map) = value.as_object() {
            if let Some(unknown) = map
                .keys()
                .find(|key| StepKind::from_str(key).is_none() && !AUXILIARY_KEYS.contains(&key.as_str()))
            {
                return Err(PreprocessError::UnknownStep(unknown.clone()));
            }
        }
        let config: Self = serde_json::from_value(value)?;
        config.validated()
    }

    pub fn is_enabled(&self, kind: StepKind) -> bool {
        match kind {
            StepKind::NormalizeColors => self.normalize_colors.enabled,
            StepKind::Resize => self.resize.enabled,
            StepKind::PerspectiveWarp => self.perspective_warp.enabled,
            StepKind::Grayscale => self.grayscale.enabled,
            StepKind::ShadowRemoval => self.shadow_removal.enabled,
            StepKind::Deskew => self.deskew.enabled,
            StepKind::Clahe => self.clahe.enabled,
            StepKind::Morphology => self.morphology.enabled,
            StepKind::Sharpen => self.sharpen.enabled,
            StepKind::Threshold => self.threshold.enabled,
            StepKind::Denoise => self.denoise.enabled,
            StepKind::Invert => self.invert.enabled,
            StepKind::Pad => self.pad.enabled,
            StepKind::Deblur => self.deblur.enabled,
        }
    }

    /// Builder-style toggle. Returns a new configuration; callers holding a
    /// shared configuration should clone before toggling.
    pub fn with_enabled(mut self, kind: StepKind, enabled: bool) -> Self {
        let flag = match kind {
            StepKind::NormalizeColors => &mut self.normalize_colors.enabled,
            StepKind::Resize => &mut self.resize.enabled,
            StepKind::PerspectiveWarp => &mut self.perspective_warp.enabled,
            StepKind::Grayscale => &mut self.grayscale.enabled,
            StepKind::ShadowRemoval => &mut self.shadow_removal.enabled,
            StepKind::Deskew => &mut self.deskew.enabled,
            StepKind::Clahe => &mut self.clahe.enabled,
            StepKind::Morphology => &mut self.morphology.enabled,
            StepKind::Sharpen => &mut self.sharpen.enabled,
            StepKind::Threshold => &mut self.threshold.enabled,
            StepKind::Denoise => &mut self.denoise.enabled,
            StepKind::Invert => &mut self.invert.enabled,
            StepKind::Pad => &mut self.pad.enabled,
            StepKind::Deblur => &mut self.deblur.enabled,
        };
        *flag = enabled;
        self
    }

    /// Enabled steps, in execution order
    pub fn enabled_steps(&self) -> Vec<StepKind> {
        StepKind::ORDER
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    /// Coerce window sizes to odd values and reject out-of-range parameters.
    pub fn validated(mut self) -> Result<Self, PreprocessError> {
        self.shadow_removal.kernel_size = odd(self.shadow_removal.kernel_size);
        self.morphology.kernel_size = odd(self.morphology.kernel_size);
        self.denoise.kernel_size = odd(self.denoise.kernel_size);
        self.denoise.template_window = odd(self.denoise.template_window);
        self.denoise.search_window = odd(self.denoise.search_window);
        self.deblur.kernel_size = odd(self.deblur.kernel_size);
        self.threshold.block_size = odd(self.threshold.block_size.max(3));

        for (step, size) in [
            ("shadow_removal", self.shadow_removal.kernel_size),
            ("morphology", self.morphology.kernel_size),
            ("denoise", self.denoise.kernel_size),
        ] {
            if size > MAX_KERNEL_SIZE {
                return Err(PreprocessError::invalid(step, "kernel_size", "must be <= 511"));
            }
        }
        if self.normalize_colors.strength < 0.0 {
            return Err(PreprocessError::invalid("normalize_colors", "strength", "must be >= 0"));
        }
        if let (Some(max), min) = (self.resize.max_height, self.resize.min_height) {
            if max < min {
                return Err(PreprocessError::invalid("resize", "max_height", "must be >= min_height"));
            }
        }
        if let (Some(max), min) = (self.resize.max_width, self.resize.min_width) {
            if max < min {
                return Err(PreprocessError::invalid("resize", "max_width", "must be >= min_width"));
            }
        }
        if self.perspective_warp.min_contour_area < 0.0 {
            return Err(PreprocessError::invalid("perspective_warp", "min_contour_area", "must be >= 0"));
        }
        if !(self.deskew.max_angle > 0.0 && self.deskew.max_angle <= 90.0) {
            return Err(PreprocessError::invalid("deskew", "max_angle", "must be in (0, 90]"));
        }
        if self.clahe.clip_limit <= 0.0 {
            return Err(PreprocessError::invalid("clahe", "clip_limit", "must be > 0"));
        }
        if self.clahe.tile_grid == 0 {
            return Err(PreprocessError::invalid("clahe", "tile_grid", "must be > 0"));
        }
        if self.sharpen.sigma <= 0.0 {
            return Err(PreprocessError::invalid("sharpen", "sigma", "must be > 0"));
        }
        if self.denoise.sigma_color <= 0.0 || self.denoise.sigma_space <= 0.0 {
            return Err(PreprocessError::invalid("denoise", "sigma_color", "sigmas must be > 0"));
        }
        if self.denoise.h <= 0.0 {
            return Err(PreprocessError::invalid("denoise", "h", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.invert.dark_ratio) {
            return Err(PreprocessError::invalid("invert", "dark_ratio", "must be in [0, 1]"));
        }
        if self.deblur.snr <= 0.0 {
            return Err(PreprocessError::invalid("deblur", "snr", "must be > 0"));
        }
        if self.deblur.iterations == 0 {
            return Err(PreprocessError::invalid("deblur", "iterations", "must be > 0"));
        }
        if self.line_split.min_line_height == 0 {
            return Err(PreprocessError::invalid("line_split", "min_line_height", "must be > 0"));
        }
        Ok(self)
    }
}

/// Largest square structuring element, a radius of 255 pixels
pub const MAX_KERNEL_SIZE: u32 = 511;

/// Round an even window size up to the next odd value
pub fn odd(size: u32) -> u32 {
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMethod {
    #[default]
    SimpleWhiteBalance,
    GrayWorld,
    HistogramEqualization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    pub enabled: bool,
    pub method: ColorMethod,
    /// Strength of the a/b recentering for `simple_white_balance`
    pub strength: f32,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: ColorMethod::default(),
            strength: 1.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Nearest,
    Linear,
    #[default]
    Cubic,
    Lanczos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub enabled: bool,
    pub min_height: u32,
    pub min_width: u32,
    pub max_height: Option<u32>,
    pub max_width: Option<u32>,
    pub maintain_aspect: bool,
    pub interpolation: Interpolation,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_height: 32,
            min_width: 0,
            max_height: None,
            max_width: None,
            maintain_aspect: true,
            interpolation: Interpolation::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PerspectiveConfig {
    pub enabled: bool,
    /// Constant border added around the rectified crop
    pub margin: u32,
    pub min_contour_area: f32,
    pub border_value: u8,
}

impl Default for PerspectiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            margin: 10,
            min_contour_area: 100.0,
            border_value: 255,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GrayscaleConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowMethod {
    #[default]
    MorphOpen,
    BlurSubtract,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShadowConfig {
    pub enabled: bool,
    pub method: ShadowMethod,
    pub kernel_size: u32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: ShadowMethod::default(),
            kernel_size: 21,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeskewMethod {
    #[default]
    Projection,
    Hough,
    Contours,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeskewConfig {
    pub enabled: bool,
    pub method: DeskewMethod,
    /// Largest correction considered, in degrees
    pub max_angle: f32,
    /// Accumulator votes needed for a Hough line
    pub hough_threshold: u32,
    /// Contours smaller than this are ignored by the contour estimator
    pub min_contour_area: f32,
}

impl Default for DeskewConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: DeskewMethod::default(),
            max_angle: 15.0,
            hough_threshold: 100,
            min_contour_area: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaheMode {
    /// L channel of LAB only
    #[default]
    Lab,
    Gray,
    /// Each RGB channel independently; may shift colors
    Rgb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClaheConfig {
    pub enabled: bool,
    pub clip_limit: f32,
    /// Tiles per axis
    pub tile_grid: u32,
    pub mode: ClaheMode,
}

impl Default for ClaheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            clip_limit: 2.0,
            tile_grid: 8,
            mode: ClaheMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MorphOperation {
    Open,
    #[default]
    Close,
    Dilate,
    Erode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MorphologyConfig {
    pub enabled: bool,
    pub operation: MorphOperation,
    pub kernel_size: u32,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            operation: MorphOperation::default(),
            kernel_size: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharpenMethod {
    #[default]
    UnsharpMask,
    Kernel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SharpenConfig {
    pub enabled: bool,
    pub method: SharpenMethod,
    pub strength: f32,
    /// Gaussian sigma of the unsharp mask
    pub sigma: f32,
}

impl Default for SharpenConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: SharpenMethod::default(),
            strength: 1.0,
            sigma: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    #[default]
    Otsu,
    AdaptiveGaussian,
    AdaptiveMean,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdConfig {
    pub enabled: bool,
    pub method: ThresholdMethod,
    /// Neighbourhood size of the adaptive methods
    pub block_size: u32,
    /// Constant subtracted from the local mean
    pub c: f32,
    /// Threshold of the `fixed` method
    pub value: u8,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: ThresholdMethod::default(),
            block_size: 11,
            c: 2.0,
            value: 127,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenoiseMethod {
    NonLocalMeans,
    Bilateral,
    Gaussian,
    #[default]
    Median,
    MorphClose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DenoiseConfig {
    pub enabled: bool,
    pub method: DenoiseMethod,
    /// Window of the gaussian, median, bilateral and closing filters
    pub kernel_size: u32,
    /// Filter strength of non-local means
    pub h: f32,
    pub template_window: u32,
    pub search_window: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: DenoiseMethod::default(),
            kernel_size: 3,
            h: 10.0,
            template_window: 7,
            search_window: 21,
            sigma_color: 75.0,
            sigma_space: 75.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InvertConfig {
    pub enabled: bool,
    /// Fraction of pixels below mid-gray above which the image is inverted
    pub dark_ratio: f32,
}

impl Default for InvertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dark_ratio: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PadConfig {
    pub enabled: bool,
    pub size: u32,
    pub value: u8,
}

impl Default for PadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            size: 10,
            value: 255,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeblurMethod {
    #[default]
    Wiener,
    RichardsonLucy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeblurConfig {
    pub enabled: bool,
    pub method: DeblurMethod,
    /// Length of the assumed horizontal motion-blur kernel
    pub kernel_size: u32,
    pub snr: f32,
    pub iterations: u32,
}

impl Default for DeblurConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: DeblurMethod::default(),
            kernel_size: 5,
            snr: 30.0,
            iterations: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LineSplitConfig {
    pub min_line_height: u32,
}

impl Default for LineSplitConfig {
    fn default() -> Self {
        Self { min_line_height: 10 }
    }
}
