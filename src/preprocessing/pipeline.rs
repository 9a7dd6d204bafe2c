use crate::config::{PipelineConfig, StepKind};
use crate::error::PreprocessError;
use std::time::Instant;

use super::buffer::PixelBuffer;
use super::lines;
use super::steps;
use super::variants::{self, VariantSet};

/// Timing information for a single preprocessing step
#[derive(Debug, Clone)]
pub struct StepTiming {
    pub name: &'static str,
    pub time_ms: u64,
}

/// Images recorded after each enabled step, in execution order.
///
/// The first entry is always `"original"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepTrace {
    entries: Vec<(String, PixelBuffer)>,
}

impl StepTrace {
    fn push(&mut self, name: &str, image: PixelBuffer) {
        self.entries.push((name.to_string(), image));
    }

    pub fn get(&self, name: &str) -> Option<&PixelBuffer> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, image)| image)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PixelBuffer)> {
        self.entries.iter().map(|(name, image)| (name.as_str(), image))
    }

    /// Image after the last enabled step
    pub fn last(&self) -> Option<&PixelBuffer> {
        self.entries.last().map(|(_, image)| image)
    }
}

impl IntoIterator for StepTrace {
    type Item = (String, PixelBuffer);
    type IntoIter = std::vec::IntoIter<(String, PixelBuffer)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Runs the enabled steps in their fixed order.
///
/// Holds only a validated, read-only configuration, so one instance can be
/// shared across threads. Step failures never escape: a failing step logs and
/// passes its input through unchanged.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PreprocessError> {
        let config = config.validated()?;
        if config.deblur.enabled && !steps::deblur::available() {
            tracing::error!("deblur is enabled but this build has no deconvolution backend; the step will be a no-op");
        }
        Ok(Self { config })
    }

    /// Build from a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, PreprocessError> {
        Self::new(PipelineConfig::from_json_str(json)?)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Sibling pipeline over an independent, already validated configuration
    pub(crate) fn derive(&self, config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run every enabled step
    pub fn process(&self, image: PixelBuffer) -> PixelBuffer {
        self.run(image, None)
    }

    /// Run every enabled step, keeping each intermediate image
    pub fn trace(&self, image: PixelBuffer) -> StepTrace {
        let mut trace = StepTrace::default();
        trace.push("original", image.clone());
        self.run(image, Some(&mut trace));
        trace
    }

    /// Per-line crops using the configured minimum line height
    pub fn split_lines(&self, image: &PixelBuffer) -> Vec<PixelBuffer> {
        lines::split_lines(image, self.config.line_split.min_line_height)
    }

    /// Alternative renditions of the same crop for ensemble decoding
    pub fn generate_variants(&self, image: &PixelBuffer) -> VariantSet {
        variants::generate(self, image)
    }

    fn run(&self, image: PixelBuffer, mut trace: Option<&mut StepTrace>) -> PixelBuffer {
        let start = Instant::now();
        let mut timings = Vec::new();

        let mut img = image;
        for kind in self.config.enabled_steps() {
            img = self.run_step(kind, img, &mut timings);
            if let Some(trace) = trace.as_deref_mut() {
                trace.push(kind.as_str(), img.clone());
            }
        }

        tracing::debug!(
            total_ms = start.elapsed().as_millis() as u64,
            steps = ?timings,
            "Preprocessing complete"
        );
        img
    }

    fn run_step(&self, kind: StepKind, img: PixelBuffer, timings: &mut Vec<StepTiming>) -> PixelBuffer {
        let step_start = Instant::now();
        let result = match self.apply_step(kind, &img) {
            Ok(out) => out,
            Err(e @ PreprocessError::CapabilityUnavailable(_)) => {
                tracing::error!(step = %kind, "{}", e);
                img
            }
            Err(e) => {
                tracing::warn!(step = %kind, "Step failed, keeping its input: {}", e);
                img
            }
        };
        timings.push(StepTiming {
            name: kind.as_str(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        result
    }

    fn apply_step(&self, kind: StepKind, img: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
        let c = &self.config;
        match kind {
            StepKind::NormalizeColors => steps::color::apply(img, &c.normalize_colors),
            StepKind::Resize => steps::resize::apply(img, &c.resize),
            StepKind::PerspectiveWarp => steps::perspective::apply(img, &c.perspective_warp),
            StepKind::Grayscale => steps::grayscale::apply(img),
            StepKind::ShadowRemoval => steps::shadow::apply(img, &c.shadow_removal),
            StepKind::Deskew => steps::deskew::apply(img, &c.deskew),
            StepKind::Clahe => steps::contrast::apply(img, &c.clahe),
            StepKind::Morphology => steps::morphology::apply(img, &c.morphology),
            StepKind::Sharpen => steps::sharpen::apply(img, &c.sharpen),
            StepKind::Threshold => steps::threshold::apply(img, &c.threshold),
            StepKind::Denoise => steps::denoise::apply(img, &c.denoise),
            StepKind::Invert => steps::invert::apply(img, &c.invert),
            StepKind::Pad => steps::pad::apply(img, &c.pad),
            StepKind::Deblur => steps::deblur::apply(img, &c.deblur),
        }
    }
}
