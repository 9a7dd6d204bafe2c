//! Alternative renditions of one crop for ensemble decoding.

use crate::config::{PipelineConfig, StepKind};

use super::buffer::PixelBuffer;
use super::pipeline::Pipeline;

/// One candidate image and the steps that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub label: &'static str,
    pub chain: Vec<&'static str>,
    pub image: PixelBuffer,
}

/// Ordered, never-empty list of variants sharing one channel count.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSet {
    variants: Vec<Variant>,
}

impl VariantSet {
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variant> {
        self.variants.iter()
    }

    pub fn get(&self, label: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.label == label)
    }

    pub fn images(&self) -> Vec<&PixelBuffer> {
        self.variants.iter().map(|v| &v.image).collect()
    }

    pub fn into_images(self) -> Vec<PixelBuffer> {
        self.variants.into_iter().map(|v| v.image).collect()
    }
}

impl IntoIterator for VariantSet {
    type Item = Variant;
    type IntoIter = std::vec::IntoIter<Variant>;

    fn into_iter(self) -> Self::IntoIter {
        self.variants.into_iter()
    }
}

/// Chain entry for the unconditional inversion applied to the baseline.
///
/// Kept apart from the `invert` step name, which only fires on dark crops.
pub const INVERTED_TAG: &str = "inverted";

fn chain_of(config: &PipelineConfig) -> Vec<&'static str> {
    config.enabled_steps().into_iter().map(|kind| kind.as_str()).collect()
}

/// Run `pipeline` with extra steps forced on, over a private copy of its
/// configuration.
fn forced(pipeline: &Pipeline, label: &'static str, extra: [StepKind; 2], image: &PixelBuffer) -> Variant {
    let config = extra
        .into_iter()
        .fold(pipeline.config().clone(), |config, kind| config.with_enabled(kind, true));
    let chain = chain_of(&config);
    Variant {
        label,
        chain,
        image: pipeline.derive(config).process(image.clone()),
    }
}

/// Baseline, shadow-removal + CLAHE, threshold + morphology, inverted baseline.
pub(crate) fn generate(pipeline: &Pipeline, image: &PixelBuffer) -> VariantSet {
    let base_chain = chain_of(pipeline.config());
    let baseline = pipeline.process(image.clone());
    let inverted = baseline.inverted();

    let mut inverted_chain = base_chain.clone();
    inverted_chain.push(INVERTED_TAG);

    let mut variants = vec![
        Variant {
            label: "baseline",
            chain: base_chain,
            image: baseline,
        },
        forced(pipeline, "illumination", [StepKind::ShadowRemoval, StepKind::Clahe], image),
        forced(pipeline, "binarized", [StepKind::Threshold, StepKind::Morphology], image),
        Variant {
            label: "inverted",
            chain: inverted_chain,
            image: inverted,
        },
    ];

    let mixed = variants.iter().any(|v| v.image.is_gray()) && variants.iter().any(|v| !v.image.is_gray());
    if mixed {
        for variant in &mut variants {
            if !variant.image.is_gray() {
                variant.image = PixelBuffer::Gray(variant.image.to_gray());
            }
        }
    }

    tracing::debug!(count = variants.len(), mixed, "Variants generated");
    VariantSet { variants }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn crop() -> PixelBuffer {
        PixelBuffer::Color(RgbImage::from_fn(80, 30, |x, y| {
            let shade = 150 + (x as u8) / 2;
            if (10..70).contains(&x) && (12..18).contains(&y) {
                Rgb([30, 30, 40])
            } else {
                Rgb([shade, shade, shade - 10])
            }
        }))
    }

    #[test]
    fn test_four_variants_with_one_channel_count() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let set = pipeline.generate_variants(&crop());

        assert_eq!(set.len(), 4);
        let channels = set.iter().next().unwrap().image.channels();
        assert!(set.iter().all(|v| v.image.channels() == channels));
        assert_eq!(channels, 1);

        let first = &set.iter().next().unwrap().image;
        assert!(set.iter().any(|v| &v.image != first));
    }

    #[test]
    fn test_chains_describe_forced_steps() {
        let pipeline = Pipeline::from_json(r#"{"grayscale": {"enabled": true}}"#).unwrap();
        let set = pipeline.generate_variants(&crop());

        assert_eq!(set.get("baseline").unwrap().chain, vec!["grayscale"]);
        assert_eq!(
            set.get("illumination").unwrap().chain,
            vec!["grayscale", "shadow_removal", "clahe"]
        );
        assert_eq!(
            set.get("binarized").unwrap().chain,
            vec!["grayscale", "morphology", "threshold"]
        );
        assert_eq!(set.get("inverted").unwrap().chain, vec!["grayscale", "inverted"]);
    }

    #[test]
    fn test_inverted_tag_differs_from_invert_step() {
        let pipeline = Pipeline::from_json(r#"{"invert": {"enabled": true}}"#).unwrap();
        let set = pipeline.generate_variants(&crop());

        assert_eq!(set.get("baseline").unwrap().chain, vec!["invert"]);
        assert_eq!(set.get("inverted").unwrap().chain, vec!["invert", INVERTED_TAG]);
        assert_ne!(INVERTED_TAG, StepKind::Invert.as_str());
    }

    #[test]
    fn test_generation_leaves_configuration_untouched() {
        let pipeline = Pipeline::from_json(r#"{"grayscale": {"enabled": true}}"#).unwrap();
        let before_config = pipeline.config().clone();
        let before = pipeline.process(crop());

        pipeline.generate_variants(&crop());

        assert_eq!(pipeline.config(), &before_config);
        assert_eq!(pipeline.process(crop()), before);
    }
}
