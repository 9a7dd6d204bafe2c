//! Preprocessing for OCR of printed and embossed expiry dates.
//!
//! ```no_run
//! use expiry_preprocess::{Pipeline, PixelBuffer};
//!
//! let pipeline = Pipeline::from_json(r#"{"grayscale": {"enabled": true}, "deskew": {"enabled": true}}"#)?;
//! let crop = PixelBuffer::open("crop.png")?;
//! let processed = pipeline.process(crop);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod preprocessing;

pub use config::{PipelineConfig, StepKind};
pub use error::PreprocessError;
pub use preprocessing::{Pipeline, PixelBuffer, StepTrace, VariantSet};
