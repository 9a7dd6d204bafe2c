//! Image normalization pipeline for small text crops
//!
//! Geometric correction, photometric normalization and binarization steps
//! run in a fixed order under a typed configuration; line splitting and
//! variant generation build on the same steps.

pub mod buffer;
pub mod geometry;
pub mod lines;
pub mod pipeline;
pub mod steps;
pub mod variants;

pub use buffer::PixelBuffer;
pub use lines::{split_lines, LineBand};
pub use pipeline::{Pipeline, StepTiming, StepTrace};
pub use variants::{Variant, VariantSet};
