use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Invalid pipeline configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Invalid value for {step}.{param}: {reason}")]
    InvalidParameter {
        step: &'static str,
        param: &'static str,
        reason: String,
    },

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("{0} is unavailable: crate was built without the `deblur` feature")]
    CapabilityUnavailable(&'static str),

    #[error("Preprocessing failed: {0}")]
    PreprocessingError(String),

    #[error("Failed to read image: {0}")]
    Image(#[from] image::ImageError),
}

impl PreprocessError {
    /// Configuration-time errors are the only fatal class.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::InvalidParameter { .. } | Self::UnknownStep(_)
        )
    }

    pub(crate) fn invalid(step: &'static str, param: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            step,
            param,
            reason: reason.into(),
        }
    }
}
