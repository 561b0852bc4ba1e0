use async_trait::async_trait;
use folio_core::models::{Classification, ImageAnalysis};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Vision classifier is not configured")]
    NotConfigured,

    #[error("Vision request failed: {0}")]
    Request(String),

    #[error("Vision API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed vision response: {0}")]
    MalformedResponse(String),

    #[error("Failed to fetch image for analysis: {0}")]
    ImageFetch(String),
}

impl From<VisionError> for folio_core::AppError {
    fn from(err: VisionError) -> Self {
        folio_core::AppError::Vision(err.to_string())
    }
}

pub type VisionResult<T> = Result<T, VisionError>;

/// Image understanding service, addressed by image URL.
#[async_trait]
pub trait VisionClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Descriptive tags, title, description and alt text.
    async fn analyze(&self, image_url: &str) -> VisionResult<ImageAnalysis>;

    /// Tattoo / artwork category with confidence and per-category reasoning.
    async fn classify(&self, image_url: &str) -> VisionResult<Classification>;
}

/// Used when no API key is configured. Every call fails, so the pipeline records fallbacks.
pub struct DisabledClassifier;

#[async_trait]
impl VisionClassifier for DisabledClassifier {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn analyze(&self, _image_url: &str) -> VisionResult<ImageAnalysis> {
        Err(VisionError::NotConfigured)
    }

    async fn classify(&self, _image_url: &str) -> VisionResult<Classification> {
        Err(VisionError::NotConfigured)
    }
}
