use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Empty image data")]
    Empty,

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Failed to transcode {format} image: {message}")]
    Transcode { format: String, message: String },

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image processing task failed: {0}")]
    Task(String),
}

pub type ProcessingResult<T> = Result<T, ProcessingError>;

impl From<image::ImageError> for ProcessingError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => ProcessingError::UnsupportedFormat(e.to_string()),
            image::ImageError::Encoding(e) => ProcessingError::Encode(e.to_string()),
            other => ProcessingError::Decode(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ProcessingError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProcessingError::Task(err.to_string())
    }
}

impl From<ProcessingError> for folio_core::AppError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::UnsupportedFormat(msg) => folio_core::AppError::UnsupportedFormat(msg),
            ProcessingError::Empty => {
                folio_core::AppError::InvalidInput("Empty image data".to_string())
            }
            other => folio_core::AppError::ImageProcessing(other.to_string()),
        }
    }
}
