//! Image processing for the media pipeline
//!
//! - [`normalize`]: detects camera-native containers (HEIF/HEIC, AVIF, RAW)
//!   and transcodes them to JPEG before anything else touches the bytes.
//! - [`variants`]: derives the original / medium / thumbnail resolution set.

pub mod error;
pub mod normalize;
pub mod variants;

pub use error::{ProcessingError, ProcessingResult};
pub use normalize::{
    normalized_filename, CameraFormat, CameraTranscoder, CommandTranscoder, FormatNormalizer,
    NormalizedImage,
};
pub use variants::{GeneratedVariant, GeneratedVariants, ResolutionGenerator, Variant};
