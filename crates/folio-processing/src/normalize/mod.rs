//! Format normalization
//!
//! Camera-native containers are converted to JPEG before any other step sees
//! the bytes. Detection order, first match wins:
//!
//! 1. the declared MIME type names a camera format;
//! 2. the leading bytes carry a camera container signature;
//! 3. the image decoder rejects the data as an unsupported HEIF/AVIF format.
//!
//! Everything else passes through untouched, even if it will not decode; the
//! resolution step is where undecodable input fails the asset.

mod signature;
mod transcoder;

pub use signature::{sniff_camera_format, sniff_web_mime, SIGNATURE_WINDOW};
pub use transcoder::{CameraTranscoder, CommandTranscoder};

use bytes::Bytes;
use image::error::ImageFormatHint;
use image::{ImageError, ImageFormat, ImageReader};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::Cursor;
use std::sync::Arc;

use crate::error::{ProcessingError, ProcessingResult};

pub const UNIVERSAL_MIME: &str = "image/jpeg";
pub const DEFAULT_NORMALIZE_QUALITY: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFormat {
    Heic,
    Heif,
    Avif,
    CanonRaw,
    NikonRaw,
    SonyRaw,
    AdobeDng,
}

impl CameraFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match mime.as_str() {
            "image/heic" | "image/heic-sequence" => Some(CameraFormat::Heic),
            "image/heif" | "image/heif-sequence" => Some(CameraFormat::Heif),
            "image/avif" => Some(CameraFormat::Avif),
            "image/x-canon-cr2" => Some(CameraFormat::CanonRaw),
            "image/x-nikon-nef" => Some(CameraFormat::NikonRaw),
            "image/x-sony-arw" => Some(CameraFormat::SonyRaw),
            "image/x-adobe-dng" | "image/dng" => Some(CameraFormat::AdobeDng),
            _ => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(
            self,
            CameraFormat::CanonRaw
                | CameraFormat::NikonRaw
                | CameraFormat::SonyRaw
                | CameraFormat::AdobeDng
        )
    }

    pub fn extension(&self) -> &'static str {
        match self {
            CameraFormat::Heic => "heic",
            CameraFormat::Heif => "heif",
            CameraFormat::Avif => "avif",
            CameraFormat::CanonRaw => "cr2",
            CameraFormat::NikonRaw => "nef",
            CameraFormat::SonyRaw => "arw",
            CameraFormat::AdobeDng => "dng",
        }
    }
}

impl Display for CameraFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}

/// Normalizer output. `mime_type` is authoritative for every later step.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub data: Bytes,
    pub mime_type: String,
    pub was_converted: bool,
    pub source_format: Option<CameraFormat>,
}

impl NormalizedImage {
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

pub struct FormatNormalizer {
    transcoder: Arc<dyn CameraTranscoder>,
    quality: u8,
}

impl FormatNormalizer {
    pub fn new(transcoder: Arc<dyn CameraTranscoder>) -> Self {
        Self {
            transcoder,
            quality: DEFAULT_NORMALIZE_QUALITY,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Which camera format, if any, the input should be treated as.
    pub fn detect(data: &[u8], declared_mime: &str) -> Option<CameraFormat> {
        CameraFormat::from_mime(declared_mime)
            .or_else(|| sniff_camera_format(data))
            .or_else(|| detect_from_decoder(data))
    }

    #[tracing::instrument(skip(self, data), fields(size_bytes = data.len()))]
    pub async fn normalize(
        &self,
        data: Bytes,
        declared_mime: &str,
    ) -> ProcessingResult<NormalizedImage> {
        if data.is_empty() {
            return Err(ProcessingError::Empty);
        }

        let Some(format) = Self::detect(&data, declared_mime) else {
            let mime_type = sniff_web_mime(&data)
                .map(str::to_string)
                .unwrap_or_else(|| fallback_mime(declared_mime));
            return Ok(NormalizedImage {
                data,
                mime_type,
                was_converted: false,
                source_format: None,
            });
        };

        tracing::info!(
            format = %format,
            declared_mime = %declared_mime,
            "Camera-native image detected, transcoding to JPEG"
        );

        let converted = self
            .transcoder
            .transcode(data, format, self.quality)
            .await?;

        if sniff_web_mime(&converted) != Some(UNIVERSAL_MIME) {
            return Err(ProcessingError::Transcode {
                format: format.to_string(),
                message: "converter output is not a JPEG".to_string(),
            });
        }

        Ok(NormalizedImage {
            data: converted,
            mime_type: UNIVERSAL_MIME.to_string(),
            was_converted: true,
            source_format: Some(format),
        })
    }
}

/// Read only the header; an `Unsupported` error naming HEIF/AVIF counts as a detection.
fn detect_from_decoder(data: &[u8]) -> Option<CameraFormat> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format().ok()?;
    match reader.into_dimensions() {
        Err(ImageError::Unsupported(err)) => match err.format_hint() {
            ImageFormatHint::Exact(ImageFormat::Avif) => Some(CameraFormat::Avif),
            ImageFormatHint::Name(name) => {
                let name = name.to_lowercase();
                if name.contains("hei") {
                    Some(CameraFormat::Heif)
                } else if name.contains("avif") {
                    Some(CameraFormat::Avif)
                } else {
                    None
                }
            }
            _ => None,
        },
        _ => None,
    }
}

fn fallback_mime(declared: &str) -> String {
    let declared = declared.split(';').next().unwrap_or("").trim().to_lowercase();
    if declared.starts_with("image/") {
        declared
    } else {
        "application/octet-stream".to_string()
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Replace the filename extension with the one matching the normalized type.
pub fn normalized_filename(filename: &str, normalized: &NormalizedImage) -> String {
    if !normalized.was_converted {
        return filename.to_string();
    }
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    };
    format!("{}.{}", stem, normalized.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeTranscoder {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeTranscoder {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl CameraTranscoder for FakeTranscoder {
        async fn transcode(
            &self,
            _data: Bytes,
            format: CameraFormat,
            quality: u8,
        ) -> ProcessingResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProcessingError::Transcode {
                    format: format.to_string(),
                    message: "converter missing".to_string(),
                });
            }
            let img = RgbImage::from_pixel(8, 6, Rgb([10, 20, 30]));
            let mut out = Vec::new();
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality)
                .encode_image(&img)
                .unwrap();
            Ok(Bytes::from(out))
        }
    }

    fn png_bytes() -> Bytes {
        let img = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        Bytes::from(buf)
    }

    fn heic_bytes() -> Bytes {
        let mut data = vec![0x00, 0x00, 0x00, 0x18];
        data.extend_from_slice(b"ftypheic");
        data.extend_from_slice(&[0u8; 32]);
        Bytes::from(data)
    }

    #[tokio::test]
    async fn signature_wins_over_declared_jpeg() {
        let transcoder = FakeTranscoder::new(false);
        let normalizer = FormatNormalizer::new(transcoder.clone());

        let out = normalizer.normalize(heic_bytes(), "image/jpeg").await.unwrap();

        assert!(out.was_converted);
        assert_eq!(out.mime_type, "image/jpeg");
        assert_eq!(out.source_format, Some(CameraFormat::Heic));
        assert_eq!(transcoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn declared_heic_is_converted() {
        let transcoder = FakeTranscoder::new(false);
        let normalizer = FormatNormalizer::new(transcoder.clone());

        let out = normalizer
            .normalize(Bytes::from_static(b"opaque camera bytes"), "image/HEIC")
            .await
            .unwrap();

        assert!(out.was_converted);
        assert_eq!(out.source_format, Some(CameraFormat::Heic));
    }

    #[tokio::test]
    async fn web_formats_pass_through() {
        let transcoder = FakeTranscoder::new(false);
        let normalizer = FormatNormalizer::new(transcoder.clone());
        let input = png_bytes();

        let out = normalizer
            .normalize(input.clone(), "application/octet-stream")
            .await
            .unwrap();

        assert!(!out.was_converted);
        assert_eq!(out.mime_type, "image/png");
        assert_eq!(out.data, input);
        assert_eq!(transcoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undecodable_bytes_pass_through_with_declared_type() {
        let normalizer = FormatNormalizer::new(FakeTranscoder::new(false));
        let out = normalizer
            .normalize(Bytes::from_static(b"not an image"), "image/tiff")
            .await
            .unwrap();
        assert!(!out.was_converted);
        assert_eq!(out.mime_type, "image/tiff");
    }

    #[tokio::test]
    async fn transcode_failure_fails_normalization() {
        let normalizer = FormatNormalizer::new(FakeTranscoder::new(true));
        let err = normalizer
            .normalize(heic_bytes(), "image/heic")
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Transcode { .. }));
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let normalizer = FormatNormalizer::new(FakeTranscoder::new(false));
        let err = normalizer.normalize(Bytes::new(), "image/jpeg").await.unwrap_err();
        assert!(matches!(err, ProcessingError::Empty));
    }

    #[test]
    fn filename_extension_follows_output_type() {
        let converted = NormalizedImage {
            data: Bytes::new(),
            mime_type: "image/jpeg".to_string(),
            was_converted: true,
            source_format: Some(CameraFormat::Heic),
        };
        assert_eq!(normalized_filename("IMG_0042.HEIC", &converted), "IMG_0042.jpg");
        assert_eq!(normalized_filename("noext", &converted), "noext.jpg");

        let untouched = NormalizedImage {
            was_converted: false,
            ..converted
        };
        assert_eq!(normalized_filename("sunset.jpeg", &untouched), "sunset.jpeg");
    }
}
