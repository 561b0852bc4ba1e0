//! Camera format transcoders

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::CameraFormat;
use crate::error::{ProcessingError, ProcessingResult};

/// Converts a camera-native image into JPEG bytes at the given quality.
#[async_trait]
pub trait CameraTranscoder: Send + Sync {
    async fn transcode(
        &self,
        data: Bytes,
        format: CameraFormat,
        quality: u8,
    ) -> ProcessingResult<Bytes>;
}

/// Shells out to `heif-convert` (libheif) for HEIF/AVIF and `dcraw` for RAW.
pub struct CommandTranscoder {
    heif_converter_path: PathBuf,
    raw_converter_path: PathBuf,
}

impl CommandTranscoder {
    pub fn new(heif_converter_path: impl Into<PathBuf>, raw_converter_path: impl Into<PathBuf>) -> Self {
        Self {
            heif_converter_path: heif_converter_path.into(),
            raw_converter_path: raw_converter_path.into(),
        }
    }

    async fn run_heif_convert(
        &self,
        input: &Path,
        output: &Path,
        format: CameraFormat,
        quality: u8,
    ) -> ProcessingResult<()> {
        let output_status = Command::new(&self.heif_converter_path)
            .arg("-q")
            .arg(quality.to_string())
            .arg(input)
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| transcode_error(format, format!("Failed to execute heif-convert: {}", e)))?;

        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            return Err(transcode_error(
                format,
                format!("heif-convert failed: {}", stderr.trim()),
            ));
        }
        Ok(())
    }

    /// `dcraw -c -w` writes a PPM to stdout which is re-encoded as JPEG.
    async fn run_dcraw(
        &self,
        input: &Path,
        format: CameraFormat,
        quality: u8,
    ) -> ProcessingResult<Bytes> {
        let output = Command::new(&self.raw_converter_path)
            .arg("-c")
            .arg("-w")
            .arg(input)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| transcode_error(format, format!("Failed to execute dcraw: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(transcode_error(format, format!("dcraw failed: {}", stderr.trim())));
        }

        let ppm = output.stdout;
        tokio::task::spawn_blocking(move || encode_jpeg_from_bytes(&ppm, quality))
            .await?
            .map_err(|e| transcode_error(format, e.to_string()))
    }
}

#[async_trait]
impl CameraTranscoder for CommandTranscoder {
    async fn transcode(
        &self,
        data: Bytes,
        format: CameraFormat,
        quality: u8,
    ) -> ProcessingResult<Bytes> {
        let dir = tempfile::tempdir()
            .map_err(|e| transcode_error(format, format!("Failed to create temp dir: {}", e)))?;
        let input = dir.path().join(format!("input.{}", format.extension()));
        tokio::fs::write(&input, &data)
            .await
            .map_err(|e| transcode_error(format, format!("Failed to write temp input: {}", e)))?;

        let start = std::time::Instant::now();
        let jpeg = if format.is_raw() {
            self.run_dcraw(&input, format, quality).await?
        } else {
            let output = dir.path().join("output.jpg");
            self.run_heif_convert(&input, &output, format, quality).await?;
            Bytes::from(tokio::fs::read(&output).await.map_err(|e| {
                transcode_error(format, format!("Failed to read converter output: {}", e))
            })?)
        };

        tracing::info!(
            format = %format,
            input_bytes = data.len(),
            output_bytes = jpeg.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Camera image transcoded to JPEG"
        );

        Ok(jpeg)
    }
}

fn transcode_error(format: CameraFormat, message: String) -> ProcessingError {
    ProcessingError::Transcode {
        format: format.to_string(),
        message,
    }
}

/// Decode any image the `image` crate understands and re-encode as RGB JPEG.
pub(crate) fn encode_jpeg_from_bytes(data: &[u8], quality: u8) -> ProcessingResult<Bytes> {
    let img = image::load_from_memory(data)?;
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb)?;
    Ok(Bytes::from(out))
}
