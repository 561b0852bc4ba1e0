//! Upload intake and resubmission

use bytes::Bytes;
use chrono::Utc;
use folio_core::models::{MediaAsset, MediaPatch, MediaSource, NewMediaAsset, ProcessingStatus};
use folio_core::AppError;
use folio_db::MediaStore;
use folio_processing::{normalized_filename, FormatNormalizer, Variant};
use folio_storage::keys::media_namespace;
use folio_storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::pipeline::ProcessRequest;
use crate::queue::{PipelineJob, PipelineQueue};

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub data: Bytes,
    pub filename: String,
    pub declared_mime: String,
    pub source: MediaSource,
}

pub struct IngestService {
    media: Arc<dyn MediaStore>,
    storage: Arc<dyn Storage>,
    normalizer: Arc<FormatNormalizer>,
    queue: PipelineQueue,
    max_file_size: usize,
    abandoned_after: Duration,
}

impl IngestService {
    pub fn new(
        media: Arc<dyn MediaStore>,
        storage: Arc<dyn Storage>,
        normalizer: Arc<FormatNormalizer>,
        queue: PipelineQueue,
        max_file_size: usize,
        abandoned_after: Duration,
    ) -> Self {
        Self {
            media,
            storage,
            normalizer,
            queue,
            max_file_size,
            abandoned_after,
        }
    }

    /// Normalize, store the original, create the `pending` record and queue processing.
    ///
    /// Nothing is left behind when a step before record creation fails.
    #[tracing::instrument(skip(self, request), fields(filename = %request.filename, size_bytes = request.data.len()))]
    pub async fn ingest(&self, request: UploadRequest) -> Result<MediaAsset, AppError> {
        if request.data.is_empty() {
            return Err(AppError::InvalidInput("Uploaded file is empty".to_string()));
        }
        if request.data.len() > self.max_file_size {
            return Err(AppError::PayloadTooLarge(format!(
                "{} bytes exceeds the {} byte limit",
                request.data.len(),
                self.max_file_size
            )));
        }

        let normalized = self
            .normalizer
            .normalize(request.data, &request.declared_mime)
            .await?;

        let id = Uuid::new_v4();
        let filename = normalized_filename(&request.filename, &normalized);
        let file_size = normalized.data.len() as i64;
        let mime_type = normalized.mime_type.clone();
        let logical_name = Variant::Original.logical_name(normalized.extension());

        let stored = self
            .storage
            .store(normalized.data, &logical_name, &media_namespace(id), &mime_type)
            .await?;

        let created = self
            .media
            .create(NewMediaAsset {
                id,
                filename,
                mime_type,
                file_size,
                source: request.source,
                original_key: stored.key.clone(),
                original_url: stored.url,
            })
            .await;

        let asset = match created {
            Ok(asset) => asset,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&stored.key).await {
                    tracing::warn!(
                        key = %stored.key,
                        error = %cleanup,
                        "Failed to remove original after record creation failed"
                    );
                }
                return Err(e.into());
            }
        };

        tracing::info!(
            media_id = %asset.id,
            mime_type = %asset.mime_type,
            converted = normalized.was_converted,
            key = %asset.original_key,
            "Media ingested"
        );

        self.queue
            .submit(PipelineJob::Process(ProcessRequest::for_asset(&asset)))?;
        Ok(asset)
    }

    /// Put a failed or abandoned asset back to `pending` and queue it again.
    ///
    /// A `pending` asset whose job never ran (dropped at shutdown, or a failed
    /// submit) is queued again as is.
    #[tracing::instrument(skip(self))]
    pub async fn resubmit(&self, media_id: Uuid) -> Result<MediaAsset, AppError> {
        let asset = self
            .media
            .get(media_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media asset {}", media_id)))?;

        let from = match asset.status {
            ProcessingStatus::Pending => {
                tracing::info!(checkpoint = ?asset.checkpoint, "Pending media requeued");
                self.queue
                    .submit(PipelineJob::Process(ProcessRequest::for_asset(&asset)))?;
                return Ok(asset);
            }
            ProcessingStatus::Failed => ProcessingStatus::Failed,
            ProcessingStatus::Processing if self.is_abandoned(&asset) => {
                ProcessingStatus::Processing
            }
            status => {
                return Err(AppError::InvalidTransition {
                    from: status,
                    to: ProcessingStatus::Pending,
                })
            }
        };

        if !self
            .media
            .transition_status(media_id, from, ProcessingStatus::Pending)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Media asset {} changed status during resubmission",
                media_id
            )));
        }

        let asset = self
            .media
            .update(
                media_id,
                &MediaPatch {
                    error_message: Some(None),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media asset {}", media_id)))?;

        tracing::info!(previous_status = %from, checkpoint = ?asset.checkpoint, "Media resubmitted");
        self.queue
            .submit(PipelineJob::Process(ProcessRequest::for_asset(&asset)))?;
        Ok(asset)
    }

    /// Queue a resize-only run for an asset whose original is stored.
    pub async fn reprocess(&self, media_id: Uuid) -> Result<(), AppError> {
        let asset = self
            .media
            .get(media_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media asset {}", media_id)))?;
        if asset.status == ProcessingStatus::Failed {
            return Err(AppError::Conflict(format!(
                "Media asset {} failed; resubmit it instead",
                media_id
            )));
        }
        self.queue.submit(PipelineJob::Reprocess(media_id))?;
        Ok(())
    }

    fn is_abandoned(&self, asset: &MediaAsset) -> bool {
        let Some(started) = asset.processing_started_at else {
            return true;
        };
        let threshold = chrono::Duration::from_std(self.abandoned_after)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        Utc::now() - started > threshold
    }
}
