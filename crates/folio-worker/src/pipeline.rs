//! Per-asset pipeline
//!
//! Steps run in [`PipelineStep`] order. Each one persists its output and a
//! checkpoint before the next starts, so a re-delivered job resumes after
//! the last committed step. Variant keys are fixed per asset, which makes
//! re-running a storage step an overwrite.

use bytes::Bytes;
use folio_core::models::{
    merge_tags, triggers, Classification, ImageAnalysis, MediaAsset, MediaPatch, PipelineStep,
    ProcessingStatus,
};
use folio_db::MediaStore;
use folio_processing::{GeneratedVariants, ResolutionGenerator, Variant};
use folio_rules::{RuleContext, WorkflowEngine};
use folio_storage::keys::media_namespace;
use folio_storage::Storage;
use folio_vision::VisionClassifier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};

/// Job payload for a full pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub media_id: Uuid,
    pub original_url: String,
    pub filename: String,
    pub mime_type: String,
}

impl ProcessRequest {
    pub fn for_asset(asset: &MediaAsset) -> Self {
        Self {
            media_id: asset.id,
            original_url: asset.original_url.clone(),
            filename: asset.filename.clone(),
            mime_type: asset.mime_type.clone(),
        }
    }
}

pub struct MediaPipeline {
    media: Arc<dyn MediaStore>,
    storage: Arc<dyn Storage>,
    generator: ResolutionGenerator,
    vision: Arc<dyn VisionClassifier>,
    rules: Arc<WorkflowEngine>,
}

impl MediaPipeline {
    pub fn new(
        media: Arc<dyn MediaStore>,
        storage: Arc<dyn Storage>,
        generator: ResolutionGenerator,
        vision: Arc<dyn VisionClassifier>,
        rules: Arc<WorkflowEngine>,
    ) -> Self {
        Self {
            media,
            storage,
            generator,
            vision,
            rules,
        }
    }

    /// Run the full step sequence for one asset.
    ///
    /// A `processing` asset is resumed from its checkpoint. A `completed`
    /// asset only gets its rule evaluation if that never committed.
    #[tracing::instrument(skip(self, request), fields(media_id = %request.media_id))]
    pub async fn process(&self, request: ProcessRequest) -> PipelineResult<MediaAsset> {
        let id = request.media_id;
        let asset = self.load(id).await?;

        match asset.status {
            ProcessingStatus::Pending => {
                if !self
                    .media
                    .transition_status(id, ProcessingStatus::Pending, ProcessingStatus::Processing)
                    .await?
                {
                    let current = self.load(id).await?;
                    if current.status != ProcessingStatus::Processing {
                        return Err(PipelineError::InvalidState {
                            id,
                            status: current.status,
                            operation: "start processing",
                        });
                    }
                    tracing::info!("Asset already processing, resuming");
                }
            }
            ProcessingStatus::Processing => {
                tracing::info!(checkpoint = ?asset.checkpoint, "Resuming asset from checkpoint");
            }
            ProcessingStatus::Completed => {
                if asset.has_completed(PipelineStep::EvaluateRules) {
                    tracing::debug!("Asset already completed, nothing to do");
                    return Ok(asset);
                }
                return self.evaluate_rules(asset).await;
            }
            ProcessingStatus::Failed => {
                return Err(PipelineError::InvalidState {
                    id,
                    status: asset.status,
                    operation: "process without resubmission",
                });
            }
        }

        let start = std::time::Instant::now();
        let result = self.run_steps(&request).await;
        match result {
            Ok(asset) => {
                tracing::info!(
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Asset processing completed"
                );
                self.evaluate_rules(asset).await
            }
            Err(e) => {
                self.mark_failed(id, &e).await;
                Err(e)
            }
        }
    }

    /// Regenerate and store the resolution variants from the stored original.
    ///
    /// `pending` assets move through `processing` to `completed`; `completed`
    /// assets keep their status. Keys are the same on every run.
    #[tracing::instrument(skip(self))]
    pub async fn reprocess(&self, media_id: Uuid) -> PipelineResult<MediaAsset> {
        let asset = self.load(media_id).await?;

        match asset.status {
            ProcessingStatus::Completed => {
                let asset = self.resize(&asset, false).await?;
                tracing::info!("Asset variants regenerated");
                Ok(asset)
            }
            ProcessingStatus::Pending => {
                if !self
                    .media
                    .transition_status(
                        media_id,
                        ProcessingStatus::Pending,
                        ProcessingStatus::Processing,
                    )
                    .await?
                {
                    let current = self.load(media_id).await?;
                    return Err(PipelineError::InvalidState {
                        id: media_id,
                        status: current.status,
                        operation: "reprocess",
                    });
                }
                match self.resize(&asset, true).await {
                    Ok(_) => self.complete(media_id).await,
                    Err(e) => {
                        self.mark_failed(media_id, &e).await;
                        Err(e)
                    }
                }
            }
            status => Err(PipelineError::InvalidState {
                id: media_id,
                status,
                operation: "reprocess",
            }),
        }
    }

    async fn run_steps(&self, request: &ProcessRequest) -> PipelineResult<MediaAsset> {
        let id = request.media_id;
        let mut asset = self.load(id).await?;
        if request.original_url != asset.original_url {
            tracing::warn!(
                requested_url = %request.original_url,
                recorded_url = %asset.original_url,
                "Job original URL differs from record, using record"
            );
        }

        if !asset.has_completed(PipelineStep::RecordVariants) {
            asset = self.resize(&asset, true).await?;
        }

        if !asset.has_completed(PipelineStep::RecordEnrichment) {
            let (analysis, classification) = self.classify(&asset).await;
            self.checkpoint(id, PipelineStep::Classify).await?;
            self.record_enrichment(&asset, analysis, classification).await?;
        }

        self.complete(id).await
    }

    /// acquire_original -> derive_resolutions -> store_variants -> record_variants
    async fn resize(&self, asset: &MediaAsset, record_checkpoints: bool) -> PipelineResult<MediaAsset> {
        let id = asset.id;

        let original = self.acquire_original(asset).await?;
        if record_checkpoints {
            self.checkpoint(id, PipelineStep::AcquireOriginal).await?;
        }

        let variants = self
            .generator
            .generate(original, &asset.mime_type)
            .await
            .map_err(|e| PipelineError::step(PipelineStep::DeriveResolutions, e))?;
        if record_checkpoints {
            self.checkpoint(id, PipelineStep::DeriveResolutions).await?;
        }

        let patch = self.store_variants(id, &variants).await?;
        if record_checkpoints {
            self.checkpoint(id, PipelineStep::StoreVariants).await?;
        }

        let patch = MediaPatch {
            checkpoint: record_checkpoints.then_some(PipelineStep::RecordVariants),
            ..patch
        };
        let updated = self
            .media
            .update(id, &patch)
            .await
            .map_err(|e| PipelineError::step(PipelineStep::RecordVariants, e))?
            .ok_or(PipelineError::NotFound(id))?;

        tracing::debug!(
            width = variants.width,
            height = variants.height,
            "Variants recorded"
        );
        Ok(updated)
    }

    async fn acquire_original(&self, asset: &MediaAsset) -> PipelineResult<Bytes> {
        let data = self
            .storage
            .download(&asset.original_key)
            .await
            .map_err(|e| PipelineError::step(PipelineStep::AcquireOriginal, e))?;
        if data.is_empty() {
            return Err(PipelineError::step(
                PipelineStep::AcquireOriginal,
                "stored original is empty",
            ));
        }
        tracing::debug!(key = %asset.original_key, size_bytes = data.len(), "Original acquired");
        Ok(data)
    }

    /// Store derived variants and return the record patch describing them.
    async fn store_variants(
        &self,
        id: Uuid,
        variants: &GeneratedVariants,
    ) -> PipelineResult<MediaPatch> {
        let namespace = media_namespace(id);
        let mut patch = MediaPatch {
            width: Some(variants.width as i32),
            height: Some(variants.height as i32),
            ..Default::default()
        };

        for variant in variants.derived() {
            let stored = self
                .storage
                .store(
                    variant.data.clone(),
                    &variant.variant.logical_name("jpg"),
                    &namespace,
                    &variant.mime_type,
                )
                .await
                .map_err(|e| PipelineError::step(PipelineStep::StoreVariants, e))?;

            tracing::debug!(
                variant = %variant.variant,
                key = %stored.key,
                size_bytes = variant.data.len(),
                width = variant.width,
                height = variant.height,
                "Variant stored"
            );

            match variant.variant {
                Variant::Medium => {
                    patch.medium_key = Some(stored.key);
                    patch.medium_url = Some(stored.url);
                }
                Variant::Thumbnail => {
                    patch.thumbnail_key = Some(stored.key);
                    patch.thumbnail_url = Some(stored.url);
                }
                Variant::Original => {}
            }
        }

        Ok(patch)
    }

    /// Vision calls never fail the asset; errors become fallback values.
    async fn classify(&self, asset: &MediaAsset) -> (ImageAnalysis, Classification) {
        let image_url = asset
            .medium_url
            .as_deref()
            .unwrap_or(asset.original_url.as_str());

        let (analysis, classification) = tokio::join!(
            self.vision.analyze(image_url),
            self.vision.classify(image_url)
        );

        let analysis = analysis.unwrap_or_else(|e| {
            tracing::warn!(
                classifier = self.vision.name(),
                error = %e,
                "Image analysis failed, using fallback"
            );
            ImageAnalysis::fallback(&asset.filename)
        });
        let classification = classification.unwrap_or_else(|e| {
            tracing::warn!(
                classifier = self.vision.name(),
                error = %e,
                "Classification failed, using fallback"
            );
            Classification::fallback(&e.to_string())
        });

        tracing::info!(
            detected_type = %classification.detected_type.as_str(),
            confidence = classification.confidence,
            tags = analysis.tags.len(),
            "Asset classified"
        );
        (analysis, classification)
    }

    async fn record_enrichment(
        &self,
        asset: &MediaAsset,
        analysis: ImageAnalysis,
        classification: Classification,
    ) -> PipelineResult<MediaAsset> {
        let patch = MediaPatch {
            tags: Some(merge_tags(&asset.tags, &analysis.tags)),
            title: Some(analysis.title),
            description: Some(analysis.description),
            alt_text: Some(analysis.alt_text),
            ai_suggested_tags: Some(classification.suggested_tags.clone()),
            classification: Some(classification),
            checkpoint: Some(PipelineStep::RecordEnrichment),
            ..Default::default()
        };
        self.media
            .update(asset.id, &patch)
            .await
            .map_err(|e| PipelineError::step(PipelineStep::RecordEnrichment, e))?
            .ok_or(PipelineError::NotFound(asset.id))
    }

    /// Rule failures are logged and never change the asset's status.
    async fn evaluate_rules(&self, asset: MediaAsset) -> PipelineResult<MediaAsset> {
        let id = asset.id;
        match self
            .rules
            .evaluate(triggers::ON_UPLOAD, &RuleContext::from(&asset))
            .await
        {
            Ok(executions) => {
                let failed = executions
                    .iter()
                    .filter(|e| e.error.is_some())
                    .count();
                tracing::debug!(
                    rules = executions.len(),
                    failed,
                    "Upload rules evaluated"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rule evaluation failed");
            }
        }

        if let Err(e) = self
            .media
            .update(id, &MediaPatch::checkpoint(PipelineStep::EvaluateRules))
            .await
        {
            tracing::warn!(error = %e, "Failed to record rule evaluation checkpoint");
        }

        Ok(self.load(id).await.unwrap_or(asset))
    }

    async fn complete(&self, id: Uuid) -> PipelineResult<MediaAsset> {
        if !self
            .media
            .transition_status(id, ProcessingStatus::Processing, ProcessingStatus::Completed)
            .await?
        {
            let current = self.load(id).await?;
            if current.status != ProcessingStatus::Completed {
                return Err(PipelineError::InvalidState {
                    id,
                    status: current.status,
                    operation: "complete",
                });
            }
        }
        self.load(id).await
    }

    async fn mark_failed(&self, id: Uuid, err: &PipelineError) {
        tracing::error!(step = ?err.failed_step(), error = %err, "Asset processing failed");

        let patch = MediaPatch {
            error_message: Some(Some(err.to_string())),
            ..Default::default()
        };
        if let Err(e) = self.media.update(id, &patch).await {
            tracing::error!(error = %e, "Failed to record processing error");
        }
        match self
            .media
            .transition_status(id, ProcessingStatus::Processing, ProcessingStatus::Failed)
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Asset left processing before it could be marked failed"),
            Err(e) => tracing::error!(error = %e, "Failed to mark asset failed"),
        }
    }

    async fn checkpoint(&self, id: Uuid, step: PipelineStep) -> PipelineResult<()> {
        self.media
            .update(id, &MediaPatch::checkpoint(step))
            .await
            .map_err(|e| PipelineError::step(step, e))?
            .ok_or(PipelineError::NotFound(id))?;
        tracing::trace!(step = %step, "Checkpoint recorded");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> PipelineResult<MediaAsset> {
        self.media.get(id).await?.ok_or(PipelineError::NotFound(id))
    }
}
