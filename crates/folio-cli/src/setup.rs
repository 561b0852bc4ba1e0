//! Service wiring
//!
//! Everything is built once here and shared by `Arc`.

use folio_core::Config;
use folio_db::{
    DomainEntityStore, EntityRepository, InMemoryEntityStore, InMemoryExecutionLog,
    InMemoryMediaStore, InMemoryRuleStore, MediaRepository, MediaStore, WorkflowExecutionLog,
    WorkflowExecutionRepository, WorkflowRuleRepository, WorkflowRuleStore,
};
use folio_processing::{CommandTranscoder, FormatNormalizer, ResolutionGenerator};
use folio_rules::{RuleRegistry, TracingNotifier, WorkflowEngine};
use folio_storage::Storage;
use folio_vision::{
    ClaudeVisionClassifier, ClaudeVisionConfig, DisabledClassifier, VisionClassifier, VisionError,
};
use folio_worker::{EntityLinker, IngestService, MediaPipeline, PipelineQueue, PipelineQueueConfig};
use std::sync::Arc;

/// Record stores behind their traits.
#[derive(Clone)]
pub struct Stores {
    pub media: Arc<dyn MediaStore>,
    pub rules: Arc<dyn WorkflowRuleStore>,
    pub executions: Arc<dyn WorkflowExecutionLog>,
    pub entities: Arc<dyn DomainEntityStore>,
}

impl Stores {
    pub async fn postgres(config: &Config) -> anyhow::Result<Self> {
        let pool = folio_db::connect(&config.database_url, config.db_max_connections).await?;
        Ok(Self {
            media: Arc::new(MediaRepository::new(pool.clone())),
            rules: Arc::new(WorkflowRuleRepository::new(pool.clone())),
            executions: Arc::new(WorkflowExecutionRepository::new(pool.clone())),
            entities: Arc::new(EntityRepository::new(pool)),
        })
    }

    /// Nothing survives the process.
    pub fn in_memory() -> Self {
        Self {
            media: Arc::new(InMemoryMediaStore::new()),
            rules: Arc::new(InMemoryRuleStore::new()),
            executions: Arc::new(InMemoryExecutionLog::new()),
            entities: Arc::new(InMemoryEntityStore::new()),
        }
    }
}

pub struct Services {
    pub stores: Stores,
    pub engine: Arc<WorkflowEngine>,
    pub queue: PipelineQueue,
    pub ingest: IngestService,
    pub linker: EntityLinker,
}

impl Services {
    pub fn assemble(
        config: &Config,
        stores: Stores,
        storage: Arc<dyn Storage>,
        vision: Arc<dyn VisionClassifier>,
    ) -> Self {
        let registry = RuleRegistry::with_defaults(stores.media.clone(), Arc::new(TracingNotifier));
        let engine = Arc::new(WorkflowEngine::new(
            stores.rules.clone(),
            stores.executions.clone(),
            registry,
        ));

        let generator = ResolutionGenerator::new(
            config.medium_max_edge,
            config.thumbnail_max_edge,
            config.variant_jpeg_quality,
        );
        let pipeline = Arc::new(MediaPipeline::new(
            stores.media.clone(),
            storage.clone(),
            generator,
            vision,
            engine.clone(),
        ));
        let queue = PipelineQueue::new(
            pipeline,
            PipelineQueueConfig {
                max_concurrency: config.pipeline_max_concurrency,
            },
        );

        let transcoder = CommandTranscoder::new(
            config.heif_converter_path.clone(),
            config.raw_converter_path.clone(),
        );
        let normalizer = FormatNormalizer::new(Arc::new(transcoder))
            .with_quality(config.normalize_jpeg_quality);
        let ingest = IngestService::new(
            stores.media.clone(),
            storage,
            Arc::new(normalizer),
            queue.clone(),
            config.max_file_size_bytes,
            config.abandoned_after(),
        );
        let linker = EntityLinker::new(stores.media.clone(), stores.entities.clone());

        Self {
            stores,
            engine,
            queue,
            ingest,
            linker,
        }
    }
}

/// Claude when a usable key is configured, otherwise a classifier that always
/// fails so every asset gets fallback values.
pub fn vision_classifier(config: &Config) -> Arc<dyn VisionClassifier> {
    let Some(api_key) = config.anthropic_api_key.clone() else {
        tracing::warn!("ANTHROPIC_API_KEY not set, classification disabled");
        return Arc::new(DisabledClassifier);
    };

    let vision_config = ClaudeVisionConfig {
        timeout: config.vision_timeout(),
        inline_images: config.vision_inline_images,
        ..ClaudeVisionConfig::new(api_key, config.anthropic_vision_model.clone())
    };
    match ClaudeVisionClassifier::new(vision_config) {
        Ok(classifier) => Arc::new(classifier),
        Err(VisionError::NotConfigured) => {
            tracing::warn!("ANTHROPIC_API_KEY looks like a placeholder, classification disabled");
            Arc::new(DisabledClassifier)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to build vision client, classification disabled");
            Arc::new(DisabledClassifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::models::{MediaCategory, MediaSource, ProcessingStatus};
    use folio_core::StorageBackend;
    use folio_storage::MemoryStorage;
    use folio_worker::UploadRequest;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn config() -> Config {
        Config {
            environment: "test".to_string(),
            log_format: "pretty".to_string(),
            database_url: "postgresql://localhost/folio".to_string(),
            db_max_connections: 1,
            storage_backend: StorageBackend::Memory,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
            local_storage_base_url: None,
            max_file_size_bytes: 1024 * 1024,
            medium_max_edge: 64,
            thumbnail_max_edge: 16,
            variant_jpeg_quality: 80,
            normalize_jpeg_quality: 90,
            heif_converter_path: "heif-convert".to_string(),
            raw_converter_path: "dcraw".to_string(),
            pipeline_max_concurrency: 2,
            pipeline_abandoned_after_secs: 60,
            anthropic_api_key: None,
            anthropic_vision_model: "test-model".to_string(),
            vision_timeout_secs: 5,
            vision_inline_images: false,
        }
    }

    fn png(width: u32, height: u32) -> bytes::Bytes {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 120, 200]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        bytes::Bytes::from(out.into_inner())
    }

    #[test]
    fn missing_or_placeholder_key_disables_classification() {
        let mut config = config();
        assert_eq!(vision_classifier(&config).name(), "disabled");

        config.anthropic_api_key = Some("sk-x".to_string());
        assert_eq!(vision_classifier(&config).name(), "disabled");

        config.anthropic_api_key = Some("sk-ant-REDACTED".to_string());
        assert_eq!(vision_classifier(&config).name(), "claude_vision");
    }

    #[tokio::test]
    async fn assembled_services_process_an_upload() {
        let config = config();
        let services = Services::assemble(
            &config,
            Stores::in_memory(),
            Arc::new(MemoryStorage::new()),
            Arc::new(DisabledClassifier),
        );

        let asset = services
            .ingest
            .ingest(UploadRequest {
                data: png(200, 100),
                filename: "flash_sheet.png".to_string(),
                declared_mime: "image/png".to_string(),
                source: MediaSource::Upload,
            })
            .await
            .unwrap();
        services.queue.drain().await;

        let asset = services.stores.media.get(asset.id).await.unwrap().unwrap();
        assert_eq!(asset.status, ProcessingStatus::Completed);
        assert_eq!(asset.mime_type, "image/png");
        assert_eq!(asset.title.as_deref(), Some("flash sheet"));
        assert_eq!(
            asset.classification.map(|c| c.detected_type),
            Some(MediaCategory::Unknown)
        );
        assert_eq!(services.queue.max_concurrency(), 2);
    }
}
