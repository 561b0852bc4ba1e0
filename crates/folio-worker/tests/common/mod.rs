#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use folio_core::models::{
    Classification, ImageAnalysis, MediaAsset, MediaCategory, MediaSource, NewMediaAsset,
};
use folio_db::{
    InMemoryEntityStore, InMemoryExecutionLog, InMemoryMediaStore, InMemoryRuleStore, MediaStore,
};
use folio_processing::{
    CameraFormat, CameraTranscoder, FormatNormalizer, ProcessingResult, ResolutionGenerator,
};
use folio_rules::{RuleRegistry, TracingNotifier, WorkflowEngine};
use folio_storage::keys::media_namespace;
use folio_storage::{MemoryStorage, Storage};
use folio_vision::{VisionClassifier, VisionError, VisionResult};
use folio_worker::{
    EntityLinker, IngestService, MediaPipeline, PipelineQueue, PipelineQueueConfig, UploadRequest,
};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const MAX_FILE_SIZE: usize = 25 * 1024 * 1024;

pub fn jpeg(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 85)
        .encode_image(&img)
        .unwrap();
    Bytes::from(out)
}

pub fn truncated_jpeg() -> Bytes {
    Bytes::from_static(&[
        0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01,
    ])
}

pub fn heic_bytes() -> Bytes {
    let mut data = vec![0x00, 0x00, 0x00, 0x18];
    data.extend_from_slice(b"ftypheic");
    data.extend_from_slice(&[0u8; 64]);
    Bytes::from(data)
}

/// Decodes nothing; always answers with a small JPEG.
pub struct FakeTranscoder;

#[async_trait]
impl CameraTranscoder for FakeTranscoder {
    async fn transcode(
        &self,
        _data: Bytes,
        _format: CameraFormat,
        _quality: u8,
    ) -> ProcessingResult<Bytes> {
        Ok(jpeg(400, 300))
    }
}

/// Scriptable classifier that also tracks how many classify calls overlap.
pub struct StubClassifier {
    classification: Mutex<Option<Classification>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl StubClassifier {
    pub fn new() -> Self {
        Self {
            classification: Mutex::new(Some(Self::tattoo(0.9))),
            delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn tattoo(confidence: f64) -> Classification {
        let mut c = Classification::fallback("unused");
        c.detected_type = MediaCategory::Tattoo;
        c.confidence = confidence;
        c.detections.clear();
        c.suggested_tags = vec!["koi".to_string(), "irezumi".to_string()];
        c.placement = Some("forearm".to_string());
        c.style = Some("japanese".to_string());
        c
    }

    /// `None` makes every call fail.
    pub fn set_classification(&self, classification: Option<Classification>) {
        *self.classification.lock().unwrap() = classification;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionClassifier for StubClassifier {
    fn name(&self) -> &str {
        "stub"
    }

    async fn analyze(&self, _image_url: &str) -> VisionResult<ImageAnalysis> {
        if self.classification.lock().unwrap().is_none() {
            return Err(VisionError::Request("connection reset".to_string()));
        }
        Ok(ImageAnalysis {
            tags: vec!["sunset".to_string(), "orange".to_string()],
            title: "Sunset".to_string(),
            description: "An orange sunset.".to_string(),
            alt_text: "Orange sunset over water".to_string(),
        })
    }

    async fn classify(&self, _image_url: &str) -> VisionResult<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.classification
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| VisionError::Api {
                status: 529,
                body: "overloaded".to_string(),
            })
    }
}

pub struct Harness {
    pub media: Arc<InMemoryMediaStore>,
    pub storage: Arc<MemoryStorage>,
    pub rules: Arc<InMemoryRuleStore>,
    pub executions: Arc<InMemoryExecutionLog>,
    pub entities: Arc<InMemoryEntityStore>,
    pub vision: Arc<StubClassifier>,
    pub engine: Arc<WorkflowEngine>,
    pub pipeline: Arc<MediaPipeline>,
    pub queue: PipelineQueue,
    pub ingest: IngestService,
    pub linker: EntityLinker,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_concurrency(4)
    }

    pub fn with_concurrency(max_concurrency: usize) -> Self {
        let media = Arc::new(InMemoryMediaStore::new());
        Self::with_media_store(media.clone(), media, max_concurrency)
    }

    /// `store` is what the services use; `media` is the inspectable backing store.
    pub fn with_media_store(
        media: Arc<InMemoryMediaStore>,
        store: Arc<dyn MediaStore>,
        max_concurrency: usize,
    ) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let rules = Arc::new(InMemoryRuleStore::new());
        let executions = Arc::new(InMemoryExecutionLog::new());
        let entities = Arc::new(InMemoryEntityStore::new());
        let vision = Arc::new(StubClassifier::new());

        let registry = RuleRegistry::with_defaults(store.clone(), Arc::new(TracingNotifier));
        let engine = Arc::new(WorkflowEngine::new(
            rules.clone(),
            executions.clone(),
            registry,
        ));
        let pipeline = Arc::new(MediaPipeline::new(
            store.clone(),
            storage.clone(),
            ResolutionGenerator::default(),
            vision.clone(),
            engine.clone(),
        ));
        let queue = PipelineQueue::new(pipeline.clone(), PipelineQueueConfig { max_concurrency });
        let ingest = IngestService::new(
            store.clone(),
            storage.clone(),
            Arc::new(FormatNormalizer::new(Arc::new(FakeTranscoder))),
            queue.clone(),
            MAX_FILE_SIZE,
            Duration::from_secs(1800),
        );
        let linker = EntityLinker::new(store, entities.clone());

        Self {
            media,
            storage,
            rules,
            executions,
            entities,
            vision,
            engine,
            pipeline,
            queue,
            ingest,
            linker,
        }
    }

    pub async fn upload(&self, filename: &str, mime: &str, data: Bytes) -> MediaAsset {
        self.ingest
            .ingest(UploadRequest {
                data,
                filename: filename.to_string(),
                declared_mime: mime.to_string(),
                source: MediaSource::Upload,
            })
            .await
            .unwrap()
    }

    /// Store an original and create its `pending` record without queueing anything.
    pub async fn seed(&self, data: Bytes) -> MediaAsset {
        let id = Uuid::new_v4();
        let stored = self
            .storage
            .store(data.clone(), "original.jpg", &media_namespace(id), "image/jpeg")
            .await
            .unwrap();
        self.media
            .create(NewMediaAsset {
                id,
                filename: "seeded.jpg".to_string(),
                mime_type: "image/jpeg".to_string(),
                file_size: data.len() as i64,
                source: MediaSource::ExternalImport,
                original_key: stored.key,
                original_url: stored.url,
            })
            .await
            .unwrap()
    }

    pub async fn get(&self, id: Uuid) -> MediaAsset {
        self.media.get(id).await.unwrap().unwrap()
    }

    pub async fn stored_dimensions(&self, key: &str) -> (u32, u32) {
        let data = self.storage.download(key).await.unwrap();
        let img = image::load_from_memory(&data).unwrap();
        (img.width(), img.height())
    }
}
