//! Bounded pipeline worker pool
//!
//! Every submitted job gets its own task, and a shared semaphore caps how
//! many of them run the pipeline at once. Jobs over the limit wait for a
//! permit instead of being rejected.
//!
//! Shutdown: [`PipelineQueue::shutdown`] closes the semaphore so waiting jobs
//! are dropped (their assets stay `pending` for resubmission);
//! [`PipelineQueue::drain`] waits for every spawned job to finish.

use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::pipeline::{MediaPipeline, ProcessRequest};

#[derive(Debug, Clone)]
pub struct PipelineQueueConfig {
    pub max_concurrency: usize,
}

impl Default for PipelineQueueConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineJob {
    Process(ProcessRequest),
    Reprocess(Uuid),
}

impl PipelineJob {
    pub fn media_id(&self) -> Uuid {
        match self {
            PipelineJob::Process(request) => request.media_id,
            PipelineJob::Reprocess(id) => *id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            PipelineJob::Process(_) => "process",
            PipelineJob::Reprocess(_) => "reprocess",
        }
    }
}

#[derive(Clone)]
pub struct PipelineQueue {
    pipeline: Arc<MediaPipeline>,
    semaphore: Arc<Semaphore>,
    tasks: Arc<Mutex<JoinSet<()>>>,
    config: PipelineQueueConfig,
}

impl PipelineQueue {
    /// Must be created inside a Tokio runtime.
    pub fn new(pipeline: Arc<MediaPipeline>, config: PipelineQueueConfig) -> Self {
        let max = config.max_concurrency.max(1);
        tracing::info!(max_concurrency = max, "Pipeline worker pool started");
        Self {
            pipeline,
            semaphore: Arc::new(Semaphore::new(max)),
            tasks: Arc::new(Mutex::new(JoinSet::new())),
            config: PipelineQueueConfig {
                max_concurrency: max,
            },
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.config.max_concurrency
    }

    /// Jobs currently holding a permit.
    pub fn running(&self) -> usize {
        self.config.max_concurrency - self.semaphore.available_permits()
    }

    /// Queue a job. Returns immediately; the job runs once a permit frees up.
    pub fn submit(&self, job: PipelineJob) -> anyhow::Result<()> {
        let media_id = job.media_id();
        let kind = job.kind();
        let pipeline = self.pipeline.clone();
        let semaphore = self.semaphore.clone();

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| anyhow::anyhow!("pipeline queue lock poisoned"))?;
        // Reap finished tasks so the set does not grow without bound.
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!(
                        media_id = %media_id,
                        job = kind,
                        "Pipeline queue shut down before job started"
                    );
                    return;
                }
            };

            let result = match job {
                PipelineJob::Process(request) => pipeline.process(request).await,
                PipelineJob::Reprocess(id) => pipeline.reprocess(id).await,
            };
            if let Err(e) = result {
                tracing::error!(media_id = %media_id, job = kind, error = %e, "Pipeline job failed");
            }
        });

        tracing::info!(media_id = %media_id, job = kind, "Pipeline job submitted");
        Ok(())
    }

    /// Wait until every submitted job, including ones submitted meanwhile, has finished.
    pub async fn drain(&self) {
        loop {
            let mut batch = match self.tasks.lock() {
                Ok(mut tasks) => std::mem::take(&mut *tasks),
                Err(_) => return,
            };
            if batch.is_empty() {
                return;
            }
            while let Some(joined) = batch.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Pipeline job panicked");
                }
            }
        }
    }

    /// Stop starting new jobs. Running jobs finish their current run.
    pub fn shutdown(&self) {
        self.semaphore.close();
        tracing::info!("Pipeline worker pool shutting down");
    }
}
