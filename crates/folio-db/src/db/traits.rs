//! Store traits consumed by the pipeline, rule engine and services

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use folio_core::models::{
    DomainEntity, LinkedEntity, MediaAsset, MediaPatch, NewMediaAsset, ProcessingStatus,
    RuleDefinition, WorkflowExecution, WorkflowRule,
};

/// Durable record of each asset's lifecycle and derived fields.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn create(&self, new: NewMediaAsset) -> Result<MediaAsset>;

    async fn get(&self, id: Uuid) -> Result<Option<MediaAsset>>;

    /// Partial update. Returns `None` when the asset does not exist.
    async fn update(&self, id: Uuid, patch: &MediaPatch) -> Result<Option<MediaAsset>>;

    /// Compare-and-set on status. Returns `false` when the current status is not `from`.
    ///
    /// Entering `processing` stamps `processing_started_at`.
    async fn transition_status(
        &self,
        id: Uuid,
        from: ProcessingStatus,
        to: ProcessingStatus,
    ) -> Result<bool>;

    /// Set the linked entity only if none is set yet. Returns `false` if already linked.
    async fn link_entity(&self, id: Uuid, entity: LinkedEntity) -> Result<bool>;
}

#[async_trait]
pub trait WorkflowRuleStore: Send + Sync {
    async fn create(&self, definition: &RuleDefinition) -> Result<WorkflowRule>;

    /// Enabled rules for a trigger ordered by priority, then creation time, then id.
    async fn list_enabled_for_trigger(&self, trigger: &str) -> Result<Vec<WorkflowRule>>;

    async fn list(&self) -> Result<Vec<WorkflowRule>>;

    async fn touch_last_fired(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

/// Append-only audit trail of rule evaluations.
#[async_trait]
pub trait WorkflowExecutionLog: Send + Sync {
    async fn record(&self, execution: &WorkflowExecution) -> Result<()>;

    async fn list_for_media(&self, media_id: Uuid) -> Result<Vec<WorkflowExecution>>;
}

/// Artwork and tattoo records.
#[async_trait]
pub trait DomainEntityStore: Send + Sync {
    async fn create(&self, entity: &DomainEntity) -> Result<DomainEntity>;

    async fn delete(&self, id: Uuid) -> Result<()>;

    async fn list_for_media(&self, media_id: Uuid) -> Result<Vec<DomainEntity>>;
}
