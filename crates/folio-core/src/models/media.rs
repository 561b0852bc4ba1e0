//! Media asset model and lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::classification::Classification;
use super::entity::{EntityKind, LinkedEntity};

/// Processing status of an asset.
///
/// `pending -> processing -> completed | failed`. A failed asset, or one
/// abandoned in `processing`, can be put back to `pending` by resubmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Pending)
                | (Processing, Pending)
        )
    }
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid processing status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    Upload,
    ExternalImport,
}

impl MediaSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaSource::Upload => "upload",
            MediaSource::ExternalImport => "external_import",
        }
    }
}

impl Display for MediaSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(MediaSource::Upload),
            "external_import" => Ok(MediaSource::ExternalImport),
            _ => Err(anyhow::anyhow!("Invalid media source: {}", s)),
        }
    }
}

/// Pipeline steps in execution order. The derived ordering follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    AcquireOriginal,
    DeriveResolutions,
    StoreVariants,
    RecordVariants,
    Classify,
    RecordEnrichment,
    EvaluateRules,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 7] = [
        PipelineStep::AcquireOriginal,
        PipelineStep::DeriveResolutions,
        PipelineStep::StoreVariants,
        PipelineStep::RecordVariants,
        PipelineStep::Classify,
        PipelineStep::RecordEnrichment,
        PipelineStep::EvaluateRules,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::AcquireOriginal => "acquire_original",
            PipelineStep::DeriveResolutions => "derive_resolutions",
            PipelineStep::StoreVariants => "store_variants",
            PipelineStep::RecordVariants => "record_variants",
            PipelineStep::Classify => "classify",
            PipelineStep::RecordEnrichment => "record_enrichment",
            PipelineStep::EvaluateRules => "evaluate_rules",
        }
    }
}

impl Display for PipelineStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStep {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStep::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Invalid pipeline step: {}", s))
    }
}

/// One uploaded or imported image tracked through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub source: MediaSource,
    pub status: ProcessingStatus,
    pub original_key: String,
    pub original_url: String,
    pub medium_key: Option<String>,
    pub medium_url: Option<String>,
    pub thumbnail_key: Option<String>,
    pub thumbnail_url: Option<String>,
    pub tags: Vec<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub alt_text: Option<String>,
    pub classification: Option<Classification>,
    pub ai_suggested_tags: Vec<String>,
    pub flags: Vec<String>,
    pub entity_candidate: Option<EntityKind>,
    pub linked_entity: Option<LinkedEntity>,
    pub error_message: Option<String>,
    pub checkpoint: Option<PipelineStep>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaAsset {
    pub fn from_new(new: NewMediaAsset, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            filename: new.filename,
            mime_type: new.mime_type,
            file_size: new.file_size,
            width: None,
            height: None,
            source: new.source,
            status: ProcessingStatus::Pending,
            original_key: new.original_key,
            original_url: new.original_url,
            medium_key: None,
            medium_url: None,
            thumbnail_key: None,
            thumbnail_url: None,
            tags: Vec::new(),
            title: None,
            description: None,
            alt_text: None,
            classification: None,
            ai_suggested_tags: Vec::new(),
            flags: Vec::new(),
            entity_candidate: None,
            linked_entity: None,
            error_message: None,
            checkpoint: None,
            processing_started_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `step` already committed its output on a previous run.
    pub fn has_completed(&self, step: PipelineStep) -> bool {
        self.checkpoint.is_some_and(|done| done >= step)
    }

    pub fn has_variants(&self) -> bool {
        self.medium_url.is_some() && self.thumbnail_url.is_some()
    }
}

/// Fields supplied when an asset record is first created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMediaAsset {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub source: MediaSource,
    pub original_key: String,
    pub original_url: String,
}

/// Partial update. `None` leaves a field untouched.
///
/// `error_message` is doubly optional so a patch can clear it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaPatch {
    pub mime_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub medium_key: Option<String>,
    pub medium_url: Option<String>,
    pub thumbnail_key: Option<String>,
    pub thumbnail_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub alt_text: Option<String>,
    pub classification: Option<Classification>,
    pub ai_suggested_tags: Option<Vec<String>>,
    pub flags: Option<Vec<String>>,
    pub entity_candidate: Option<EntityKind>,
    pub error_message: Option<Option<String>>,
    pub checkpoint: Option<PipelineStep>,
}

impl MediaPatch {
    pub fn checkpoint(step: PipelineStep) -> Self {
        Self {
            checkpoint: Some(step),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &MediaPatch::default()
    }

    /// Apply to an in-memory asset. Storage backends must produce the same result.
    pub fn apply(&self, asset: &mut MediaAsset) {
        if let Some(v) = &self.mime_type {
            asset.mime_type = v.clone();
        }
        if let Some(v) = self.width {
            asset.width = Some(v);
        }
        if let Some(v) = self.height {
            asset.height = Some(v);
        }
        if let Some(v) = &self.medium_key {
            asset.medium_key = Some(v.clone());
        }
        if let Some(v) = &self.medium_url {
            asset.medium_url = Some(v.clone());
        }
        if let Some(v) = &self.thumbnail_key {
            asset.thumbnail_key = Some(v.clone());
        }
        if let Some(v) = &self.thumbnail_url {
            asset.thumbnail_url = Some(v.clone());
        }
        if let Some(v) = &self.tags {
            asset.tags = v.clone();
        }
        if let Some(v) = &self.title {
            asset.title = Some(v.clone());
        }
        if let Some(v) = &self.description {
            asset.description = Some(v.clone());
        }
        if let Some(v) = &self.alt_text {
            asset.alt_text = Some(v.clone());
        }
        if let Some(v) = &self.classification {
            asset.classification = Some(v.clone());
        }
        if let Some(v) = &self.ai_suggested_tags {
            asset.ai_suggested_tags = v.clone();
        }
        if let Some(v) = &self.flags {
            asset.flags = v.clone();
        }
        if let Some(v) = self.entity_candidate {
            asset.entity_candidate = Some(v);
        }
        if let Some(v) = &self.error_message {
            asset.error_message = v.clone();
        }
        if let Some(v) = self.checkpoint {
            asset.checkpoint = Some(v);
        }
    }
}
