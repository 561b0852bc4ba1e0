//! Facts a rule is evaluated against

use folio_core::models::{
    merge_tags, Classification, MediaAsset, MediaCategory, ProcessingStatus,
};
use uuid::Uuid;

/// Snapshot of the triggering asset. Every field is optional so triggers
/// without a full asset can still evaluate rules; a condition whose data is
/// missing does not hold.
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    pub media_id: Option<Uuid>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub status: Option<ProcessingStatus>,
    /// Asset tags followed by AI-suggested tags, de-duplicated.
    pub tags: Vec<String>,
    pub classification: Option<Classification>,
}

impl RuleContext {
    pub fn detected_type(&self) -> Option<MediaCategory> {
        self.classification.as_ref().map(|c| c.detected_type)
    }

    pub fn confidence(&self) -> Option<f64> {
        self.classification.as_ref().map(|c| c.confidence)
    }
}

impl From<&MediaAsset> for RuleContext {
    fn from(asset: &MediaAsset) -> Self {
        Self {
            media_id: Some(asset.id),
            filename: Some(asset.filename.clone()),
            mime_type: Some(asset.mime_type.clone()),
            status: Some(asset.status),
            tags: merge_tags(&asset.tags, &asset.ai_suggested_tags),
            classification: asset.classification.clone(),
        }
    }
}
