//! Built-in action executors
//!
//! Mutating actions re-read the asset from the record store and write a
//! partial patch, so they compose with whatever earlier actions changed.
//! Each one is a no-op when its effect is already present.

use async_trait::async_trait;
use folio_core::models::{
    merge_tags, normalize_tags, EntityKind, MediaAsset, MediaPatch, ProcessingStatus,
};
use folio_db::MediaStore;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{RuleError, RuleResult};
use crate::notifier::{AdminNotification, AdminNotifier, NotificationLevel};
use crate::registry::{ActionExecutor, ActionInvocation};

fn media_id(invocation: &ActionInvocation<'_>) -> RuleResult<Uuid> {
    invocation.context.media_id.ok_or(RuleError::NoMedia)
}

async fn load(media: &dyn MediaStore, id: Uuid) -> RuleResult<MediaAsset> {
    media.get(id).await?.ok_or(RuleError::MediaNotFound(id))
}

async fn save(media: &dyn MediaStore, id: Uuid, patch: &MediaPatch) -> RuleResult<()> {
    media
        .update(id, patch)
        .await?
        .map(|_| ())
        .ok_or(RuleError::MediaNotFound(id))
}

fn required_str<'a>(action_type: &str, params: &'a JsonValue, key: &str) -> RuleResult<&'a str> {
    params
        .get(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RuleError::params(action_type, format!("'{}' must be a non-empty string", key)))
}

fn optional_str<'a>(action_type: &str, params: &'a JsonValue, key: &str) -> RuleResult<Option<&'a str>> {
    match params.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(v)) => Ok(Some(v.trim())),
        Some(_) => Err(RuleError::params(action_type, format!("'{}' must be a string", key))),
    }
}

/// `add_flag {flag}`
pub struct AddFlagAction {
    media: Arc<dyn MediaStore>,
}

impl AddFlagAction {
    pub fn new(media: Arc<dyn MediaStore>) -> Self {
        Self { media }
    }
}

#[async_trait]
impl ActionExecutor for AddFlagAction {
    fn action_type(&self) -> &'static str {
        "add_flag"
    }

    fn validate(&self, params: &JsonValue) -> RuleResult<()> {
        required_str(self.action_type(), params, "flag").map(|_| ())
    }

    async fn execute(&self, invocation: &ActionInvocation<'_>) -> RuleResult<()> {
        let flag = required_str(self.action_type(), invocation.params, "flag")?.to_lowercase();
        let id = media_id(invocation)?;
        let asset = load(self.media.as_ref(), id).await?;
        if asset.flags.contains(&flag) {
            return Ok(());
        }

        let mut flags = asset.flags;
        flags.push(flag);
        save(
            self.media.as_ref(),
            id,
            &MediaPatch {
                flags: Some(flags),
                ..Default::default()
            },
        )
        .await
    }
}

/// `merge_tags {tags?}`. Without `tags`, merges the asset's AI-suggested tags.
pub struct MergeTagsAction {
    media: Arc<dyn MediaStore>,
}

impl MergeTagsAction {
    pub fn new(media: Arc<dyn MediaStore>) -> Self {
        Self { media }
    }

    fn explicit_tags(&self, params: &JsonValue) -> RuleResult<Option<Vec<String>>> {
        match params.get("tags") {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        RuleError::params(self.action_type(), "'tags' must contain strings")
                    })
                })
                .collect::<RuleResult<Vec<_>>>()
                .map(|tags| Some(normalize_tags(tags))),
            Some(_) => Err(RuleError::params(self.action_type(), "'tags' must be an array")),
        }
    }
}

#[async_trait]
impl ActionExecutor for MergeTagsAction {
    fn action_type(&self) -> &'static str {
        "merge_tags"
    }

    fn validate(&self, params: &JsonValue) -> RuleResult<()> {
        self.explicit_tags(params).map(|_| ())
    }

    async fn execute(&self, invocation: &ActionInvocation<'_>) -> RuleResult<()> {
        let explicit = self.explicit_tags(invocation.params)?;
        let id = media_id(invocation)?;
        let asset = load(self.media.as_ref(), id).await?;

        let additional = match explicit {
            Some(tags) => tags,
            None => {
                let suggested = asset
                    .classification
                    .as_ref()
                    .map(|c| c.suggested_tags.clone())
                    .unwrap_or_default();
                merge_tags(&asset.ai_suggested_tags, &suggested)
            }
        };
        let merged = merge_tags(&asset.tags, &additional);
        if merged == asset.tags {
            return Ok(());
        }

        save(
            self.media.as_ref(),
            id,
            &MediaPatch {
                tags: Some(merged),
                ..Default::default()
            },
        )
        .await
    }
}

/// `mark_entity_candidate {kind?}`. Without `kind`, uses the detected category.
pub struct MarkEntityCandidateAction {
    media: Arc<dyn MediaStore>,
}

impl MarkEntityCandidateAction {
    pub fn new(media: Arc<dyn MediaStore>) -> Self {
        Self { media }
    }

    fn explicit_kind(&self, params: &JsonValue) -> RuleResult<Option<EntityKind>> {
        optional_str(self.action_type(), params, "kind")?
            .map(|raw| {
                raw.parse::<EntityKind>()
                    .map_err(|e| RuleError::params(self.action_type(), e.to_string()))
            })
            .transpose()
    }
}

#[async_trait]
impl ActionExecutor for MarkEntityCandidateAction {
    fn action_type(&self) -> &'static str {
        "mark_entity_candidate"
    }

    fn validate(&self, params: &JsonValue) -> RuleResult<()> {
        self.explicit_kind(params).map(|_| ())
    }

    async fn execute(&self, invocation: &ActionInvocation<'_>) -> RuleResult<()> {
        let kind = match self.explicit_kind(invocation.params)? {
            Some(kind) => kind,
            None => invocation
                .context
                .detected_type()
                .and_then(EntityKind::from_category)
                .ok_or_else(|| {
                    RuleError::params(
                        self.action_type(),
                        "no 'kind' given and the asset has no detected category",
                    )
                })?,
        };
        let id = media_id(invocation)?;
        let asset = load(self.media.as_ref(), id).await?;
        if asset.entity_candidate == Some(kind) {
            return Ok(());
        }

        save(
            self.media.as_ref(),
            id,
            &MediaPatch {
                entity_candidate: Some(kind),
                ..Default::default()
            },
        )
        .await
    }
}

/// `notify {message?, level?}`
pub struct NotifyAction {
    notifier: Arc<dyn AdminNotifier>,
}

impl NotifyAction {
    pub fn new(notifier: Arc<dyn AdminNotifier>) -> Self {
        Self { notifier }
    }

    fn level(&self, params: &JsonValue) -> RuleResult<NotificationLevel> {
        match optional_str(self.action_type(), params, "level")? {
            None | Some("info") => Ok(NotificationLevel::Info),
            Some("warning") | Some("warn") => Ok(NotificationLevel::Warning),
            Some(other) => Err(RuleError::params(
                self.action_type(),
                format!("unknown level '{}'", other),
            )),
        }
    }
}

#[async_trait]
impl ActionExecutor for NotifyAction {
    fn action_type(&self) -> &'static str {
        "notify"
    }

    fn validate(&self, params: &JsonValue) -> RuleResult<()> {
        optional_str(self.action_type(), params, "message")?;
        self.level(params).map(|_| ())
    }

    async fn execute(&self, invocation: &ActionInvocation<'_>) -> RuleResult<()> {
        let message = optional_str(self.action_type(), invocation.params, "message")?
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Rule '{}' matched", invocation.rule.name));

        let notification = AdminNotification {
            rule_id: invocation.rule.id,
            rule_name: invocation.rule.name.clone(),
            media_id: invocation.context.media_id,
            level: self.level(invocation.params)?,
            message,
        };
        self.notifier.notify(&notification).await?;
        Ok(())
    }
}

/// `set_status {status}`. Only transitions the lifecycle allows.
pub struct SetStatusAction {
    media: Arc<dyn MediaStore>,
}

impl SetStatusAction {
    pub fn new(media: Arc<dyn MediaStore>) -> Self {
        Self { media }
    }

    fn target(&self, params: &JsonValue) -> RuleResult<ProcessingStatus> {
        required_str(self.action_type(), params, "status")?
            .parse()
            .map_err(|e: anyhow::Error| RuleError::params(self.action_type(), e.to_string()))
    }
}

#[async_trait]
impl ActionExecutor for SetStatusAction {
    fn action_type(&self) -> &'static str {
        "set_status"
    }

    fn validate(&self, params: &JsonValue) -> RuleResult<()> {
        self.target(params).map(|_| ())
    }

    async fn execute(&self, invocation: &ActionInvocation<'_>) -> RuleResult<()> {
        let target = self.target(invocation.params)?;
        let id = media_id(invocation)?;
        let asset = load(self.media.as_ref(), id).await?;
        if asset.status == target {
            return Ok(());
        }
        if !asset.status.can_transition_to(target) {
            return Err(RuleError::InvalidTransition {
                from: asset.status,
                to: target,
            });
        }
        if !self.media.transition_status(id, asset.status, target).await? {
            return Err(RuleError::Store(anyhow::anyhow!(
                "status of {} changed concurrently",
                id
            )));
        }
        Ok(())
    }
}

/// `set_alt_text {text}`. Leaves existing alt text alone.
pub struct SetAltTextAction {
    media: Arc<dyn MediaStore>,
}

impl SetAltTextAction {
    pub fn new(media: Arc<dyn MediaStore>) -> Self {
        Self { media }
    }
}

#[async_trait]
impl ActionExecutor for SetAltTextAction {
    fn action_type(&self) -> &'static str {
        "set_alt_text"
    }

    fn validate(&self, params: &JsonValue) -> RuleResult<()> {
        required_str(self.action_type(), params, "text").map(|_| ())
    }

    async fn execute(&self, invocation: &ActionInvocation<'_>) -> RuleResult<()> {
        let text = required_str(self.action_type(), invocation.params, "text")?;
        let id = media_id(invocation)?;
        let asset = load(self.media.as_ref(), id).await?;
        if asset
            .alt_text
            .as_deref()
            .is_some_and(|existing| !existing.trim().is_empty())
        {
            return Ok(());
        }

        save(
            self.media.as_ref(),
            id,
            &MediaPatch {
                alt_text: Some(text.to_string()),
                ..Default::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RuleContext;
    use chrono::Utc;
    use folio_core::models::{
        triggers, Classification, MediaCategory, MediaSource, NewMediaAsset, WorkflowRule,
    };
    use folio_db::InMemoryMediaStore;
    use serde_json::json;

    fn rule() -> WorkflowRule {
        WorkflowRule {
            id: Uuid::new_v4(),
            name: "test rule".to_string(),
            trigger: triggers::ON_UPLOAD.to_string(),
            conditions: json!([]),
            actions: json!([]),
            priority: 0,
            enabled: true,
            last_fired_at: None,
            created_at: Utc::now(),
        }
    }

    async fn seeded() -> (Arc<InMemoryMediaStore>, MediaAsset) {
        let store = Arc::new(InMemoryMediaStore::new());
        let id = Uuid::new_v4();
        let asset = store
            .create(NewMediaAsset {
                id,
                filename: "koi.jpg".to_string(),
                mime_type: "image/jpeg".to_string(),
                file_size: 10,
                source: MediaSource::Upload,
                original_key: format!("media/{}/original.jpg", id),
                original_url: format!("memory://folio/media/{}/original.jpg", id),
            })
            .await
            .unwrap();
        (store, asset)
    }

    #[tokio::test]
    async fn add_flag_is_idempotent() {
        let (store, asset) = seeded().await;
        let action = AddFlagAction::new(store.clone());
        let rule = rule();
        let params = json!({"flag": "Tattoo-Candidate"});
        let ctx = RuleContext::from(&asset);
        let invocation = ActionInvocation {
            rule: &rule,
            params: &params,
            context: &ctx,
        };

        action.execute(&invocation).await.unwrap();
        action.execute(&invocation).await.unwrap();

        let stored = store.get(asset.id).await.unwrap().unwrap();
        assert_eq!(stored.flags, vec!["tattoo-candidate"]);
    }

    #[tokio::test]
    async fn merge_tags_defaults_to_suggestions() {
        let (store, mut asset) = seeded().await;
        let mut classification = Classification::fallback("unused");
        classification.suggested_tags = vec!["koi".to_string(), "irezumi".to_string()];
        store
            .update(
                asset.id,
                &MediaPatch {
                    tags: Some(vec!["fish".to_string(), "koi".to_string()]),
                    ai_suggested_tags: Some(vec!["water".to_string()]),
                    classification: Some(classification),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        asset = store.get(asset.id).await.unwrap().unwrap();

        let rule = rule();
        let params = json!({});
        let ctx = RuleContext::from(&asset);
        MergeTagsAction::new(store.clone())
            .execute(&ActionInvocation {
                rule: &rule,
                params: &params,
                context: &ctx,
            })
            .await
            .unwrap();

        let stored = store.get(asset.id).await.unwrap().unwrap();
        assert_eq!(stored.tags, vec!["fish", "koi", "water", "irezumi"]);
    }

    #[tokio::test]
    async fn entity_candidate_falls_back_to_detected_type() {
        let (store, asset) = seeded().await;
        let mut ctx = RuleContext::from(&asset);
        let mut classification = Classification::fallback("unused");
        classification.detected_type = MediaCategory::Artwork;
        ctx.classification = Some(classification);

        let rule = rule();
        let params = json!({});
        MarkEntityCandidateAction::new(store.clone())
            .execute(&ActionInvocation {
                rule: &rule,
                params: &params,
                context: &ctx,
            })
            .await
            .unwrap();

        let stored = store.get(asset.id).await.unwrap().unwrap();
        assert_eq!(stored.entity_candidate, Some(EntityKind::Artwork));
    }

    #[tokio::test]
    async fn set_status_refuses_illegal_transition() {
        let (store, asset) = seeded().await;
        let rule = rule();
        let params = json!({"status": "completed"});
        let ctx = RuleContext::from(&asset);

        let err = SetStatusAction::new(store.clone())
            .execute(&ActionInvocation {
                rule: &rule,
                params: &params,
                context: &ctx,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RuleError::InvalidTransition { .. }));
        let stored = store.get(asset.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProcessingStatus::Pending);
    }

    #[tokio::test]
    async fn alt_text_only_fills_gaps() {
        let (store, asset) = seeded().await;
        let rule = rule();
        let ctx = RuleContext::from(&asset);
        let action = SetAltTextAction::new(store.clone());

        let first = json!({"text": "Koi fish tattoo"});
        action
            .execute(&ActionInvocation {
                rule: &rule,
                params: &first,
                context: &ctx,
            })
            .await
            .unwrap();
        let second = json!({"text": "Something else"});
        action
            .execute(&ActionInvocation {
                rule: &rule,
                params: &second,
                context: &ctx,
            })
            .await
            .unwrap();

        let stored = store.get(asset.id).await.unwrap().unwrap();
        assert_eq!(stored.alt_text.as_deref(), Some("Koi fish tattoo"));
    }

    #[tokio::test]
    async fn actions_without_media_fail() {
        let store = Arc::new(InMemoryMediaStore::new());
        let rule = rule();
        let params = json!({"flag": "x"});
        let ctx = RuleContext::default();
        let err = AddFlagAction::new(store)
            .execute(&ActionInvocation {
                rule: &rule,
                params: &params,
                context: &ctx,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RuleError::NoMedia));
    }
}
