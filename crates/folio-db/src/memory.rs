//! In-memory store implementations
//!
//! Used by tests and by the CLI when no database is configured. Semantics
//! match the Postgres repositories: partial patches, compare-and-set status
//! transitions and link-once entity references.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use folio_core::models::{
    DomainEntity, LinkedEntity, MediaAsset, MediaPatch, NewMediaAsset, ProcessingStatus,
    RuleDefinition, WorkflowExecution, WorkflowRule,
};

use crate::db::traits::{DomainEntityStore, MediaStore, WorkflowExecutionLog, WorkflowRuleStore};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

#[derive(Clone, Default)]
pub struct InMemoryMediaStore {
    assets: Arc<Mutex<HashMap<Uuid, MediaAsset>>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace an asset as-is.
    pub fn insert(&self, asset: MediaAsset) -> Result<()> {
        lock(&self.assets)?.insert(asset.id, asset);
        Ok(())
    }

    pub fn all(&self) -> Result<Vec<MediaAsset>> {
        let mut assets: Vec<MediaAsset> = lock(&self.assets)?.values().cloned().collect();
        assets.sort_by_key(|a| a.created_at);
        Ok(assets)
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn create(&self, new: NewMediaAsset) -> Result<MediaAsset> {
        let mut assets = lock(&self.assets)?;
        if assets.contains_key(&new.id) {
            return Err(anyhow!("Media asset {} already exists", new.id));
        }
        let asset = MediaAsset::from_new(new, Utc::now());
        assets.insert(asset.id, asset.clone());
        Ok(asset)
    }

    async fn get(&self, id: Uuid) -> Result<Option<MediaAsset>> {
        Ok(lock(&self.assets)?.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, patch: &MediaPatch) -> Result<Option<MediaAsset>> {
        let mut assets = lock(&self.assets)?;
        Ok(assets.get_mut(&id).map(|asset| {
            patch.apply(asset);
            asset.updated_at = Utc::now();
            asset.clone()
        }))
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: ProcessingStatus,
        to: ProcessingStatus,
    ) -> Result<bool> {
        let mut assets = lock(&self.assets)?;
        match assets.get_mut(&id) {
            Some(asset) if asset.status == from => {
                let now = Utc::now();
                asset.status = to;
                if to == ProcessingStatus::Processing {
                    asset.processing_started_at = Some(now);
                }
                asset.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn link_entity(&self, id: Uuid, entity: LinkedEntity) -> Result<bool> {
        let mut assets = lock(&self.assets)?;
        match assets.get_mut(&id) {
            Some(asset) if asset.linked_entity.is_none() => {
                asset.linked_entity = Some(entity);
                asset.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryRuleStore {
    rules: Arc<Mutex<Vec<WorkflowRule>>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule row verbatim, including malformed condition/action JSON.
    pub fn insert(&self, rule: WorkflowRule) -> Result<()> {
        lock(&self.rules)?.push(rule);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Option<WorkflowRule>> {
        Ok(lock(&self.rules)?.iter().find(|r| r.id == id).cloned())
    }
}

#[async_trait]
impl WorkflowRuleStore for InMemoryRuleStore {
    async fn create(&self, definition: &RuleDefinition) -> Result<WorkflowRule> {
        let rule = WorkflowRule {
            id: Uuid::new_v4(),
            name: definition.name.clone(),
            trigger: definition.trigger.clone(),
            conditions: serde_json::to_value(&definition.conditions)?,
            actions: serde_json::to_value(&definition.actions)?,
            priority: definition.priority,
            enabled: definition.enabled,
            last_fired_at: None,
            created_at: Utc::now(),
        };
        lock(&self.rules)?.push(rule.clone());
        Ok(rule)
    }

    async fn list_enabled_for_trigger(&self, trigger: &str) -> Result<Vec<WorkflowRule>> {
        let mut rules: Vec<WorkflowRule> = lock(&self.rules)?
            .iter()
            .filter(|r| r.enabled && r.trigger == trigger)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal keys.
        rules.sort_by_key(|r| (r.priority, r.created_at));
        Ok(rules)
    }

    async fn list(&self) -> Result<Vec<WorkflowRule>> {
        let mut rules = lock(&self.rules)?.clone();
        rules.sort_by(|a, b| {
            (a.trigger.as_str(), a.priority, a.created_at)
                .cmp(&(b.trigger.as_str(), b.priority, b.created_at))
        });
        Ok(rules)
    }

    async fn touch_last_fired(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(rule) = lock(&self.rules)?.iter_mut().find(|r| r.id == id) {
            rule.last_fired_at = Some(at);
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryExecutionLog {
    executions: Arc<Mutex<Vec<WorkflowExecution>>>,
    failing: bool,
}

impl InMemoryExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log whose writes always fail.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn all(&self) -> Result<Vec<WorkflowExecution>> {
        Ok(lock(&self.executions)?.clone())
    }
}

#[async_trait]
impl WorkflowExecutionLog for InMemoryExecutionLog {
    async fn record(&self, execution: &WorkflowExecution) -> Result<()> {
        if self.failing {
            return Err(anyhow!("execution log unavailable"));
        }
        lock(&self.executions)?.push(execution.clone());
        Ok(())
    }

    async fn list_for_media(&self, media_id: Uuid) -> Result<Vec<WorkflowExecution>> {
        Ok(lock(&self.executions)?
            .iter()
            .filter(|e| e.media_id == Some(media_id))
            .cloned()
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryEntityStore {
    entities: Arc<Mutex<Vec<DomainEntity>>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> Result<usize> {
        Ok(lock(&self.entities)?.len())
    }
}

#[async_trait]
impl DomainEntityStore for InMemoryEntityStore {
    async fn create(&self, entity: &DomainEntity) -> Result<DomainEntity> {
        lock(&self.entities)?.push(entity.clone());
        Ok(entity.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        lock(&self.entities)?.retain(|e| e.id != id);
        Ok(())
    }

    async fn list_for_media(&self, media_id: Uuid) -> Result<Vec<DomainEntity>> {
        Ok(lock(&self.entities)?
            .iter()
            .filter(|e| e.media_id == media_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::models::{EntityKind, MediaSource};

    fn new_asset() -> NewMediaAsset {
        let id = Uuid::new_v4();
        NewMediaAsset {
            id,
            filename: "koi.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            file_size: 42,
            source: MediaSource::Upload,
            original_key: format!("media/{}/original.jpg", id),
            original_url: format!("memory://folio/media/{}/original.jpg", id),
        }
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let store = InMemoryMediaStore::new();
        let asset = store.create(new_asset()).await.unwrap();
        assert_eq!(asset.status, ProcessingStatus::Pending);

        assert!(store
            .transition_status(asset.id, ProcessingStatus::Pending, ProcessingStatus::Processing)
            .await
            .unwrap());
        assert!(!store
            .transition_status(asset.id, ProcessingStatus::Pending, ProcessingStatus::Processing)
            .await
            .unwrap());

        let stored = store.get(asset.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProcessingStatus::Processing);
        assert!(stored.processing_started_at.is_some());
    }

    #[tokio::test]
    async fn link_entity_only_once() {
        let store = InMemoryMediaStore::new();
        let asset = store.create(new_asset()).await.unwrap();
        let first = LinkedEntity {
            kind: EntityKind::Tattoo,
            id: Uuid::new_v4(),
        };
        let second = LinkedEntity {
            kind: EntityKind::Artwork,
            id: Uuid::new_v4(),
        };
        assert!(store.link_entity(asset.id, first).await.unwrap());
        assert!(!store.link_entity(asset.id, second).await.unwrap());
        let stored = store.get(asset.id).await.unwrap().unwrap();
        assert_eq!(stored.linked_entity, Some(first));
    }

    #[tokio::test]
    async fn update_missing_asset_returns_none() {
        let store = InMemoryMediaStore::new();
        let patch = MediaPatch {
            width: Some(1),
            ..Default::default()
        };
        assert!(store.update(Uuid::new_v4(), &patch).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rules_ordered_by_priority_then_insertion() {
        let store = InMemoryRuleStore::new();
        let mk = |name: &str, priority: i32, trigger: &str| RuleDefinition {
            name: name.to_string(),
            trigger: trigger.to_string(),
            conditions: vec![],
            actions: vec![],
            priority,
            enabled: true,
        };
        store.create(&mk("late", 20, "on_upload")).await.unwrap();
        store.create(&mk("early", 10, "on_upload")).await.unwrap();
        store.create(&mk("early-2", 10, "on_upload")).await.unwrap();
        store.create(&mk("other", 0, "on_link")).await.unwrap();

        let names: Vec<String> = store
            .list_enabled_for_trigger("on_upload")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["early", "early-2", "late"]);
    }
}
