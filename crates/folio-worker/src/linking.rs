//! Promote a processed asset into a portfolio entity

use chrono::Utc;
use folio_core::models::{DomainEntity, EntityKind, LinkedEntity, ProcessingStatus};
use folio_core::AppError;
use folio_db::{DomainEntityStore, MediaStore};
use std::sync::Arc;
use uuid::Uuid;

pub struct EntityLinker {
    media: Arc<dyn MediaStore>,
    entities: Arc<dyn DomainEntityStore>,
}

impl EntityLinker {
    pub fn new(media: Arc<dyn MediaStore>, entities: Arc<dyn DomainEntityStore>) -> Self {
        Self { media, entities }
    }

    /// Create an artwork or tattoo from a completed asset and link it.
    ///
    /// Without `kind`, the rule-marked candidate kind is used, then the
    /// detected category. An asset links to at most one entity; a second
    /// call fails with `Conflict` and creates nothing.
    #[tracing::instrument(skip(self))]
    pub async fn create_entity_from_asset(
        &self,
        media_id: Uuid,
        kind: Option<EntityKind>,
    ) -> Result<DomainEntity, AppError> {
        let asset = self
            .media
            .get(media_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media asset {}", media_id)))?;

        if let Some(linked) = asset.linked_entity {
            return Err(AppError::Conflict(format!(
                "Media asset {} is already linked to {} {}",
                media_id, linked.kind, linked.id
            )));
        }
        if asset.status != ProcessingStatus::Completed {
            return Err(AppError::InvalidInput(format!(
                "Media asset {} is {}; only completed assets can be linked",
                media_id, asset.status
            )));
        }

        let kind = kind
            .or(asset.entity_candidate)
            .or_else(|| {
                asset
                    .classification
                    .as_ref()
                    .and_then(|c| EntityKind::from_category(c.detected_type))
            })
            .ok_or_else(|| {
                AppError::InvalidInput(
                    "Entity kind not given and the asset has no detected category".to_string(),
                )
            })?;

        let classification = asset.classification.as_ref();
        let entity = DomainEntity {
            id: Uuid::new_v4(),
            kind,
            title: asset.title.clone().unwrap_or_else(|| asset.filename.clone()),
            description: asset.description.clone().filter(|d| !d.is_empty()),
            image_url: asset.medium_url.clone().or(Some(asset.original_url.clone())),
            tags: asset.tags.clone(),
            style: classification.and_then(|c| c.style.clone()),
            placement: match kind {
                EntityKind::Tattoo => classification.and_then(|c| c.placement.clone()),
                EntityKind::Artwork => None,
            },
            media_id,
            created_at: Utc::now(),
        };

        let entity = self.entities.create(&entity).await?;
        let link = LinkedEntity {
            kind,
            id: entity.id,
        };

        if !self.media.link_entity(media_id, link).await? {
            if let Err(e) = self.entities.delete(entity.id).await {
                tracing::error!(
                    entity_id = %entity.id,
                    error = %e,
                    "Failed to remove entity after losing the link race"
                );
            }
            return Err(AppError::Conflict(format!(
                "Media asset {} was linked concurrently",
                media_id
            )));
        }

        tracing::info!(entity_id = %entity.id, kind = %kind, "Entity created from asset");
        Ok(entity)
    }
}
