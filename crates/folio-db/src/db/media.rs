//! Media asset repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

use folio_core::models::{
    Classification, EntityKind, LinkedEntity, MediaAsset, MediaPatch, NewMediaAsset,
    ProcessingStatus,
};

use super::traits::MediaStore;

const MEDIA_COLUMNS: &str = r#"
    id, filename, mime_type, file_size, width, height, source, status,
    original_key, original_url, medium_key, medium_url, thumbnail_key, thumbnail_url,
    tags, title, description, alt_text, classification, ai_suggested_tags, flags,
    entity_candidate, linked_entity_kind, linked_entity_id, error_message, checkpoint,
    processing_started_at, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct MediaRow {
    id: Uuid,
    filename: String,
    mime_type: String,
    file_size: i64,
    width: Option<i32>,
    height: Option<i32>,
    source: String,
    status: String,
    original_key: String,
    original_url: String,
    medium_key: Option<String>,
    medium_url: Option<String>,
    thumbnail_key: Option<String>,
    thumbnail_url: Option<String>,
    tags: Vec<String>,
    title: Option<String>,
    description: Option<String>,
    alt_text: Option<String>,
    classification: Option<Json<Classification>>,
    ai_suggested_tags: Vec<String>,
    flags: Vec<String>,
    entity_candidate: Option<String>,
    linked_entity_kind: Option<String>,
    linked_entity_id: Option<Uuid>,
    error_message: Option<String>,
    checkpoint: Option<String>,
    processing_started_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MediaRow> for MediaAsset {
    type Error = anyhow::Error;

    fn try_from(row: MediaRow) -> Result<Self> {
        let linked_entity = match (row.linked_entity_kind, row.linked_entity_id) {
            (Some(kind), Some(id)) => Some(LinkedEntity {
                kind: kind.parse()?,
                id,
            }),
            _ => None,
        };

        Ok(MediaAsset {
            id: row.id,
            filename: row.filename,
            mime_type: row.mime_type,
            file_size: row.file_size,
            width: row.width,
            height: row.height,
            source: row.source.parse()?,
            status: row.status.parse()?,
            original_key: row.original_key,
            original_url: row.original_url,
            medium_key: row.medium_key,
            medium_url: row.medium_url,
            thumbnail_key: row.thumbnail_key,
            thumbnail_url: row.thumbnail_url,
            tags: row.tags,
            title: row.title,
            description: row.description,
            alt_text: row.alt_text,
            classification: row.classification.map(|Json(c)| c),
            ai_suggested_tags: row.ai_suggested_tags,
            flags: row.flags,
            entity_candidate: row
                .entity_candidate
                .map(|k| k.parse::<EntityKind>())
                .transpose()?,
            linked_entity,
            error_message: row.error_message,
            checkpoint: row.checkpoint.map(|s| s.parse()).transpose()?,
            processing_started_at: row.processing_started_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
}

impl MediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaStore for MediaRepository {
    async fn create(&self, new: NewMediaAsset) -> Result<MediaAsset> {
        let now = Utc::now();
        let row = sqlx::query_as::<Postgres, MediaRow>(&format!(
            r#"
            INSERT INTO media_assets (
                id, filename, mime_type, file_size, source, status,
                original_key, original_url, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7, $8, $8)
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(new.id)
        .bind(&new.filename)
        .bind(&new.mime_type)
        .bind(new.file_size)
        .bind(new.source.as_str())
        .bind(&new.original_key)
        .bind(&new.original_url)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create media asset")?;

        row.try_into()
    }

    async fn get(&self, id: Uuid) -> Result<Option<MediaAsset>> {
        let row = sqlx::query_as::<Postgres, MediaRow>(&format!(
            "SELECT {} FROM media_assets WHERE id = $1",
            MEDIA_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get media asset")?;

        row.map(MediaAsset::try_from).transpose()
    }

    async fn update(&self, id: Uuid, patch: &MediaPatch) -> Result<Option<MediaAsset>> {
        let (set_error, error_message) = match &patch.error_message {
            Some(value) => (true, value.clone()),
            None => (false, None),
        };

        let row = sqlx::query_as::<Postgres, MediaRow>(&format!(
            r#"
            UPDATE media_assets
            SET
                mime_type = COALESCE($2, mime_type),
                width = COALESCE($3, width),
                height = COALESCE($4, height),
                medium_key = COALESCE($5, medium_key),
                medium_url = COALESCE($6, medium_url),
                thumbnail_key = COALESCE($7, thumbnail_key),
                thumbnail_url = COALESCE($8, thumbnail_url),
                tags = COALESCE($9, tags),
                title = COALESCE($10, title),
                description = COALESCE($11, description),
                alt_text = COALESCE($12, alt_text),
                classification = COALESCE($13, classification),
                ai_suggested_tags = COALESCE($14, ai_suggested_tags),
                flags = COALESCE($15, flags),
                entity_candidate = COALESCE($16, entity_candidate),
                error_message = CASE WHEN $17 THEN $18 ELSE error_message END,
                checkpoint = COALESCE($19, checkpoint),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(id)
        .bind(patch.mime_type.as_deref())
        .bind(patch.width)
        .bind(patch.height)
        .bind(patch.medium_key.as_deref())
        .bind(patch.medium_url.as_deref())
        .bind(patch.thumbnail_key.as_deref())
        .bind(patch.thumbnail_url.as_deref())
        .bind(patch.tags.as_deref())
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.alt_text.as_deref())
        .bind(patch.classification.as_ref().map(Json))
        .bind(patch.ai_suggested_tags.as_deref())
        .bind(patch.flags.as_deref())
        .bind(patch.entity_candidate.map(|k| k.as_str()))
        .bind(set_error)
        .bind(error_message)
        .bind(patch.checkpoint.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update media asset")?;

        row.map(MediaAsset::try_from).transpose()
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: ProcessingStatus,
        to: ProcessingStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE media_assets
            SET status = $3,
                processing_started_at = CASE WHEN $3 = 'processing' THEN NOW() ELSE processing_started_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to transition media status")?;

        Ok(result.rows_affected() == 1)
    }

    async fn link_entity(&self, id: Uuid, entity: LinkedEntity) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE media_assets
            SET linked_entity_kind = $2, linked_entity_id = $3, updated_at = NOW()
            WHERE id = $1 AND linked_entity_id IS NULL
            "#,
        )
        .bind(id)
        .bind(entity.kind.as_str())
        .bind(entity.id)
        .execute(&self.pool)
        .await
        .context("Failed to link entity to media asset")?;

        Ok(result.rows_affected() == 1)
    }
}
