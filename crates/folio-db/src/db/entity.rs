//! Portfolio entity (artwork / tattoo) repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

use folio_core::models::DomainEntity;

use super::traits::DomainEntityStore;

#[derive(Debug, FromRow)]
struct EntityRow {
    id: Uuid,
    kind: String,
    title: String,
    description: Option<String>,
    image_url: Option<String>,
    tags: Vec<String>,
    style: Option<String>,
    placement: Option<String>,
    media_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<EntityRow> for DomainEntity {
    type Error = anyhow::Error;

    fn try_from(row: EntityRow) -> Result<Self> {
        Ok(DomainEntity {
            id: row.id,
            kind: row.kind.parse()?,
            title: row.title,
            description: row.description,
            image_url: row.image_url,
            tags: row.tags,
            style: row.style,
            placement: row.placement,
            media_id: row.media_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct EntityRepository {
    pool: PgPool,
}

impl EntityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DomainEntityStore for EntityRepository {
    async fn create(&self, entity: &DomainEntity) -> Result<DomainEntity> {
        let row = sqlx::query_as::<Postgres, EntityRow>(
            r#"
            INSERT INTO portfolio_entities (
                id, kind, title, description, image_url, tags, style, placement, media_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, kind, title, description, image_url, tags, style, placement, media_id, created_at
            "#,
        )
        .bind(entity.id)
        .bind(entity.kind.as_str())
        .bind(&entity.title)
        .bind(entity.description.as_deref())
        .bind(entity.image_url.as_deref())
        .bind(&entity.tags)
        .bind(entity.style.as_deref())
        .bind(entity.placement.as_deref())
        .bind(entity.media_id)
        .bind(entity.created_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create portfolio entity")?;

        row.try_into()
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM portfolio_entities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete portfolio entity")?;
        Ok(())
    }

    async fn list_for_media(&self, media_id: Uuid) -> Result<Vec<DomainEntity>> {
        let rows = sqlx::query_as::<Postgres, EntityRow>(
            r#"
            SELECT id, kind, title, description, image_url, tags, style, placement, media_id, created_at
            FROM portfolio_entities
            WHERE media_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(media_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list portfolio entities")?;

        rows.into_iter().map(DomainEntity::try_from).collect()
    }
}
