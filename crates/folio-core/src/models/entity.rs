//! Portfolio entities an asset can be promoted into

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::classification::MediaCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Artwork,
    Tattoo,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Artwork => "artwork",
            EntityKind::Tattoo => "tattoo",
        }
    }

    /// Entity kind implied by a classification category, if any.
    pub fn from_category(category: MediaCategory) -> Option<Self> {
        match category {
            MediaCategory::Tattoo => Some(EntityKind::Tattoo),
            MediaCategory::Artwork => Some(EntityKind::Artwork),
            MediaCategory::Unknown => None,
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "artwork" => Ok(EntityKind::Artwork),
            "tattoo" => Ok(EntityKind::Tattoo),
            _ => Err(anyhow::anyhow!("Invalid entity kind: {}", s)),
        }
    }
}

/// Reference from an asset to the entity created from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedEntity {
    pub kind: EntityKind,
    pub id: Uuid,
}

/// Artwork or tattoo record created from an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEntity {
    pub id: Uuid,
    pub kind: EntityKind,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub style: Option<String>,
    pub placement: Option<String>,
    pub media_id: Uuid,
    pub created_at: DateTime<Utc>,
}
