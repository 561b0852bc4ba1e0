//! Configuration module
//!
//! Settings are read from the environment (optionally seeded from a `.env`
//! file) with defaults for everything except credentials.

use std::env;
use std::time::Duration;

use crate::storage_types::StorageBackend;

const MAX_FILE_SIZE_MB: usize = 25;
const PIPELINE_MAX_CONCURRENCY: usize = 4;
const PIPELINE_ABANDONED_AFTER_SECS: u64 = 1800;
const MEDIUM_MAX_EDGE: u32 = 800;
const THUMBNAIL_MAX_EDGE: u32 = 200;
const VARIANT_JPEG_QUALITY: u8 = 85;
const NORMALIZE_JPEG_QUALITY: u8 = 95;
const VISION_TIMEOUT_SECS: u64 = 60;
const DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_VISION_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub log_format: String,
    pub database_url: String,
    pub db_max_connections: u32,
    // Storage
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Ingest and processing
    pub max_file_size_bytes: usize,
    pub medium_max_edge: u32,
    pub thumbnail_max_edge: u32,
    pub variant_jpeg_quality: u8,
    pub normalize_jpeg_quality: u8,
    pub heif_converter_path: String,
    pub raw_converter_path: String,
    // Pipeline
    pub pipeline_max_concurrency: usize,
    pub pipeline_abandoned_after_secs: u64,
    // Vision
    pub anthropic_api_key: Option<String>,
    pub anthropic_vision_model: String,
    pub vision_timeout_secs: u64,
    pub vision_inline_images: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse::<StorageBackend>()?,
            Err(_) => StorageBackend::Local,
        };

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let config = Config {
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| {
                if is_production(&environment) {
                    "json".to_string()
                } else {
                    "pretty".to_string()
                }
            }),
            environment,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost:5432/folio".to_string()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| DB_MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(DB_MAX_CONNECTIONS),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .ok()
                .or_else(|| Some("./data/media".to_string())),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL")
                .ok()
                .or_else(|| Some("http://localhost:3000/media".to_string())),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            medium_max_edge: env::var("MEDIUM_MAX_EDGE")
                .unwrap_or_else(|_| MEDIUM_MAX_EDGE.to_string())
                .parse()
                .unwrap_or(MEDIUM_MAX_EDGE),
            thumbnail_max_edge: env::var("THUMBNAIL_MAX_EDGE")
                .unwrap_or_else(|_| THUMBNAIL_MAX_EDGE.to_string())
                .parse()
                .unwrap_or(THUMBNAIL_MAX_EDGE),
            variant_jpeg_quality: env::var("VARIANT_JPEG_QUALITY")
                .unwrap_or_else(|_| VARIANT_JPEG_QUALITY.to_string())
                .parse()
                .unwrap_or(VARIANT_JPEG_QUALITY),
            normalize_jpeg_quality: env::var("NORMALIZE_JPEG_QUALITY")
                .unwrap_or_else(|_| NORMALIZE_JPEG_QUALITY.to_string())
                .parse()
                .unwrap_or(NORMALIZE_JPEG_QUALITY),
            heif_converter_path: env::var("HEIF_CONVERTER_PATH")
                .unwrap_or_else(|_| "heif-convert".to_string()),
            raw_converter_path: env::var("RAW_CONVERTER_PATH")
                .unwrap_or_else(|_| "dcraw".to_string()),
            pipeline_max_concurrency: env::var("PIPELINE_MAX_CONCURRENCY")
                .unwrap_or_else(|_| PIPELINE_MAX_CONCURRENCY.to_string())
                .parse()
                .unwrap_or(PIPELINE_MAX_CONCURRENCY),
            pipeline_abandoned_after_secs: env::var("PIPELINE_ABANDONED_AFTER_SECS")
                .unwrap_or_else(|_| PIPELINE_ABANDONED_AFTER_SECS.to_string())
                .parse()
                .unwrap_or(PIPELINE_ABANDONED_AFTER_SECS),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty()),
            anthropic_vision_model: env::var("ANTHROPIC_VISION_MODEL")
                .unwrap_or_else(|_| DEFAULT_VISION_MODEL.to_string()),
            vision_timeout_secs: env::var("VISION_TIMEOUT_SECS")
                .unwrap_or_else(|_| VISION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(VISION_TIMEOUT_SECS),
            vision_inline_images: env::var("VISION_INLINE_IMAGES")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() || self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH and LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {
                if self.is_production() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BACKEND=memory is not allowed in production"
                    ));
                }
            }
        }

        if self.pipeline_max_concurrency == 0 {
            return Err(anyhow::anyhow!(
                "PIPELINE_MAX_CONCURRENCY must be at least 1"
            ));
        }

        if self.thumbnail_max_edge == 0 || self.thumbnail_max_edge > self.medium_max_edge {
            return Err(anyhow::anyhow!(
                "THUMBNAIL_MAX_EDGE must be between 1 and MEDIUM_MAX_EDGE ({})",
                self.medium_max_edge
            ));
        }

        for (name, quality) in [
            ("VARIANT_JPEG_QUALITY", self.variant_jpeg_quality),
            ("NORMALIZE_JPEG_QUALITY", self.normalize_jpeg_quality),
        ] {
            if quality == 0 || quality > 100 {
                return Err(anyhow::anyhow!("{} must be between 1 and 100", name));
            }
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        is_production(&self.environment)
    }

    pub fn abandoned_after(&self) -> Duration {
        Duration::from_secs(self.pipeline_abandoned_after_secs)
    }

    pub fn vision_timeout(&self) -> Duration {
        Duration::from_secs(self.vision_timeout_secs)
    }
}

fn is_production(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            environment: "development".to_string(),
            log_format: "pretty".to_string(),
            database_url: "postgresql://localhost/folio".to_string(),
            db_max_connections: 5,
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: Some("/tmp/folio".to_string()),
            local_storage_base_url: Some("http://localhost/media".to_string()),
            max_file_size_bytes: 1024,
            medium_max_edge: 800,
            thumbnail_max_edge: 200,
            variant_jpeg_quality: 85,
            normalize_jpeg_quality: 95,
            heif_converter_path: "heif-convert".to_string(),
            raw_converter_path: "dcraw".to_string(),
            pipeline_max_concurrency: 2,
            pipeline_abandoned_after_secs: 60,
            anthropic_api_key: None,
            anthropic_vision_model: DEFAULT_VISION_MODEL.to_string(),
            vision_timeout_secs: 10,
            vision_inline_images: false,
        }
    }

    #[test]
    fn local_defaults_validate() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn s3_requires_bucket() {
        let mut config = base();
        config.storage_backend = StorageBackend::S3;
        config.s3_region = Some("eu-west-1".to_string());
        assert!(config.validate().is_err());
        config.s3_bucket = Some("portfolio".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let mut config = base();
        config.pipeline_max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn thumbnail_cannot_exceed_medium() {
        let mut config = base();
        config.thumbnail_max_edge = 900;
        assert!(config.validate().is_err());
    }
}
