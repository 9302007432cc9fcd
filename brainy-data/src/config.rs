//! Layered configuration: built-in defaults, optional TOML file, then
//! `BRAINY_*` environment overrides, same precedence order the teacher's
//! server resolved by hand with `std::env::var` chains — here expressed
//! declaratively with the `config` crate.

use ::config::{Config, Environment, File};
use brainy_core::{BrainyError, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BrainyConfig {
    /// Where a filesystem-backed storage adapter keeps its data.
    pub storage_path: String,

    /// Embedding output dimension; must match the configured embedding
    /// function.
    #[validate(range(min = 1))]
    pub vector_dimension: usize,

    /// Default HNSW `ef_search` for a fresh index.
    #[validate(range(min = 1))]
    pub ef_search: usize,

    /// Pipeline streaming parallelism cap.
    #[validate(range(min = 1))]
    pub pipeline_parallelism: usize,

    /// Statistics flush lock TTL base, in milliseconds (see
    /// `brainy_storage::StatisticsManager`).
    #[validate(range(min = 1))]
    pub statistics_lock_ttl_ms: u64,
}

impl Default for BrainyConfig {
    fn default() -> Self {
        Self {
            storage_path: "./data/brainy".to_string(),
            vector_dimension: 384,
            ef_search: 100,
            pipeline_parallelism: 8,
            statistics_lock_ttl_ms: 30_000,
        }
    }
}

impl BrainyConfig {
    /// Loads defaults, layers an optional TOML file at `path` if present,
    /// then layers `BRAINY_*` environment variables (`BRAINY_VECTOR_DIMENSION`
    /// maps to `vector_dimension`, etc).
    pub fn load(path: Option<&str>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("storage_path", defaults.storage_path)
            .map_err(config_err)?
            .set_default("vector_dimension", defaults.vector_dimension as i64)
            .map_err(config_err)?
            .set_default("ef_search", defaults.ef_search as i64)
            .map_err(config_err)?
            .set_default("pipeline_parallelism", defaults.pipeline_parallelism as i64)
            .map_err(config_err)?
            .set_default("statistics_lock_ttl_ms", defaults.statistics_lock_ttl_ms as i64)
            .map_err(config_err)?;

        if let Some(path) = path {
            if std::path::Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        builder = builder.add_source(Environment::with_prefix("BRAINY").separator("_"));

        let config: BrainyConfig = builder.build().map_err(config_err)?.try_deserialize().map_err(config_err)?;

        config.validate().map_err(|e| BrainyError::InvalidInput(e.to_string()))?;
        Ok(config)
    }
}

fn config_err(err: ::config::ConfigError) -> BrainyError {
    BrainyError::InvalidInput(format!("configuration error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BrainyConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_with_no_file_uses_defaults() {
        let config = BrainyConfig::load(None).unwrap();
        assert_eq!(config.vector_dimension, 384);
    }

    #[test]
    fn test_env_override_takes_precedence() {
        std::env::set_var("BRAINY_VECTOR_DIMENSION", "768");
        let config = BrainyConfig::load(None).unwrap();
        std::env::remove_var("BRAINY_VECTOR_DIMENSION");
        assert_eq!(config.vector_dimension, 768);
    }
}
