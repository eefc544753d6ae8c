//! Configuration types for the translator
//!
//! This module defines the configuration consumed by the translation engine
//! and the loader that layers defaults, an optional file and the process
//! environment.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Placeholder substituted with the dictionary code in the dictionary templates
pub const DICT_CODE_PLACEHOLDER: &str = "{dict_code}";

/// Longest accepted shared cache TTL: 100 years
pub const MAX_EXPIRE_MINUTES: u64 = 100 * 365 * 24 * 60;

/// Environment variable prefix (`TRANSLATOR_CACHE__EXPIRE_MINUTES=10`)
pub const ENV_PREFIX: &str = "TRANSLATOR";

/// Root configuration for the translator
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Query used for dictionary-code fields
    pub dict_query_sql: String,
    /// Query used for dictionary-code fields following the English naming convention
    pub dict_query_sql_eng: String,
    /// Shared cache configuration
    pub cache: CacheConfig,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            dict_query_sql:
                "select dict_display from dict_data where dict_code = '{dict_code}' and dict_data_code = ?"
                    .to_string(),
            dict_query_sql_eng:
                "select dict_eng_display from dict_data where dict_code = '{dict_code}' and dict_data_code = ?"
                    .to_string(),
            cache: CacheConfig::default(),
        }
    }
}

impl TranslatorConfig {
    /// Load configuration: defaults, then `path` (format picked from the
    /// extension), then `TRANSLATOR_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values the engine relies on
    pub fn validate(&self) -> Result<()> {
        for (name, template) in [
            ("dict_query_sql", &self.dict_query_sql),
            ("dict_query_sql_eng", &self.dict_query_sql_eng),
        ] {
            if !template.contains(DICT_CODE_PLACEHOLDER) {
                return Err(Error::configuration(format!(
                    "{name} must contain the {DICT_CODE_PLACEHOLDER} placeholder"
                )));
            }
        }
        if self.cache.expire_minutes == 0 {
            return Err(Error::configuration("cache.expire_minutes must be positive"));
        }
        if self.cache.expire_minutes > MAX_EXPIRE_MINUTES {
            return Err(Error::configuration(format!(
                "cache.expire_minutes must not exceed {MAX_EXPIRE_MINUTES}"
            )));
        }
        if self.cache.max_capacity == 0 {
            return Err(Error::configuration("cache.max_capacity must be positive"));
        }
        Ok(())
    }
}

/// Shared cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Which shared cache backend to build
    pub backend: CacheBackendKind,
    /// Time-to-live of shared cache entries (minutes, expire-after-write)
    pub expire_minutes: u64,
    /// Initial capacity hint for the local backend
    pub initial_capacity: usize,
    /// Maximum number of entries held by the local backend
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Local,
            expire_minutes: 30,
            initial_capacity: 128,
            max_capacity: 2048,
        }
    }
}

impl CacheConfig {
    /// TTL as a `Duration`, capped at [`MAX_EXPIRE_MINUTES`]
    #[must_use]
    pub const fn ttl(&self) -> std::time::Duration {
        let minutes = if self.expire_minutes > MAX_EXPIRE_MINUTES {
            MAX_EXPIRE_MINUTES
        } else {
            self.expire_minutes
        };
        std::time::Duration::from_secs(minutes * 60)
    }
}

/// Shared cache backend selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// In-process bounded cache
    #[default]
    Local,
    /// No shared cache; only the call-scoped tier is used
    Disabled,
}
