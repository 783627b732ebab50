//! Engine configuration.
//!
//! Handles loading, validating, and merging `config.toml`. User values are
//! layered over the stock defaults, so a config file only lists what it
//! changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! remove_metadata = true        # Strip EXIF/ICC from encoded variants
//! default_directives = ""       # Query applied under every request
//! base_path = "/@imagetools"    # Dev-server path prefix for served variants
//!
//! [cache]
//! enabled = true
//! dir = ".cache/image-directives"
//! # retention = 86400           # Seconds an untouched entry survives a sweep (unset: never)
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! `default_directives` uses the same query syntax as requests and only fills
//! in directives a request does not set:
//!
//! ```toml
//! default_directives = "format=webp&quality=75"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::cache::VariantCache;
use crate::directives::DirectiveSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name looked up by [`load_config`].
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Strip EXIF, ICC and other metadata from encoded variants.
    pub remove_metadata: bool,
    /// Directives applied to every request, as a query string.
    pub default_directives: String,
    /// Path prefix under which served variants are addressed.
    pub base_path: String,
    pub cache: CacheConfig,
    pub processing: ProcessingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            remove_metadata: true,
            default_directives: String::new(),
            base_path: "/@imagetools".to_string(),
            cache: CacheConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_path.starts_with('/') {
            return Err(ConfigError::Validation(
                "base_path must start with '/'".into(),
            ));
        }
        if self.cache.retention == Some(0) {
            return Err(ConfigError::Validation(
                "cache.retention must be positive (omit it to disable sweeping)".into(),
            ));
        }
        if self.cache.enabled && self.cache.dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "cache.dir must not be empty when the cache is enabled".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn default_directives(&self) -> DirectiveSet {
        DirectiveSet::parse_query(&self.default_directives)
    }

    /// URL path of a served variant: `<base_path>/<id>`.
    pub fn served_path(&self, id: &str) -> String {
        format!("{}/{}", self.base_path.trim_end_matches('/'), id)
    }

    /// Build the variant cache this config describes. Relative cache
    /// directories are resolved against `root`.
    pub fn variant_cache(&self, root: &Path) -> VariantCache {
        if !self.cache.enabled {
            return VariantCache::disabled();
        }
        VariantCache::new(root.join(&self.cache.dir), self.cache.retention())
    }
}

/// Variant cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Cache directory, relative to the working directory.
    pub dir: String,
    /// Seconds an entry may go untouched before a sweep removes it.
    /// When absent, entries are never swept.
    pub retention: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: ".cache/image-directives".to_string(),
            retention: None,
        }
    }
}

impl CacheConfig {
    pub fn retention(&self) -> Option<Duration> {
        self.retention.map(Duration::from_secs)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(EngineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<EngineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: EngineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load a config file. The file must exist.
pub fn load_config_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Load `config.toml` from `dir`, falling back to the stock defaults when
/// there is none.
pub fn load_config(dir: &Path) -> Result<EngineConfig, ConfigError> {
    let path = dir.join(CONFIG_FILENAME);
    if !path.exists() {
        return resolve_config(None);
    }
    load_config_file(&path)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# image-directives configuration
# ==============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Strip EXIF, ICC and other metadata from encoded variants.
remove_metadata = true

# Directives applied to every request, in query syntax. A request's own
# directives win. Example: "format=webp&quality=75"
default_directives = ""

# Path prefix of variants delivered by a dev server instead of written to
# disk. Must start with '/'.
base_path = "/@imagetools"

# ---------------------------------------------------------------------------
# Variant cache
# ---------------------------------------------------------------------------
[cache]
# Reuse encoded variants across runs.
enabled = true

# Cache directory, relative to the working directory.
dir = ".cache/image-directives"

# Seconds an entry may go unused before `sweep` deletes it.
# Unset keeps entries forever.
# retention = 86400

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
