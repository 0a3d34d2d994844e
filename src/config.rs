//! Service configuration (`strata.toml`).
//!
//! Typed configuration for the file service. Missing fields use sensible
//! defaults; a missing file means all defaults (no error).

use std::fmt;
use std::path::Path;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level service configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Strong-counter settings.
    #[serde(default)]
    pub counter: CounterConfig,

    /// Microversions settings.
    #[serde(default)]
    pub microversions: MicroversionsConfig,

    /// Revision-history query settings.
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Why a configuration failed to load.
#[derive(Debug)]
pub struct ConfigError {
    /// Where the config was read from (path or `"<inline>"`).
    pub source: String,
    /// Human-readable description.
    pub detail: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "configuration error in '{}': {}\n  To fix: edit the config file and correct the issue.",
            self.source, self.detail
        )
    }
}

impl std::error::Error for ConfigError {}

impl ServiceConfig {
    /// Parse from TOML text.
    ///
    /// # Errors
    /// [`ConfigError`] on malformed TOML or unknown fields.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError {
            source: "<inline>".to_owned(),
            detail: e.to_string(),
        })
    }

    /// Load from a file; a missing file yields all defaults.
    ///
    /// # Errors
    /// [`ConfigError`] on unreadable or malformed content.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError {
                    source: path.display().to_string(),
                    detail: e.to_string(),
                });
            }
        };
        toml::from_str(&text).map_err(|e| ConfigError {
            source: path.display().to_string(),
            detail: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// CounterConfig
// ---------------------------------------------------------------------------

/// Strong-counter settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CounterConfig {
    /// Number of shards per counter (default: 8).
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            shard_count: default_shard_count(),
        }
    }
}

const fn default_shard_count() -> usize {
    8
}

// ---------------------------------------------------------------------------
// MicroversionsConfig
// ---------------------------------------------------------------------------

/// Microversions settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MicroversionsConfig {
    /// Name of the work queue (default: `"microversions"`).
    #[serde(default = "default_queue_name")]
    pub queue: String,

    /// Serialized tasks larger than this many bytes are dropped
    /// (default: 1 MiB).
    #[serde(default = "default_task_payload_limit")]
    pub task_payload_limit: usize,
}

impl Default for MicroversionsConfig {
    fn default() -> Self {
        Self {
            queue: default_queue_name(),
            task_payload_limit: default_task_payload_limit(),
        }
    }
}

fn default_queue_name() -> String {
    "microversions".to_owned()
}

const fn default_task_payload_limit() -> usize {
    1 << 20
}

// ---------------------------------------------------------------------------
// HistoryConfig
// ---------------------------------------------------------------------------

/// Revision-history query settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    /// Cap on rows returned by a history query (default: 1000).
    #[serde(default = "default_query_limit")]
    pub query_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            query_limit: default_query_limit(),
        }
    }
}

const fn default_query_limit() -> usize {
    1000
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
