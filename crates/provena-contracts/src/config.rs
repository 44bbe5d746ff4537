//! Ledger configuration.
//!
//! `LedgerConfig` is deserialized from TOML.  Every section is optional and
//! falls back to its default, so an empty document is a valid configuration.
//!
//! ```toml
//! [chain]
//! consistency = "strictly-serialized"   # or "eventually-consistent"
//!
//! [storage]
//! path = "provena-audit.jsonl"
//!
//! [logging]
//! filter = "warn"
//!
//! [verification]
//! # Assumes stored payloads are exactly what was hashed.
//! recompute_hashes = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// How the chain writer links concurrent appends for one organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChainConsistencyMode {
    /// Read the latest entry and insert without coordination.  Two
    /// concurrent appends may both link to the same predecessor, forking the
    /// chain; the verifier reports the fork as a broken link.
    EventuallyConsistent,

    /// Serialize read-latest + insert per organization, so the chain stays
    /// strictly linear for every writer sharing the same `ChainWriter`.
    #[default]
    StrictlySerialized,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub consistency: ChainConsistencyMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON-lines file holding every organization's entries.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("provena-audit.jsonl")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "warn".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Also recompute each entry's input and output hash from its stored
    /// payloads.
    ///
    /// The default assumes every row was written by `ChainWriter`, which
    /// stores exactly the payload it hashed.  Turn it off for stores whose
    /// payload columns hold summaries or imported rows rather than the
    /// hashed content; otherwise those rows show up as `input_hash` /
    /// `output_hash` breaks.
    #[serde(default = "default_recompute_hashes")]
    pub recompute_hashes: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            recompute_hashes: default_recompute_hashes(),
        }
    }
}

fn default_recompute_hashes() -> bool {
    true
}

/// The top-level structure deserialized from a TOML configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
}

impl LedgerConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `LedgerError::Config` if the TOML is malformed or does not
    /// match the expected schema (e.g. an unknown consistency mode).
    pub fn from_toml_str(s: &str) -> LedgerResult<Self> {
        toml::from_str(s).map_err(|e| LedgerError::Config {
            reason: format!("failed to parse ledger config TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as TOML.
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LedgerError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}
