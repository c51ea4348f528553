//! Application settings and TOML configuration parsing.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::fusion::FusionRules;
use crate::gateway::TopicConfig;
use crate::ingest::OverflowPolicy;

/// Top-level vaultwatch configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Transport topic names.
    #[serde(default)]
    pub topics: TopicConfig,

    /// Classification markers, sentinels, and thresholds.
    #[serde(default)]
    pub fusion: FusionRules,

    /// Ingestion queue sizing and overflow behavior.
    #[serde(default)]
    pub ingest: IngestSettings,

    /// External inference-log backfill.
    #[serde(default)]
    pub backfill: BackfillSettings,

    /// Consumer poll cycle.
    #[serde(default)]
    pub poll: PollSettings,
}

/// Ingestion queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Maximum queued events between poll cycles.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// What to do when a push hits the capacity limit.
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

/// Backfill settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillSettings {
    /// Path to the inference services' append-only result log.
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
}

/// Poll cycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    /// Milliseconds between consumer drain cycles.
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// Log filter used when the `VAULTWATCH_LOG` env var is unset.
    #[serde(default)]
    pub log_level: Option<String>,
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_results_path() -> PathBuf {
    PathBuf::from("results.json")
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            overflow: OverflowPolicy::default(),
        }
    }
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            results_path: default_results_path(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            log_level: None,
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            topics: TopicConfig::default(),
            fusion: FusionRules::default(),
            ingest: IngestSettings::default(),
            backfill: BackfillSettings::default(),
            poll: PollSettings::default(),
        }
    }
}

impl VaultConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// If the file does not exist, returns the default configuration.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: VaultConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}
