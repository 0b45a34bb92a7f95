use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ranking::DEFAULT_KEY_PREFIX;

/// Top-level settings file.
///
/// Example YAML:
/// ```yaml
/// ranking:
///   deadline: "250ms"
///   read_retries: 2
///   key_prefix: "leaderboard:cmp:"
///   default_limit: 50
/// scoring:
///   max_minutes_per_event: 1440
/// storage:
///   snapshot_path: /var/lib/readrank/state.json
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub ranking: RankingSettings,

    #[serde(default)]
    pub scoring: ScoringSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RankingSettings {
    /// Per-call deadline on the ranking store, humantime format ("250ms", "2s")
    #[serde(default = "default_deadline")]
    pub deadline: String,

    /// Extra attempts for read calls. Increments are never retried.
    #[serde(default = "default_read_retries")]
    pub read_retries: usize,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Leaderboard size when the caller gives no limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            deadline: default_deadline(),
            read_retries: default_read_retries(),
            key_prefix: default_key_prefix(),
            default_limit: default_limit(),
        }
    }
}

impl RankingSettings {
    pub fn deadline(&self) -> Result<Duration, humantime::DurationError> {
        humantime::parse_duration(self.deadline.trim())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringSettings {
    #[serde(default = "default_max_minutes")]
    pub max_minutes_per_event: u32,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            max_minutes_per_event: default_max_minutes(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StorageSettings {
    /// State snapshot file (default: <data dir>/readrank/state.json)
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

fn default_deadline() -> String {
    "250ms".to_string()
}

fn default_read_retries() -> usize {
    2
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_limit() -> usize {
    50
}

fn default_max_minutes() -> u32 {
    1440
}
