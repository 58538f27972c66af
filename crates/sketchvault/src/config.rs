//! Engine configuration persisted inside the project data directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::fs::ProjectFs;

/// Hidden directory holding everything the engine persists for a project.
pub const ENGINE_DATA_DIR: &str = ".sketchvault";
pub const ENGINE_CONFIG_FILE: &str = ".sketchvault/engine.json";
pub const ENGINE_CONFIG_VERSION: &str = "1.0.0";

pub const DEFAULT_HISTORY_CAP: usize = 1000;
pub const DEFAULT_AUTO_SNAPSHOT_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub version: String,
    pub project_id: String,
    /// Retention cap for the history log; oldest entries are evicted beyond it.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    /// Auto-snapshot period in seconds; `0` disables the timer.
    #[serde(default = "default_auto_snapshot_interval")]
    pub auto_snapshot_interval_secs: u64,
    pub created_at: DateTime<Utc>,
    pub last_opened: DateTime<Utc>,
}

fn default_history_cap() -> usize {
    DEFAULT_HISTORY_CAP
}

fn default_auto_snapshot_interval() -> u64 {
    DEFAULT_AUTO_SNAPSHOT_INTERVAL_SECS
}

impl EngineConfig {
    pub fn default_new() -> Self {
        let now = Utc::now();
        Self {
            version: ENGINE_CONFIG_VERSION.to_string(),
            project_id: Uuid::now_v7().to_string(),
            history_cap: DEFAULT_HISTORY_CAP,
            auto_snapshot_interval_secs: DEFAULT_AUTO_SNAPSHOT_INTERVAL_SECS,
            created_at: now,
            last_opened: now,
        }
    }
}

/// Load the engine config, creating a fresh one on first open. The
/// `last_opened` stamp is refreshed and flushed on every load.
pub fn load_or_create(fs: &dyn ProjectFs) -> EngineResult<EngineConfig> {
    fs.create_dir_all(ENGINE_DATA_DIR)?;

    if !fs.exists(ENGINE_CONFIG_FILE) {
        let config = EngineConfig::default_new();
        save(fs, &config)?;
        return Ok(config);
    }

    let data = fs.read(ENGINE_CONFIG_FILE)?;
    let mut config: EngineConfig =
        serde_json::from_str(&data).map_err(|source| EngineError::Serialize {
            what: "engine config",
            source,
        })?;
    if config.version != ENGINE_CONFIG_VERSION {
        tracing::warn!(
            "engine config version {} differs from {}, keeping stored values",
            config.version,
            ENGINE_CONFIG_VERSION
        );
    }
    config.last_opened = Utc::now();
    save(fs, &config)?;
    Ok(config)
}

pub fn save(fs: &dyn ProjectFs, config: &EngineConfig) -> EngineResult<()> {
    let data =
        serde_json::to_string_pretty(config).map_err(|source| EngineError::Serialize {
            what: "engine config",
            source,
        })?;
    fs.write(ENGINE_CONFIG_FILE, &data)
}
