//! Named whole-project snapshots with restore-with-backup semantics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::ENGINE_DATA_DIR;
use crate::error::EngineResult;
use crate::fs::SharedFs;
use crate::history::{HistoryLog, HistoryPayload};
use crate::notify::{EventBus, Notification};

pub const SNAPSHOT_INDEX_FILE: &str = ".sketchvault/snapshots/metadata.json";
pub const SETTINGS_FILE: &str = ".sketchvault/settings.json";

pub const AUTO_TAG: &str = "auto";
pub const BACKUP_TAG: &str = "backup";

/// File extensions captured by a snapshot.
pub const TRACKED_EXTENSIONS: &[&str] = &[
    "ino", "cpp", "h", "c", "js", "ts", "json", "md", "txt",
];

/// Directory names skipped during the snapshot walk.
pub const SKIP_DIRS: &[&str] = &["node_modules", ".git", "dist", "build"];

/// Index record for one snapshot; the file map lives in the per-id blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// A full point-in-time capture: every tracked file's content plus the
/// project settings blob. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub files: BTreeMap<String, String>,
    pub settings: Value,
}

impl ProjectSnapshot {
    pub fn meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            id: self.id.clone(),
            timestamp: self.timestamp,
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// The snapshot store. Holds the index in memory (newest first); snapshot
/// blobs are loaded from disk on demand.
pub struct SnapshotStore {
    metas: Vec<SnapshotMeta>,
    fs: SharedFs,
    bus: EventBus,
}

impl SnapshotStore {
    /// Open the store for a project, reloading the persisted index.
    pub fn open(fs: SharedFs, bus: EventBus) -> Self {
        let mut store = Self {
            metas: Vec::new(),
            fs,
            bus,
        };
        store.reload_index();
        store
    }

    fn reload_index(&mut self) {
        if !self.fs.exists(SNAPSHOT_INDEX_FILE) {
            return;
        }
        let data = match self.fs.read(SNAPSHOT_INDEX_FILE) {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!("failed to read snapshot index: {error}");
                return;
            }
        };
        match serde_json::from_str::<Vec<SnapshotMeta>>(&data) {
            Ok(mut metas) => {
                metas.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                self.metas = metas;
            }
            Err(error) => {
                tracing::warn!("failed to parse snapshot index, starting empty: {error}");
            }
        }
    }

    /// Capture every tracked file plus the settings blob. Also records a
    /// `ProjectAction` history entry wiring the snapshot into the log.
    pub fn create(
        &mut self,
        history: &mut HistoryLog,
        name: &str,
        description: &str,
        tags: &[&str],
    ) -> EngineResult<String> {
        let mut files = BTreeMap::new();
        collect_files(&self.fs, "", &mut files)?;

        let settings = if self.fs.exists(SETTINGS_FILE) {
            match self
                .fs
                .read(SETTINGS_FILE)
                .ok()
                .and_then(|data| serde_json::from_str(&data).ok())
            {
                Some(settings) => settings,
                None => {
                    tracing::warn!("project settings unreadable, capturing empty blob");
                    json!({})
                }
            }
        } else {
            json!({})
        };

        let snapshot = ProjectSnapshot {
            id: Uuid::now_v7().to_string(),
            timestamp: Utc::now(),
            name: name.to_string(),
            description: description.to_string(),
            tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
            files,
            settings,
        };
        let id = snapshot.id.clone();
        let meta = snapshot.meta();

        self.write_blob(&snapshot);
        self.metas.insert(0, meta.clone());
        self.persist_index();

        history.add_entry(
            &format!("Snapshot created: {name}"),
            HistoryPayload::ProjectAction(json!({
                "action": "snapshot_created",
                "snapshot_id": id,
                "name": name,
            })),
            true,
            Some(HistoryPayload::ProjectAction(json!({
                "action": "delete_snapshot",
                "snapshot_id": id,
            }))),
        );
        self.bus.emit(Notification::SnapshotCreated(meta));
        Ok(id)
    }

    /// Restore every file of the snapshot to disk, after first capturing a
    /// `"backup"`-tagged safety snapshot. The backup must exist before any
    /// file is written; if it cannot be taken the restore is abandoned.
    /// File writes themselves are best-effort: a mid-restore failure leaves
    /// a mixed state and the backup is the safety net.
    pub fn restore(&mut self, history: &mut HistoryLog, id: &str) -> bool {
        if !self.metas.iter().any(|meta| meta.id == id) {
            return false;
        }
        let Some(snapshot) = self.load(id) else {
            tracing::warn!("snapshot {id} is indexed but its blob is unreadable");
            return false;
        };

        let backup_id = match self.create(
            history,
            "Backup before restore",
            &format!("Automatic backup taken before restoring '{}'", snapshot.name),
            &[BACKUP_TAG],
        ) {
            Ok(backup_id) => backup_id,
            Err(error) => {
                tracing::warn!("backup failed, refusing to restore {id}: {error}");
                return false;
            }
        };

        for (path, content) in &snapshot.files {
            if let Err(error) = self.fs.write(path, content) {
                tracing::warn!("failed to restore {path}: {error}");
            }
        }

        self.bus.emit(Notification::SnapshotRestored {
            snapshot_id: id.to_string(),
            backup_id,
        });
        true
    }

    /// Remove the snapshot from the index. The blob file stays behind (the
    /// persistence adapter has no delete); it is unreachable once unindexed.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.metas.len();
        self.metas.retain(|meta| meta.id != id);
        if self.metas.len() == before {
            return false;
        }
        self.persist_index();
        self.bus.emit(Notification::SnapshotDeleted {
            snapshot_id: id.to_string(),
        });
        true
    }

    /// Index records, newest first.
    pub fn list(&self) -> Vec<SnapshotMeta> {
        self.metas.clone()
    }

    /// Load the full snapshot blob for an indexed id.
    pub fn load(&self, id: &str) -> Option<ProjectSnapshot> {
        if !self.metas.iter().any(|meta| meta.id == id) {
            return None;
        }
        let data = self.fs.read(&blob_path(id)).ok()?;
        serde_json::from_str(&data).ok()
    }

    fn write_blob(&self, snapshot: &ProjectSnapshot) {
        let data = match serde_json::to_string_pretty(snapshot) {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!("failed to serialize snapshot {}: {error}", snapshot.id);
                return;
            }
        };
        if let Err(error) = self.fs.write(&blob_path(&snapshot.id), &data) {
            tracing::warn!("failed to flush snapshot {}: {error}", snapshot.id);
        }
    }

    fn persist_index(&self) {
        let data = match serde_json::to_string_pretty(&self.metas) {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!("failed to serialize snapshot index: {error}");
                return;
            }
        };
        if let Err(error) = self.fs.write(SNAPSHOT_INDEX_FILE, &data) {
            tracing::warn!("failed to flush snapshot index: {error}");
        }
    }
}

fn blob_path(id: &str) -> String {
    format!("{ENGINE_DATA_DIR}/snapshots/{id}.json")
}

fn is_tracked(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(stem, extension)| !stem.is_empty() && TRACKED_EXTENSIONS.contains(&extension))
}

fn is_skipped_dir(name: &str) -> bool {
    SKIP_DIRS.contains(&name) || name == ENGINE_DATA_DIR
}

fn collect_files(
    fs: &SharedFs,
    dir: &str,
    out: &mut BTreeMap<String, String>,
) -> EngineResult<()> {
    for name in fs.list_dir(dir)? {
        let path = if dir.is_empty() {
            name.clone()
        } else {
            format!("{dir}/{name}")
        };
        if fs.is_dir(&path) {
            if is_skipped_dir(&name) {
                continue;
            }
            collect_files(fs, &path, out)?;
        } else if is_tracked(&name) {
            let content = fs.read(&path)?;
            out.insert(path, content);
        }
    }
    Ok(())
}
