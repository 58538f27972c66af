//! Append-only, most-recent-first action log with type-specific undo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::fs::SharedFs;
use crate::notify::{EventBus, Notification};

pub const HISTORY_FILE: &str = ".sketchvault/history.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HistoryKind {
    FileChange,
    CircuitChange,
    ProjectAction,
    Build,
    Upload,
}

/// Kind-specific payload of a history entry.
///
/// One variant per [`HistoryKind`], so undo dispatch is an exhaustive match
/// rather than a runtime switch with a silent default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum HistoryPayload {
    /// Full file content, used both as forward data and as undo data.
    FileChange { file_path: String, content: String },
    /// Opaque circuit state; only the circuit subsystem can apply it.
    CircuitChange(Value),
    ProjectAction(Value),
    Build(Value),
    Upload(Value),
}

impl HistoryPayload {
    pub fn kind(&self) -> HistoryKind {
        match self {
            HistoryPayload::FileChange { .. } => HistoryKind::FileChange,
            HistoryPayload::CircuitChange(_) => HistoryKind::CircuitChange,
            HistoryPayload::ProjectAction(_) => HistoryKind::ProjectAction,
            HistoryPayload::Build(_) => HistoryKind::Build,
            HistoryPayload::Upload(_) => HistoryKind::Upload,
        }
    }
}

/// An immutable record of one action. Never mutated after creation; evicted
/// from the tail once the log exceeds its retention cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: HistoryKind,
    pub description: String,
    pub payload: HistoryPayload,
    pub project_ref: String,
    pub reversible: bool,
    pub undo_payload: Option<HistoryPayload>,
}

/// The history log. Entries are kept most-recent-first and flushed as one
/// JSON document after every mutation; flush failures are logged, never
/// propagated.
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    cap: usize,
    project_ref: String,
    fs: SharedFs,
    bus: EventBus,
}

impl HistoryLog {
    /// Open the log for a project, reloading any persisted entries.
    pub fn open(fs: SharedFs, bus: EventBus, config: &EngineConfig) -> Self {
        let mut log = Self {
            entries: Vec::new(),
            cap: config.history_cap,
            project_ref: config.project_id.clone(),
            fs,
            bus,
        };
        log.reload();
        log
    }

    fn reload(&mut self) {
        if !self.fs.exists(HISTORY_FILE) {
            return;
        }
        let data = match self.fs.read(HISTORY_FILE) {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!("failed to read history log: {error}");
                return;
            }
        };
        match serde_json::from_str::<Vec<HistoryEntry>>(&data) {
            Ok(mut entries) => {
                entries.truncate(self.cap);
                self.entries = entries;
            }
            Err(error) => {
                tracing::warn!("failed to parse history log, starting empty: {error}");
            }
        }
    }

    /// Record an action at the head of the log. Returns the new entry id.
    ///
    /// An entry is only considered reversible when it also carries undo
    /// data; `reversible` without `undo_payload` is downgraded.
    pub fn add_entry(
        &mut self,
        description: &str,
        payload: HistoryPayload,
        reversible: bool,
        undo_payload: Option<HistoryPayload>,
    ) -> String {
        let reversible = reversible && undo_payload.is_some();
        let entry = HistoryEntry {
            id: Uuid::now_v7().to_string(),
            timestamp: Utc::now(),
            kind: payload.kind(),
            description: description.to_string(),
            payload,
            project_ref: self.project_ref.clone(),
            reversible,
            undo_payload,
        };
        let id = entry.id.clone();

        self.entries.insert(0, entry.clone());
        if self.entries.len() > self.cap {
            self.entries.truncate(self.cap);
        }
        self.persist();
        self.bus.emit(Notification::HistoryAdded(entry));
        id
    }

    /// Up to `limit` entries, newest first, optionally filtered by kind.
    pub fn query(&self, limit: usize, kind: Option<HistoryKind>) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .filter(|entry| kind.map_or(true, |kind| entry.kind == kind))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Undo the entry with the given id.
    ///
    /// Dispatch is on the entry's kind: only `FileChange` and
    /// `CircuitChange` entries can be undone; other kinds return `false`
    /// by design, whatever their undo payload holds. A successful undo
    /// appends a forward entry whose payload and undo payload are swapped,
    /// so the undo itself can be undone (acting as redo).
    pub fn undo(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.iter().find(|entry| entry.id == id).cloned() else {
            return false;
        };
        if !entry.reversible {
            return false;
        }
        let Some(undo_payload) = entry.undo_payload.clone() else {
            return false;
        };

        match (entry.kind, &undo_payload) {
            (HistoryKind::FileChange, HistoryPayload::FileChange { file_path, content }) => {
                if self.fs.exists(file_path) {
                    if let Err(error) = self.fs.write(file_path, content) {
                        tracing::warn!("failed to restore {file_path}: {error}");
                    }
                }
            }
            (HistoryKind::CircuitChange, HistoryPayload::CircuitChange(state)) => {
                self.bus.emit(Notification::RestoreCircuit(state.clone()));
            }
            (
                HistoryKind::ProjectAction | HistoryKind::Build | HistoryKind::Upload,
                _,
            ) => {
                tracing::warn!("undo is not implemented for {:?} entries", entry.kind);
                return false;
            }
            (kind, payload) => {
                tracing::warn!(
                    "undo payload kind {:?} does not match {:?} entry",
                    payload.kind(),
                    kind
                );
                return false;
            }
        }

        let redo_entry_id = self.add_entry(
            &format!("Undo: {}", entry.description),
            undo_payload,
            true,
            Some(entry.payload),
        );
        self.bus.emit(Notification::ActionUndone {
            entry_id: entry.id,
            redo_entry_id,
        });
        true
    }

    fn persist(&self) {
        let data = match serde_json::to_string_pretty(&self.entries) {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!("failed to serialize history log: {error}");
                return;
            }
        };
        if let Err(error) = self.fs.write(HISTORY_FILE, &data) {
            tracing::warn!("failed to flush history log: {error}");
        }
    }
}
