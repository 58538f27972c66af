//! The per-project facade wiring the log, snapshot store and collaboration
//! engine together behind one writer lock.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::collab::{
    ChangeProposal, CollaborationEngine, CollaborationSession, CursorPosition, NewParticipant,
};
use crate::config::{self, EngineConfig};
use crate::error::EngineResult;
use crate::fs::{DiskFs, SharedFs};
use crate::history::{HistoryEntry, HistoryKind, HistoryLog, HistoryPayload};
use crate::insights::{project_insights, ProjectInsights};
use crate::notify::{EventBus, Notification};
use crate::snapshot::{SnapshotMeta, SnapshotStore, AUTO_TAG};

const BUS_CAPACITY: usize = 64;

struct ProjectState {
    history: HistoryLog,
    snapshots: SnapshotStore,
    collab: CollaborationEngine,
}

/// One project's engine instance.
///
/// Every mutating operation is a synchronous state transition under a
/// single writer mutex, followed by a fire-and-forget persistence flush.
/// The only background activity is the auto-snapshot timer, started at
/// construction and cancelled exactly once by [`dispose`](Self::dispose).
pub struct ProjectEngine {
    config: EngineConfig,
    bus: EventBus,
    state: Arc<Mutex<ProjectState>>,
    auto_snapshot: Mutex<Option<JoinHandle<()>>>,
}

impl ProjectEngine {
    /// Open the engine for a project directory. Loads (or creates) the
    /// engine config, reloads persisted history and snapshot index, and
    /// starts the auto-snapshot timer. Must be called within a tokio
    /// runtime when the timer is enabled.
    pub fn open(project_dir: &Path) -> EngineResult<Self> {
        let fs: SharedFs = Arc::new(DiskFs::new(project_dir));
        Self::with_fs(fs)
    }

    /// Open the engine over an explicit persistence adapter.
    pub fn with_fs(fs: SharedFs) -> EngineResult<Self> {
        let bus = EventBus::new(BUS_CAPACITY);
        let config = config::load_or_create(fs.as_ref())?;

        let history = HistoryLog::open(Arc::clone(&fs), bus.clone(), &config);
        let snapshots = SnapshotStore::open(Arc::clone(&fs), bus.clone());
        let collab = CollaborationEngine::new(Arc::clone(&fs), bus.clone());

        let engine = Self {
            config,
            bus,
            state: Arc::new(Mutex::new(ProjectState {
                history,
                snapshots,
                collab,
            })),
            auto_snapshot: Mutex::new(None),
        };
        engine.start_auto_snapshot();
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribe to engine notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.bus.subscribe()
    }

    // --- History Log ---

    pub fn add_history_entry(
        &self,
        description: &str,
        payload: HistoryPayload,
        reversible: bool,
        undo_payload: Option<HistoryPayload>,
    ) -> String {
        self.state
            .lock()
            .history
            .add_entry(description, payload, reversible, undo_payload)
    }

    pub fn history(&self, limit: usize, kind: Option<HistoryKind>) -> Vec<HistoryEntry> {
        self.state.lock().history.query(limit, kind)
    }

    pub fn undo(&self, entry_id: &str) -> bool {
        self.state.lock().history.undo(entry_id)
    }

    // --- Snapshot Store ---

    pub fn create_snapshot(
        &self,
        name: &str,
        description: &str,
        tags: &[&str],
    ) -> EngineResult<String> {
        let mut state = self.state.lock();
        let ProjectState {
            history, snapshots, ..
        } = &mut *state;
        snapshots.create(history, name, description, tags)
    }

    pub fn restore_snapshot(&self, snapshot_id: &str) -> bool {
        let mut state = self.state.lock();
        let ProjectState {
            history, snapshots, ..
        } = &mut *state;
        snapshots.restore(history, snapshot_id)
    }

    pub fn delete_snapshot(&self, snapshot_id: &str) -> bool {
        self.state.lock().snapshots.delete(snapshot_id)
    }

    pub fn list_snapshots(&self) -> Vec<SnapshotMeta> {
        self.state.lock().snapshots.list()
    }

    // --- Collaboration Engine ---

    pub fn create_session(&self) -> String {
        self.state
            .lock()
            .collab
            .create_session(&self.config.project_id)
    }

    pub fn session(&self, session_id: &str) -> Option<CollaborationSession> {
        self.state.lock().collab.session(session_id).cloned()
    }

    pub fn join_session(&self, session_id: &str, participant: NewParticipant) -> bool {
        self.state.lock().collab.join(session_id, participant)
    }

    pub fn leave_session(&self, session_id: &str, participant_id: &str) -> bool {
        self.state.lock().collab.leave(session_id, participant_id)
    }

    pub fn broadcast_change(
        &self,
        session_id: &str,
        proposal: ChangeProposal,
    ) -> Option<String> {
        self.state
            .lock()
            .collab
            .broadcast_change(session_id, proposal)
    }

    pub fn apply_change(&self, change_id: &str) -> bool {
        self.state.lock().collab.apply_change(change_id)
    }

    pub fn update_cursor(
        &self,
        session_id: &str,
        participant_id: &str,
        cursor: CursorPosition,
    ) -> bool {
        self.state
            .lock()
            .collab
            .update_cursor(session_id, participant_id, cursor)
    }

    // --- Insights ---

    pub fn insights(&self) -> ProjectInsights {
        let state = self.state.lock();
        project_insights(&state.history, &state.snapshots)
    }

    // --- Lifecycle ---

    fn start_auto_snapshot(&self) {
        let interval_secs = self.config.auto_snapshot_interval_secs;
        if interval_secs == 0 {
            return;
        }
        let period = Duration::from_secs(interval_secs);
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                let mut state = state.lock();
                let ProjectState {
                    history, snapshots, ..
                } = &mut *state;
                if let Err(error) = snapshots.create(
                    history,
                    "Auto snapshot",
                    "Periodic automatic capture",
                    &[AUTO_TAG],
                ) {
                    tracing::warn!("auto snapshot failed: {error}");
                }
            }
        });
        *self.auto_snapshot.lock() = Some(handle);
    }

    /// Cancel the auto-snapshot timer (exactly once) and mark every
    /// collaboration session inactive. Safe to call repeatedly.
    pub fn dispose(&self) {
        if let Some(handle) = self.auto_snapshot.lock().take() {
            handle.abort();
        }
        self.state.lock().collab.deactivate_all();
    }
}

impl Drop for ProjectEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{ChangeKind, EditPosition, EditRange, ParticipantRole};
    use crate::fs::ProjectFs;
    use crate::snapshot::BACKUP_TAG;
    use serde_json::json;
    use tempfile::tempdir;

    fn disable_auto_snapshot(dir: &Path) {
        let fs = DiskFs::new(dir);
        let mut config = config::load_or_create(&fs).expect("config");
        config.auto_snapshot_interval_secs = 0;
        config::save(&fs, &config).expect("save config");
    }

    fn owner(id: &str) -> NewParticipant {
        NewParticipant {
            id: id.to_string(),
            name: format!("user {id}"),
            email: Some(format!("{id}@example.com")),
            role: ParticipantRole::Owner,
        }
    }

    #[test]
    fn snapshot_round_trip_with_backup() {
        let dir = tempdir().expect("tempdir");
        disable_auto_snapshot(dir.path());
        let engine = ProjectEngine::open(dir.path()).expect("open");
        let fs = DiskFs::new(dir.path());

        fs.write("a.txt", "v1").expect("write");
        let id = engine.create_snapshot("v1", "", &[]).expect("snapshot");

        fs.write("a.txt", "v2").expect("mutate");
        assert!(engine.restore_snapshot(&id));

        assert_eq!(fs.read("a.txt").expect("read"), "v1");
        let backups: Vec<_> = engine
            .list_snapshots()
            .into_iter()
            .filter(|meta| meta.tags.iter().any(|tag| tag == BACKUP_TAG))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].name, "Backup before restore");
    }

    #[test]
    fn undo_round_trip_through_the_facade() {
        let dir = tempdir().expect("tempdir");
        disable_auto_snapshot(dir.path());
        let engine = ProjectEngine::open(dir.path()).expect("open");
        let fs = DiskFs::new(dir.path());
        fs.write("sketch.ino", "v2").expect("write");

        let id = engine.add_history_entry(
            "Edited sketch.ino",
            HistoryPayload::FileChange {
                file_path: "sketch.ino".to_string(),
                content: "v2".to_string(),
            },
            true,
            Some(HistoryPayload::FileChange {
                file_path: "sketch.ino".to_string(),
                content: "v1".to_string(),
            }),
        );

        assert!(engine.undo(&id));
        assert_eq!(fs.read("sketch.ino").expect("read"), "v1");

        let redo = engine.history(1, None).remove(0);
        assert!(engine.undo(&redo.id));
        assert_eq!(fs.read("sketch.ino").expect("read"), "v2");
    }

    #[test]
    fn collaboration_flow_end_to_end() {
        let dir = tempdir().expect("tempdir");
        disable_auto_snapshot(dir.path());
        let engine = ProjectEngine::open(dir.path()).expect("open");
        let fs = DiskFs::new(dir.path());
        fs.write("sketch.ino", "hello world").expect("write");

        let session_id = engine.create_session();
        assert!(engine.join_session(&session_id, owner("p1")));

        let position = EditPosition { line: 0, column: 5 };
        let change_id = engine
            .broadcast_change(
                &session_id,
                ChangeProposal {
                    kind: ChangeKind::Insert,
                    file: "sketch.ino".to_string(),
                    range: EditRange {
                        start: position,
                        end: position,
                    },
                    content: ",".to_string(),
                    author_id: "p1".to_string(),
                },
            )
            .expect("broadcast");

        assert!(engine.apply_change(&change_id));
        assert_eq!(fs.read("sketch.ino").expect("read"), "hello, world");
        assert!(!engine.apply_change(&change_id));

        assert!(engine.update_cursor(
            &session_id,
            "p1",
            CursorPosition {
                file: "sketch.ino".to_string(),
                line: 0,
                column: 6,
            }
        ));
        assert!(engine.leave_session(&session_id, "p1"));
    }

    #[test]
    fn dispose_deactivates_sessions_and_is_idempotent() {
        let dir = tempdir().expect("tempdir");
        disable_auto_snapshot(dir.path());
        let engine = ProjectEngine::open(dir.path()).expect("open");
        let session_id = engine.create_session();

        engine.dispose();
        engine.dispose();

        let session = engine.session(&session_id).expect("session");
        assert!(!session.is_active);
        assert!(!engine.join_session(&session_id, owner("p1")));
    }

    #[test]
    fn insights_reflect_history_and_snapshots() {
        let dir = tempdir().expect("tempdir");
        disable_auto_snapshot(dir.path());
        let engine = ProjectEngine::open(dir.path()).expect("open");
        let fs = DiskFs::new(dir.path());
        fs.write("sketch.ino", "x").expect("write");

        engine.add_history_entry(
            "edit",
            HistoryPayload::FileChange {
                file_path: "sketch.ino".to_string(),
                content: "x".to_string(),
            },
            false,
            None,
        );
        engine.add_history_entry("build", HistoryPayload::Build(json!({})), false, None);
        engine.create_snapshot("v1", "", &[]).expect("snapshot");

        let insights = engine.insights();
        assert_eq!(insights.snapshot_count, 1);
        assert_eq!(insights.entries_by_kind[&HistoryKind::FileChange], 1);
        assert_eq!(insights.most_edited_files[0].file_path, "sketch.ino");
    }

    #[tokio::test(start_paused = true)]
    async fn auto_snapshot_fires_on_the_interval() {
        let dir = tempdir().expect("tempdir");
        let engine = ProjectEngine::open(dir.path()).expect("open");
        let fs = DiskFs::new(dir.path());
        fs.write("sketch.ino", "x").expect("write");
        let interval = engine.config().auto_snapshot_interval_secs;

        tokio::time::sleep(Duration::from_secs(interval + 1)).await;

        let autos: Vec<_> = engine
            .list_snapshots()
            .into_iter()
            .filter(|meta| meta.tags.iter().any(|tag| tag == AUTO_TAG))
            .collect();
        assert!(!autos.is_empty());
        assert_eq!(autos[0].name, "Auto snapshot");

        engine.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_stops_the_auto_snapshot_timer() {
        let dir = tempdir().expect("tempdir");
        let engine = ProjectEngine::open(dir.path()).expect("open");
        let fs = DiskFs::new(dir.path());
        fs.write("sketch.ino", "x").expect("write");
        let interval = engine.config().auto_snapshot_interval_secs;

        engine.dispose();
        tokio::time::sleep(Duration::from_secs(interval * 3)).await;

        assert!(engine.list_snapshots().is_empty());
    }
}
