//! Strongly-typed notification bus for engine mutations.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::collab::{ChangeEvent, CursorPosition, Participant};
use crate::history::HistoryEntry;
use crate::snapshot::SnapshotMeta;

/// A notification emitted after a state transition, for external layers
/// (UI panels, circuit view, chat) to observe. Payload shapes follow the
/// entity they describe.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum Notification {
    HistoryAdded(HistoryEntry),
    ActionUndone {
        entry_id: String,
        redo_entry_id: String,
    },
    /// The undo data for a circuit change; the circuit subsystem consumes it.
    RestoreCircuit(serde_json::Value),
    SnapshotCreated(SnapshotMeta),
    SnapshotRestored {
        snapshot_id: String,
        backup_id: String,
    },
    SnapshotDeleted {
        snapshot_id: String,
    },
    SessionCreated {
        session_id: String,
        project_id: String,
    },
    ParticipantJoined {
        session_id: String,
        participant: Participant,
    },
    ParticipantLeft {
        session_id: String,
        participant_id: String,
    },
    ChangeBroadcast(ChangeEvent),
    ChangeApplied {
        change_id: String,
        file: String,
    },
    CursorUpdated {
        session_id: String,
        participant_id: String,
        cursor: CursorPosition,
    },
}

/// Broadcast bus carrying [`Notification`] values to any number of
/// subscribers. Emitting with no subscribers is not an error.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn emit(&self, notification: Notification) {
        let _ = self.sender.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn emit_and_receive_notification() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(Notification::SnapshotDeleted {
            snapshot_id: "snap-1".to_string(),
        });

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("timeout")
            .expect("recv");
        assert!(
            matches!(received, Notification::SnapshotDeleted { ref snapshot_id } if snapshot_id == "snap-1")
        );
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_notification() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(Notification::SessionCreated {
            session_id: "sess-1".to_string(),
            project_id: "proj-1".to_string(),
        });

        let first = rx1.recv().await.expect("recv1");
        let second = rx2.recv().await.expect("recv2");
        assert!(matches!(first, Notification::SessionCreated { .. }));
        assert!(matches!(second, Notification::SessionCreated { .. }));
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new(8);
        bus.emit(Notification::SnapshotDeleted {
            snapshot_id: "snap-1".to_string(),
        });
    }
}
