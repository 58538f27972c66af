//! Multi-participant editing sessions: roster, presence, and per-file
//! queues of proposed text changes.

pub mod edit;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fs::SharedFs;
use crate::notify::{EventBus, Notification};

pub use edit::{ChangeKind, EditPosition, EditRange};

/// Fixed participant color palette. Seven entries; the eighth concurrent
/// participant reuses the first color. That reuse is a documented
/// limitation of the source design, kept as-is.
pub const PARTICIPANT_PALETTE: [&str; 7] = [
    "#e74c3c", "#3498db", "#2ecc71", "#f39c12", "#9b59b6", "#1abc9c", "#e67e22",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Owner,
    Editor,
    Viewer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: ParticipantRole,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub cursor: Option<CursorPosition>,
    pub color: String,
}

/// Identity and role of a joining participant; presence fields and the
/// color are assigned by the engine at join time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParticipant {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: ParticipantRole,
}

/// Capability flags fixed at session creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionPermissions {
    pub can_edit: bool,
    pub can_build: bool,
    pub can_upload: bool,
    pub can_invite: bool,
    pub can_manage_settings: bool,
}

impl Default for SessionPermissions {
    fn default() -> Self {
        Self {
            can_edit: true,
            can_build: true,
            can_upload: false,
            can_invite: true,
            can_manage_settings: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationSession {
    pub id: String,
    pub project_id: String,
    pub participants: Vec<Participant>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub permissions: SessionPermissions,
}

/// One proposed text edit, queued per file until applied. Once applied it
/// can never be applied again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ChangeKind,
    pub file: String,
    pub range: EditRange,
    pub content: String,
    pub author_id: String,
    pub applied: bool,
}

/// A change as proposed by a caller; id, timestamp and applied state are
/// stamped by [`CollaborationEngine::broadcast_change`].
#[derive(Debug, Clone)]
pub struct ChangeProposal {
    pub kind: ChangeKind,
    pub file: String,
    pub range: EditRange,
    pub content: String,
    pub author_id: String,
}

/// Session and change-queue state for one project. Session state is
/// local-process only and never persisted.
pub struct CollaborationEngine {
    sessions: HashMap<String, CollaborationSession>,
    /// Pending changes per file. Applied entries are retained, not pruned.
    pending: HashMap<String, Vec<ChangeEvent>>,
    fs: SharedFs,
    bus: EventBus,
}

impl CollaborationEngine {
    pub fn new(fs: SharedFs, bus: EventBus) -> Self {
        Self {
            sessions: HashMap::new(),
            pending: HashMap::new(),
            fs,
            bus,
        }
    }

    /// Create an empty session with the fixed default permissions.
    pub fn create_session(&mut self, project_id: &str) -> String {
        let now = Utc::now();
        let session = CollaborationSession {
            id: Uuid::now_v7().to_string(),
            project_id: project_id.to_string(),
            participants: Vec::new(),
            is_active: true,
            created_at: now,
            last_activity: now,
            permissions: SessionPermissions::default(),
        };
        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        self.bus.emit(Notification::SessionCreated {
            session_id: id.clone(),
            project_id: project_id.to_string(),
        });
        id
    }

    pub fn session(&self, session_id: &str) -> Option<&CollaborationSession> {
        self.sessions.get(session_id)
    }

    /// Add a participant to an active session, assigning presence and the
    /// first unused palette color.
    pub fn join(&mut self, session_id: &str, joining: NewParticipant) -> bool {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return false;
        };
        if !session.is_active {
            return false;
        }

        let color = PARTICIPANT_PALETTE
            .iter()
            .find(|candidate| {
                !session
                    .participants
                    .iter()
                    .any(|existing| existing.color == **candidate)
            })
            .unwrap_or(&PARTICIPANT_PALETTE[0]);

        let participant = Participant {
            id: joining.id,
            name: joining.name,
            email: joining.email,
            role: joining.role,
            is_online: true,
            last_seen: Utc::now(),
            cursor: None,
            color: (*color).to_string(),
        };
        session.participants.push(participant.clone());
        session.last_activity = Utc::now();
        self.bus.emit(Notification::ParticipantJoined {
            session_id: session_id.to_string(),
            participant,
        });
        true
    }

    /// Remove a participant from the roster entirely.
    pub fn leave(&mut self, session_id: &str, participant_id: &str) -> bool {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return false;
        };
        let before = session.participants.len();
        session
            .participants
            .retain(|participant| participant.id != participant_id);
        if session.participants.len() == before {
            return false;
        }
        session.last_activity = Utc::now();
        self.bus.emit(Notification::ParticipantLeft {
            session_id: session_id.to_string(),
            participant_id: participant_id.to_string(),
        });
        true
    }

    /// Propose a change: stamp it and enqueue it on the file's pending
    /// list. Disk is not touched until [`apply_change`](Self::apply_change).
    pub fn broadcast_change(
        &mut self,
        session_id: &str,
        proposal: ChangeProposal,
    ) -> Option<String> {
        let session = self.sessions.get_mut(session_id)?;
        if !session.is_active {
            return None;
        }
        session.last_activity = Utc::now();

        let change = ChangeEvent {
            id: Uuid::now_v7().to_string(),
            timestamp: Utc::now(),
            kind: proposal.kind,
            file: proposal.file.clone(),
            range: proposal.range,
            content: proposal.content,
            author_id: proposal.author_id,
            applied: false,
        };
        let id = change.id.clone();
        self.pending
            .entry(proposal.file)
            .or_default()
            .push(change.clone());
        self.bus.emit(Notification::ChangeBroadcast(change));
        Some(id)
    }

    /// Apply a previously broadcast change to its file, exactly once.
    ///
    /// Returns `false` for an unknown id, an already-applied change, or a
    /// target file that does not exist. No conflict resolution happens
    /// between overlapping changes: last applied wins.
    pub fn apply_change(&mut self, change_id: &str) -> bool {
        for queue in self.pending.values_mut() {
            let Some(change) = queue.iter_mut().find(|change| change.id == change_id) else {
                continue;
            };
            if change.applied {
                return false;
            }
            if !self.fs.exists(&change.file) {
                return false;
            }
            let current = match self.fs.read(&change.file) {
                Ok(current) => current,
                Err(error) => {
                    tracing::warn!("failed to read {}: {error}", change.file);
                    return false;
                }
            };
            let updated = edit::apply_edit(change.kind, &current, &change.range, &change.content);
            if let Err(error) = self.fs.write(&change.file, &updated) {
                // Flush failures never surface; the change still counts as applied.
                tracing::warn!("failed to write {}: {error}", change.file);
            }
            change.applied = true;
            self.bus.emit(Notification::ChangeApplied {
                change_id: change_id.to_string(),
                file: change.file.clone(),
            });
            return true;
        }
        false
    }

    /// Pending changes recorded for a file, applied entries included.
    pub fn changes_for(&self, file: &str) -> &[ChangeEvent] {
        self.pending.get(file).map_or(&[], Vec::as_slice)
    }

    /// Update a participant's cursor. Presence only; line and column are
    /// not validated against the file.
    pub fn update_cursor(
        &mut self,
        session_id: &str,
        participant_id: &str,
        cursor: CursorPosition,
    ) -> bool {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return false;
        };
        let Some(participant) = session
            .participants
            .iter_mut()
            .find(|participant| participant.id == participant_id)
        else {
            return false;
        };
        participant.cursor = Some(cursor.clone());
        participant.last_seen = Utc::now();
        self.bus.emit(Notification::CursorUpdated {
            session_id: session_id.to_string(),
            participant_id: participant_id.to_string(),
            cursor,
        });
        true
    }

    /// Mark every session inactive. Sessions are never physically removed
    /// while the process runs.
    pub fn deactivate_all(&mut self) {
        for session in self.sessions.values_mut() {
            session.is_active = false;
        }
    }
}
