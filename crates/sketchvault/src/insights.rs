//! Read-only aggregation over the history log and snapshot store.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::history::{HistoryKind, HistoryLog, HistoryPayload};
use crate::snapshot::{SnapshotStore, AUTO_TAG, BACKUP_TAG};

const MOST_EDITED_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct FileEditCount {
    pub file_path: String,
    pub edits: usize,
}

/// Derived view of project activity. Not independently stateful; recomputed
/// on demand from the log and the snapshot index.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectInsights {
    pub total_entries: usize,
    pub entries_by_kind: BTreeMap<HistoryKind, usize>,
    pub most_edited_files: Vec<FileEditCount>,
    pub snapshot_count: usize,
    pub auto_snapshot_count: usize,
    pub backup_snapshot_count: usize,
}

pub fn project_insights(history: &HistoryLog, snapshots: &SnapshotStore) -> ProjectInsights {
    let mut entries_by_kind: BTreeMap<HistoryKind, usize> = BTreeMap::new();
    let mut edits_per_file: BTreeMap<&str, usize> = BTreeMap::new();

    for entry in history.entries() {
        *entries_by_kind.entry(entry.kind).or_default() += 1;
        if let HistoryPayload::FileChange { file_path, .. } = &entry.payload {
            *edits_per_file.entry(file_path.as_str()).or_default() += 1;
        }
    }

    let mut most_edited_files: Vec<FileEditCount> = edits_per_file
        .into_iter()
        .map(|(file_path, edits)| FileEditCount {
            file_path: file_path.to_string(),
            edits,
        })
        .collect();
    most_edited_files.sort_by(|a, b| b.edits.cmp(&a.edits).then(a.file_path.cmp(&b.file_path)));
    most_edited_files.truncate(MOST_EDITED_LIMIT);

    let metas = snapshots.list();
    let tag_count = |tag: &str| {
        metas
            .iter()
            .filter(|meta| meta.tags.iter().any(|candidate| candidate == tag))
            .count()
    };

    ProjectInsights {
        total_entries: history.len(),
        entries_by_kind,
        most_edited_files,
        snapshot_count: metas.len(),
        auto_snapshot_count: tag_count(AUTO_TAG),
        backup_snapshot_count: tag_count(BACKUP_TAG),
    }
}
