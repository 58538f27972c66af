use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the sketchvault crate.
///
/// Only real I/O and serialization failures surface as errors. Domain-level
/// misses (unknown snapshot, inactive session, already-applied change) are
/// reported as `false`/`None` by the operation itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Filesystem access failed.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A persisted document could not be encoded or decoded.
    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias using [`EngineError`].
pub type EngineResult<T> = Result<T, EngineError>;
