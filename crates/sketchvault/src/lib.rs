//! In-process project history and collaboration engine for sketch projects.
//!
//! The engine records a reversible action log, captures and restores
//! whole-project snapshots, and coordinates multi-participant editing
//! sessions. All state is in-memory with best-effort JSON persistence under
//! a project-local hidden directory; external layers observe mutations
//! through the [`notify::EventBus`].

pub mod collab;
pub mod config;
pub mod engine;
pub mod error;
pub mod fs;
pub mod history;
pub mod insights;
pub mod notify;
pub mod snapshot;

pub use crate::engine::ProjectEngine;
pub use crate::error::{EngineError, EngineResult};
pub use crate::notify::{EventBus, Notification};
