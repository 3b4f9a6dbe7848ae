//! The orchestration session record.
//!
//! One `Session` per run, owned behind `SharedSession` and mutated only by
//! the setup phase and the build supervisor. The status endpoint serializes
//! read-only snapshots of it; nothing mutates it from the network side.
//!
//! `BuildState` transitions are a closed table rather than a consequence of
//! callback ordering:
//!
//! ```text
//! Pending --BuildStart--> Building --Bundled--> Served
//!                          |  ^                  |
//!                 BuildError  '---BuildStart-----'   (rebuild)
//!                          v
//!                        Failed   (sticky)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Value, json};

use crate::bundler::BuildEvent;
use crate::ports::port_for;

// =============================================================================
// BuildState
// =============================================================================

/// Per-target build lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Pending,
    Building,
    Served,
    Failed,
}

impl BuildState {
    /// Transition table. `Failed` is terminal; a served target may
    /// re-enter `Building` on a rebuild.
    pub fn next(self, event: &BuildEvent) -> BuildState {
        use BuildState::*;
        match (self, event) {
            (Failed, _) => Failed,
            (_, BuildEvent::BuildError(_)) => Failed,
            (Pending | Served, BuildEvent::BuildStart) => Building,
            (Building, BuildEvent::Bundled(_)) => Served,
            // Bundled while already Served (duplicate notification) keeps Served
            (Served, BuildEvent::Bundled(_)) => Served,
            // BuildStart while Building, BuildEnd anywhere: no state change
            (state, _) => state,
        }
    }
}

// =============================================================================
// Target
// =============================================================================

/// One buildable size variant of the visual.
#[derive(Debug, Clone, Serialize)]
pub struct Target {
    /// Ordinal index, stable for the run; determines the port.
    pub index: usize,
    /// Folder name (`300x300`); the target's identity.
    pub folder: String,
    /// Source entry document.
    pub entry: PathBuf,
    pub port: u16,
    pub state: BuildState,
    /// Set on build or start failure, cleared never (Failed is sticky).
    pub error: bool,
}

impl Target {
    pub fn new(index: usize, folder: String, entry: PathBuf, base_port: u16) -> Self {
        Self {
            index,
            folder,
            entry,
            port: port_for(base_port, index),
            state: BuildState::Pending,
            error: false,
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// The single process-wide orchestration record.
#[derive(Debug)]
pub struct Session {
    /// Visual identity (brand/visual).
    pub visual: String,
    pub visual_path: PathBuf,
    /// One-shot git snapshot taken at startup.
    pub git_status: String,
    /// Typed config for injection rendering.
    pub config: crate::config::VisualConfig,
    /// Raw config JSON, served verbatim on the status endpoint.
    pub config_raw: Value,
    /// Demo fill content derived from the schema.
    pub fill: Value,
    /// Selected targets in ordinal order.
    pub targets: Vec<Target>,
}

/// Shared handle to the session. Writers must not hold the lock across an
/// await point; each mutation completes before the next suspension so the
/// status endpoint never observes a half-applied update.
pub type SharedSession = Arc<RwLock<Session>>;

impl Session {
    pub fn shared(self) -> SharedSession {
        Arc::new(RwLock::new(self))
    }

    /// Apply a lifecycle event to one target, returning the new state.
    pub fn apply_event(&mut self, index: usize, event: &BuildEvent) -> BuildState {
        let target = &mut self.targets[index];
        target.state = target.state.next(event);
        if matches!(event, BuildEvent::BuildError(_)) {
            target.error = true;
        }
        target.state
    }

    /// Mark a target failed outside the event stream (start failure).
    pub fn mark_failed(&mut self, index: usize) {
        let target = &mut self.targets[index];
        target.state = BuildState::Failed;
        target.error = true;
    }

    /// Replace the fill content (schema file changed).
    pub fn set_fill(&mut self, fill: Value) {
        self.fill = fill;
    }

    /// Snapshot served on `GET /state`.
    pub fn state_json(&self) -> Value {
        let folders: Vec<&str> = self.targets.iter().map(|t| t.folder.as_str()).collect();
        let mut bundlers = serde_json::Map::new();
        for target in &self.targets {
            bundlers.insert(
                target.index.to_string(),
                json!({
                    "folder": target.folder,
                    "port": target.port,
                    "error": target.error,
                }),
            );
        }

        json!({
            "gitStatus": self.git_status,
            "visualPath": self.visual_path.display().to_string(),
            "config": self.config_raw,
            "folders": folders,
            "bundlers": bundlers,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
