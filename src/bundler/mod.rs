//! Bundling-process protocol.
//!
//! The orchestrator does not compile anything itself; it starts one
//! bundling process per target and observes its lifecycle:
//!
//! ```text
//! BuildStart → BuildEnd → Bundled(entry)     (success)
//! BuildStart → BuildError(msg)               (failure)
//! ```
//!
//! Events for one target are strictly ordered by its channel; nothing is
//! ordered across targets. `Bundler` is the seam for plugging in a real
//! engine — the default [`DevBundler`] copy-bundles and serves each size
//! folder, which is all the dev loop needs.

mod dev;

pub use dev::DevBundler;

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::session::Target;

/// Channel capacity per bundler handle.
const EVENT_BUFFER: usize = 32;

/// Fixed build options for the dev loop.
///
/// `content_hash` stays off so output filenames are stable and injected
/// markers remain addressable across rebuilds.
#[derive(Debug, Clone)]
pub struct BundleOptions {
    /// Keep the process alive and react to source edits.
    pub watch: bool,
    /// Reuse intermediate artifacts between builds.
    pub cache: bool,
    pub minify: bool,
    pub source_maps: bool,
    /// Append content hashes to output filenames.
    pub content_hash: bool,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            watch: true,
            cache: false,
            minify: true,
            source_maps: true,
            content_hash: false,
        }
    }
}

/// Lifecycle events reported by a bundling process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// Compilation started (initial build or rebuild).
    BuildStart,
    /// Compilation finished; artifact not yet written.
    BuildEnd,
    /// Artifact ready; payload is the built entry document path.
    Bundled(PathBuf),
    /// Compilation failed.
    BuildError(String),
}

/// Rebuild signal endpoint for one live bundling process.
///
/// Cloneable so the watch coordinator can hold one per target while the
/// supervisor owns the event side of the handle.
#[derive(Debug, Clone)]
pub struct RebuildTrigger {
    folder: String,
    tx: mpsc::Sender<()>,
}

impl RebuildTrigger {
    /// Target folder this trigger belongs to.
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Request an in-place re-bundle. Returns false if the process is gone.
    pub fn trigger(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Handle to one started bundling process.
pub struct BundlerHandle {
    events: mpsc::Receiver<BuildEvent>,
    rebuild: RebuildTrigger,
}

impl BundlerHandle {
    /// Build a handle around fresh channels; returns the producer ends.
    pub fn channel(folder: &str) -> (Self, mpsc::Sender<BuildEvent>, mpsc::Receiver<()>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (rebuild_tx, rebuild_rx) = mpsc::channel(EVENT_BUFFER);
        let handle = Self {
            events: event_rx,
            rebuild: RebuildTrigger {
                folder: folder.to_string(),
                tx: rebuild_tx,
            },
        };
        (handle, event_tx, rebuild_rx)
    }

    /// Next lifecycle event; `None` once the process has gone away.
    pub async fn next_event(&mut self) -> Option<BuildEvent> {
        self.events.recv().await
    }

    /// Clone the rebuild endpoint for the watch coordinator.
    pub fn rebuild_trigger(&self) -> RebuildTrigger {
        self.rebuild.clone()
    }
}

/// A bundling engine the supervisor can drive.
pub trait Bundler: Send + Sync {
    /// Start one bundling process for `target`, writing output under
    /// `dist_root/<folder>/`. Synchronous failures (e.g. the port cannot
    /// be bound) surface here and mark the target failed without touching
    /// the rest of the run.
    fn start(
        &self,
        target: &Target,
        dist_root: &Path,
        options: &BundleOptions,
    ) -> anyhow::Result<BundlerHandle>;
}
