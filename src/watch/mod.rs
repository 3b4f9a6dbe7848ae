//! Watch coordinator.
//!
//! Observes exactly two files per run — the visual's `schema.json` and
//! `config.json` — and reacts without tearing anything down:
//!
//! - schema change: re-validate, regenerate fill, signal an in-place
//!   rebuild on every live bundling process;
//! - config change: re-validate and report; a broken edit never kills a
//!   running session, and nothing is auto-corrected.
//!
//! ```text
//! notify → bridge thread → debounce (200ms) → classify → revalidate/rebuild
//! ```

mod debouncer;

use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

use crate::bundler::RebuildTrigger;
use crate::config::{CONFIG_FILE, VisualConfig};
use crate::logger::{status_error, status_success};
use crate::schema::{self, SCHEMA_FILE};
use crate::session::SharedSession;
use debouncer::Debouncer;

pub struct WatchCoordinator {
    visual_path: PathBuf,
    session: SharedSession,
    triggers: Vec<RebuildTrigger>,
}

impl WatchCoordinator {
    pub fn new(
        visual_path: PathBuf,
        session: SharedSession,
        triggers: Vec<RebuildTrigger>,
    ) -> Self {
        Self {
            visual_path,
            session,
            triggers,
        }
    }

    /// Run the watch loop until the process ends.
    pub async fn run(self) -> Result<()> {
        let (async_tx, mut async_rx) = tokio::sync::mpsc::channel::<notify::Event>(64);

        // notify's callback is sync; bridge it into the async loop
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;
        watcher.watch(&self.visual_path, RecursiveMode::NonRecursive)?;

        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        crate::debug!("watch"; "watching {} and {}", SCHEMA_FILE, CONFIG_FILE);

        let mut debouncer = Debouncer::new();
        loop {
            tokio::select! {
                biased;
                Some(mut event) = async_rx.recv() => {
                    event.paths.retain(|p| is_watched_file(p));
                    if !event.paths.is_empty() {
                        debouncer.add_event(&event);
                    }
                }
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    if let Some(changes) = debouncer.take_if_ready() {
                        self.process(&changes);
                    }
                }
            }
        }
    }

    /// Handle one debounced batch. Errors stay inside: a broken edit is
    /// reported, never propagated out of the watch loop.
    fn process(&self, changes: &FxHashSet<PathBuf>) {
        let (schema_changed, config_changed) = classify(changes);

        if config_changed {
            self.revalidate_config();
        }
        if schema_changed {
            self.refresh_schema_and_rebuild();
        }
    }

    /// Config edits are surfaced, not acted on.
    fn revalidate_config(&self) {
        match VisualConfig::load(&self.visual_path) {
            Ok((config, _raw)) => match config.validate().into_result() {
                Ok(()) => status_success(&format!("{CONFIG_FILE} ok")),
                Err(diags) => status_error(&format!("{CONFIG_FILE} invalid"), &diags.to_string()),
            },
            Err(e) => status_error(&format!("{CONFIG_FILE} unreadable"), &format!("{e:#}")),
        }
    }

    /// Schema edits regenerate the fill and rebuild every live target.
    fn refresh_schema_and_rebuild(&self) {
        let schema = match schema::load(&self.visual_path) {
            Ok(schema) => schema,
            Err(e) => {
                status_error(&format!("{SCHEMA_FILE} invalid"), &e.to_string());
                return;
            }
        };

        let fill = schema::fill::generate(&schema);
        self.session.write().set_fill(fill);

        let mut live = 0;
        for trigger in &self.triggers {
            if trigger.trigger() {
                live += 1;
            } else {
                crate::debug!("watch"; "bundler for {} is gone", trigger.folder());
            }
        }
        status_success(&format!("{SCHEMA_FILE} changed, rebuilding {live} target(s)"));
    }
}

/// Is this one of the two files this coordinator cares about?
fn is_watched_file(path: &Path) -> bool {
    matches!(
        path.file_name().and_then(|n| n.to_str()),
        Some(CONFIG_FILE) | Some(SCHEMA_FILE)
    )
}

/// Split a change set into (schema changed, config changed).
fn classify(changes: &FxHashSet<PathBuf>) -> (bool, bool) {
    let mut schema = false;
    let mut config = false;
    for path in changes {
        match path.file_name().and_then(|n| n.to_str()) {
            Some(SCHEMA_FILE) => schema = true,
            Some(CONFIG_FILE) => config = true,
            _ => {}
        }
    }
    (schema, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::BundlerHandle;
    use crate::session::{Session, Target};
    use serde_json::json;
    use tempfile::TempDir;

    fn make_session(visual_path: PathBuf) -> SharedSession {
        Session {
            visual: "acme/spring".into(),
            visual_path,
            git_status: "main@abc1234".into(),
            config: VisualConfig::default(),
            config_raw: json!({}),
            fill: json!({}),
            targets: vec![Target::new(
                0,
                "300x300".into(),
                PathBuf::from("300x300/index.html"),
                1200,
            )],
        }
        .shared()
    }

    #[test]
    fn test_is_watched_file() {
        assert!(is_watched_file(Path::new("/v/schema.json")));
        assert!(is_watched_file(Path::new("/v/config.json")));
        assert!(!is_watched_file(Path::new("/v/300x300/index.html")));
    }

    #[test]
    fn test_classify() {
        let mut changes = FxHashSet::default();
        changes.insert(PathBuf::from("/v/schema.json"));
        assert_eq!(classify(&changes), (true, false));

        changes.insert(PathBuf::from("/v/config.json"));
        assert_eq!(classify(&changes), (true, true));
    }

    #[tokio::test]
    async fn test_schema_change_updates_fill_and_triggers_rebuild() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(SCHEMA_FILE),
            r#"{"type":"object","properties":{"headline":{"type":"string"}}}"#,
        )
        .unwrap();

        let session = make_session(temp.path().to_path_buf());
        let (handle, _event_tx, mut rebuild_rx) = BundlerHandle::channel("300x300");
        let coordinator = WatchCoordinator::new(
            temp.path().to_path_buf(),
            session.clone(),
            vec![handle.rebuild_trigger()],
        );

        coordinator.refresh_schema_and_rebuild();

        assert_eq!(session.read().fill["headline"], "{headline}");
        assert!(rebuild_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_invalid_schema_reports_without_rebuild() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(SCHEMA_FILE), r#"{"type":"array"}"#).unwrap();

        let session = make_session(temp.path().to_path_buf());
        let (handle, _event_tx, mut rebuild_rx) = BundlerHandle::channel("300x300");
        let coordinator = WatchCoordinator::new(
            temp.path().to_path_buf(),
            session.clone(),
            vec![handle.rebuild_trigger()],
        );

        coordinator.refresh_schema_and_rebuild();

        // fill untouched, no rebuild signalled
        assert_eq!(session.read().fill, json!({}));
        assert!(rebuild_rx.try_recv().is_err());
    }

    #[test]
    fn test_config_change_never_rebuilds() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            r#"{"client":"","version":"x","cdnBase":"nope"}"#,
        )
        .unwrap();

        let session = make_session(temp.path().to_path_buf());
        let (handle, _event_tx, mut rebuild_rx) = BundlerHandle::channel("300x300");
        let coordinator = WatchCoordinator::new(
            temp.path().to_path_buf(),
            session,
            vec![handle.rebuild_trigger()],
        );

        let mut changes = FxHashSet::default();
        changes.insert(temp.path().join(CONFIG_FILE));
        coordinator.process(&changes);

        assert!(rebuild_rx.try_recv().is_err());
    }
}
