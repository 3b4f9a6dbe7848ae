//! Build supervisor.
//!
//! Owns one bundling-process handle per selected target. Each target gets
//! its own event task on the local task set, so lifecycle events stay
//! strictly ordered per target while targets interleave freely. A failing
//! target is isolated: its state goes to `Failed`, the failure is reported,
//! and every other target keeps building and serving.
//!
//! Errors inside event handling are caught at the loop boundary and
//! logged; nothing thrown by one build ever terminates the orchestrator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::bundler::{BuildEvent, BundleOptions, Bundler, BundlerHandle, RebuildTrigger};
use crate::logger::{status_error, status_success, status_warning};
use crate::markup::{self, InjectContext, ScriptMode};
use crate::session::{BuildState, SharedSession, Target};
use crate::utils::alert;

// =============================================================================
// FailureReporter
// =============================================================================

/// External error-tracking collaborator.
///
/// Build failures are handed over here in addition to the console; tests
/// plug in a recording reporter to assert isolation.
pub trait FailureReporter: Send + Sync {
    fn report(&self, folder: &str, error: &str);
}

/// Default reporter: colored console status line.
pub struct LogReporter;

impl FailureReporter for LogReporter {
    fn report(&self, folder: &str, error: &str) {
        status_error(&format!("build failed: {folder}"), error);
    }
}

// =============================================================================
// BuildSupervisor
// =============================================================================

pub struct BuildSupervisor {
    session: SharedSession,
    bundler: Arc<dyn Bundler>,
    reporter: Arc<dyn FailureReporter>,
    options: BundleOptions,
    dist_root: PathBuf,
    mode: ScriptMode,
}

impl BuildSupervisor {
    pub fn new(
        session: SharedSession,
        bundler: Arc<dyn Bundler>,
        reporter: Arc<dyn FailureReporter>,
        dist_root: PathBuf,
        mode: ScriptMode,
    ) -> Self {
        Self {
            session,
            bundler,
            reporter,
            options: BundleOptions::default(),
            dist_root,
            mode,
        }
    }

    /// Start a bundling process for every target and spawn its event task
    /// on the current local set. Returns the rebuild triggers of the
    /// processes that actually started.
    ///
    /// A synchronous start failure (port taken, entry missing) marks that
    /// target failed and moves on; even zero live targets keep the session
    /// running — listening is best-effort per target.
    pub fn start_all(&self) -> Vec<RebuildTrigger> {
        let targets: Vec<Target> = self.session.read().targets.clone();
        let mut triggers = Vec::with_capacity(targets.len());

        for target in targets {
            match self.bundler.start(&target, &self.dist_root, &self.options) {
                Ok(handle) => {
                    triggers.push(handle.rebuild_trigger());
                    tokio::task::spawn_local(supervise_target(
                        target,
                        handle,
                        self.session.clone(),
                        self.reporter.clone(),
                        self.mode,
                    ));
                }
                Err(e) => {
                    self.session.write().mark_failed(target.index);
                    self.reporter
                        .report(&target.folder, &format!("failed to start: {e:#}"));
                    alert::notify_desktop(
                        "vizor",
                        &format!("{} failed to start: {e:#}", target.folder),
                    );
                }
            }
        }

        if triggers.is_empty() {
            crate::log!("build"; "no target is listening; session stays up for inspection");
        }
        triggers
    }
}

/// Per-target event loop; lives until the bundling process goes away.
async fn supervise_target(
    target: Target,
    mut handle: BundlerHandle,
    session: SharedSession,
    reporter: Arc<dyn FailureReporter>,
    mode: ScriptMode,
) {
    while let Some(event) = handle.next_event().await {
        handle_event(&target, &event, &session, reporter.as_ref(), mode);
    }
    crate::debug!("build"; "{}: bundling process ended", target.folder);
}

fn handle_event(
    target: &Target,
    event: &BuildEvent,
    session: &SharedSession,
    reporter: &dyn FailureReporter,
    mode: ScriptMode,
) {
    match event {
        BuildEvent::BuildStart => {
            session.write().apply_event(target.index, event);
            crate::debug!("build"; "{}: building", target.folder);
        }
        BuildEvent::BuildEnd => {
            session.write().apply_event(target.index, event);
            crate::debug!("build"; "{}: build finished", target.folder);
        }
        BuildEvent::BuildError(msg) => {
            session.write().apply_event(target.index, event);
            reporter.report(&target.folder, msg);
        }
        BuildEvent::Bundled(entry) => {
            // Ignore stray success events for a target that already failed
            if session.read().targets[target.index].state == BuildState::Failed {
                return;
            }

            // Snapshot everything rendering needs, then release the lock
            // before touching the filesystem
            let ctx = {
                let s = session.read();
                InjectContext {
                    mode,
                    config: s.config.clone(),
                    visual: s.visual.clone(),
                    fill: s.fill.clone(),
                    cache_bust: unix_now(),
                }
            };

            match markup::apply_to_file(entry, target, &ctx) {
                Ok(text) => {
                    if !markup::has_container(&text, &ctx.config.container) {
                        status_warning(&format!(
                            "{}: no #{} container in built document",
                            target.folder, ctx.config.container
                        ));
                    }
                }
                Err(e) => {
                    // Post-processing trouble is not a build failure; the
                    // raw artifact still serves
                    crate::log!("error"; "{}: injection failed: {:#}", target.folder, e);
                }
            }

            session.write().apply_event(target.index, event);
            status_success(&format!(
                "{} on http://127.0.0.1:{}",
                target.folder, target.port
            ));
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisualConfig;
    use crate::session::Session;
    use anyhow::anyhow;
    use parking_lot::Mutex;
    use rustc_hash::FxHashMap;
    use serde_json::json;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    const DOC: &str = "<html><head></head><body><div id=\"visual-root\"></div></body></html>";

    /// Bundler that replays canned event scripts, no processes involved.
    struct ScriptedBundler {
        scripts: Mutex<FxHashMap<String, Vec<BuildEvent>>>,
    }

    impl ScriptedBundler {
        fn new(scripts: &[(&str, Vec<BuildEvent>)]) -> Self {
            let map = scripts
                .iter()
                .map(|(folder, events)| ((*folder).to_string(), events.clone()))
                .collect();
            Self {
                scripts: Mutex::new(map),
            }
        }
    }

    impl Bundler for ScriptedBundler {
        fn start(
            &self,
            target: &Target,
            _dist_root: &Path,
            _options: &BundleOptions,
        ) -> anyhow::Result<BundlerHandle> {
            let Some(events) = self.scripts.lock().remove(&target.folder) else {
                return Err(anyhow!("port {} could not be bound", target.port));
            };
            let (handle, tx, _rebuild_rx) = BundlerHandle::channel(&target.folder);
            for event in events {
                tx.try_send(event).unwrap();
            }
            Ok(handle)
        }
    }

    struct RecordingReporter {
        reports: Mutex<Vec<(String, String)>>,
    }

    impl RecordingReporter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                reports: Mutex::new(Vec::new()),
            })
        }
    }

    impl FailureReporter for RecordingReporter {
        fn report(&self, folder: &str, error: &str) {
            self.reports.lock().push((folder.into(), error.into()));
        }
    }

    fn make_session(temp: &TempDir, folders: &[&str]) -> SharedSession {
        let targets = folders
            .iter()
            .enumerate()
            .map(|(i, folder)| {
                Target::new(
                    i,
                    (*folder).to_string(),
                    temp.path().join(folder).join("index.html"),
                    1200,
                )
            })
            .collect();

        Session {
            visual: "acme/spring".into(),
            visual_path: temp.path().to_path_buf(),
            git_status: "main@abc1234".into(),
            config: VisualConfig {
                client: "acme".into(),
                version: "3".into(),
                cdn_base: "https://cdn.acme.io".into(),
                ..VisualConfig::default()
            },
            config_raw: json!({"client": "acme"}),
            fill: json!({}),
            targets,
        }
        .shared()
    }

    fn seed_dist(temp: &TempDir, folder: &str) -> PathBuf {
        let dir = temp.path().join("dist").join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        let entry = dir.join("index.html");
        std::fs::write(&entry, DOC).unwrap();
        entry
    }

    async fn run_until_settled(session: &SharedSession) {
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let done = session
                .read()
                .targets
                .iter()
                .all(|t| matches!(t.state, BuildState::Served | BuildState::Failed));
            if done {
                return;
            }
        }
        panic!("targets never settled");
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_target() {
        let temp = TempDir::new().unwrap();
        let session = make_session(&temp, &["300x300", "728x90"]);
        let good_entry = seed_dist(&temp, "300x300");

        let bundler = ScriptedBundler::new(&[
            (
                "300x300",
                vec![
                    BuildEvent::BuildStart,
                    BuildEvent::BuildEnd,
                    BuildEvent::Bundled(good_entry),
                ],
            ),
            (
                "728x90",
                vec![
                    BuildEvent::BuildStart,
                    BuildEvent::BuildError("unexpected token".into()),
                ],
            ),
        ]);
        let reporter = RecordingReporter::new();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let supervisor = BuildSupervisor::new(
                    session.clone(),
                    Arc::new(bundler),
                    reporter.clone(),
                    temp.path().join("dist"),
                    ScriptMode::Cdn,
                );
                let triggers = supervisor.start_all();
                assert_eq!(triggers.len(), 2);
                run_until_settled(&session).await;
            })
            .await;

        let s = session.read();
        assert_eq!(s.targets[0].state, BuildState::Served);
        assert!(!s.targets[0].error);
        assert_eq!(s.targets[1].state, BuildState::Failed);
        assert!(s.targets[1].error);

        let reports = reporter.reports.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "728x90");
    }

    #[tokio::test]
    async fn test_bundled_document_gets_markers() {
        let temp = TempDir::new().unwrap();
        let session = make_session(&temp, &["300x300"]);
        let entry = seed_dist(&temp, "300x300");

        let bundler = ScriptedBundler::new(&[(
            "300x300",
            vec![
                BuildEvent::BuildStart,
                BuildEvent::BuildEnd,
                BuildEvent::Bundled(entry.clone()),
            ],
        )]);

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let supervisor = BuildSupervisor::new(
                    session.clone(),
                    Arc::new(bundler),
                    RecordingReporter::new(),
                    temp.path().join("dist"),
                    ScriptMode::Cdn,
                );
                supervisor.start_all();
                run_until_settled(&session).await;
            })
            .await;

        let text = std::fs::read_to_string(&entry).unwrap();
        for marker in markup::MARKERS {
            assert_eq!(text.matches(&marker.open_token()).count(), 1);
        }
    }

    #[tokio::test]
    async fn test_start_failure_marks_target_without_aborting_run() {
        let temp = TempDir::new().unwrap();
        let session = make_session(&temp, &["300x300", "728x90"]);
        let good_entry = seed_dist(&temp, "300x300");

        // 728x90 has no script: start() errors synchronously
        let bundler = ScriptedBundler::new(&[(
            "300x300",
            vec![
                BuildEvent::BuildStart,
                BuildEvent::BuildEnd,
                BuildEvent::Bundled(good_entry),
            ],
        )]);
        let reporter = RecordingReporter::new();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let supervisor = BuildSupervisor::new(
                    session.clone(),
                    Arc::new(bundler),
                    reporter.clone(),
                    temp.path().join("dist"),
                    ScriptMode::Cdn,
                );
                let triggers = supervisor.start_all();
                assert_eq!(triggers.len(), 1);
                run_until_settled(&session).await;
            })
            .await;

        let s = session.read();
        assert_eq!(s.targets[0].state, BuildState::Served);
        assert_eq!(s.targets[1].state, BuildState::Failed);
        assert!(s.targets[1].error);
        assert!(reporter.reports.lock()[0].1.contains("failed to start"));
    }

    #[tokio::test]
    async fn test_end_to_end_two_targets_reach_status_endpoint_shape() {
        let temp = TempDir::new().unwrap();
        let session = make_session(&temp, &["300x300", "728x90"]);
        let entry_a = seed_dist(&temp, "300x300");
        let entry_b = seed_dist(&temp, "728x90");

        let bundler = ScriptedBundler::new(&[
            (
                "300x300",
                vec![
                    BuildEvent::BuildStart,
                    BuildEvent::BuildEnd,
                    BuildEvent::Bundled(entry_a),
                ],
            ),
            (
                "728x90",
                vec![
                    BuildEvent::BuildStart,
                    BuildEvent::BuildEnd,
                    BuildEvent::Bundled(entry_b),
                ],
            ),
        ]);

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let supervisor = BuildSupervisor::new(
                    session.clone(),
                    Arc::new(bundler),
                    RecordingReporter::new(),
                    temp.path().join("dist"),
                    ScriptMode::Cdn,
                );
                supervisor.start_all();
                run_until_settled(&session).await;
            })
            .await;

        let state = session.read().state_json();
        assert_eq!(state["bundlers"]["0"]["folder"], "300x300");
        assert_eq!(state["bundlers"]["0"]["port"], 1200);
        assert_eq!(state["bundlers"]["0"]["error"], false);
        assert_eq!(state["bundlers"]["1"]["folder"], "728x90");
        assert_eq!(state["bundlers"]["1"]["port"], 1201);
        assert_eq!(state["bundlers"]["1"]["error"], false);
    }
}
