//! The dev command: wire everything up and run until Ctrl+C.
//!
//! Startup order matters and mirrors the failure taxonomy: resolve which
//! visual to build, load its config (fatal on errors), derive fill from
//! the schema (non-fatal), discover and select targets (fatal when empty),
//! preflight the reserved ports (fatal when bound), then bind the status
//! server, hand the session to the orchestrator task set and block on the
//! status request loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use crossbeam::channel::Receiver;
use serde_json::json;

use crate::bundler::DevBundler;
use crate::config::VisualConfig;
use crate::markup::ScriptMode;
use crate::ports::{self, STATUS_PORT};
use crate::registry::{
    self,
    resolve::resolve_visual,
    select::{InteractiveSelect, SelectAll, SelectionStrategy},
};
use crate::schema;
use crate::session::{Session, SharedSession};
use crate::status;
use crate::supervisor::{BuildSupervisor, LogReporter};
use crate::utils::{alert, vcs};
use crate::watch::WatchCoordinator;
use crate::{log, logger};

use super::args::{Cli, DevArgs};

/// Output directory below the project root.
const DIST_DIR: &str = "dist";

pub fn run(cli: &Cli, args: &DevArgs) -> Result<()> {
    match orchestrate(cli, args) {
        Ok(()) => Ok(()),
        Err(e) => {
            // A developer not watching the terminal should still notice
            alert::notify_desktop("vizor", &format!("{e:#}"));
            Err(e)
        }
    }
}

fn orchestrate(cli: &Cli, args: &DevArgs) -> Result<()> {
    logger::set_debug(args.debug);

    let root = cli.root.canonicalize().unwrap_or_else(|_| cli.root.clone());

    // Which visual? (pinned newest / resume last / interactive)
    let resolved = resolve_visual(&root, args.newest, args.latest)?;
    log!("dev"; "visual: {}", resolved.identity);

    // Config errors at startup are fatal; during the run they only warn
    let (config, config_raw) = VisualConfig::load_checked(&resolved.path)?;

    // Fill is best-effort: a broken schema logs and leaves the fill empty
    let fill = match schema::load(&resolved.path) {
        Ok(s) => schema::fill::generate(&s),
        Err(e) => {
            log!("warning"; "{:#}, starting with empty fill", e);
            json!({})
        }
    };

    let git_status = vcs::snapshot(&root);

    // Discover and narrow the target set
    let candidates = registry::discover(&resolved.path)?;
    let strategy: Box<dyn SelectionStrategy> = if args.latest || args.newest {
        Box::new(SelectAll)
    } else {
        Box::new(InteractiveSelect)
    };
    let selected = registry::select_targets(&candidates, strategy.as_ref())?;

    // Refuse to start when a reserved port is taken
    ports::preflight(&[config.base_port, STATUS_PORT])?;

    let targets = registry::into_targets(selected, config.base_port);
    log!("dev"; "{} target(s), ports {}-{}",
        targets.len(), targets[0].port, targets[targets.len() - 1].port);

    let session = Session {
        visual: resolved.identity,
        visual_path: resolved.path.clone(),
        git_status,
        config,
        config_raw,
        fill,
        targets,
    }
    .shared();

    // Bind the status server first so /state answers from the beginning
    let (status_server, shutdown_rx) = status::bind()?;

    let mode = if args.local {
        ScriptMode::Local
    } else {
        ScriptMode::Cdn
    };
    spawn_orchestrator(
        session.clone(),
        resolved.path,
        root.join(DIST_DIR),
        mode,
        shutdown_rx,
    );

    status_server.run(session);
    Ok(())
}

/// Run supervisor and watch coordinator on a current-thread runtime:
/// many logically-concurrent tasks, one thread, no locking discipline
/// beyond the session lock.
fn spawn_orchestrator(
    session: SharedSession,
    visual_path: PathBuf,
    dist_root: PathBuf,
    mode: ScriptMode,
    shutdown_rx: Receiver<()>,
) {
    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to create tokio runtime");

        let local = tokio::task::LocalSet::new();
        rt.block_on(local.run_until(async move {
            let supervisor = BuildSupervisor::new(
                session.clone(),
                Arc::new(DevBundler),
                Arc::new(LogReporter),
                dist_root,
                mode,
            );
            let triggers = supervisor.start_all();

            let watcher = WatchCoordinator::new(visual_path, session, triggers);
            tokio::select! {
                result = watcher.run() => {
                    if let Err(e) = result {
                        log!("watch"; "error: {}", e);
                    }
                }
                _ = tokio::task::spawn_blocking(move || {
                    let _ = shutdown_rx.recv();
                }) => {}
            }
        }));
    });
}
