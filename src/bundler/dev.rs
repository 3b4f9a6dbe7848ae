//! Default bundling engine for the dev loop.
//!
//! `DevBundler` does the minimum a bundling process must do for the
//! orchestrator: produce a fresh artifact tree under `dist/<size>/` on
//! every (re)build, serve it on the target's port, and report the
//! lifecycle over the handle's channel. Source edits inside the size
//! folder trigger an in-place rebuild when `watch` is on; external
//! rebuild signals arrive through the handle.
//!
//! `cache=false` is taken literally: every cycle removes the previous
//! output and copies the sources again, so rebuilds are deterministic and
//! injected markers are re-applied to a clean document.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam::channel;
use tiny_http::{Header, Response, Server};
use tokio::sync::mpsc;

use super::{BuildEvent, BundleOptions, Bundler, BundlerHandle};
use crate::registry::ENTRY_FILE;
use crate::session::Target;

/// Shared asset folder at the visual level, copied into every bundle.
const INCLUDE_DIR: &str = "include";

/// Quiet period for source-edit bursts inside one size folder.
const SOURCE_SETTLE_MS: u64 = 150;

/// Why a build cycle runs.
enum Cause {
    Source,
    External,
}

pub struct DevBundler;

impl Bundler for DevBundler {
    fn start(
        &self,
        target: &Target,
        dist_root: &Path,
        options: &BundleOptions,
    ) -> Result<BundlerHandle> {
        let src_dir = target
            .entry
            .parent()
            .context("entry document has no parent folder")?
            .to_path_buf();
        if !target.entry.is_file() {
            return Err(anyhow!("entry document `{}` is missing", target.entry.display()));
        }

        let dist_dir = dist_root.join(&target.folder);

        // Bind synchronously so a taken port fails the start, not the build
        let server = Server::http(("127.0.0.1", target.port))
            .map_err(|e| anyhow!("could not bind port {}: {e}", target.port))?;

        let (handle, event_tx, rebuild_rx) = BundlerHandle::channel(&target.folder);

        spawn_serve_loop(server, dist_dir.clone(), &target.folder);
        spawn_build_loop(
            target.folder.clone(),
            src_dir,
            dist_dir,
            event_tx,
            rebuild_rx,
            options.watch,
        );

        crate::debug!("build"; "{} started on port {} ({:?})", target.folder, target.port, options);
        Ok(handle)
    }
}

// =============================================================================
// Build loop
// =============================================================================

fn spawn_build_loop(
    folder: String,
    src_dir: PathBuf,
    dist_dir: PathBuf,
    event_tx: mpsc::Sender<BuildEvent>,
    mut rebuild_rx: mpsc::Receiver<()>,
    watch: bool,
) {
    thread::spawn(move || {
        let (signal_tx, signal_rx) = channel::unbounded::<Cause>();

        // External rebuild signals (watch coordinator) → merged channel
        let external_tx = signal_tx.clone();
        thread::spawn(move || {
            while rebuild_rx.blocking_recv().is_some() {
                if external_tx.send(Cause::External).is_err() {
                    break;
                }
            }
        });

        // Source edits inside the size folder → merged channel
        let _watcher = watch.then(|| watch_sources(&src_dir, signal_tx));

        // Initial build, then one cycle per merged signal
        if run_cycle(&folder, &src_dir, &dist_dir, &event_tx).is_err() {
            return;
        }
        while let Ok(cause) = signal_rx.recv() {
            // Let the burst settle, then drain whatever queued meanwhile
            thread::sleep(Duration::from_millis(SOURCE_SETTLE_MS));
            while signal_rx.try_recv().is_ok() {}

            if matches!(cause, Cause::Source) {
                crate::debug!("build"; "{}: source change", folder);
            }
            if run_cycle(&folder, &src_dir, &dist_dir, &event_tx).is_err() {
                return;
            }
        }
    });
}

/// One full build cycle. `Err` means the supervisor side is gone.
fn run_cycle(
    folder: &str,
    src_dir: &Path,
    dist_dir: &Path,
    event_tx: &mpsc::Sender<BuildEvent>,
) -> Result<(), ()> {
    event_tx
        .blocking_send(BuildEvent::BuildStart)
        .map_err(|_| ())?;

    match bundle(src_dir, dist_dir) {
        Ok(entry) => {
            event_tx
                .blocking_send(BuildEvent::BuildEnd)
                .map_err(|_| ())?;
            event_tx
                .blocking_send(BuildEvent::Bundled(entry))
                .map_err(|_| ())?;
        }
        Err(e) => {
            event_tx
                .blocking_send(BuildEvent::BuildError(format!("{folder}: {e:#}")))
                .map_err(|_| ())?;
        }
    }
    Ok(())
}

/// Copy the size folder (plus the visual's shared `include/`) into the
/// output directory. Returns the built entry document path.
pub fn bundle(src_dir: &Path, dist_dir: &Path) -> Result<PathBuf> {
    if dist_dir.exists() {
        fs::remove_dir_all(dist_dir)
            .with_context(|| format!("failed to clean {}", dist_dir.display()))?;
    }
    copy_tree(src_dir, dist_dir)?;

    // Shared assets live beside the size folders
    if let Some(include) = src_dir.parent().map(|p| p.join(INCLUDE_DIR))
        && include.is_dir()
    {
        copy_tree(&include, &dist_dir.join(INCLUDE_DIR))?;
    }

    let entry = dist_dir.join(ENTRY_FILE);
    if !entry.is_file() {
        return Err(anyhow!("bundle produced no {ENTRY_FILE}"));
    }
    Ok(entry)
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to).with_context(|| format!("failed to create {}", to.display()))?;
    for entry in fs::read_dir(from).with_context(|| format!("failed to read {}", from.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        let src = entry.path();
        let dst = to.join(&name);
        if src.is_dir() {
            copy_tree(&src, &dst)?;
        } else {
            fs::copy(&src, &dst)
                .with_context(|| format!("failed to copy {}", src.display()))?;
        }
    }
    Ok(())
}

fn watch_sources(src_dir: &Path, signal_tx: channel::Sender<Cause>) -> Option<notify::RecommendedWatcher> {
    use notify::{RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res
            && !matches!(event.kind, notify::EventKind::Access(_))
        {
            let _ = signal_tx.send(Cause::Source);
        }
    })
    .ok()?;

    if let Err(e) = watcher.watch(src_dir, RecursiveMode::Recursive) {
        crate::log!("warning"; "cannot watch {}: {}", src_dir.display(), e);
        return None;
    }
    Some(watcher)
}

// =============================================================================
// Serve loop
// =============================================================================

fn spawn_serve_loop(server: Server, dist_dir: PathBuf, folder: &str) {
    let folder = folder.to_string();
    let server = Arc::new(server);
    thread::spawn(move || {
        for request in server.incoming_requests() {
            if crate::core::is_shutdown() {
                break;
            }
            if let Err(e) = respond(request, &dist_dir) {
                crate::debug!("serve"; "{}: request error: {}", folder, e);
            }
        }
    });
}

fn respond(request: tiny_http::Request, dist_dir: &Path) -> Result<()> {
    let Some(path) = resolve_path(request.url(), dist_dir) else {
        let response = Response::from_string("404 Not Found").with_status_code(404);
        return request.respond(response).map_err(Into::into);
    };

    let body = fs::read(&path)?;
    let response = Response::from_data(body).with_header(
        Header::from_bytes("Content-Type", content_type_for(&path)).unwrap(),
    );
    request.respond(response).map_err(Into::into)
}

/// Map a request URL onto a file below the output directory.
fn resolve_path(url: &str, dist_dir: &Path) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.trim_start_matches('/');
    if path.split('/').any(|seg| seg == "..") {
        return None;
    }

    let candidate = if path.is_empty() {
        dist_dir.join(ENTRY_FILE)
    } else {
        dist_dir.join(path)
    };

    if candidate.is_file() {
        return Some(candidate);
    }
    // Directory URLs fall back to their entry document
    let with_entry = candidate.join(ENTRY_FILE);
    with_entry.is_file().then_some(with_entry)
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "js" => "application/javascript",
        "css" => "text/css",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

// =============================================================================
// Tests
// =============================================================================
