//! Target discovery and selection.
//!
//! A visual's buildable targets are its immediate subfolders named by
//! pixel dimensions (`300x300`, `728x90`, ...) that contain an entry
//! document. Discovery is mechanical; *which* of the discovered targets
//! get built is a [`select::SelectionStrategy`] decision, and *which
//! visual* is being built at all is resolved once at startup by
//! [`resolve`].

pub mod resolve;
pub mod select;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::session::Target;

/// Entry document every size folder must contain.
pub const ENTRY_FILE: &str = "index.html";

/// Size-folder naming convention: `<width>x<height>`.
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+x\d+$").unwrap());

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no size folders with an {ENTRY_FILE} found under `{0}`")]
    NoTargetsFound(PathBuf),

    #[error("no targets selected")]
    NoTargetsSelected,

    #[error("failed to scan `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
}

/// A discovered, not-yet-selected size folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub folder: String,
    pub entry: PathBuf,
}

/// Scan the visual directory for size folders containing an entry document.
///
/// Results are sorted by folder name so ordinal indices (and therefore
/// port assignment) are reproducible across runs and platforms.
pub fn discover(visual_path: &Path) -> Result<Vec<Candidate>, RegistryError> {
    let entries = fs::read_dir(visual_path)
        .map_err(|e| RegistryError::Io(visual_path.to_path_buf(), e))?;

    let mut candidates = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !SIZE_RE.is_match(name) {
            continue;
        }
        let entry_doc = path.join(ENTRY_FILE);
        if !entry_doc.is_file() {
            crate::debug!("registry"; "skipping {}: no {}", name, ENTRY_FILE);
            continue;
        }
        candidates.push(Candidate {
            folder: name.to_string(),
            entry: entry_doc,
        });
    }

    if candidates.is_empty() {
        return Err(RegistryError::NoTargetsFound(visual_path.to_path_buf()));
    }

    candidates.sort_by(|a, b| a.folder.cmp(&b.folder));
    Ok(candidates)
}

/// Narrow the discovered candidates through a selection strategy.
///
/// An empty selection is fatal here, before any bundling process exists.
pub fn select_targets(
    candidates: &[Candidate],
    strategy: &dyn select::SelectionStrategy,
) -> anyhow::Result<Vec<Candidate>> {
    let selected = strategy.select(candidates)?;
    if selected.is_empty() {
        return Err(RegistryError::NoTargetsSelected.into());
    }
    Ok(selected)
}

/// Turn the selected candidates into port-assigned targets.
///
/// Ordinal indices follow selection order, which preserves discovery
/// order; ports are contiguous from the base port.
pub fn into_targets(selected: Vec<Candidate>, base_port: u16) -> Vec<Target> {
    selected
        .into_iter()
        .enumerate()
        .map(|(index, c)| Target::new(index, c.folder, c.entry, base_port))
        .collect()
}
