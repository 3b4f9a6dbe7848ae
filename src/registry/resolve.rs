//! Visual resolution.
//!
//! Decides *which* visual to orchestrate, once, before anything starts:
//!
//! 1. `--newest` and a pinned newest visual is recorded → use the pin;
//! 2. `--latest` and the last-built visual still exists → resume it
//!    without asking;
//! 3. a last-built visual exists → offer to resume it interactively;
//! 4. otherwise prompt brand → visual under `<root>/src/`.
//!
//! The chosen visual is re-recorded as "last" for the next run. Pin state
//! lives in `<root>/.vizor/state.json`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};

/// Directory holding per-project orchestrator state.
const STATE_DIR: &str = ".vizor";
const STATE_FILE: &str = "state.json";

/// Source tree root below the project root.
pub const SRC_DIR: &str = "src";

/// Persisted pin state. Paths are `<brand>/<visual>` relative to `src/`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PinState {
    /// Explicitly pinned "newest" visual, set by external tooling.
    pub newest: Option<String>,
    /// Last visual this tool built.
    pub last: Option<String>,
}

impl PinState {
    pub fn load(root: &Path) -> Self {
        let path = root.join(STATE_DIR).join(STATE_FILE);
        fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    pub fn store(&self, root: &Path) -> Result<()> {
        let dir = root.join(STATE_DIR);
        fs::create_dir_all(&dir)?;
        let text = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(STATE_FILE), text)
            .with_context(|| format!("failed to write {STATE_DIR}/{STATE_FILE}"))?;
        Ok(())
    }
}

/// Resolved visual: identity (`brand/visual`) and its absolute path.
#[derive(Debug, Clone)]
pub struct ResolvedVisual {
    pub identity: String,
    pub path: PathBuf,
}

/// Resolve the visual to orchestrate. See module docs for the precedence.
pub fn resolve_visual(root: &Path, newest: bool, latest: bool) -> Result<ResolvedVisual> {
    let mut state = PinState::load(root);

    let resolved = pick_visual(root, &state, newest, latest)?;

    // Remember for the next run
    state.last = Some(resolved.identity.clone());
    if let Err(e) = state.store(root) {
        crate::debug!("registry"; "could not persist last visual: {}", e);
    }

    Ok(resolved)
}

fn pick_visual(root: &Path, state: &PinState, newest: bool, latest: bool) -> Result<ResolvedVisual> {
    if newest {
        let Some(pinned) = &state.newest else {
            bail!("--newest given but no newest visual is recorded");
        };
        let resolved = from_relative(root, pinned);
        if !resolved.path.is_dir() {
            bail!("pinned newest visual `{pinned}` no longer exists");
        }
        return Ok(resolved);
    }

    if let Some(last) = &state.last {
        let resolved = from_relative(root, last);
        if resolved.path.is_dir() {
            if latest {
                return Ok(resolved);
            }
            if prompt_yes(&format!("Resume {}?", last.bold()))? {
                return Ok(resolved);
            }
        } else if latest {
            crate::log!("registry"; "last visual `{}` is gone, choose another", last);
        }
    }

    prompt_brand_visual(root)
}

fn from_relative(root: &Path, relative: &str) -> ResolvedVisual {
    ResolvedVisual {
        identity: relative.to_string(),
        path: root.join(SRC_DIR).join(relative),
    }
}

/// Interactive brand → visual walk over `<root>/src/`.
fn prompt_brand_visual(root: &Path) -> Result<ResolvedVisual> {
    let src = root.join(SRC_DIR);
    let brands = list_subdirs(&src);
    if brands.is_empty() {
        bail!("no brands found under `{}`", src.display());
    }
    let brand = &brands[prompt_pick("brand", &brands)?];

    let visuals = list_subdirs(&src.join(brand));
    if visuals.is_empty() {
        bail!("no visuals found under `{}/{brand}`", src.display());
    }
    let visual = &visuals[prompt_pick("visual", &visuals)?];

    let identity = format!("{brand}/{visual}");
    Ok(from_relative(root, &identity))
}

/// Sorted immediate subdirectory names (hidden folders skipped).
fn list_subdirs(path: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(path) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

/// Numbered single pick from a list; re-asks on invalid input.
fn prompt_pick(label: &str, options: &[String]) -> Result<usize> {
    for (i, option) in options.iter().enumerate() {
        eprintln!("  {} {}", format!("{}.", i + 1).dimmed(), option);
    }
    loop {
        eprint!("Pick a {label}: ");
        io::stderr().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if let Ok(n) = input.trim().parse::<usize>()
            && n >= 1
            && n <= options.len()
        {
            return Ok(n - 1);
        }
        eprintln!("{}", format!("enter 1-{}", options.len()).yellow());
    }
}

fn prompt_yes(question: &str) -> Result<bool> {
    eprint!("{question} [Y/n] ");
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input.is_empty() || input == "y" || input == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pin_state_roundtrip() {
        let temp = TempDir::new().unwrap();
        let state = PinState {
            newest: Some("acme/spring".into()),
            last: Some("acme/winter".into()),
        };
        state.store(temp.path()).unwrap();

        let loaded = PinState::load(temp.path());
        assert_eq!(loaded.newest.as_deref(), Some("acme/spring"));
        assert_eq!(loaded.last.as_deref(), Some("acme/winter"));
    }

    #[test]
    fn test_pin_state_missing_is_default() {
        let temp = TempDir::new().unwrap();
        let state = PinState::load(temp.path());
        assert!(state.newest.is_none());
        assert!(state.last.is_none());
    }

    #[test]
    fn test_newest_requires_recorded_pin() {
        let temp = TempDir::new().unwrap();
        let err = pick_visual(temp.path(), &PinState::default(), true, false).unwrap_err();
        assert!(err.to_string().contains("no newest visual"));
    }

    #[test]
    fn test_newest_rejects_stale_pin() {
        let temp = TempDir::new().unwrap();
        let state = PinState {
            newest: Some("acme/gone".into()),
            last: None,
        };
        let err = pick_visual(temp.path(), &state, true, false).unwrap_err();
        assert!(err.to_string().contains("no longer exists"));
    }

    #[test]
    fn test_latest_resumes_without_prompt() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/acme/spring")).unwrap();
        let state = PinState {
            newest: None,
            last: Some("acme/spring".into()),
        };

        let resolved = pick_visual(temp.path(), &state, false, true).unwrap();
        assert_eq!(resolved.identity, "acme/spring");
        assert!(resolved.path.ends_with("src/acme/spring"));
    }

    #[test]
    fn test_list_subdirs_sorted_without_hidden() {
        let temp = TempDir::new().unwrap();
        for dir in ["zeta", "acme", ".git"] {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
        fs::write(temp.path().join("file.txt"), "x").unwrap();

        assert_eq!(list_subdirs(temp.path()), vec!["acme", "zeta"]);
    }
}
