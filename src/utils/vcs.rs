//! Read-only git snapshot.
//!
//! One probe at startup; the result lands in the session record and is
//! echoed on the status endpoint. The orchestrator never mutates the
//! repository.

use std::path::Path;

/// Snapshot the repository state as `branch@shorthash`.
///
/// Degrades gracefully: a detached head drops the branch name, a missing
/// repository yields a fixed placeholder.
pub fn snapshot(root: &Path) -> String {
    let Ok(repo) = gix::discover(root) else {
        return "no repository".to_string();
    };

    let branch = repo
        .head_name()
        .ok()
        .flatten()
        .map(|name| {
            let full = name.as_bstr().to_string();
            full.strip_prefix("refs/heads/")
                .map(str::to_string)
                .unwrap_or(full.clone())
        })
        .unwrap_or_else(|| "detached".to_string());

    match repo.head_id() {
        Ok(id) => format!("{branch}@{}", id.to_hex_with_len(8)),
        Err(_) => branch,
    }
}
