//! Idempotent markup injection.
//!
//! Every successful bundle passes through this pipeline, which splices a
//! fixed, ordered set of fragments into the built entry document. Each
//! fragment is wrapped between named comment delimiters and the open
//! delimiter is checked before insertion, so running the pipeline any
//! number of times over the same file yields the same document —
//! idempotence is the correctness property everything else leans on.

pub mod markers;

pub use markers::{InjectContext, MARKERS, ScriptMode};

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::session::Target;

/// Where a marker's content is spliced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Immediately before `</head>`.
    Head,
    /// Immediately before `</body>`.
    Body,
}

impl Anchor {
    const fn tag(self) -> &'static str {
        match self {
            Anchor::Head => "</head>",
            Anchor::Body => "</body>",
        }
    }
}

/// One named injection point.
pub struct Marker {
    pub name: &'static str,
    pub anchor: Anchor,
    pub render: fn(&Target, &InjectContext) -> String,
}

impl Marker {
    pub fn open_token(&self) -> String {
        format!("<!-- vizor:{} -->", self.name)
    }

    pub fn close_token(&self) -> String {
        format!("<!-- /vizor:{} -->", self.name)
    }
}

/// Apply every marker, in order, to the document text.
pub fn apply(text: &str, target: &Target, ctx: &InjectContext) -> String {
    let mut text = text.to_string();
    for marker in MARKERS {
        text = apply_marker(text, marker, target, ctx);
    }
    text
}

fn apply_marker(text: String, marker: &Marker, target: &Target, ctx: &InjectContext) -> String {
    let open = marker.open_token();
    if text.contains(&open) {
        crate::debug!("inject"; "{} already present in {}", marker.name, target.folder);
        return text;
    }

    let anchor = marker.anchor.tag();
    let Some(at) = text.find(anchor) else {
        crate::log!("warning"; "{}: no {} tag, skipping {} injection", target.folder, anchor, marker.name);
        return text;
    };

    let block = format!("{open}\n{}\n{}\n", (marker.render)(target, ctx), marker.close_token());
    let mut out = String::with_capacity(text.len() + block.len());
    out.push_str(&text[..at]);
    out.push_str(&block);
    out.push_str(&text[at..]);
    out
}

/// Apply the pipeline to a built entry document and write it back in place.
///
/// Returns the processed text so the caller can run follow-up checks
/// without re-reading the file.
pub fn apply_to_file(path: &Path, target: &Target, ctx: &InjectContext) -> Result<String> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let processed = apply(&text, target, ctx);
    if processed != text {
        fs::write(path, &processed)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(processed)
}

/// Non-fatal container check: the built document is expected to carry the
/// configured container element, but is still useful for inspection
/// without it.
pub fn has_container(text: &str, container_id: &str) -> bool {
    text.contains(&format!("id=\"{container_id}\"")) || text.contains(&format!("id='{container_id}'"))
}
