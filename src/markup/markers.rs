//! The fixed marker set.
//!
//! Order is part of the contract: environment, demo fill, client library,
//! document title, helpers. Rendered content is a pure function of
//! `(target, context)`; in local mode script URLs point at the local dev
//! servers, otherwise at versioned CDN URLs with a cache-breaking query
//! parameter.

use serde_json::{Value, json};

use super::{Anchor, Marker};
use crate::config::VisualConfig;
use crate::session::Target;

/// Port of the local client-library dev server (`--local` mode).
pub const LOCAL_LIB_PORT: u16 = 8000;

/// Where injected script URLs point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptMode {
    /// Local dev servers on this machine.
    Local,
    /// Versioned CDN URLs with cache busting.
    Cdn,
}

/// Everything marker rendering may depend on. No hidden state: the same
/// context and target always render the same fragments.
#[derive(Debug, Clone)]
pub struct InjectContext {
    pub mode: ScriptMode,
    pub config: VisualConfig,
    /// Visual identity (`brand/visual`).
    pub visual: String,
    /// Demo fill content derived from the schema.
    pub fill: Value,
    /// Unix time used for the `?cb=` cache-breaking parameter.
    pub cache_bust: u64,
}

impl InjectContext {
    /// URL of a library script, local or CDN depending on mode.
    fn script_url(&self, lib: &str) -> String {
        match self.mode {
            ScriptMode::Local => {
                format!("http://127.0.0.1:{LOCAL_LIB_PORT}/{lib}.js")
            }
            ScriptMode::Cdn => format!(
                "{}/{lib}/{}/{lib}.min.js?cb={}",
                self.config.cdn_base, self.config.version, self.cache_bust
            ),
        }
    }
}

/// All markers, in application order.
pub static MARKERS: &[&Marker] = &[
    &ENVIRONMENT,
    &FILL,
    &CLIENT,
    &TITLE,
    &HELPERS,
];

/// Runtime environment descriptor for the served document.
static ENVIRONMENT: Marker = Marker {
    name: "environment",
    anchor: Anchor::Head,
    render: render_environment,
};

/// Demo fill content so the visual renders with data.
static FILL: Marker = Marker {
    name: "fill",
    anchor: Anchor::Head,
    render: render_fill,
};

/// The client library driving the visual.
static CLIENT: Marker = Marker {
    name: "client",
    anchor: Anchor::Body,
    render: render_client,
};

/// Document title and viewport metadata.
static TITLE: Marker = Marker {
    name: "title",
    anchor: Anchor::Head,
    render: render_title,
};

/// Shared helper library.
static HELPERS: Marker = Marker {
    name: "helpers",
    anchor: Anchor::Body,
    render: render_helpers,
};

fn render_environment(target: &Target, ctx: &InjectContext) -> String {
    let env = json!({
        "visual": ctx.visual,
        "size": target.folder,
        "port": target.port,
        "mode": match ctx.mode {
            ScriptMode::Local => "local",
            ScriptMode::Cdn => "cdn",
        },
    });
    format!("<script>window.VIZOR_ENV = {env};</script>")
}

fn render_fill(_target: &Target, ctx: &InjectContext) -> String {
    format!("<script>window.VIZOR_FILL = {};</script>", ctx.fill)
}

fn render_client(_target: &Target, ctx: &InjectContext) -> String {
    format!(
        "<script src=\"{}\"></script>",
        ctx.script_url(&ctx.config.client)
    )
}

fn render_title(target: &Target, ctx: &InjectContext) -> String {
    let title = ctx.config.title.as_deref().unwrap_or(&ctx.visual);
    format!(
        "<title>{} · {}</title>\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">",
        title, target.folder
    )
}

fn render_helpers(_target: &Target, ctx: &InjectContext) -> String {
    format!("<script src=\"{}\"></script>", ctx.script_url("helpers"))
}
