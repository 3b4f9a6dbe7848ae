//! Visual configuration (`config.json`).
//!
//! Every visual carries a `config.json` next to its size folders. The
//! orchestrator loads it once at startup (fatal on errors) and re-validates
//! it on every config-file change during the run (reported, never fatal).
//!
//! # Example
//!
//! ```json
//! {
//!     "client": "acme",
//!     "version": "3",
//!     "cdnBase": "https://cdn.example.com",
//!     "container": "visual-root",
//!     "basePort": 1200
//! }
//! ```

mod error;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Name of the per-visual config file.
pub const CONFIG_FILE: &str = "config.json";

/// Per-visual configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VisualConfig {
    /// Client library name, also the brand script on the CDN.
    pub client: String,

    /// Client library major version (numeric string, e.g. "3").
    pub version: String,

    /// CDN base URL for injected scripts (non-local mode).
    pub cdn_base: String,

    /// Id of the container element expected in every built document.
    pub container: String,

    /// Base port for per-size dev servers; size N gets `base_port + N`.
    pub base_port: u16,

    /// Document title override. Defaults to the visual folder name.
    pub title: Option<String>,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            client: String::new(),
            version: "1".to_string(),
            cdn_base: "https://cdn.example.com".to_string(),
            container: "visual-root".to_string(),
            base_port: 1200,
            title: None,
        }
    }
}

impl VisualConfig {
    /// Load and parse `config.json` from a visual directory.
    ///
    /// Returns the typed config together with the raw JSON value (the raw
    /// value is served verbatim on the status endpoint).
    pub fn load(visual_path: &Path) -> Result<(Self, serde_json::Value), ConfigError> {
        let path = visual_path.join(CONFIG_FILE);
        let text = fs::read_to_string(&path).map_err(|e| ConfigError::Io(path.clone(), e))?;
        let raw: serde_json::Value = serde_json::from_str(&text)?;
        let config: Self = serde_json::from_value(raw.clone())?;
        Ok((config, raw))
    }

    /// Semantic validation. Parse errors are caught earlier; this checks
    /// the values make sense for a dev run.
    pub fn validate(&self) -> ConfigDiagnostics {
        let mut diags = ConfigDiagnostics::new();

        if self.client.trim().is_empty() {
            diags.error("client", "client name must not be empty");
        }

        if self.version.trim().is_empty() {
            diags.error("version", "version must not be empty");
        } else if !self.version.chars().all(|c| c.is_ascii_digit()) {
            diags.error_with_hint(
                "version",
                format!("`{}` is not a numeric version", self.version),
                "use the major version only, e.g. \"3\"",
            );
        }

        if !self.cdn_base.starts_with("http://") && !self.cdn_base.starts_with("https://") {
            diags.error_with_hint(
                "cdnBase",
                format!("`{}` is not an absolute URL", self.cdn_base),
                "use a full URL, e.g. https://cdn.example.com",
            );
        } else if self.cdn_base.ends_with('/') {
            diags.error_with_hint(
                "cdnBase",
                "must not end with a slash",
                "script paths are appended with a leading slash",
            );
        }

        if self.container.trim().is_empty() {
            diags.error("container", "container id must not be empty");
        }

        if self.base_port < 1024 {
            diags.error_with_hint(
                "basePort",
                format!("port {} is in the privileged range", self.base_port),
                "pick a port >= 1024",
            );
        }

        diags
    }

    /// Load + validate in one step; used at startup where errors are fatal.
    pub fn load_checked(visual_path: &Path) -> Result<(Self, serde_json::Value), ConfigError> {
        let (config, raw) = Self::load(visual_path)?;
        config
            .validate()
            .into_result()
            .map_err(ConfigError::Diagnostics)?;
        Ok((config, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(json: &str) -> VisualConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("{}");
        assert_eq!(config.base_port, 1200);
        assert_eq!(config.container, "visual-root");
        assert!(config.title.is_none());
    }

    #[test]
    fn test_camel_case_fields() {
        let config = parse(r#"{"client":"acme","cdnBase":"https://cdn.acme.io","basePort":2400}"#);
        assert_eq!(config.client, "acme");
        assert_eq!(config.cdn_base, "https://cdn.acme.io");
        assert_eq!(config.base_port, 2400);
    }

    #[test]
    fn test_validate_ok() {
        let config = parse(r#"{"client":"acme","version":"3","cdnBase":"https://cdn.acme.io"}"#);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = parse(
            r#"{"client":"","version":"v3","cdnBase":"cdn.acme.io/","basePort":80}"#,
        );
        let diags = config.validate();
        // client empty, version non-numeric, cdnBase not absolute, port privileged
        assert_eq!(diags.len(), 4);
    }

    #[test]
    fn test_validate_trailing_slash() {
        let config = parse(r#"{"client":"acme","cdnBase":"https://cdn.acme.io/"}"#);
        let diags = config.validate();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.errors()[0].field, "cdnBase");
    }

    #[test]
    fn test_load_checked_roundtrip() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            r#"{"client":"acme","version":"3","cdnBase":"https://cdn.acme.io"}"#,
        )
        .unwrap();

        let (config, raw) = VisualConfig::load_checked(temp.path()).unwrap();
        assert_eq!(config.client, "acme");
        assert_eq!(raw["client"], "acme");
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            VisualConfig::load(temp.path()),
            Err(ConfigError::Io(..))
        ));
    }
}
