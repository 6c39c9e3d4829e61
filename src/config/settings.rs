//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::export::{ArtifactKind, ScratchSpace, SelectorSettings, StrategyId};

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Where the host's route listener is.
    #[serde(default)]
    pub revit: RevitConfig,

    /// How MCP clients reach the bridge.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Export strategy settings.
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let revit = &self.revit;
        if revit.host.trim().is_empty() {
            return Err(invalid("revit.host must not be empty"));
        }
        if revit.port == 0 {
            return Err(invalid("revit.port must be non-zero"));
        }
        if !revit.base_path.starts_with('/') {
            return Err(invalid(format!(
                "revit.base_path '{}' must start with '/'",
                revit.base_path
            )));
        }
        if revit.timeout_secs == 0 || revit.export_timeout_secs == 0 || revit.status_timeout_secs == 0
        {
            return Err(invalid("revit timeouts must be non-zero"));
        }
        if revit.export_timeout_secs < revit.timeout_secs {
            return Err(invalid(format!(
                "revit.export_timeout_secs ({}) must not be shorter than revit.timeout_secs ({})",
                revit.export_timeout_secs, revit.timeout_secs
            )));
        }

        if self.transport.port == 0 {
            return Err(invalid("transport.port must be non-zero"));
        }

        let order = &self.export.pdf_strategy_order;
        if order.is_empty() {
            return Err(invalid("export.pdf_strategy_order must not be empty"));
        }
        for (i, id) in order.iter().enumerate() {
            if id.kind() != ArtifactKind::Pdf {
                return Err(invalid(format!(
                    "export.pdf_strategy_order: '{}' is not a PDF strategy",
                    id.name()
                )));
            }
            if order[..i].contains(id) {
                return Err(invalid(format!(
                    "export.pdf_strategy_order: '{}' listed more than once",
                    id.name()
                )));
            }
        }
        if self.export.image_pixel_size == 0 {
            return Err(invalid("export.image_pixel_size must be non-zero"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        message: message.into(),
    }
}

/// Host route listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RevitConfig {
    /// Host name. Default: `localhost`.
    #[serde(default = "default_revit_host")]
    pub host: String,

    /// Port. Default: 48884.
    #[serde(default = "default_revit_port")]
    pub port: u16,

    /// Base path of the routes. Default: `/revit_mcp`.
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Bound for ordinary queries, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Bound for PDF/image export, in seconds.
    #[serde(default = "default_export_timeout")]
    pub export_timeout_secs: u64,

    /// Bound for the health probe, in seconds.
    #[serde(default = "default_status_timeout")]
    pub status_timeout_secs: u64,
}

impl RevitConfig {
    /// Base URL of the routes, e.g. `http://localhost:48884/revit_mcp`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.host,
            self.port,
            self.base_path.trim_end_matches('/')
        )
    }
}

impl Default for RevitConfig {
    fn default() -> Self {
        Self {
            host: default_revit_host(),
            port: default_revit_port(),
            base_path: default_base_path(),
            timeout_secs: default_timeout(),
            export_timeout_secs: default_export_timeout(),
            status_timeout_secs: default_status_timeout(),
        }
    }
}

fn default_revit_host() -> String {
    "localhost".to_string()
}

const fn default_revit_port() -> u16 {
    48884
}

fn default_base_path() -> String {
    "/revit_mcp".to_string()
}

const fn default_timeout() -> u64 {
    30
}

const fn default_export_timeout() -> u64 {
    60
}

const fn default_status_timeout() -> u64 {
    10
}

/// MCP transport mode. Fixed at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Newline-delimited JSON-RPC on stdin/stdout.
    #[default]
    Stdio,
    /// JSON-RPC over an HTTP listener.
    Http,
}

/// MCP transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Transport mode. Default: stdio.
    #[serde(default)]
    pub mode: TransportMode,

    /// Bind address for HTTP mode. Default: `0.0.0.0`.
    #[serde(default = "default_transport_host")]
    pub host: String,

    /// Bind port for HTTP mode. Default: 8000.
    #[serde(default = "default_transport_port")]
    pub port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            host: default_transport_host(),
            port: default_transport_port(),
        }
    }
}

fn default_transport_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_transport_port() -> u16 {
    8000
}

/// Export settings, used when this process hosts the routes itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Root for scratch directories. Default: the system temp dir.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Order in which PDF strategies are tried.
    #[serde(default = "default_pdf_order")]
    pub pdf_strategy_order: Vec<StrategyId>,

    /// Pixel size for sheet images.
    #[serde(default = "default_pixel_size")]
    pub image_pixel_size: u32,
}

impl ExportConfig {
    /// Selector settings for this section.
    #[must_use]
    pub fn selector_settings(&self) -> SelectorSettings {
        SelectorSettings {
            scratch: self
                .scratch_dir
                .clone()
                .map_or_else(ScratchSpace::system, ScratchSpace::new),
            pdf_order: self.pdf_strategy_order.clone(),
            image_pixel_size: self.image_pixel_size,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            pdf_strategy_order: default_pdf_order(),
            image_pixel_size: default_pixel_size(),
        }
    }
}

fn default_pdf_order() -> Vec<StrategyId> {
    vec![StrategyId::PdfExport, StrategyId::PrintManager]
}

const fn default_pixel_size() -> u32 {
    2048
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r"{}";
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.revit.base_url(), "http://localhost:48884/revit_mcp");
        assert_eq!(config.transport.mode, TransportMode::Stdio);
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "_comment": "Test config",
            "revit": {
                "host": "10.0.0.5",
                "port": 48885,
                "base_path": "/revit_mcp/",
                "timeout_secs": 20,
                "export_timeout_secs": 120,
                "status_timeout_secs": 5
            },
            "transport": {
                "mode": "http",
                "host": "127.0.0.1",
                "port": 9000
            },
            "export": {
                "scratch_dir": "/tmp/revit",
                "pdf_strategy_order": ["print_manager", "pdf_export"],
                "image_pixel_size": 1024
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.revit.base_url(), "http://10.0.0.5:48885/revit_mcp");
        assert_eq!(config.revit.export_timeout_secs, 120);
        assert_eq!(config.transport.mode, TransportMode::Http);
        assert_eq!(config.transport.port, 9000);
        assert_eq!(
            config.export.pdf_strategy_order,
            vec![StrategyId::PrintManager, StrategyId::PdfExport]
        );
        assert_eq!(config.logging.level, "debug");

        let settings = config.export.selector_settings();
        assert_eq!(settings.scratch.root(), std::path::Path::new("/tmp/revit"));
        assert_eq!(settings.image_pixel_size, 1024);
    }

    #[test]
    fn revit_config_defaults() {
        let config = RevitConfig::default();
        assert_eq!(config.port, 48884);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.export_timeout_secs, 60);
        assert_eq!(config.status_timeout_secs, 10);
    }

    #[test]
    fn transport_config_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn reject_zero_port() {
        let json = r#"{ "revit": { "port": 0 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_export_timeout_shorter_than_default() {
        let json = r#"{ "revit": { "timeout_secs": 30, "export_timeout_secs": 10 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_relative_base_path() {
        let json = r#"{ "revit": { "base_path": "revit_mcp" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_duplicate_or_foreign_strategies() {
        let duplicate = r#"{ "export": { "pdf_strategy_order": ["pdf_export", "pdf_export"] } }"#;
        let config: Config = serde_json::from_str(duplicate).unwrap();
        assert!(config.validate().is_err());

        let image = r#"{ "export": { "pdf_strategy_order": ["image_export"] } }"#;
        let config: Config = serde_json::from_str(image).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_strategy_name() {
        let json = r#"{ "export": { "pdf_strategy_order": ["fax"] } }"#;
        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let json = r#"{
            "unknown_field": "value"
        }"#;

        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
