//! Configuration file management for x509watch.
//!
//! This module handles loading, parsing, and merging configuration from TOML files
//! and command-line arguments, then validating the result into [`Settings`].
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (specified with --config)
//! 3. Command-line arguments and `X509WATCH_*` environment variables (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! listen = "0.0.0.0:9101"
//! cert_dir = "/etc/ssl/private"
//! interval = "5m"
//! log_level = "info"
//! log_format = "json"
//! per_certificate_metrics = true
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{LogFormat, LogLevel};
use crate::source::SourceLocation;

/// Raw configuration as read from a file or the command line.
///
/// All fields are optional to support partial configuration and merging.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP listen address, `host:port` or `:port`
    pub listen: Option<String>,
    /// A single certificate file (PEM bundle or DER)
    pub cert_file: Option<PathBuf>,
    /// A directory scanned recursively
    pub cert_dir: Option<PathBuf>,
    /// Scan interval such as "30s" or "5m"; "0s" scans once at startup
    pub interval: Option<String>,
    /// One of debug, info, warn, error
    pub log_level: Option<String>,
    /// text or json
    pub log_format: Option<String>,
    /// Export per-certificate series labelled with CN, issuer and path
    pub per_certificate_metrics: Option<bool>,
}

/// Validated configuration the exporter runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub listen: SocketAddr,
    pub location: SourceLocation,
    pub interval: Duration,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
    pub per_certificate_metrics: bool,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Creates a configuration holding the built-in defaults.
    ///
    /// # Default Values
    ///
    /// - `listen`: "0.0.0.0:9101"
    /// - `cert_file` / `cert_dir`: None (one must be provided)
    /// - `interval`: "0s" (scan once)
    /// - `log_level`: "info"
    /// - `log_format`: "text"
    /// - `per_certificate_metrics`: true
    pub fn defaults() -> Self {
        Config {
            listen: Some("0.0.0.0:9101".to_string()),
            cert_file: None,
            cert_dir: None,
            interval: Some("0s".to_string()),
            log_level: Some("info".to_string()),
            log_format: Some("text".to_string()),
            per_certificate_metrics: Some(true),
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// Setting a source location in `other` replaces both location fields, so a
    /// `--cert-dir` on the command line overrides a `cert_file` from the file.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.listen.is_some() {
            self.listen = other.listen;
        }
        if other.cert_file.is_some() || other.cert_dir.is_some() {
            self.cert_file = other.cert_file;
            self.cert_dir = other.cert_dir;
        }
        if other.interval.is_some() {
            self.interval = other.interval;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if other.log_format.is_some() {
            self.log_format = other.log_format;
        }
        if other.per_certificate_metrics.is_some() {
            self.per_certificate_metrics = other.per_certificate_metrics;
        }
        self
    }

    /// Creates a Config from command-line arguments for merging.
    ///
    /// Only provided arguments (Some values) override other configurations.
    pub fn from_cli_args(
        listen: Option<String>,
        cert_file: Option<PathBuf>,
        cert_dir: Option<PathBuf>,
        interval: Option<String>,
        log_level: Option<String>,
        log_format: Option<String>,
        per_certificate_metrics: Option<bool>,
    ) -> Self {
        Config {
            listen,
            cert_file,
            cert_dir,
            interval,
            log_level,
            log_format,
            per_certificate_metrics,
        }
    }

    /// Generates an example configuration file in TOML format.
    pub fn example_toml() -> String {
        let example = Config {
            cert_dir: Some(PathBuf::from("/etc/ssl/certs")),
            interval: Some("5m".to_string()),
            ..Config::defaults()
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }

    /// Validates the merged configuration.
    ///
    /// Exactly one of `cert_file` and `cert_dir` must be set; every other
    /// field falls back to its default when absent.
    pub fn validate(self) -> Result<Settings, ConfigError> {
        let defaults = Config::defaults();
        let Config {
            listen,
            cert_file,
            cert_dir,
            interval,
            log_level,
            log_format,
            per_certificate_metrics,
        } = self.merge_defaults(defaults);

        let location = match (cert_file, cert_dir) {
            (Some(file), None) => SourceLocation::File(file),
            (None, Some(dir)) => SourceLocation::Directory(dir),
            (None, None) => {
                return Err(ConfigError::Validation(
                    "either --cert-file or --cert-dir must be set".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ConfigError::Validation(
                    "only one of --cert-file or --cert-dir can be set".to_string(),
                ))
            }
        };

        let listen = listen.unwrap_or_default();
        let listen = parse_listen(&listen).ok_or_else(|| {
            ConfigError::Validation(format!("invalid listen address '{}'", listen))
        })?;

        let interval = interval.unwrap_or_default();
        let interval = humantime::parse_duration(interval.trim()).map_err(|e| {
            ConfigError::Validation(format!("invalid interval '{}': {}", interval, e))
        })?;

        let log_level = log_level.unwrap_or_default();
        let log_level = LogLevel::from_str(&log_level).map_err(|_| {
            ConfigError::Validation("log-level must be one of: debug, info, warn, error".to_string())
        })?;

        let log_format = log_format.unwrap_or_default();
        let log_format = LogFormat::from_str(&log_format).map_err(|_| {
            ConfigError::Validation("log-format must be one of: text, json".to_string())
        })?;

        Ok(Settings {
            listen,
            location,
            interval,
            log_level,
            log_format,
            per_certificate_metrics: per_certificate_metrics.unwrap_or(true),
        })
    }

    fn merge_defaults(self, defaults: Config) -> Config {
        Config {
            listen: self.listen.or(defaults.listen),
            interval: self.interval.or(defaults.interval),
            log_level: self.log_level.or(defaults.log_level),
            log_format: self.log_format.or(defaults.log_format),
            per_certificate_metrics: self
                .per_certificate_metrics
                .or(defaults.per_certificate_metrics),
            ..self
        }
    }
}

/// Accepts `host:port` and the `:port` shorthand for all interfaces.
fn parse_listen(listen: &str) -> Option<SocketAddr> {
    let listen = listen.trim();
    match listen.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port).parse().ok(),
        None => listen.parse().ok(),
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("IO Error: {0}")]
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    #[error("Parse Error: {0}")]
    Parse(String),
    /// Validation error (missing required fields, invalid values, etc.)
    #[error("Validation Error: {0}")]
    Validation(String),
}
