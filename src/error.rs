//! Error types for certificate scanning and the exporter process.
//!
//! Two families live here. [`CertificateError`] is a *value*: it describes
//! why one path could not contribute certificates to a scan, and is collected
//! into the scan batch next to the records that did decode. [`ExporterError`]
//! covers the few process-level failures (bad configuration, metric
//! registration, binding the HTTP listener) that stop the exporter.

use std::fmt;
use std::path::{Path, PathBuf};

use strum_macros::{EnumIter, IntoStaticStr};
use thiserror::Error;

/// Classification of a per-path scan failure.
///
/// The `&'static str` form (see [`ErrorKind::as_str`]) is the value of the
/// `error_type` metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, IntoStaticStr)]
pub enum ErrorKind {
    /// Filesystem access failed: missing file, permission denied, unlistable directory.
    #[strum(serialize = "read_error")]
    ReadError,
    /// A certificate block was recognised but its contents are malformed.
    #[strum(serialize = "parse_error")]
    ParseError,
    /// The content is not a supported encoding, or a PEM container held no certificate.
    #[strum(serialize = "pem_error")]
    PemError,
    /// The operation was abandoned because the scan was cancelled.
    #[strum(serialize = "unknown_error")]
    UnknownError,
}

impl ErrorKind {
    /// Label value for this kind, e.g. `"parse_error"`.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure to obtain certificates from one path.
///
/// The cause is never empty: constructing an error without one substitutes
/// the kind's label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cert error [{kind}] on {}: {cause}", .path.display())]
pub struct CertificateError {
    path: PathBuf,
    kind: ErrorKind,
    cause: String,
}

impl CertificateError {
    /// Creates an error for `path`. A `None` or empty cause falls back to
    /// the kind's label.
    pub fn new(path: impl Into<PathBuf>, kind: ErrorKind, cause: Option<String>) -> Self {
        let cause = match cause {
            Some(cause) if !cause.is_empty() => cause,
            _ => kind.as_str().to_string(),
        };
        CertificateError {
            path: path.into(),
            kind,
            cause,
        }
    }

    pub fn read(path: impl Into<PathBuf>, cause: impl ToString) -> Self {
        Self::new(path, ErrorKind::ReadError, Some(cause.to_string()))
    }

    pub fn parse(path: impl Into<PathBuf>, cause: impl ToString) -> Self {
        Self::new(path, ErrorKind::ParseError, Some(cause.to_string()))
    }

    pub fn pem(path: impl Into<PathBuf>, cause: impl ToString) -> Self {
        Self::new(path, ErrorKind::PemError, Some(cause.to_string()))
    }

    /// The error reported when a scan is cancelled before `path` is opened.
    pub fn cancelled(path: impl Into<PathBuf>) -> Self {
        Self::new(
            path,
            ErrorKind::UnknownError,
            Some("scan cancelled".to_string()),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn cause(&self) -> &str {
        &self.cause
    }
}

/// Process-level failures. These are the only errors that terminate the
/// exporter; everything that goes wrong inside a scan is absorbed.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// Configuration could not be loaded or failed validation
    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A collector could not be registered with the metrics registry
    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// The tracing subscriber could not be installed
    #[error("failed to initialize logging: {0}")]
    Logging(String),

    /// The HTTP listener could not be bound or failed while serving
    #[error("HTTP server error on {address}: {source}")]
    Server {
        /// The listen address
        address: String,
        /// The underlying I/O error
        source: std::io::Error,
    },
}
