//! x509watch discovers X.509 certificates on disk and exports their validity
//! windows as Prometheus metrics.
//!
//! A scan loads every certificate under a configured file or directory into a
//! [`ScanBatch`], then a [`MetricsPublisher`] replaces the exported snapshot
//! with it. [`ScanOrchestrator`] runs scans once or periodically; the
//! [`server`] module exposes the snapshot over HTTP.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use std::time::Duration;
//! # use tokio_util::sync::CancellationToken;
//! use x509watch::metrics::prom::PromPublisher;
//! use x509watch::source::DirSource;
//! use x509watch::ScanOrchestrator;
//!
//! # async fn run() -> Result<(), prometheus::Error> {
//! let publisher = Arc::new(PromPublisher::new(prometheus::Registry::new())?);
//! let orchestrator = ScanOrchestrator::new(
//!     Arc::new(DirSource::new("/etc/ssl/certs")),
//!     publisher.clone(),
//!     Duration::from_secs(300),
//!     CancellationToken::new(),
//! );
//! orchestrator.run().await;
//! # Ok(())
//! # }
//! ```

pub mod certificate;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod scan;
pub mod server;
pub mod source;

mod test_utils;

pub use certificate::CertificateRecord;
pub use error::{CertificateError, ErrorKind, ExporterError};
pub use metrics::{classify_expiry_bucket, ExpiryBucket, MetricsPublisher};
pub use scan::{CycleSummary, ScanOrchestrator};
pub use source::{CertificateSource, ScanBatch};
