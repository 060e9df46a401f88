use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use strum::IntoEnumIterator;
use tracing::debug;

use super::{classify_expiry_bucket, ExpiryBucket, MetricsPublisher};
use crate::error::ErrorKind;
use crate::source::ScanBatch;

const CERT_LABELS: &[&str] = &["common_name", "issuer", "filepath"];

/// Source of the reference time for a publish.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Publishes scan batches as Prometheus gauges on an explicit registry.
///
/// Every publish rebuilds the snapshot from scratch: all per-certificate,
/// per-bucket and per-error-kind series are reset first, so certificates
/// that disappeared from disk disappear from the export too. Publishing
/// and gathering are serialised by a lock, so a scrape sees either the
/// previous snapshot or the new one, never a mix.
pub struct PromPublisher {
    registry: Registry,
    snapshot: RwLock<()>,
    clock: Clock,
    per_certificate: bool,
    valid_certs: Gauge,
    not_before: GaugeVec,
    not_after: GaugeVec,
    expired: GaugeVec,
    expires_in_seconds: GaugeVec,
    valid_since_seconds: GaugeVec,
    by_expiry_bucket: GaugeVec,
    errors_by_type: GaugeVec,
    build_info: GaugeVec,
}

impl PromPublisher {
    /// Creates the exporter gauges and registers them with `registry`.
    ///
    /// # Arguments
    /// * `registry` - Registry the gauges are registered on and gathered from
    ///
    /// # Errors
    /// Fails if any of the metric names is already registered.
    pub fn new(registry: Registry) -> Result<Self, prometheus::Error> {
        let valid_certs = Gauge::new(
            "x509_valid_certs_total",
            "Number of current valid (non-expired) certificates",
        )?;
        let not_before = cert_gauge(
            "x509_cert_not_before",
            "Certificate validity start time (unix seconds)",
        )?;
        let not_after = cert_gauge(
            "x509_cert_not_after",
            "Certificate expiry time (unix seconds)",
        )?;
        let expired = cert_gauge(
            "x509_cert_expired",
            "1 if certificate is expired, 0 otherwise",
        )?;
        let expires_in_seconds = cert_gauge(
            "x509_cert_expires_in_seconds",
            "Seconds until certificate expiry (negative if expired)",
        )?;
        let valid_since_seconds = cert_gauge(
            "x509_cert_valid_since_seconds",
            "Seconds since certificate became valid (negative if not yet valid)",
        )?;
        let by_expiry_bucket = GaugeVec::new(
            Opts::new(
                "x509_certs_by_expiry_bucket",
                "Number of certificates by remaining validity in the last scan",
            ),
            &["range"],
        )?;
        let errors_by_type = GaugeVec::new(
            Opts::new(
                "x509_cert_errors_total",
                "Number of certificate load errors by type in the last scan",
            ),
            &["error_type"],
        )?;
        let build_info = GaugeVec::new(
            Opts::new(
                "x509_exporter_build_info",
                "Build info for the x509 exporter",
            ),
            &["version", "revision", "platform"],
        )?;

        registry.register(Box::new(valid_certs.clone()))?;
        for vec in [
            &not_before,
            &not_after,
            &expired,
            &expires_in_seconds,
            &valid_since_seconds,
            &by_expiry_bucket,
            &errors_by_type,
            &build_info,
        ] {
            registry.register(Box::new(vec.clone()))?;
        }

        Ok(PromPublisher {
            registry,
            snapshot: RwLock::new(()),
            clock: Arc::new(Utc::now),
            per_certificate: true,
            valid_certs,
            not_before,
            not_after,
            expired,
            expires_in_seconds,
            valid_since_seconds,
            by_expiry_bucket,
            errors_by_type,
            build_info,
        })
    }

    /// Replaces the wall clock, mostly for tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Enables or disables the per-certificate series. Aggregates are
    /// always exported.
    pub fn per_certificate_metrics(mut self, enabled: bool) -> Self {
        self.per_certificate = enabled;
        self
    }

    /// Sets `x509_exporter_build_info` to 1. Call once at startup.
    pub fn set_build_info(&self, version: &str, revision: &str, platform: &str) {
        self.build_info
            .with_label_values(&[version, revision, platform])
            .set(1.0);
    }

    /// Gathers the current snapshot.
    pub fn gather(&self) -> Vec<MetricFamily> {
        let _snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        self.registry.gather()
    }

    /// Renders the current snapshot in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    fn reset(&self) {
        for vec in [
            &self.not_before,
            &self.not_after,
            &self.expired,
            &self.expires_in_seconds,
            &self.valid_since_seconds,
            &self.by_expiry_bucket,
            &self.errors_by_type,
        ] {
            vec.reset();
        }
    }
}

impl MetricsPublisher for PromPublisher {
    fn publish(&self, batch: ScanBatch) {
        let now = (self.clock)();

        let mut buckets: HashMap<ExpiryBucket, u64> =
            ExpiryBucket::iter().map(|bucket| (bucket, 0)).collect();
        let mut errors: BTreeMap<ErrorKind, u64> = BTreeMap::new();
        for error in &batch.errors {
            *errors.entry(error.kind()).or_default() += 1;
        }

        let _snapshot = self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.reset();

        let mut valid = 0u64;
        for cert in &batch.records {
            let expired = cert.is_expired(now);
            let expires_in = cert.expires_in_seconds(now);

            *buckets
                .entry(classify_expiry_bucket(expires_in))
                .or_default() += 1;
            if !expired {
                valid += 1;
            }

            if self.per_certificate {
                let filepath = cert.file_path.display().to_string();
                let labels = [
                    cert.common_name.as_str(),
                    cert.issuer.as_str(),
                    filepath.as_str(),
                ];
                self.not_before
                    .with_label_values(&labels)
                    .set(cert.not_before.timestamp() as f64);
                self.not_after
                    .with_label_values(&labels)
                    .set(cert.not_after.timestamp() as f64);
                self.expired
                    .with_label_values(&labels)
                    .set(if expired { 1.0 } else { 0.0 });
                self.expires_in_seconds
                    .with_label_values(&labels)
                    .set(expires_in as f64);
                self.valid_since_seconds
                    .with_label_values(&labels)
                    .set(cert.valid_since_seconds(now) as f64);
            }
        }

        self.valid_certs.set(valid as f64);
        for (bucket, count) in &buckets {
            self.by_expiry_bucket
                .with_label_values(&[bucket.label()])
                .set(*count as f64);
        }
        for (kind, count) in &errors {
            self.errors_by_type
                .with_label_values(&[kind.as_str()])
                .set(*count as f64);
        }

        debug!(
            certs = batch.records.len(),
            valid,
            errors = batch.errors.len(),
            "metrics snapshot replaced"
        );
    }
}

fn cert_gauge(name: &str, help: &str) -> Result<GaugeVec, prometheus::Error> {
    GaugeVec::new(Opts::new(name, help), CERT_LABELS)
}
