//! Metrics aggregation and export.
//!
//! This module turns a scan batch into the exported metrics snapshot.
//! The [`MetricsPublisher`] trait is the seam the scan loop talks to;
//! [`prom::PromPublisher`] is the Prometheus implementation.
//!
//! # Submodules
//!
//! - `prom` - Prometheus registry, gauges and text rendering

pub mod prom;

use std::time::Duration;

use strum_macros::{EnumIter, IntoStaticStr};

use crate::source::ScanBatch;

const DAY: u64 = 24 * 60 * 60;

/// Consumes one complete scan batch and replaces the exported snapshot
/// with it.
pub trait MetricsPublisher: Send + Sync {
    fn publish(&self, batch: ScanBatch);
}

/// Coarse classification of a certificate's remaining validity.
///
/// Variants are declared from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum ExpiryBucket {
    #[strum(serialize = "expired")]
    Expired,
    #[strum(serialize = "<1d")]
    UnderOneDay,
    #[strum(serialize = "<7d")]
    UnderSevenDays,
    #[strum(serialize = "<30d")]
    UnderThirtyDays,
    #[strum(serialize = "<90d")]
    UnderNinetyDays,
    #[strum(serialize = ">=90d")]
    NinetyDaysOrMore,
}

impl ExpiryBucket {
    /// Value of the `range` label.
    pub fn label(self) -> &'static str {
        self.into()
    }
}

/// Buckets a remaining lifetime in seconds. Zero and below is expired; the
/// first threshold the value falls under wins.
pub fn classify_expiry_bucket(remaining_secs: i64) -> ExpiryBucket {
    if remaining_secs <= 0 {
        return ExpiryBucket::Expired;
    }
    let remaining = Duration::from_secs(remaining_secs.unsigned_abs());
    let thresholds = [
        (1, ExpiryBucket::UnderOneDay),
        (7, ExpiryBucket::UnderSevenDays),
        (30, ExpiryBucket::UnderThirtyDays),
        (90, ExpiryBucket::UnderNinetyDays),
    ];
    thresholds
        .iter()
        .find(|(days, _)| remaining < Duration::from_secs(days * DAY))
        .map(|(_, bucket)| *bucket)
        .unwrap_or(ExpiryBucket::NinetyDaysOrMore)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    const D: i64 = DAY as i64;

    #[test]
    fn test_bucket_boundaries() {
        let cases = [
            (i64::MIN, ExpiryBucket::Expired),
            (-1, ExpiryBucket::Expired),
            (0, ExpiryBucket::Expired),
            (1, ExpiryBucket::UnderOneDay),
            (D - 1, ExpiryBucket::UnderOneDay),
            (D, ExpiryBucket::UnderSevenDays),
            (7 * D - 1, ExpiryBucket::UnderSevenDays),
            (7 * D, ExpiryBucket::UnderThirtyDays),
            (30 * D - 1, ExpiryBucket::UnderThirtyDays),
            (30 * D, ExpiryBucket::UnderNinetyDays),
            (90 * D - 1, ExpiryBucket::UnderNinetyDays),
            (90 * D, ExpiryBucket::NinetyDaysOrMore),
            (i64::MAX, ExpiryBucket::NinetyDaysOrMore),
        ];

        for (remaining, expected) in cases {
            assert_eq!(
                classify_expiry_bucket(remaining),
                expected,
                "remaining = {}s",
                remaining
            );
        }
    }

    #[test]
    fn test_bucket_labels() {
        let labels: Vec<&str> = ExpiryBucket::iter().map(ExpiryBucket::label).collect();
        assert_eq!(
            labels,
            vec!["expired", "<1d", "<7d", "<30d", "<90d", ">=90d"]
        );
    }
}
