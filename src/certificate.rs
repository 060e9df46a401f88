//! The decoded form of one certificate found on disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509Ref};

/// Identity and validity window of a certificate, tagged with the file it
/// was read from.
///
/// Records are immutable values. `not_before <= not_after` is expected for
/// well-formed certificates but is not checked; whatever the certificate
/// says is passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    pub file_path: PathBuf,
    /// Subject CN, empty when absent.
    pub common_name: String,
    /// Issuer CN, empty when absent.
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CertificateRecord {
    /// Extracts a record from a parsed certificate.
    pub fn from_x509(path: &Path, cert: &X509Ref) -> Result<CertificateRecord, ErrorStack> {
        Ok(CertificateRecord {
            file_path: path.to_path_buf(),
            common_name: common_name(cert.subject_name()),
            issuer: common_name(cert.issuer_name()),
            not_before: asn1_to_datetime(cert.not_before())?,
            not_after: asn1_to_datetime(cert.not_after())?,
        })
    }

    /// Seconds until `not_after`; negative once expired.
    pub fn expires_in_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.not_after - now).num_seconds()
    }

    /// Seconds since `not_before`; negative before the window opens.
    pub fn valid_since_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.not_before).num_seconds()
    }

    /// A certificate is expired strictly after `not_after`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.not_after
    }
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().to_string().ok())
        .unwrap_or_default()
}

fn asn1_to_datetime(time: &Asn1TimeRef) -> Result<DateTime<Utc>, ErrorStack> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    // ASN.1 times stay within chrono's range.
    Ok(DateTime::from_timestamp(secs, 0).unwrap_or_default())
}
