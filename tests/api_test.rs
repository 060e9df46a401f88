//! Integration tests for the public API

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use prometheus::Registry;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::{pem_cert, samples};
use x509watch::metrics::prom::PromPublisher;
use x509watch::source::{load_tree, DirSource, FileSource};
use x509watch::{
    CertificateError, CertificateSource, ErrorKind, MetricsPublisher, ScanOrchestrator,
};

#[test]
fn test_error_kinds_are_public() {
    fn describe(err: &CertificateError) -> String {
        match err.kind() {
            ErrorKind::ReadError => format!("cannot read {}", err.path().display()),
            ErrorKind::ParseError => format!("malformed certificate: {}", err.cause()),
            ErrorKind::PemError => format!("not a certificate: {}", err.cause()),
            ErrorKind::UnknownError => "cancelled".to_string(),
        }
    }

    let err = CertificateError::read("/etc/ssl/x.pem", "permission denied");
    assert_eq!(describe(&err), "cannot read /etc/ssl/x.pem");
}

#[test]
fn test_directory_scan_published() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.pem"), pem_cert("a.example", 3)).unwrap();
    fs::write(dir.path().join("b.pem"), pem_cert("b.example", 200)).unwrap();
    fs::write(dir.path().join("old.pem"), pem_cert("old.example", -2)).unwrap();
    fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

    let publisher = PromPublisher::new(Registry::new()).unwrap();
    publisher.publish(DirSource::new(dir.path()).load(&CancellationToken::new()));

    let text = publisher.render().unwrap();
    assert!(text.contains("x509_valid_certs_total 2"));
    assert_eq!(samples(&text, "x509_cert_not_after").len(), 3);
    assert!(text.contains(r#"x509_certs_by_expiry_bucket{range="<7d"} 1"#));
    assert!(text.contains(r#"x509_certs_by_expiry_bucket{range=">=90d"} 1"#));
    assert!(text.contains(r#"x509_certs_by_expiry_bucket{range="expired"} 1"#));
    assert!(text.contains(r#"x509_cert_errors_total{error_type="pem_error"} 1"#));
}

#[test]
fn test_deleted_certificate_disappears() {
    let dir = TempDir::new().unwrap();
    for cn in ["one", "two", "three"] {
        fs::write(dir.path().join(format!("{}.pem", cn)), pem_cert(cn, 30)).unwrap();
    }
    let publisher = PromPublisher::new(Registry::new()).unwrap();
    let cancel = CancellationToken::new();

    publisher.publish(load_tree(dir.path(), &cancel));
    assert_eq!(
        samples(&publisher.render().unwrap(), "x509_cert_expired").len(),
        3
    );

    fs::remove_file(dir.path().join("two.pem")).unwrap();
    fs::remove_file(dir.path().join("three.pem")).unwrap();
    publisher.publish(load_tree(dir.path(), &cancel));

    let text = publisher.render().unwrap();
    let remaining = samples(&text, "x509_cert_expired");
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].contains(r#"common_name="one""#));
}

#[test]
fn test_bundle_with_malformed_block() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bundle.pem");
    let mut bundle = pem_cert("good", 30);
    bundle.extend_from_slice(
        b"-----BEGIN CERTIFICATE-----\nbm90IGEgY2VydGlmaWNhdGUgYXQgYWxs\n-----END CERTIFICATE-----\n",
    );
    fs::write(&path, bundle).unwrap();

    let batch = FileSource::new(&path).load(&CancellationToken::new());

    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].common_name, "good");
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(batch.errors[0].kind(), ErrorKind::ParseError);
}

#[tokio::test]
async fn test_periodic_scan_picks_up_new_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("first.pem"), pem_cert("first", 30)).unwrap();

    let publisher = Arc::new(PromPublisher::new(Registry::new()).unwrap());
    let cancel = CancellationToken::new();
    let orchestrator = ScanOrchestrator::new(
        Arc::new(DirSource::new(dir.path())),
        publisher.clone(),
        Duration::from_millis(20),
        cancel.clone(),
    );
    let handle = tokio::spawn(async move { orchestrator.run().await });

    fs::write(dir.path().join("second.pem"), pem_cert("second", 30)).unwrap();

    let seen_both = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let text = publisher.render().unwrap();
            if samples(&text, "x509_cert_not_after").len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    cancel.cancel();
    handle.await.unwrap();
    assert!(seen_both.is_ok(), "second certificate never published");
}
