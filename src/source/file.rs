use std::fs;
use std::path::{Path, PathBuf};

use openssl::x509::X509;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{CertificateSource, ScanBatch};
use crate::certificate::CertificateRecord;
use crate::error::CertificateError;

const PEM_BEGIN: &[u8] = b"-----BEGIN ";
const PEM_DASHES: &[u8] = b"-----";
const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// A single certificate file: a PEM bundle or one DER certificate.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }
}

impl CertificateSource for FileSource {
    fn load(&self, cancel: &CancellationToken) -> ScanBatch {
        load_file(&self.path, cancel)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// Reads `path` and decodes it with [`decode`].
pub fn load_file(path: &Path, cancel: &CancellationToken) -> ScanBatch {
    if cancel.is_cancelled() {
        return ScanBatch::from_error(CertificateError::cancelled(path));
    }

    debug!(path = %path.display(), "loading certificates from file");

    match fs::read(path) {
        Ok(data) => decode(path, &data),
        Err(e) => ScanBatch::from_error(CertificateError::read(path, e)),
    }
}

/// Decodes the full content of one file.
///
/// PEM blocks are recognised by begin lines, wherever they appear in the
/// file. `CERTIFICATE` blocks become records; any other block type is
/// skipped. A malformed certificate block costs the file one parse error
/// but the other blocks still count. A file whose certificate blocks are
/// all malformed reports only that parse error, not a PEM error as well;
/// the PEM error is for files with no certificate block at all. Content
/// without any begin line is tried as a single DER certificate.
pub fn decode(path: &Path, data: &[u8]) -> ScanBatch {
    if data.is_empty() {
        return ScanBatch::from_error(CertificateError::pem(path, "empty file"));
    }

    let blocks = split_pem_blocks(data);
    if blocks.is_empty() {
        debug!(path = %path.display(), "no PEM blocks found, trying DER");
        return decode_der(path, data);
    }

    let mut batch = ScanBatch::new();
    let mut certificate_blocks = 0usize;
    let mut parse_failures: Vec<String> = Vec::new();

    for block in blocks {
        let tag = block_tag(block);
        if tag != Some(CERTIFICATE_TAG) {
            debug!(
                path = %path.display(),
                block_type = tag.unwrap_or("<unreadable>"),
                "ignoring PEM block"
            );
            continue;
        }
        certificate_blocks += 1;

        let parsed = pem::parse(block)
            .map_err(|e| e.to_string())
            .and_then(|p| X509::from_der(p.contents()).map_err(|e| e.to_string()))
            .and_then(|cert| CertificateRecord::from_x509(path, &cert).map_err(|e| e.to_string()));

        match parsed {
            Ok(record) => batch.records.push(record),
            Err(cause) => parse_failures.push(cause),
        }
    }

    if let Some(first) = parse_failures.first() {
        let cause = match parse_failures.len() {
            1 => first.clone(),
            n => format!("{} (and {} more malformed blocks)", first, n - 1),
        };
        batch.errors.push(CertificateError::parse(path, cause));
    }

    if certificate_blocks == 0 {
        batch
            .errors
            .push(CertificateError::pem(path, "no certificate block found"));
    }

    batch
}

fn decode_der(path: &Path, data: &[u8]) -> ScanBatch {
    let parsed = X509::from_der(data).and_then(|cert| CertificateRecord::from_x509(path, &cert));
    match parsed {
        Ok(record) => ScanBatch {
            records: vec![record],
            errors: Vec::new(),
        },
        Err(e) => ScanBatch::from_error(CertificateError::pem(
            path,
            format!("neither PEM nor DER X.509: {}", e),
        )),
    }
}

/// Splits `data` into slices that each start at a PEM begin line and run up
/// to the next one. Only markers at the start of a line that form a complete
/// begin line count; anything else is surrounding text.
fn split_pem_blocks(data: &[u8]) -> Vec<&[u8]> {
    let starts: Vec<usize> = line_starts(data)
        .filter(|&start| block_tag(&data[start..]).is_some())
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(data.len());
            &data[start..end]
        })
        .collect()
}

fn line_starts(data: &[u8]) -> impl Iterator<Item = usize> + '_ {
    std::iter::once(0)
        .chain(
            data.iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .map(|(i, _)| i + 1),
        )
        .filter(move |&start| start < data.len())
}

/// The label of a block's begin line, e.g. `CERTIFICATE`. The line must be
/// exactly `-----BEGIN <label>-----`.
fn block_tag(block: &[u8]) -> Option<&str> {
    let rest = block.strip_prefix(PEM_BEGIN)?;
    let len = rest.windows(PEM_DASHES.len()).position(|w| w == PEM_DASHES)?;
    let after = &rest[len + PEM_DASHES.len()..];
    if !(after.is_empty() || after.starts_with(b"\n") || after.starts_with(b"\r\n")) {
        return None;
    }
    let tag = std::str::from_utf8(&rest[..len]).ok()?;
    if tag.contains('\n') {
        return None;
    }
    Some(tag)
}
