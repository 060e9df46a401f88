//! Certificate discovery.
//!
//! A [`CertificateSource`] turns a configured location into a [`ScanBatch`]:
//! every certificate it could decode plus one [`CertificateError`] for every
//! path that could not contribute. Loading never fails as a whole; problems
//! are values in the batch.
//!
//! # Variants
//!
//! - [`FileSource`] - a single file holding PEM blocks or one DER certificate
//! - [`DirSource`] - every regular file below a directory, recursively
//!
//! Both honour a cooperative [`CancellationToken`], checked before each path
//! is opened.

mod dir;
mod file;

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::certificate::CertificateRecord;
use crate::error::{CertificateError, ErrorKind};

pub use dir::{load_tree, DirSource};
pub use file::{decode, load_file, FileSource};

/// Everything one scan cycle produced. Batches are never merged across
/// cycles; the publisher consumes one and it is dropped.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScanBatch {
    pub records: Vec<CertificateRecord>,
    pub errors: Vec<CertificateError>,
}

impl ScanBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A batch holding a single error and no records.
    pub fn from_error(error: CertificateError) -> Self {
        ScanBatch {
            records: Vec::new(),
            errors: vec![error],
        }
    }

    pub fn merge(&mut self, other: ScanBatch) {
        self.records.extend(other.records);
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.errors.is_empty()
    }

    /// Number of errors of the given kind.
    pub fn error_count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind() == kind).count()
    }
}

/// Something that can be asked for the certificates it currently holds.
///
/// Implementations must be callable from a blocking thread while the async
/// runtime keeps serving scrapes.
pub trait CertificateSource: Send + Sync {
    /// Loads every certificate reachable from this source.
    fn load(&self, cancel: &CancellationToken) -> ScanBatch;

    /// The configured root, for logging.
    fn location(&self) -> &Path;
}

/// Which on-disk layout a configured path refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Directory(PathBuf),
}

/// Builds the source for a configured location.
pub fn source_for(location: SourceLocation) -> Box<dyn CertificateSource> {
    match location {
        SourceLocation::File(path) => Box::new(FileSource::new(path)),
        SourceLocation::Directory(root) => Box::new(DirSource::new(root)),
    }
}
