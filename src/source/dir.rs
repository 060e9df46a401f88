use std::fs;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::file::load_file;
use super::{CertificateSource, ScanBatch};
use crate::error::CertificateError;

/// Every regular file below a root directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirSource { root: root.into() }
    }
}

impl CertificateSource for DirSource {
    fn load(&self, cancel: &CancellationToken) -> ScanBatch {
        load_tree(&self.root, cancel)
    }

    fn location(&self) -> &Path {
        &self.root
    }
}

/// Walks `root` depth-first with an explicit worklist.
///
/// An entry that cannot be stat'ed or listed yields a read error and the
/// walk moves on to its siblings. Cancellation stops the walk at the next
/// path with a single unknown error; results gathered so far are kept.
/// Symlinks to files are followed, symlinks to directories are not.
/// Result order is unspecified.
pub fn load_tree(root: &Path, cancel: &CancellationToken) -> ScanBatch {
    walk(root, cancel, |path| load_file(path, cancel))
}

/// The walk behind [`load_tree`], with the per-file loader as a parameter.
fn walk<F>(root: &Path, cancel: &CancellationToken, mut load: F) -> ScanBatch
where
    F: FnMut(&Path) -> ScanBatch,
{
    let mut batch = ScanBatch::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(path) = pending.pop() {
        if cancel.is_cancelled() {
            batch.errors.push(CertificateError::cancelled(&path));
            break;
        }

        let is_root = path == root;
        let file_type = match entry_type(&path, is_root) {
            Ok(t) => t,
            Err(e) => {
                batch.errors.push(CertificateError::read(&path, e));
                continue;
            }
        };

        match file_type {
            EntryType::Directory => match fs::read_dir(&path) {
                Ok(entries) => {
                    for entry in entries {
                        match entry {
                            Ok(entry) => pending.push(entry.path()),
                            Err(e) => batch.errors.push(CertificateError::read(&path, e)),
                        }
                    }
                }
                Err(e) => batch.errors.push(CertificateError::read(&path, e)),
            },
            EntryType::File => batch.merge(load(&path)),
            EntryType::DirectoryLink => {
                debug!(path = %path.display(), "not following directory symlink");
            }
            EntryType::Other => {
                debug!(path = %path.display(), "skipping non-regular file");
            }
        }
    }

    batch
}

enum EntryType {
    Directory,
    File,
    DirectoryLink,
    Other,
}

fn entry_type(path: &Path, is_root: bool) -> std::io::Result<EntryType> {
    let meta = fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        let target = fs::metadata(path)?;
        return Ok(match (target.is_dir(), target.is_file()) {
            (true, _) if is_root => EntryType::Directory,
            (true, _) => EntryType::DirectoryLink,
            (_, true) => EntryType::File,
            _ => EntryType::Other,
        });
    }
    Ok(if meta.is_dir() {
        EntryType::Directory
    } else if meta.is_file() {
        EntryType::File
    } else {
        EntryType::Other
    })
}
