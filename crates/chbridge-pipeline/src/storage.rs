//! Flat-file storage seam.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Opens flat-file sources and creates flat-file destinations.
pub trait FileStorage {
    /// Filesystem location a logical path refers to, used for diagnostics.
    fn resolve(&self, path: &str) -> PathBuf;

    /// Open a source file for reading.
    fn open(&self, path: &str) -> io::Result<Box<dyn Read>>;

    /// Create (or truncate) a destination file for writing.
    fn create(&self, path: &str) -> io::Result<Box<dyn Write>>;
}

/// Local filesystem storage.
///
/// When rooted, source paths are reduced to their file name and looked up
/// inside the root directory (the upload directory). Destination paths are
/// always used as given.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    root: Option<PathBuf>,
}

impl LocalStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

impl FileStorage for LocalStorage {
    fn resolve(&self, path: &str) -> PathBuf {
        let given = Path::new(path);
        match &self.root {
            Some(root) => match given.file_name() {
                Some(name) => root.join(name),
                None => root.join(given),
            },
            None => given.to_path_buf(),
        }
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read>> {
        let file = File::open(self.resolve(path))?;
        Ok(Box::new(file))
    }

    fn create(&self, path: &str) -> io::Result<Box<dyn Write>> {
        let file = File::create(path)?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooted_storage_keeps_only_file_name() {
        let storage = LocalStorage::rooted("uploads");
        assert_eq!(
            storage.resolve("../../etc/trips.csv"),
            PathBuf::from("uploads/trips.csv")
        );
        assert_eq!(storage.resolve("trips.csv"), PathBuf::from("uploads/trips.csv"));
    }

    #[test]
    fn plain_storage_uses_path_as_given() {
        let storage = LocalStorage::new();
        assert_eq!(storage.resolve("data/trips.csv"), PathBuf::from("data/trips.csv"));
        assert!(storage.root().is_none());
    }

    #[test]
    fn open_missing_file_reports_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = LocalStorage::rooted(dir.path());
        let err = storage.open("missing.csv").err().expect("open should fail");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
