//! Filesystem Blob Store
//!
//! One file per container under a single media directory. Writes go through
//! a temp file in the same directory and are renamed into place, so a
//! reference never points at a partially written container.

use bridge_traits::{
    error::{BridgeError, Result},
    storage::{BlobDeletion, BlobReader, BlobRef, BlobStore},
};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use uuid::Uuid;

/// Extension of every blob written by this store.
pub const BLOB_EXTENSION: &str = "vault";

/// Filesystem-backed blob store
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(path = ?root, "Opened blob store");
        Ok(Self { root })
    }

    /// Default media directory: `<platform data dir>/<app_name>/media`.
    pub fn default_root(app_name: &str) -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join(app_name)
            .join("media")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a reference to its path, rejecting anything that could escape the
    /// store root.
    fn resolve(&self, reference: &BlobRef) -> Result<PathBuf> {
        let name = reference.as_str();
        let valid = !name.is_empty()
            && !name.contains(['/', '\\'])
            && name != "."
            && name != ".."
            && Path::new(name).extension().and_then(|e| e.to_str()) == Some(BLOB_EXTENSION);

        if !valid {
            return Err(BridgeError::OperationFailed(format!(
                "Invalid blob reference: {}",
                name
            )));
        }
        Ok(self.root.join(name))
    }

    fn fresh_reference() -> BlobRef {
        BlobRef::new(format!("{}.{}", Uuid::new_v4(), BLOB_EXTENSION))
    }
}

impl BlobStore for FsBlobStore {
    fn put_stream(&self, reader: &mut dyn Read) -> Result<BlobRef> {
        let mut temp = NamedTempFile::new_in(&self.root)?;
        let written = io::copy(reader, &mut temp)?;
        temp.flush()?;
        temp.as_file().sync_all()?;

        let reference = Self::fresh_reference();
        let path = self.resolve(&reference)?;
        // On failure the temp file is dropped and removed.
        temp.persist(&path).map_err(|e| BridgeError::Io(e.error))?;

        debug!(reference = %reference, bytes = written, "Stored blob");
        Ok(reference)
    }

    fn open(&self, reference: &BlobRef) -> Result<Box<dyn BlobReader>> {
        let path = self.resolve(reference)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(BridgeError::BlobNotFound(reference.to_string()))
            }
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    fn delete(&self, reference: &BlobRef) -> Result<BlobDeletion> {
        let path = self.resolve(reference)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(reference = %reference, "Deleted blob");
                Ok(BlobDeletion::Deleted)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(reference = %reference, "Blob already missing on delete");
                Ok(BlobDeletion::NotFound)
            }
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    fn list(&self) -> Result<Vec<BlobRef>> {
        let mut references = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                references.push(BlobRef::new(name));
            }
        }
        references.sort();
        Ok(references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom};

    fn store() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("media")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_put_open_and_seek() {
        let (_dir, store) = store();
        let reference = store.put(b"0123456789").unwrap();
        assert!(reference.as_str().ends_with(".vault"));

        let mut reader = store.open(&reference).unwrap();
        reader.seek(SeekFrom::Start(6)).unwrap();
        let mut tail = String::new();
        reader.read_to_string(&mut tail).unwrap();
        assert_eq!(tail, "6789");
    }

    #[test]
    fn test_put_stream_leaves_no_temp_files() {
        let (_dir, store) = store();
        let mut source = io::Cursor::new(vec![42u8; 100_000]);
        let reference = store.put_stream(&mut source).unwrap();

        let names: Vec<_> = fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![reference.as_str().to_string()]);
        assert_eq!(store.list().unwrap(), vec![reference]);
    }

    #[test]
    fn test_failed_stream_leaves_nothing_behind() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "source vanished"))
            }
        }

        let (_dir, store) = store();
        assert!(store.put_stream(&mut Failing).is_err());
        assert_eq!(fs::read_dir(store.root()).unwrap().count(), 0);
    }

    #[test]
    fn test_delete_reports_not_found() {
        let (_dir, store) = store();
        let reference = store.put(b"abc").unwrap();

        assert_eq!(store.delete(&reference).unwrap(), BlobDeletion::Deleted);
        assert_eq!(store.delete(&reference).unwrap(), BlobDeletion::NotFound);
        assert!(matches!(
            store.open(&reference),
            Err(BridgeError::BlobNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_escaping_references() {
        let (_dir, store) = store();
        for bad in ["../x.vault", "a/b.vault", "", "..", "plain.txt"] {
            assert!(store.open(&BlobRef::new(bad)).is_err(), "{bad} accepted");
        }
    }
}
