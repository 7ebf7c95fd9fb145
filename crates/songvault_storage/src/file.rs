//! File-based storage backend for persistent storage.
//!
//! Layout of a cache directory:
//!
//! ```text
//! <cache_path>/
//! ├─ LOCK              # Advisory lock for single-process access
//! ├─ 736f6e672f31.doc  # One file per document, named by hex of the key
//! └─ 7072656673.doc
//! ```
//!
//! Each document write goes to a temporary file and is renamed into place,
//! so a crash mid-write leaves either the old blob or the new one.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const DOC_EXTENSION: &str = "doc";
const TEMP_EXTENSION: &str = "tmp";

/// A file-based storage backend.
///
/// Documents survive process restarts. The backend holds an exclusive
/// advisory lock on the cache directory for its whole lifetime; a second
/// open of the same directory fails with [`StorageError::Locked`].
///
/// # Durability
///
/// Every `put` writes a temp file, syncs it, and renames it over the final
/// path. `flush` syncs the directory entry on platforms where that matters.
///
/// # Example
///
/// ```no_run
/// use songvault_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("song_cache")).unwrap();
/// backend.put("song/intro", b"payload").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    /// Serializes writes so temp-file names never collide.
    write_lock: Mutex<()>,
    _lock_file: File,
}

impl FileBackend {
    /// Opens or creates a cache directory at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - Another process holds the lock (`StorageError::Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> StorageResult<Self> {
        fs::create_dir_all(path)?;

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the cache directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn doc_path(&self, key: &str) -> PathBuf {
        self.path
            .join(format!("{}.{DOC_EXTENSION}", hex::encode(key.as_bytes())))
    }

    fn key_from_file_name(name: &str) -> Option<String> {
        let stem = name.strip_suffix(&format!(".{DOC_EXTENSION}"))?;
        let bytes = hex::decode(stem).ok()?;
        String::from_utf8(bytes).ok()
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.doc_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let _guard = self.write_lock.lock();

        let final_path = self.doc_path(key);
        let temp_path = final_path.with_extension(TEMP_EXTENSION);

        {
            let mut temp = File::create(&temp_path)?;
            std::io::Write::write_all(&mut temp, value)?;
            temp.sync_all()?;
        }
        fs::rename(&temp_path, &final_path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.doc_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(key) = Self::key_from_file_name(name) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn flush(&self) -> StorageResult<()> {
        // Individual puts already sync their contents; sync the directory
        // entry so renames are durable too.
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    fn usage(&self) -> StorageResult<u64> {
        let mut total = 0u64;
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(&format!(".{DOC_EXTENSION}")) {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }

    fn capacity(&self) -> StorageResult<Option<u64>> {
        // OS file systems expose no practical per-application budget here.
        Ok(None)
    }

    fn wipe(&self) -> StorageResult<()> {
        let _guard = self.write_lock.lock();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name != LOCK_FILE {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}
