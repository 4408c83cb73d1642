// src/system/storage.rs

//! Storage backends for template sources and rendered output.
//!
//! Paths are `/` separated strings (see [`crate::core::paths`]).

use crate::core::paths;
use log::trace;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::io;
use std::sync::Mutex;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("No such file: '{path}'")]
    NotFound { path: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to list '{path}': {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },

    #[error("Storage lock is poisoned.")]
    Poisoned,
}

impl StorageError {
    fn io(path: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_string(),
            }
        } else {
            Self::Io {
                path: path.to_string(),
                source,
            }
        }
    }
}

/// Where templates are read from and rendered files are written to.
pub trait Storage: Debug + Send + Sync {
    fn read(&self, path: &str) -> Result<String, StorageError>;

    /// Writes `content`, replacing any existing file. Parent directories must exist.
    fn write(&self, path: &str, content: &str) -> Result<(), StorageError>;

    /// Every file below `dir`, recursively, sorted.
    fn list(&self, dir: &str) -> Result<Vec<String>, StorageError>;

    fn exists(&self, path: &str) -> bool;

    /// Creates `dir` and its missing parents.
    fn create_dir(&self, dir: &str) -> Result<(), StorageError>;

    fn remove(&self, path: &str) -> Result<(), StorageError>;
}

// --- FILESYSTEM ---

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemStorage;

impl FileSystemStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for FileSystemStorage {
    fn read(&self, path: &str) -> Result<String, StorageError> {
        trace!("Reading '{}'", path);
        fs::read_to_string(path).map_err(|e| StorageError::io(path, e))
    }

    fn write(&self, path: &str, content: &str) -> Result<(), StorageError> {
        trace!("Writing '{}'", path);
        fs::write(path, content).map_err(|e| StorageError::io(path, e))
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, StorageError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| StorageError::Walk {
                path: dir.to_string(),
                source: e,
            })?;
            if entry.file_type().is_file() {
                files.push(paths::path_to_string(entry.path()));
            }
        }
        files.sort();
        Ok(files)
    }

    fn exists(&self, path: &str) -> bool {
        fs::metadata(path).is_ok()
    }

    fn create_dir(&self, dir: &str) -> Result<(), StorageError> {
        fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))
    }

    fn remove(&self, path: &str) -> Result<(), StorageError> {
        fs::remove_file(path).map_err(|e| StorageError::io(path, e))
    }
}

// --- IN MEMORY ---

/// A map of normalized path to file content. Directories are implied by the
/// files below them.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a storage pre-filled with `(path, content)` pairs.
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let map = files
            .into_iter()
            .map(|(path, content)| (paths::normalize(path.as_ref()), content.into()))
            .collect();
        Self {
            files: Mutex::new(map),
        }
    }

    /// A copy of every stored file.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.files
            .lock()
            .map(|files| files.clone())
            .unwrap_or_default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, path: &str) -> Result<String, StorageError> {
        let files = self.files.lock().map_err(|_| StorageError::Poisoned)?;
        files
            .get(&paths::normalize(path))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_string(),
            })
    }

    fn write(&self, path: &str, content: &str) -> Result<(), StorageError> {
        let mut files = self.files.lock().map_err(|_| StorageError::Poisoned)?;
        files.insert(paths::normalize(path), content.to_string());
        Ok(())
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, StorageError> {
        let files = self.files.lock().map_err(|_| StorageError::Poisoned)?;
        let dir = paths::normalize(dir);
        Ok(files
            .keys()
            .filter(|path| *path != &dir && paths::is_within(&dir, path))
            .cloned()
            .collect())
    }

    fn exists(&self, path: &str) -> bool {
        let path = paths::normalize(path);
        self.files.lock().is_ok_and(|files| {
            files.contains_key(&path) || files.keys().any(|f| f != &path && paths::is_within(&path, f))
        })
    }

    fn create_dir(&self, _dir: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), StorageError> {
        let mut files = self.files.lock().map_err(|_| StorageError::Poisoned)?;
        files
            .remove(&paths::normalize(path))
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_string(),
            })
    }
}
