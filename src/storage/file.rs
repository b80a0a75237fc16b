//! File-backed storage backend
//!
//! One file per key under a private directory. Short keys are stored under
//! the hex encoding of the key, so keys may contain any character. Keys too
//! long for a file name are stored under their SHA-256 digest, with the
//! hex-encoded key on the first line of the file.

use super::{StorageBackend, StorageError};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXTENSION: &str = "kv";
const HASHED_EXTENSION: &str = "kvh";

/// Longest key kept under its own hex name (200 chars plus extension)
const MAX_PLAIN_KEY_BYTES: usize = 100;

/// Where a key lives on disk
struct Slot {
    path: PathBuf,
    /// Hex key header expected on the first line of a hashed file
    header: Option<String>,
}

/// Directory of persisted key-value files
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (creating if needed) a storage directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(dir.display().to_string(), e))?;

        // Set restrictive permissions
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            fs::set_permissions(&dir, perms)
                .map_err(|e| StorageError::io(dir.display().to_string(), e))?;
        }

        Ok(Self { dir })
    }

    /// Storage directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_for(&self, key: &str) -> Result<Slot, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        if key.len() <= MAX_PLAIN_KEY_BYTES {
            return Ok(Slot {
                path: self
                    .dir
                    .join(format!("{}.{}", hex::encode(key.as_bytes()), EXTENSION)),
                header: None,
            });
        }

        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        Ok(Slot {
            path: self.dir.join(format!("{}.{}", digest, HASHED_EXTENSION)),
            header: Some(hex::encode(key.as_bytes())),
        })
    }

    fn key_for(path: &Path) -> Option<String> {
        let bytes = match path.extension()?.to_str()? {
            EXTENSION => hex::decode(path.file_stem()?.to_str()?).ok()?,
            HASHED_EXTENSION => {
                let content = fs::read_to_string(path).ok()?;
                let (header, _) = content.split_once('\n')?;
                hex::decode(header).ok()?
            }
            _ => return None,
        };
        String::from_utf8(bytes).ok()
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let slot = self.slot_for(key)?;
        let content = match fs::read_to_string(&slot.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(key, e)),
        };

        let Some(expected) = slot.header else {
            return Ok(Some(content));
        };
        match content.split_once('\n') {
            Some((header, value)) if header == expected => Ok(Some(value.to_string())),
            _ => {
                warn!("Hashed storage file for {} belongs to another key", key);
                Ok(None)
            }
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let slot = self.slot_for(key)?;
        let path = slot.path;
        let tmp = path.with_extension("tmp");

        let written = match slot.header {
            Some(header) => fs::write(&tmp, format!("{}\n{}", header, value)),
            None => fs::write(&tmp, value),
        };
        written.map_err(|e| StorageError::io(key, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&tmp, perms).map_err(|e| StorageError::io(key, e))?;
        }

        fs::rename(&tmp, &path).map_err(|e| StorageError::io(key, e))?;
        debug!("Stored {} ({} bytes)", key, value.len());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let path = self.slot_for(key)?.path;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| StorageError::io(self.dir.display().to_string(), e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(self.dir.display().to_string(), e))?;
            if let Some(key) = Self::key_for(&entry.path()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn clear(&self) -> Result<(), StorageError> {
        for key in self.list_keys()? {
            self.remove_item(&key)?;
        }
        Ok(())
    }
}
