//! Filesystem-backed mirror.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::{Path, PathBuf};
use tokio::fs;

use coachsync_common::{Error, Result};

use crate::mirror::LocalMirror;

/// Characters allowed verbatim in mirror file names. Everything else is
/// percent-encoded so arbitrary keys map to exactly one file.
const FILE_NAME_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.');

/// Mirror storing one file per key under a root directory.
pub struct FileMirror {
    root: PathBuf,
}

impl FileMirror {
    /// Create a new file mirror with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Invalid path
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Create root if it doesn't exist (sync for constructor)
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self { root })
    }

    /// Convert a mirror key to its file path.
    fn to_fs_path(&self, key: &str) -> PathBuf {
        let encoded = utf8_percent_encode(key, FILE_NAME_SAFE).to_string();
        self.root.join(encoded)
    }
}

#[async_trait]
impl LocalMirror for FileMirror {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.to_fs_path(key);

        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::Storage(format!(
                "Failed to read mirror key '{}': {}",
                key, err
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.to_fs_path(key);

        // Write-then-rename: readers never observe a half-written snapshot.
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.to_fs_path(key);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Storage(format!(
                "Failed to remove mirror key '{}': {}",
                key, err
            ))),
        }
    }
}
