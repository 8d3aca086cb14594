// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `BlobStore` for the preferences host (uses platform config dir).

use directories::ProjectDirs;
use prefs_app_core::config::{BlobStore, StoreError};
use std::fs;
use std::path::{Path, PathBuf};

/// Store documents as JSON files under a base directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    base: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at the user config directory (e.g., `~/.config/Prefs`).
    pub fn new() -> Result<Self, StoreError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "Prefs")
            .ok_or_else(|| StoreError::Other("could not resolve config dir".into()))?;
        Self::at(proj.config_dir())
    }

    /// Create a store rooted at an explicit directory.
    pub fn at(base: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Directory documents are written to.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl BlobStore for FsBlobStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    // Write-then-rename so a crash mid-write never leaves a truncated document.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
