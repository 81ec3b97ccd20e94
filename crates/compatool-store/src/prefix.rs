use crate::layout::system32_dir;
use crate::StoreError;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory lifecycle of one prefix.
///
/// Prefixes are never removed implicitly; `purge` exists for explicit
/// operator action only.
#[derive(Debug, Clone)]
pub struct PrefixManager {
    prefix: PathBuf,
}

impl PrefixManager {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.prefix
    }

    #[inline]
    pub fn system32(&self) -> PathBuf {
        system32_dir(&self.prefix)
    }

    /// Create the prefix directory. Returns true if it did not exist before.
    pub fn ensure_exists(&self) -> Result<bool, StoreError> {
        if self.prefix.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&self.prefix)?;
        tracing::debug!("created prefix directory {}", self.prefix.display());
        Ok(true)
    }

    /// True once the runtime has populated the prefix with its Windows tree.
    pub fn is_initialized(&self) -> bool {
        self.prefix.join("drive_c").is_dir()
    }

    pub fn purge(&self) -> Result<(), StoreError> {
        if self.prefix.exists() {
            tracing::info!("removing prefix {}", self.prefix.display());
            fs::remove_dir_all(&self.prefix)?;
        }
        Ok(())
    }
}
