use crate::StoreError;
use std::fs;
use std::path::Path;

pub const DEFAULT_RETENTION_THRESHOLD: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionOutcome {
    /// Fewer entries than the threshold; the root was left alone.
    Kept(usize),
    /// The root held this many entries and was emptied.
    Purged(usize),
}

/// Count-based cache purge.
///
/// Once a cache root holds `threshold` or more entries, everything under it is
/// deleted. This runs before acquisitions, so a purge costs at most one
/// re-download of the artifacts currently in use.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    threshold: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_THRESHOLD)
    }
}

impl RetentionPolicy {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    #[inline]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Apply the policy to `root`. A missing root is created.
    pub fn enforce(&self, root: &Path) -> Result<RetentionOutcome, StoreError> {
        if !root.exists() {
            fs::create_dir_all(root)?;
            return Ok(RetentionOutcome::Kept(0));
        }

        let count = fs::read_dir(root)?.count();
        if count < self.threshold {
            return Ok(RetentionOutcome::Kept(count));
        }

        tracing::info!(
            "{} holds {count} entries (threshold {}), purging",
            root.display(),
            self.threshold
        );
        fs::remove_dir_all(root)?;
        fs::create_dir_all(root)?;
        Ok(RetentionOutcome::Purged(count))
    }
}
