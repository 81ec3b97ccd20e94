//! Artifact cache, checksum-verified acquisition, and retention for compatool.
//!
//! This crate provides the storage layer: `ToolLayout` for the per-kind cache
//! roots, `ArtifactAcquirer` which downloads (through a pluggable
//! `ArtifactSource`), verifies against SHA-512 digests, extracts, and projects
//! shim payloads into a prefix, `RetentionPolicy` for the count-based cache
//! purge, `PrefixManager` for prefix directory lifecycle, and DLSS library
//! projection for the upscaler shim.

pub mod acquire;
pub mod checksum;
pub mod extract;
pub mod layout;
pub mod nvngx;
pub mod prefix;
pub mod retention;
pub mod source;

pub use acquire::{AcquireOutcome, ArtifactAcquirer};
pub use checksum::{checksum_matches, sha512_file, verify_artifact};
pub use extract::{extract_archive, ArchiveFormat};
pub use layout::{system32_dir, ToolLayout};
pub use nvngx::{
    find_nvngx_dir, nvngx_search_dirs, nvngx_search_dirs_from_env, project_nvngx, NvngxOutcome,
    NVNGX_PATH_VAR,
};
pub use prefix::PrefixManager;
pub use retention::{RetentionOutcome, RetentionPolicy, DEFAULT_RETENTION_THRESHOLD};
pub use source::{ArtifactSource, HttpSource};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not acquire {url}: {reason}")]
    Acquisition { url: String, reason: String },
    #[error("SHA-512 checksum verification failed for {artifact}: computed {actual}, expected one of {expected:?}")]
    ChecksumMismatch {
        artifact: String,
        actual: String,
        expected: Vec<String>,
    },
    #[error("unsupported archive format for {}", .0.display())]
    UnsupportedArchive(PathBuf),
    #[error("artifact payload directory missing: {}", .0.display())]
    MissingPayload(PathBuf),
}
