//! Orchestration engine for the compatibility runtime lifecycle.
//!
//! This crate ties the catalog, store, and runtime crates together into
//! `CompatEngine`: the explicit context object that purges stale caches on
//! construction, acquires the runtime and shim artifacts, warms the prefix up,
//! projects shim payloads into it, and launches and inspects processes inside it.

pub mod engine;

pub use engine::{CompatEngine, EngineOptions};

use compatool_catalog::CatalogError;
use compatool_runtime::RuntimeError;
use compatool_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("background task failed: {0}")]
    Task(String),
}

impl CoreError {
    /// True when an acquisition failed SHA-512 verification.
    pub fn is_checksum_failure(&self) -> bool {
        matches!(self, Self::Store(StoreError::ChecksumMismatch { .. }))
    }

    /// True when launch was refused because the configuration cannot work.
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(
            self,
            Self::Catalog(CatalogError::InvalidConfiguration(_))
                | Self::Runtime(RuntimeError::MissingBinary { .. })
        )
    }
}
