//! Process environment composition and execution inside a Wine prefix.
//!
//! This crate implements the execution layer: `EnvironmentComposer` builds the
//! per-launch variable set from runtime and graphics settings, `ProcessLauncher`
//! spawns `wine64` (and `wineserver`) with it, `LogRelay` streams stderr into
//! the log sink on a background thread, the `winedbg` module parses the
//! translation layer's diagnostic listings, and `IdentityResolver` maps
//! emulated process ids to host process ids on top of those parsers.

pub mod env;
pub mod host;
pub mod identity;
pub mod launcher;
pub mod relay;
pub mod winedbg;

pub use env::{stack_preload, ComposedEnvironment, EnvironmentComposer, HostEnv};
pub use host::{fsync_support, fsync_support_for_release, FsyncSupport};
pub use identity::{IdentityResolver, PathDirection};
pub use launcher::{
    split_command_line, Invocation, ProcessHandle, ProcessLauncher, RunOptions, WineBinaries,
};
pub use relay::{LogRelay, LogSink, RelayStats, MAX_LINE_BYTES};
pub use winedbg::{parse_last_line, parse_process_list, parse_process_map};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("required binary '{binary}' not found in {}", .searched.display())]
    MissingBinary { binary: String, searched: PathBuf },
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("background task failed: {0}")]
    Join(String),
}
