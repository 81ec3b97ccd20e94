//! Release catalog, host distribution probing, and settings for compatool.
//!
//! This crate defines the data layer: immutable `ArtifactDescriptor` records for
//! every installable runtime, graphics-shim, and upscaler-shim version, the
//! `/etc/os-release` probe that picks the distribution-specific runtime build,
//! the `RuntimeSettings`/`GraphicsSettings` context handed to every other
//! component, and TOML configuration parsing (`CompatConfig`).

pub mod config;
pub mod distro;
pub mod release;
pub mod settings;

pub use config::{load_config_file, parse_config_str, CompatConfig, ResolvedConfig};
pub use distro::{detect_distro, detect_host, parse_os_release, Container, Distro, HostInfo};
pub use release::{
    dxvk_release, nvapi_release, wine_release, ArtifactDescriptor, ArtifactKind, DxvkVersion,
    NvapiVersion, WineVersion,
};
pub use settings::{
    validate_dll_overrides, validate_hud_string, GraphicsSettings, HudType, RuntimeSettings,
    RuntimeSource, StartupMode, SyncModel,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
