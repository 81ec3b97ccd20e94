use crate::release::{ArtifactDescriptor, DxvkVersion, NvapiVersion};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartupMode {
    /// Runtime builds are downloaded and kept under the tools root.
    #[default]
    Managed,
    /// Runtime binaries are supplied by the user.
    Custom,
}

/// Where the runtime binaries come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeSource {
    Managed(ArtifactDescriptor),
    Custom(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncModel {
    pub esync: bool,
    pub fsync: bool,
}

/// Runtime-side settings, built once at configuration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub source: RuntimeSource,
    pub prefix: PathBuf,
    pub log_file: PathBuf,
    pub debug_flags: String,
    pub sync: SyncModel,
}

impl RuntimeSettings {
    pub fn managed(release: ArtifactDescriptor, prefix: impl Into<PathBuf>) -> Self {
        let prefix = prefix.into();
        Self {
            source: RuntimeSource::Managed(release),
            log_file: default_log_file(&prefix),
            prefix,
            debug_flags: String::new(),
            sync: SyncModel::default(),
        }
    }

    pub fn custom(bin_path: impl Into<PathBuf>, prefix: impl Into<PathBuf>) -> Self {
        let prefix = prefix.into();
        Self {
            source: RuntimeSource::Custom(bin_path.into()),
            log_file: default_log_file(&prefix),
            prefix,
            debug_flags: String::new(),
            sync: SyncModel::default(),
        }
    }

    #[must_use]
    pub fn with_log_file(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.log_file = log_file.into();
        self
    }

    #[must_use]
    pub fn with_debug_flags(mut self, flags: &str) -> Self {
        flags.clone_into(&mut self.debug_flags);
        self
    }

    #[must_use]
    pub fn with_sync(mut self, esync: bool, fsync: bool) -> Self {
        self.sync = SyncModel { esync, fsync };
        self
    }

    pub fn startup_mode(&self) -> StartupMode {
        match self.source {
            RuntimeSource::Managed(_) => StartupMode::Managed,
            RuntimeSource::Custom(_) => StartupMode::Custom,
        }
    }

    pub fn release(&self) -> Option<&ArtifactDescriptor> {
        match &self.source {
            RuntimeSource::Managed(release) => Some(release),
            RuntimeSource::Custom(_) => None,
        }
    }

    /// Directory holding the runtime entry point and its server.
    ///
    /// Managed builds live at `<runtime_root>/<name>/bin`.
    pub fn bin_path(&self, runtime_root: &Path) -> PathBuf {
        match &self.source {
            RuntimeSource::Managed(release) => runtime_root.join(&release.name).join("bin"),
            RuntimeSource::Custom(path) => path.clone(),
        }
    }
}

fn default_log_file(prefix: &Path) -> PathBuf {
    prefix
        .parent()
        .unwrap_or(prefix)
        .join("logs")
        .join("wine.log")
}

/// Overlay selection for the graphics shim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HudType {
    #[default]
    None,
    Fps,
    Full,
    /// A comma separated DXVK_HUD item list.
    Custom(String),
}

impl HudType {
    /// Value for the HUD selector variable. Invalid custom strings disable the HUD.
    pub fn env_value(&self) -> String {
        match self {
            Self::None => "0".to_owned(),
            Self::Fps => "fps".to_owned(),
            Self::Full => "full".to_owned(),
            Self::Custom(items) if validate_hud_string(items) => items.clone(),
            Self::Custom(items) => {
                tracing::warn!("ignoring invalid custom HUD string '{items}'");
                "0".to_owned()
            }
        }
    }
}

const HUD_WORDS: &[&str] = &[
    "devinfo",
    "fps",
    "frametimes",
    "submissions",
    "drawcalls",
    "pipelines",
    "descriptors",
    "memory",
    "gpuload",
    "version",
    "api",
    "cs",
    "compiler",
    "samplers",
];

pub fn validate_hud_string(hud: &str) -> bool {
    if hud.is_empty()
        || !hud
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b',' || b == b'=' || b == b'.')
    {
        return false;
    }
    hud.split(',').all(|item| {
        if let Some(scale) = item.strip_prefix("scale=") {
            is_decimal(scale)
        } else {
            HUD_WORDS.contains(&item)
        }
    })
}

fn is_decimal(s: &str) -> bool {
    let (int, frac) = s.split_once('.').unwrap_or((s, ""));
    let digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if s.contains('.') {
        !frac.is_empty() && digits(int) && digits(frac)
    } else {
        digits(int)
    }
}

/// Check a user supplied library override list such as `d3dcompiler_47=n,b;xinput1_3=`.
pub fn validate_dll_overrides(overrides: &str) -> bool {
    overrides
        .split(';')
        .filter(|entry| !entry.is_empty())
        .all(|entry| {
            let Some((libs, modes)) = entry.split_once('=') else {
                return false;
            };
            let libs_ok = libs.split(',').all(|lib| {
                !lib.is_empty()
                    && lib.bytes().all(|b| {
                        b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'+')
                    })
            });
            let modes_ok =
                modes.is_empty() || modes.split(',').all(|m| matches!(m, "n" | "b" | "d"));
            libs_ok && modes_ok
        })
}

/// Graphics-side settings for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GraphicsSettings {
    pub dxvk: DxvkVersion,
    pub nvapi: NvapiVersion,
    pub hud: HudType,
    pub async_shaders: bool,
    pub gamemode: bool,
    pub extra_dll_overrides: String,
}

impl GraphicsSettings {
    pub fn new(dxvk: DxvkVersion, nvapi: NvapiVersion) -> Self {
        Self {
            dxvk,
            // The upscaler shim only works on top of the graphics shim.
            nvapi: if dxvk == DxvkVersion::Disabled {
                NvapiVersion::Disabled
            } else {
                nvapi
            },
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_hud(mut self, hud: HudType) -> Self {
        self.hud = hud;
        self
    }

    #[must_use]
    pub fn with_async_shaders(mut self, on: bool) -> Self {
        self.async_shaders = on;
        self
    }

    #[must_use]
    pub fn with_gamemode(mut self, on: bool) -> Self {
        self.gamemode = on;
        self
    }

    /// Invalid override lists are dropped with a warning.
    #[must_use]
    pub fn with_extra_dll_overrides(mut self, overrides: &str) -> Self {
        if validate_dll_overrides(overrides) {
            overrides.clone_into(&mut self.extra_dll_overrides);
        } else {
            tracing::warn!("ignoring invalid DLL override list '{overrides}'");
            self.extra_dll_overrides.clear();
        }
        self
    }

    pub fn shim_enabled(&self) -> bool {
        self.dxvk != DxvkVersion::Disabled
    }

    pub fn upscaler_enabled(&self) -> bool {
        self.nvapi != NvapiVersion::Disabled
    }
}
