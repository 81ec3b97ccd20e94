use crate::distro::Distro;
use crate::release::{wine_release, DxvkVersion, NvapiVersion, WineVersion};
use crate::settings::{GraphicsSettings, HudType, RuntimeSettings, StartupMode};
use crate::CatalogError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk configuration, usually `compatool.toml`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CompatConfig {
    pub paths: PathsSection,
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub graphics: GraphicsSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PathsSection {
    /// Root holding the artifact caches and, by default, the prefix.
    pub tools_root: PathBuf,
    #[serde(default)]
    pub game_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    #[serde(default)]
    pub startup: StartupMode,
    #[serde(default)]
    pub version: WineVersion,
    #[serde(default)]
    pub custom_bin_path: Option<PathBuf>,
    #[serde(default)]
    pub prefix: Option<PathBuf>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_debug_flags")]
    pub debug_flags: String,
    #[serde(default = "default_true")]
    pub esync: bool,
    #[serde(default)]
    pub fsync: bool,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            startup: StartupMode::default(),
            version: WineVersion::default(),
            custom_bin_path: None,
            prefix: None,
            log_file: None,
            debug_flags: default_debug_flags(),
            esync: true,
            fsync: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GraphicsSection {
    #[serde(default)]
    pub dxvk: DxvkVersion,
    #[serde(default)]
    pub nvapi: NvapiVersion,
    #[serde(default)]
    pub hud: HudType,
    #[serde(default)]
    pub async_shaders: bool,
    #[serde(default)]
    pub gamemode: bool,
    #[serde(default)]
    pub dll_overrides: String,
}

fn default_debug_flags() -> String {
    "-all".to_owned()
}

fn default_true() -> bool {
    true
}

/// Everything a `CompatEngine` needs, resolved from a `CompatConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub tools_root: PathBuf,
    pub game_dir: Option<PathBuf>,
    pub runtime: RuntimeSettings,
    pub graphics: GraphicsSettings,
}

impl CompatConfig {
    /// Select release descriptors for `distro` and build the settings context.
    pub fn resolve(&self, distro: Distro) -> Result<ResolvedConfig, CatalogError> {
        let rt = &self.runtime;
        let prefix = rt
            .prefix
            .clone()
            .unwrap_or_else(|| self.paths.tools_root.join("prefix"));

        let runtime = match rt.startup {
            StartupMode::Managed => {
                RuntimeSettings::managed(wine_release(rt.version, distro), prefix)
            }
            StartupMode::Custom => {
                let bin = rt.custom_bin_path.clone().ok_or_else(|| {
                    CatalogError::InvalidConfiguration(
                        "runtime.custom_bin_path is required when runtime.startup = \"custom\""
                            .to_owned(),
                    )
                })?;
                RuntimeSettings::custom(bin, prefix)
            }
        };
        let mut runtime = runtime
            .with_debug_flags(&rt.debug_flags)
            .with_sync(rt.esync, rt.fsync);
        if let Some(ref log_file) = rt.log_file {
            runtime = runtime.with_log_file(log_file);
        }

        let gfx = &self.graphics;
        let graphics = GraphicsSettings::new(gfx.dxvk, gfx.nvapi)
            .with_hud(gfx.hud.clone())
            .with_async_shaders(gfx.async_shaders)
            .with_gamemode(gfx.gamemode)
            .with_extra_dll_overrides(&gfx.dll_overrides);

        Ok(ResolvedConfig {
            tools_root: self.paths.tools_root.clone(),
            game_dir: self.paths.game_dir.clone(),
            runtime,
            graphics,
        })
    }
}

pub fn parse_config_str(input: &str) -> Result<CompatConfig, CatalogError> {
    toml::from_str(input).map_err(|e| CatalogError::InvalidConfiguration(e.to_string()))
}

pub fn load_config_file(path: impl AsRef<Path>) -> Result<CompatConfig, CatalogError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}
