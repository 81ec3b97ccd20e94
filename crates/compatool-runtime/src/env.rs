use compatool_catalog::{GraphicsSettings, RuntimeSettings};

/// Libraries that must resolve to the translation layer's own builds. The
/// mode for the Direct3D group is appended at compose time.
const BASE_DLL_OVERRIDES: &str = "msquic=,mscoree=n,b;d3d9,d3d11,d3d10core,dxgi=";

pub const GAMEMODE_PRELOAD: &str = "libgamemodeauto.so.0";
pub const PRELOAD_SEPARATOR: char = ':';

pub const PREFIX_VAR: &str = "WINEPREFIX";
pub const DLL_OVERRIDES_VAR: &str = "WINEDLLOVERRIDES";
pub const DEBUG_VAR: &str = "WINEDEBUG";
pub const ENGINE_MARKER_VAR: &str = "XL_WINEONLINUX";
pub const PRELOAD_VAR: &str = "LD_PRELOAD";
pub const HUD_VAR: &str = "DXVK_HUD";
pub const ASYNC_VAR: &str = "DXVK_ASYNC";
pub const NVAPI_VAR: &str = "DXVK_ENABLE_NVAPI";
pub const ESYNC_VAR: &str = "WINEESYNC";
pub const FSYNC_VAR: &str = "WINEFSYNC";

/// Ordered variable set for one launch. Setting an existing key replaces its
/// value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedEnvironment {
    vars: Vec<(String, String)>,
}

impl ComposedEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.vars.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.vars.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> IntoIterator for &'a ComposedEnvironment {
    type Item = &'a (String, String);
    type IntoIter = std::slice::Iter<'a, (String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

/// The slice of the host environment the composer reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnv {
    pub preload: String,
}

impl HostEnv {
    pub fn from_process() -> Self {
        Self {
            preload: std::env::var(PRELOAD_VAR).unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn with_preload(mut self, preload: &str) -> Self {
        preload.clone_into(&mut self.preload);
        self
    }
}

/// Append `lib` to a preload list unless it is already listed.
pub fn stack_preload(existing: &str, lib: &str) -> String {
    if existing.contains(lib) {
        existing.to_owned()
    } else if existing.is_empty() {
        lib.to_owned()
    } else {
        format!("{existing}{PRELOAD_SEPARATOR}{lib}")
    }
}

fn toggle(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

/// Builds the process environment for launches inside one prefix.
#[derive(Debug, Clone)]
pub struct EnvironmentComposer {
    runtime: RuntimeSettings,
    graphics: GraphicsSettings,
}

impl EnvironmentComposer {
    pub fn new(runtime: RuntimeSettings, graphics: GraphicsSettings) -> Self {
        Self { runtime, graphics }
    }

    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub fn graphics(&self) -> &GraphicsSettings {
        &self.graphics
    }

    /// Compose the variables for one launch.
    ///
    /// `legacy_renderer` forces the host OpenGL path for this process even when
    /// the graphics shim is installed. Entries in `overrides` are applied last
    /// and always win.
    pub fn compose(
        &self,
        host: &HostEnv,
        legacy_renderer: bool,
        overrides: &[(String, String)],
    ) -> ComposedEnvironment {
        let rt = &self.runtime;
        let gfx = &self.graphics;
        let ogl = legacy_renderer || !gfx.shim_enabled();
        let mut env = ComposedEnvironment::new();

        env.set(PREFIX_VAR, rt.prefix.to_string_lossy());
        env.set(
            DLL_OVERRIDES_VAR,
            format!(
                "{BASE_DLL_OVERRIDES}{};{}",
                if ogl { "b" } else { "n,b" },
                gfx.extra_dll_overrides
            ),
        );
        if !ogl && gfx.upscaler_enabled() {
            env.set(NVAPI_VAR, "1");
        }

        if !rt.debug_flags.is_empty() {
            env.set(DEBUG_VAR, rt.debug_flags.as_str());
        }

        env.set(ENGINE_MARKER_VAR, "true");

        let preload = if gfx.gamemode {
            stack_preload(&host.preload, GAMEMODE_PRELOAD)
        } else {
            host.preload.clone()
        };
        env.set(PRELOAD_VAR, preload);

        env.set(HUD_VAR, gfx.hud.env_value());
        env.set(ASYNC_VAR, toggle(gfx.async_shaders));

        env.set(ESYNC_VAR, toggle(rt.sync.esync));
        env.set(FSYNC_VAR, toggle(rt.sync.fsync));

        for (key, value) in overrides {
            env.set(key.as_str(), value.as_str());
        }
        env
    }
}
