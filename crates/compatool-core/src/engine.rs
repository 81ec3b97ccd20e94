use crate::CoreError;
use compatool_catalog::{
    dxvk_release, nvapi_release, GraphicsSettings, ResolvedConfig, RuntimeSettings,
};
use compatool_runtime::{
    fsync_support, EnvironmentComposer, FsyncSupport, HostEnv, IdentityResolver, Invocation,
    LogSink, PathDirection, ProcessHandle, ProcessLauncher, RunOptions, WineBinaries,
};
use compatool_store::{
    nvngx_search_dirs_from_env, project_nvngx, ArtifactAcquirer, ArtifactSource, HttpSource,
    PrefixManager, RetentionPolicy, ToolLayout,
};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const WARM_UP_COMMAND: &str = "cmd /c dir %userprofile%/Documents > nul";

/// Collaborators an engine is built with. The defaults talk to the network
/// and read the host environment.
#[derive(Clone)]
pub struct EngineOptions {
    pub source: Arc<dyn ArtifactSource>,
    pub retention: RetentionPolicy,
    pub host_env: HostEnv,
    pub nvngx_search_roots: Vec<PathBuf>,
    pub temp_dir: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            source: Arc::new(HttpSource::new()),
            retention: RetentionPolicy::default(),
            host_env: HostEnv::from_process(),
            nvngx_search_roots: nvngx_search_dirs_from_env(),
            temp_dir: None,
        }
    }
}

impl EngineOptions {
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn ArtifactSource>) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    #[must_use]
    pub fn with_host_env(mut self, host_env: HostEnv) -> Self {
        self.host_env = host_env;
        self
    }

    #[must_use]
    pub fn with_nvngx_search_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.nvngx_search_roots = roots;
        self
    }

    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

/// Compatibility runtime for one tools root and one prefix.
///
/// Cloning is cheap and clones share readiness state. Nothing here locks the
/// caches or the prefix: callers run at most one `ensure_tool` at a time per
/// tools root.
#[derive(Clone)]
pub struct CompatEngine {
    inner: Arc<Inner>,
}

struct Inner {
    layout: ToolLayout,
    graphics: GraphicsSettings,
    game_dir: Option<PathBuf>,
    acquirer: ArtifactAcquirer,
    launcher: ProcessLauncher,
    prefix: PrefixManager,
    nvngx_roots: Vec<PathBuf>,
    ready: AtomicBool,
}

impl CompatEngine {
    pub fn new(
        tools_root: impl Into<PathBuf>,
        runtime: RuntimeSettings,
        graphics: GraphicsSettings,
        game_dir: Option<PathBuf>,
    ) -> Result<Self, CoreError> {
        Self::with_options(
            tools_root,
            runtime,
            graphics,
            game_dir,
            EngineOptions::default(),
        )
    }

    pub fn from_config(config: &ResolvedConfig, options: EngineOptions) -> Result<Self, CoreError> {
        Self::with_options(
            &config.tools_root,
            config.runtime.clone(),
            config.graphics.clone(),
            config.game_dir.clone(),
            options,
        )
    }

    /// Build the engine.
    ///
    /// Each artifact cache root is purged first if it has reached the
    /// retention threshold. The cache roots, the prefix directory, and the
    /// log file are then created; the log file is truncated.
    pub fn with_options(
        tools_root: impl Into<PathBuf>,
        runtime: RuntimeSettings,
        graphics: GraphicsSettings,
        game_dir: Option<PathBuf>,
        options: EngineOptions,
    ) -> Result<Self, CoreError> {
        let layout = ToolLayout::new(tools_root);
        for root in [layout.dxvk_dir(), layout.nvapi_dir(), layout.wine_dir()] {
            options.retention.enforce(&root)?;
        }
        layout.initialize()?;

        let prefix = PrefixManager::new(&runtime.prefix);
        prefix.ensure_exists()?;

        if runtime.sync.fsync {
            let support = fsync_support();
            if support != FsyncSupport::Supported {
                warn!("fsync requested: {support}");
            }
        }

        let sink = LogSink::file(&runtime.log_file)?;
        let binaries = WineBinaries::new(runtime.bin_path(&layout.wine_dir()));
        debug!("runtime binaries expected in {}", binaries.bin_dir().display());
        let launcher = ProcessLauncher::new(
            binaries,
            EnvironmentComposer::new(runtime, graphics.clone()),
        )
        .with_log_sink(sink)
        .with_host_env(options.host_env);

        let mut acquirer = ArtifactAcquirer::new(options.source);
        if let Some(dir) = options.temp_dir {
            acquirer = acquirer.with_temp_dir(dir);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                layout,
                graphics,
                game_dir,
                acquirer,
                launcher,
                prefix,
                nvngx_roots: options.nvngx_search_roots,
                ready: AtomicBool::new(false),
            }),
        })
    }

    #[inline]
    pub fn layout(&self) -> &ToolLayout {
        &self.inner.layout
    }

    #[inline]
    pub fn runtime(&self) -> &RuntimeSettings {
        self.inner.launcher.composer().runtime()
    }

    #[inline]
    pub fn graphics(&self) -> &GraphicsSettings {
        &self.inner.graphics
    }

    #[inline]
    pub fn launcher(&self) -> &ProcessLauncher {
        &self.inner.launcher
    }

    #[inline]
    pub fn prefix(&self) -> &Path {
        self.inner.prefix.path()
    }

    /// The runtime entry point exists and the prefix directory is present.
    pub fn is_tool_downloaded(&self) -> bool {
        self.inner.launcher.binaries().wine64().is_file() && self.inner.prefix.path().is_dir()
    }

    /// Set once `ensure_tool` has completed in this engine (or a clone).
    pub fn is_tool_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Make the runtime usable: acquire the managed runtime, warm the prefix
    /// up, then acquire the enabled shims and copy their payloads into the
    /// prefix. Cached artifacts are trusted as found; payload copies run on
    /// every call.
    pub fn ensure_tool(&self) -> Result<(), CoreError> {
        let inner = &self.inner;
        let runtime = self.runtime();

        if let Some(release) = runtime.release() {
            inner.acquirer.ensure(release, &inner.layout.wine_dir())?;
        }
        inner.launcher.binaries().verify()?;

        self.ensure_prefix()?;

        let system32 = inner.prefix.system32();
        if let Some(dxvk) = dxvk_release(inner.graphics.dxvk) {
            let root = inner.layout.dxvk_dir();
            inner.acquirer.ensure(&dxvk, &root)?;
            ArtifactAcquirer::install_payload(&dxvk, &root, &system32)?;
        }
        if let Some(nvapi) = nvapi_release(inner.graphics.nvapi) {
            let root = inner.layout.nvapi_dir();
            inner.acquirer.ensure(&nvapi, &root)?;
            ArtifactAcquirer::install_payload(&nvapi, &root, &system32)?;
            if let Some(ref game_dir) = inner.game_dir {
                project_nvngx(game_dir, inner.prefix.path(), &inner.nvngx_roots)?;
            }
        }

        inner.ready.store(true, Ordering::Release);
        info!("compatibility tool ready");
        Ok(())
    }

    /// `ensure_tool` on the blocking pool.
    pub async fn ensure_tool_async(&self) -> Result<(), CoreError> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.ensure_tool())
            .await
            .map_err(|e| CoreError::Task(e.to_string()))?
    }

    /// Create the prefix if needed and let the runtime initialize it.
    pub fn ensure_prefix(&self) -> Result<(), CoreError> {
        self.inner.prefix.ensure_exists()?;
        let status = self.warm_up()?;
        if !status.success() {
            debug!("prefix warm-up exited with {status}");
        }
        Ok(())
    }

    /// Run a trivial command so the runtime builds its registry and drive
    /// mappings, and wait for it.
    pub fn warm_up(&self) -> Result<ExitStatus, CoreError> {
        info!("warming up prefix {}", self.prefix().display());
        let mut handle = self.inner.launcher.run(
            &Invocation::command_line(WARM_UP_COMMAND),
            None,
            &[],
            RunOptions::default(),
        )?;
        Ok(handle.wait()?)
    }

    pub fn run_in_prefix(
        &self,
        invocation: &Invocation,
        working_dir: Option<&Path>,
        extra_env: &[(String, String)],
        options: RunOptions,
    ) -> Result<ProcessHandle, CoreError> {
        Ok(self
            .inner
            .launcher
            .run(invocation, working_dir, extra_env, options)?)
    }

    /// Stop every process in the prefix through `wineserver -k`.
    pub fn kill(&self) -> Result<(), CoreError> {
        info!("killing wineserver for {}", self.prefix().display());
        let mut handle = self.inner.launcher.run_server(&["-k"])?;
        handle.wait()?;
        Ok(())
    }

    pub fn add_registry_key(
        &self,
        key: &str,
        value: &str,
        data: &str,
    ) -> Result<ExitStatus, CoreError> {
        let mut handle = self.run_in_prefix(
            &Invocation::args(["reg", "add", key, "/v", value, "/d", data, "/f"]),
            None,
            &[],
            RunOptions::default(),
        )?;
        Ok(handle.wait()?)
    }

    pub fn get_process_ids(&self, executable: &str) -> Result<Vec<u32>, CoreError> {
        Ok(IdentityResolver::new(&self.inner.launcher).list_processes_by_name(executable)?)
    }

    /// First emulated pid for `executable`, if any is running.
    pub fn get_process_id(&self, executable: &str) -> Result<Option<u32>, CoreError> {
        Ok(self.get_process_ids(executable)?.first().copied())
    }

    pub fn get_unix_process_id(&self, wine_pid: u32) -> Result<Option<u32>, CoreError> {
        Ok(IdentityResolver::new(&self.inner.launcher).resolve_host_pid(wine_pid)?)
    }

    pub fn unix_to_wine_path(&self, path: &Path) -> Result<Option<String>, CoreError> {
        Ok(IdentityResolver::new(&self.inner.launcher)
            .path_translate(path, PathDirection::ToWindows)?)
    }

    pub fn wine_to_unix_path(&self, path: &str) -> Result<Option<String>, CoreError> {
        Ok(IdentityResolver::new(&self.inner.launcher)
            .path_translate(Path::new(path), PathDirection::ToUnix)?)
    }
}
