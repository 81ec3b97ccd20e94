use crate::env::{ComposedEnvironment, EnvironmentComposer, HostEnv, PREFIX_VAR};
use crate::relay::{LogRelay, LogSink, RelayStats};
use crate::RuntimeError;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

pub const WINE64: &str = "wine64";
pub const WINESERVER: &str = "wineserver";

/// The runtime's bin directory and the two executables it must contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WineBinaries {
    bin_dir: PathBuf,
}

impl WineBinaries {
    pub fn new(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
        }
    }

    #[inline]
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    #[inline]
    pub fn wine64(&self) -> PathBuf {
        self.bin_dir.join(WINE64)
    }

    #[inline]
    pub fn wineserver(&self) -> PathBuf {
        self.bin_dir.join(WINESERVER)
    }

    /// Fail with the first missing executable and the directory checked.
    pub fn verify(&self) -> Result<(), RuntimeError> {
        for name in [WINE64, WINESERVER] {
            if !self.bin_dir.join(name).is_file() {
                return Err(RuntimeError::MissingBinary {
                    binary: name.to_owned(),
                    searched: self.bin_dir.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Arguments passed to `wine64`, either pre-split or as one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Args(Vec<String>),
    CommandLine(String),
}

impl Invocation {
    pub fn args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Args(args.into_iter().map(Into::into).collect())
    }

    pub fn command_line(line: impl Into<String>) -> Self {
        Self::CommandLine(line.into())
    }

    pub fn to_args(&self) -> Vec<String> {
        match self {
            Self::Args(args) => args.clone(),
            Self::CommandLine(line) => split_command_line(line),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Args(args) => f.write_str(&args.join(" ")),
            Self::CommandLine(line) => f.write_str(line),
        }
    }
}

/// Split a command line the way Windows argument parsing does: whitespace
/// separates arguments, double quotes group, and backslashes escape a quote
/// only when they directly precede one.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quoted = false;
    let mut backslashes = 0usize;

    for c in line.chars() {
        match c {
            '\\' => {
                backslashes += 1;
                in_arg = true;
            }
            '"' => {
                current.push_str(&"\\".repeat(backslashes / 2));
                if backslashes % 2 == 1 {
                    current.push('"');
                } else {
                    quoted = !quoted;
                }
                backslashes = 0;
                in_arg = true;
            }
            c if c.is_whitespace() && !quoted => {
                current.push_str(&"\\".repeat(backslashes));
                backslashes = 0;
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            c => {
                current.push_str(&"\\".repeat(backslashes));
                backslashes = 0;
                current.push(c);
                in_arg = true;
            }
        }
    }
    current.push_str(&"\\".repeat(backslashes));
    if in_arg {
        args.push(current);
    }
    args
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Pipe stdout so the caller can read it.
    pub redirect_stdout: bool,
    /// Relay stderr lines into the log sink on a background thread.
    pub capture_stderr: bool,
    /// Use the host OpenGL path for this process.
    pub legacy_renderer: bool,
}

impl RunOptions {
    #[must_use]
    pub fn with_stdout(mut self) -> Self {
        self.redirect_stdout = true;
        self
    }

    #[must_use]
    pub fn with_stderr_log(mut self) -> Self {
        self.capture_stderr = true;
        self
    }

    #[must_use]
    pub fn with_legacy_renderer(mut self) -> Self {
        self.legacy_renderer = true;
        self
    }
}

/// Spawns processes inside the prefix with the composed environment.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    binaries: WineBinaries,
    composer: EnvironmentComposer,
    host: HostEnv,
    sink: Option<LogSink>,
}

impl ProcessLauncher {
    pub fn new(binaries: WineBinaries, composer: EnvironmentComposer) -> Self {
        Self {
            binaries,
            composer,
            host: HostEnv::from_process(),
            sink: None,
        }
    }

    #[must_use]
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_host_env(mut self, host: HostEnv) -> Self {
        self.host = host;
        self
    }

    pub fn binaries(&self) -> &WineBinaries {
        &self.binaries
    }

    pub fn composer(&self) -> &EnvironmentComposer {
        &self.composer
    }

    pub fn compose(
        &self,
        extra_env: &[(String, String)],
        legacy_renderer: bool,
    ) -> ComposedEnvironment {
        self.composer.compose(&self.host, legacy_renderer, extra_env)
    }

    /// Start `wine64` with `invocation`. Returns as soon as the process is running.
    pub fn run(
        &self,
        invocation: &Invocation,
        working_dir: Option<&Path>,
        extra_env: &[(String, String)],
        options: RunOptions,
    ) -> Result<ProcessHandle, RuntimeError> {
        self.binaries.verify()?;

        let program = self.binaries.wine64();
        let env = self.compose(extra_env, options.legacy_renderer);
        tracing::info!("running in prefix: {} {invocation}", program.display());

        let mut cmd = Command::new(&program);
        cmd.args(invocation.to_args());
        cmd.envs(env.iter());
        if let Some(dir) = working_dir.filter(|d| !d.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }
        cmd.stdout(if options.redirect_stdout {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });
        cmd.stderr(if options.capture_stderr {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });

        let mut handle = ProcessHandle::spawn(&mut cmd, &program)?;
        if options.capture_stderr {
            if let Some(stderr) = handle.child.stderr.take() {
                handle.relay = Some(LogRelay::spawn(stderr, self.sink.clone())?);
            }
        }
        Ok(handle)
    }

    /// Start `wineserver` with only the prefix variable added to the host environment.
    pub fn run_server(&self, args: &[&str]) -> Result<ProcessHandle, RuntimeError> {
        self.binaries.verify()?;

        let program = self.binaries.wineserver();
        tracing::info!("running {} {}", program.display(), args.join(" "));
        let mut cmd = Command::new(&program);
        cmd.args(args)
            .env(PREFIX_VAR, &self.composer.runtime().prefix);
        ProcessHandle::spawn(&mut cmd, &program)
    }

    /// Run to completion with stdout piped and return it, lossily decoded.
    pub fn output(&self, invocation: &Invocation) -> Result<String, RuntimeError> {
        let mut handle = self.run(invocation, None, &[], RunOptions::default().with_stdout())?;
        let out = handle.read_stdout()?;
        handle.wait()?;
        Ok(out)
    }
}

/// A started process. Dropping the handle does not stop the process.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    program: String,
    relay: Option<LogRelay>,
    relay_stats: Option<RelayStats>,
}

impl ProcessHandle {
    fn spawn(cmd: &mut Command, program: &Path) -> Result<Self, RuntimeError> {
        let program = program.display().to_string();
        let child = cmd.spawn().map_err(|source| RuntimeError::Spawn {
            program: program.clone(),
            source,
        })?;
        tracing::debug!("started {program} as pid {}", child.id());
        Ok(Self {
            child,
            program,
            relay: None,
            relay_stats: None,
        })
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Read piped stdout until EOF. Empty when stdout was not redirected.
    pub fn read_stdout(&mut self) -> Result<String, RuntimeError> {
        let Some(mut stdout) = self.child.stdout.take() else {
            return Ok(String::new());
        };
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, RuntimeError> {
        Ok(self.child.try_wait()?)
    }

    /// Block until the process exits and its stderr relay has drained.
    pub fn wait(&mut self) -> Result<ExitStatus, RuntimeError> {
        let status = self.child.wait()?;
        if let Some(relay) = self.relay.take() {
            let stats = relay.join();
            if stats.dropped > 0 {
                tracing::debug!(
                    "{}: dropped {} undecodable or overlong stderr lines",
                    self.program,
                    stats.dropped
                );
            }
            self.relay_stats = Some(stats);
        }
        tracing::debug!("{} exited with {status}", self.program);
        Ok(status)
    }

    /// `wait` on the blocking pool so async callers are not stalled.
    pub async fn wait_async(mut self) -> Result<(ExitStatus, Self), RuntimeError> {
        tokio::task::spawn_blocking(move || {
            let status = self.wait()?;
            Ok((status, self))
        })
        .await
        .map_err(|e| RuntimeError::Join(e.to_string()))?
    }

    pub fn kill(&mut self) -> Result<(), RuntimeError> {
        Ok(self.child.kill()?)
    }

    /// Stderr relay counters: live while running, final after `wait`.
    pub fn relay_stats(&self) -> Option<RelayStats> {
        self.relay
            .as_ref()
            .map(LogRelay::stats)
            .or(self.relay_stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain_and_quoted() {
        assert_eq!(
            split_command_line(r#"winedbg --command "info proc""#),
            vec!["winedbg", "--command", "info proc"]
        );
        assert_eq!(
            split_command_line("cmd /c dir %userprofile%/Documents > nul"),
            vec!["cmd", "/c", "dir", "%userprofile%/Documents", ">", "nul"]
        );
    }

    #[test]
    fn split_whitespace_runs_and_empty() {
        assert_eq!(split_command_line("  a   b  "), vec!["a", "b"]);
        assert!(split_command_line("   ").is_empty());
        assert_eq!(split_command_line(r#"a "" b"#), vec!["a", "", "b"]);
    }

    #[test]
    fn split_backslashes() {
        assert_eq!(
            split_command_line(r"C:\Program Files\x.exe"),
            vec![r"C:\Program", r"Files\x.exe"]
        );
        assert_eq!(
            split_command_line(r#""C:\Program Files\x.exe" -a"#),
            vec![r"C:\Program Files\x.exe", "-a"]
        );
        assert_eq!(split_command_line(r#"a\"b"#), vec![r#"a"b"#]);
        assert_eq!(split_command_line(r#""a\\" b"#), vec![r"a\", "b"]);
        assert_eq!(split_command_line(r"trail\\"), vec![r"trail\\"]);
    }

    #[test]
    fn invocation_args() {
        let inv = Invocation::args(["winepath", "--windows", "/home/u/game dir"]);
        assert_eq!(inv.to_args().len(), 3);
        assert_eq!(inv.to_string(), "winepath --windows /home/u/game dir");
        let inv = Invocation::command_line("reg add \"HKCU\\Software\\Wine\" /f");
        assert_eq!(inv.to_args(), vec!["reg", "add", r"HKCU\Software\Wine", "/f"]);
    }

    #[test]
    fn verify_names_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let bins = WineBinaries::new(dir.path());
        match bins.verify().unwrap_err() {
            RuntimeError::MissingBinary { binary, searched } => {
                assert_eq!(binary, WINE64);
                assert_eq!(searched, dir.path());
            }
            other => panic!("unexpected error: {other}"),
        }

        std::fs::write(dir.path().join(WINE64), b"").unwrap();
        match bins.verify().unwrap_err() {
            RuntimeError::MissingBinary { binary, .. } => assert_eq!(binary, WINESERVER),
            other => panic!("unexpected error: {other}"),
        }

        std::fs::write(dir.path().join(WINESERVER), b"").unwrap();
        bins.verify().unwrap();
    }

    #[test]
    fn run_options_builders() {
        let o = RunOptions::default().with_stdout().with_stderr_log();
        assert!(o.redirect_stdout && o.capture_stderr && !o.legacy_renderer);
        assert!(RunOptions::default().with_legacy_renderer().legacy_renderer);
    }
}
