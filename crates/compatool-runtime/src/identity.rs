use crate::launcher::{Invocation, ProcessLauncher};
use crate::winedbg::{parse_last_line, parse_process_list, parse_process_map};
use crate::RuntimeError;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathDirection {
    /// Host path to a Windows path (`winepath --windows`).
    ToWindows,
    /// Windows path to a host path (`winepath --unix`).
    ToUnix,
}

impl PathDirection {
    fn flag(self) -> &'static str {
        match self {
            Self::ToWindows => "--windows",
            Self::ToUnix => "--unix",
        }
    }
}

/// Correlates processes across the translation boundary.
///
/// Launch failures are errors; empty or unparseable listings are not.
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver<'a> {
    launcher: &'a ProcessLauncher,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(launcher: &'a ProcessLauncher) -> Self {
        Self { launcher }
    }

    /// Emulated pids of running processes whose listing mentions `executable`.
    pub fn list_processes_by_name(&self, executable: &str) -> Result<Vec<u32>, RuntimeError> {
        let output = self
            .launcher
            .output(&Invocation::command_line(r#"winedbg --command "info proc""#))?;
        let pids = parse_process_list(&output, executable);
        tracing::debug!("{executable}: emulated pids {pids:?}");
        Ok(pids)
    }

    /// Host pid of the emulated process `emulated_pid`, if the runtime reports one.
    pub fn resolve_host_pid(&self, emulated_pid: u32) -> Result<Option<u32>, RuntimeError> {
        let output = self
            .launcher
            .output(&Invocation::command_line(r#"winedbg --command "info procmap""#))?;
        let host_pid = parse_process_map(&output, emulated_pid);
        tracing::debug!("emulated pid {emulated_pid:#x} maps to host pid {host_pid:?}");
        Ok(host_pid)
    }

    pub fn path_translate(
        &self,
        path: &Path,
        direction: PathDirection,
    ) -> Result<Option<String>, RuntimeError> {
        let output = self.launcher.output(&Invocation::args([
            "winepath".to_owned(),
            direction.flag().to_owned(),
            path.to_string_lossy().into_owned(),
        ]))?;
        Ok(parse_last_line(&output))
    }
}
