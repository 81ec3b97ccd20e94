//! Projection of the host's DLSS libraries (`nvngx.dll`, `_nvngx.dll`) into
//! the game directory and the prefix.
//!
//! The NVIDIA driver ships these libraries somewhere under its library
//! directory; their exact location differs between distributions and
//! container runtimes, so a fixed list of roots is searched recursively.

use crate::layout::system32_dir;
use crate::StoreError;
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides the search with a directory checked first.
pub const NVNGX_PATH_VAR: &str = "XL_NVNGXPATH";

const SEARCH_DEPTH: usize = 10;

const HOST_LIBRARY_DIRS: &[&str] = &[
    "/app/lib",
    "/usr/lib/extensions",
    "/usr/lib/x86_64-linux-gnu",
    "/usr/lib64",
    "/usr/lib",
    "/run/host/lib/x86_64-linux-gnu",
    "/run/host/lib64",
    "/run/host/lib",
];

const REQUIRED: [&str; 2] = ["nvngx.dll", "_nvngx.dll"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NvngxOutcome {
    /// Both destinations already held the libraries.
    AlreadyInstalled,
    /// No host directory contained `nvngx.dll`.
    NotFound,
    Copied { source: PathBuf, files: usize },
}

/// Ordered search roots: the override, `~/.xlcore/compatibilitytool`, then
/// the distribution and container library directories.
pub fn nvngx_search_dirs(override_dir: Option<&Path>, home: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::with_capacity(HOST_LIBRARY_DIRS.len() + 2);
    if let Some(dir) = override_dir {
        tracing::trace!("{NVNGX_PATH_VAR}: {}", dir.display());
        dirs.push(dir.to_path_buf());
    }
    if let Some(home) = home {
        dirs.push(home.join(".xlcore").join("compatibilitytool"));
    }
    dirs.extend(HOST_LIBRARY_DIRS.iter().map(PathBuf::from));
    dirs
}

/// Search roots derived from `XL_NVNGXPATH` and `HOME`.
pub fn nvngx_search_dirs_from_env() -> Vec<PathBuf> {
    let override_dir = std::env::var_os(NVNGX_PATH_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let home = std::env::var_os("HOME").map(PathBuf::from);
    nvngx_search_dirs(override_dir.as_deref(), home.as_deref())
}

/// Directory holding the first `nvngx.dll` found under the first root that
/// has one.
pub fn find_nvngx_dir(roots: &[PathBuf]) -> Option<PathBuf> {
    for root in roots {
        if !root.is_dir() {
            tracing::trace!("DLSS: {} does not exist", root.display());
            continue;
        }
        if let Some(found) = search(root, 0) {
            return Some(found);
        }
        tracing::trace!("DLSS: no nvngx.dll under {}", root.display());
    }
    None
}

fn search(dir: &Path, depth: usize) -> Option<PathBuf> {
    if dir.join(REQUIRED[0]).is_file() {
        return Some(dir.to_path_buf());
    }
    if depth >= SEARCH_DEPTH {
        return None;
    }
    let mut subdirs: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| e.path())
        .collect();
    subdirs.sort();
    subdirs.into_iter().find_map(|sub| search(&sub, depth + 1))
}

fn has_libraries(dir: &Path) -> bool {
    REQUIRED.iter().all(|name| dir.join(name).is_file())
}

/// Copy the DLSS libraries into `<game_dir>/game` and the prefix system32,
/// skipping destinations that already hold both required files.
///
/// Every regular file beside `nvngx.dll` is copied, so companion libraries
/// such as `nvngx_dlssg.dll` come along. A host without the libraries is not
/// an error.
pub fn project_nvngx(
    game_dir: &Path,
    prefix: &Path,
    search_roots: &[PathBuf],
) -> Result<NvngxOutcome, StoreError> {
    let game = game_dir.join("game");
    let system32 = system32_dir(prefix);

    let mut destinations = Vec::with_capacity(2);
    for dest in [game, system32] {
        let installed = has_libraries(&dest);
        tracing::debug!("nvngx.dll installed in {}: {installed}", dest.display());
        if !installed {
            destinations.push(dest);
        }
    }
    if destinations.is_empty() {
        return Ok(NvngxOutcome::AlreadyInstalled);
    }

    let Some(source) = find_nvngx_dir(search_roots) else {
        tracing::info!(
            "no nvngx.dll found; copy it to ~/.xlcore/compatibilitytool or set {NVNGX_PATH_VAR} \
             (not needed on non-NVIDIA GPUs)"
        );
        return Ok(NvngxOutcome::NotFound);
    };

    let mut files = 0;
    for dest in &destinations {
        fs::create_dir_all(dest)?;
    }
    for entry in fs::read_dir(&source)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        for dest in &destinations {
            fs::copy(entry.path(), dest.join(entry.file_name()))?;
        }
        files += 1;
    }
    tracing::info!("copied {files} DLSS libraries from {}", source.display());
    Ok(NvngxOutcome::Copied { source, files })
}
