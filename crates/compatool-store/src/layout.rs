use crate::StoreError;
use compatool_catalog::ArtifactKind;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory layout under the tools root.
///
/// ```text
/// <root>/wine/<artifact-name>/...
/// <root>/dxvk/<artifact-name>/...
/// <root>/nvapi/<artifact-name>/...
/// <root>/prefix/drive_c/windows/system32/
/// ```
#[derive(Debug, Clone)]
pub struct ToolLayout {
    root: PathBuf,
}

impl ToolLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn cache_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.cache_dir_name())
    }

    #[inline]
    pub fn wine_dir(&self) -> PathBuf {
        self.cache_dir(ArtifactKind::Runtime)
    }

    #[inline]
    pub fn dxvk_dir(&self) -> PathBuf {
        self.cache_dir(ArtifactKind::GraphicsShim)
    }

    #[inline]
    pub fn nvapi_dir(&self) -> PathBuf {
        self.cache_dir(ArtifactKind::UpscalerShim)
    }

    #[inline]
    pub fn default_prefix(&self) -> PathBuf {
        self.root.join("prefix")
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        for kind in [
            ArtifactKind::Runtime,
            ArtifactKind::GraphicsShim,
            ArtifactKind::UpscalerShim,
        ] {
            fs::create_dir_all(self.cache_dir(kind))?;
        }
        Ok(())
    }
}

/// Shim install destination inside a prefix.
pub fn system32_dir(prefix: &Path) -> PathBuf {
    prefix
        .join("drive_c")
        .join("windows")
        .join("system32")
}
