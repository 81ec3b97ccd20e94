use crate::StoreError;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::Command;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
}

impl ArchiveFormat {
    /// Sniff the compression from the leading bytes of `path`.
    pub fn detect(path: &Path) -> Result<Option<Self>, StoreError> {
        let mut header = [0u8; 6];
        let mut file = File::open(path)?;
        let mut filled = 0;
        while filled < header.len() {
            let n = file.read(&mut header[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        let header = &header[..filled];
        if header.starts_with(XZ_MAGIC) {
            Ok(Some(Self::TarXz))
        } else if header.starts_with(GZIP_MAGIC) {
            Ok(Some(Self::TarGz))
        } else {
            Ok(None)
        }
    }
}

/// Unpack a compressed tarball into `dest`, which must already exist.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<ArchiveFormat, StoreError> {
    let format = ArchiveFormat::detect(archive)?
        .ok_or_else(|| StoreError::UnsupportedArchive(archive.to_path_buf()))?;
    tracing::debug!("extracting {} ({format:?}) into {}", archive.display(), dest.display());

    match format {
        ArchiveFormat::TarGz => {
            let mut tarball = tar::Archive::new(GzDecoder::new(File::open(archive)?));
            tarball.set_overwrite(true);
            tarball.unpack(dest)?;
        }
        ArchiveFormat::TarXz => {
            let status = Command::new("tar")
                .args([
                    "xJf",
                    &archive.to_string_lossy(),
                    "-C",
                    &dest.to_string_lossy(),
                    "--no-same-owner",
                ])
                .status()
                .map_err(|e| StoreError::Acquisition {
                    url: archive.display().to_string(),
                    reason: format!("failed to run tar: {e}"),
                })?;
            if !status.success() {
                return Err(StoreError::Acquisition {
                    url: archive.display().to_string(),
                    reason: format!("tar exited with {status}"),
                });
            }
        }
    }
    Ok(format)
}
