use crate::checksum::verify_artifact;
use crate::extract::extract_archive;
use crate::source::{ArtifactSource, HttpSource};
use crate::StoreError;
use compatool_catalog::ArtifactDescriptor;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The install directory was already populated; nothing was fetched.
    Cached,
    Downloaded,
}

/// Downloads, verifies, and extracts artifacts into their install roots.
///
/// There is no retry and no locking: a failed acquisition surfaces to the
/// caller, and concurrent callers for the same root must be serialized
/// externally.
#[derive(Clone)]
pub struct ArtifactAcquirer {
    source: Arc<dyn ArtifactSource>,
    temp_dir: Option<PathBuf>,
}

impl ArtifactAcquirer {
    pub fn new(source: Arc<dyn ArtifactSource>) -> Self {
        Self {
            source,
            temp_dir: None,
        }
    }

    pub fn http() -> Self {
        Self::new(Arc::new(HttpSource::new()))
    }

    /// Stage downloads in `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Install directory for `descriptor` under `install_root`.
    #[inline]
    pub fn install_dir(descriptor: &ArtifactDescriptor, install_root: &Path) -> PathBuf {
        install_root.join(&descriptor.name)
    }

    /// True if the install directory exists and has at least one entry.
    pub fn is_installed(descriptor: &ArtifactDescriptor, install_root: &Path) -> bool {
        is_populated(&Self::install_dir(descriptor, install_root))
    }

    /// Make `<install_root>/<name>` present.
    ///
    /// A populated install directory is trusted as-is and its contents are not
    /// re-verified. Otherwise the archive is downloaded to a temporary file,
    /// checked against the descriptor's checksums, and extracted into
    /// `install_root`. The temporary file never outlives this call, and a
    /// failed extraction removes the partly written install directory.
    pub fn ensure(
        &self,
        descriptor: &ArtifactDescriptor,
        install_root: &Path,
    ) -> Result<AcquireOutcome, StoreError> {
        if Self::is_installed(descriptor, install_root) {
            tracing::debug!("{} {} already installed", descriptor.kind, descriptor.name);
            return Ok(AcquireOutcome::Cached);
        }

        fs::create_dir_all(install_root)?;
        let mut staging = match self.temp_dir {
            Some(ref dir) => {
                fs::create_dir_all(dir)?;
                tempfile::Builder::new()
                    .prefix(".compatool-download-")
                    .tempfile_in(dir)?
            }
            None => tempfile::Builder::new()
                .prefix(".compatool-download-")
                .tempfile()?,
        };

        tracing::info!(
            "downloading {} {} from {}",
            descriptor.kind,
            descriptor.name,
            descriptor.download_url
        );
        let bytes = self
            .source
            .fetch(&descriptor.download_url, staging.as_file_mut())?;
        staging.as_file_mut().flush()?;
        tracing::debug!("staged {bytes} bytes at {}", staging.path().display());

        verify_artifact(staging.path(), descriptor)?;
        if let Err(e) = extract_archive(staging.path(), install_root) {
            let partial = Self::install_dir(descriptor, install_root);
            tracing::warn!(
                "extraction of {} failed, removing {}: {e}",
                descriptor.name,
                partial.display()
            );
            if partial.exists() {
                fs::remove_dir_all(&partial)?;
            }
            return Err(e);
        }
        staging.close()?;

        if !is_populated(&Self::install_dir(descriptor, install_root)) {
            tracing::warn!(
                "archive for {} did not produce {}",
                descriptor.name,
                Self::install_dir(descriptor, install_root).display()
            );
        }
        tracing::info!("{} {} installed", descriptor.kind, descriptor.name);
        Ok(AcquireOutcome::Downloaded)
    }

    /// Copy the regular files of `<install_root>/<name>/x64` into `dest`,
    /// overwriting existing files. Returns the number of files copied.
    pub fn install_payload(
        descriptor: &ArtifactDescriptor,
        install_root: &Path,
        dest: &Path,
    ) -> Result<usize, StoreError> {
        let payload = Self::install_dir(descriptor, install_root).join("x64");
        if !payload.is_dir() {
            return Err(StoreError::MissingPayload(payload));
        }
        fs::create_dir_all(dest)?;

        let mut copied = 0;
        for entry in fs::read_dir(&payload)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            fs::copy(entry.path(), dest.join(entry.file_name()))?;
            copied += 1;
        }
        tracing::debug!(
            "copied {copied} {} files into {}",
            descriptor.name,
            dest.display()
        );
        Ok(copied)
    }
}

fn is_populated(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::tar_gz;
    use compatool_catalog::ArtifactKind;
    use sha2::{Digest, Sha512};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MemorySource {
        body: Vec<u8>,
        calls: AtomicUsize,
    }

    impl MemorySource {
        fn new(body: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                body,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ArtifactSource for MemorySource {
        fn fetch(&self, _url: &str, dest: &mut dyn Write) -> Result<u64, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            dest.write_all(&self.body)?;
            Ok(self.body.len() as u64)
        }
    }

    struct FailingSource;

    impl ArtifactSource for FailingSource {
        fn fetch(&self, url: &str, _dest: &mut dyn Write) -> Result<u64, StoreError> {
            Err(StoreError::Acquisition {
                url: url.to_owned(),
                reason: "HTTP 503".to_owned(),
            })
        }
    }

    fn shim_archive() -> Vec<u8> {
        tar_gz(&[
            ("dxvk-test/x64/d3d11.dll", b"d3d11-v2"),
            ("dxvk-test/x64/dxgi.dll", b"dxgi-v2"),
            ("dxvk-test/x32/d3d11.dll", b"d3d11-32"),
        ])
    }

    fn descriptor(checksums: Vec<String>) -> ArtifactDescriptor {
        ArtifactDescriptor {
            kind: ArtifactKind::GraphicsShim,
            name: "dxvk-test".to_owned(),
            download_url: "https://example.invalid/dxvk-test.tar.gz".to_owned(),
            checksums,
        }
    }

    fn staged_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with(".compatool-download-")
            })
            .count()
    }

    #[test]
    fn second_ensure_is_a_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("dxvk");
        let source = MemorySource::new(shim_archive());
        let acquirer = ArtifactAcquirer::new(source.clone());
        let d = descriptor(Vec::new());

        assert_eq!(acquirer.ensure(&d, &root).unwrap(), AcquireOutcome::Downloaded);
        assert_eq!(source.calls(), 1);
        assert!(root.join("dxvk-test/x64/d3d11.dll").is_file());

        assert_eq!(acquirer.ensure(&d, &root).unwrap(), AcquireOutcome::Cached);
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn cache_hit_does_not_reverify_contents() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("dxvk");
        fs::create_dir_all(root.join("dxvk-test")).unwrap();
        fs::write(root.join("dxvk-test/garbage"), b"not the real thing").unwrap();

        let source = MemorySource::new(Vec::new());
        let acquirer = ArtifactAcquirer::new(source.clone());
        let d = descriptor(vec!["00".repeat(64)]);
        assert_eq!(acquirer.ensure(&d, &root).unwrap(), AcquireOutcome::Cached);
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn empty_install_dir_is_not_a_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("dxvk");
        fs::create_dir_all(root.join("dxvk-test")).unwrap();

        let source = MemorySource::new(shim_archive());
        let acquirer = ArtifactAcquirer::new(source.clone());
        assert_eq!(
            acquirer.ensure(&descriptor(Vec::new()), &root).unwrap(),
            AcquireOutcome::Downloaded
        );
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn matching_checksum_is_installed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("dxvk");
        let archive = shim_archive();
        let digest = hex::encode(Sha512::digest(&archive)).to_uppercase();
        let acquirer = ArtifactAcquirer::new(MemorySource::new(archive));

        acquirer
            .ensure(&descriptor(vec!["ab".repeat(64), digest]), &root)
            .unwrap();
        assert!(ArtifactAcquirer::is_installed(&descriptor(Vec::new()), &root));
    }

    #[test]
    fn checksum_mismatch_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("dxvk");
        let staging = dir.path().join("staging");
        let acquirer =
            ArtifactAcquirer::new(MemorySource::new(shim_archive())).with_temp_dir(&staging);

        let err = acquirer
            .ensure(&descriptor(vec!["00".repeat(64)]), &root)
            .unwrap_err();
        assert!(matches!(err, StoreError::ChecksumMismatch { .. }));
        assert!(!root.join("dxvk-test").exists());
        assert_eq!(staged_files(&staging), 0);
    }

    #[test]
    fn failed_extraction_is_not_a_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("dxvk");
        let staging = dir.path().join("staging");
        let big: Vec<u8> = (0..400_000u32)
            .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
            .collect();
        let mut archive = tar_gz(&[
            ("dxvk-test/x64/d3d11.dll", b"d3d11".as_slice()),
            ("dxvk-test/x64/big.dll", big.as_slice()),
        ]);
        archive.truncate(archive.len() * 2 / 3);

        let source = MemorySource::new(archive);
        let acquirer = ArtifactAcquirer::new(source.clone()).with_temp_dir(&staging);
        let d = descriptor(Vec::new());

        assert!(acquirer.ensure(&d, &root).is_err());
        assert!(!root.join("dxvk-test").exists());
        assert_eq!(staged_files(&staging), 0);

        assert!(acquirer.ensure(&d, &root).is_err());
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn source_failure_propagates_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        let acquirer = ArtifactAcquirer::new(Arc::new(FailingSource)).with_temp_dir(&staging);
        let err = acquirer
            .ensure(&descriptor(Vec::new()), &dir.path().join("dxvk"))
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 503"));
        assert_eq!(staged_files(&staging), 0);
    }

    #[test]
    fn temp_file_removed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        let acquirer =
            ArtifactAcquirer::new(MemorySource::new(shim_archive())).with_temp_dir(&staging);
        acquirer
            .ensure(&descriptor(Vec::new()), &dir.path().join("dxvk"))
            .unwrap();
        assert_eq!(staged_files(&staging), 0);
    }

    #[test]
    fn payload_copy_overwrites_every_time() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("dxvk");
        let system32 = dir.path().join("prefix/drive_c/windows/system32");
        let d = descriptor(Vec::new());
        ArtifactAcquirer::new(MemorySource::new(shim_archive()))
            .ensure(&d, &root)
            .unwrap();

        fs::create_dir_all(&system32).unwrap();
        fs::write(system32.join("d3d11.dll"), b"stale").unwrap();
        fs::write(system32.join("kernel32.dll"), b"untouched").unwrap();

        let copied = ArtifactAcquirer::install_payload(&d, &root, &system32).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(fs::read(system32.join("d3d11.dll")).unwrap(), b"d3d11-v2");
        assert_eq!(fs::read(system32.join("kernel32.dll")).unwrap(), b"untouched");

        fs::write(system32.join("dxgi.dll"), b"tampered").unwrap();
        ArtifactAcquirer::install_payload(&d, &root, &system32).unwrap();
        assert_eq!(fs::read(system32.join("dxgi.dll")).unwrap(), b"dxgi-v2");
    }

    #[test]
    fn payload_copy_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("dxvk");
        let x64 = root.join("dxvk-test/x64");
        fs::create_dir_all(x64.join("nested")).unwrap();
        fs::write(x64.join("nested/skip.dll"), b"").unwrap();
        fs::write(x64.join("d3d9.dll"), b"d3d9").unwrap();

        let dest = dir.path().join("system32");
        let copied =
            ArtifactAcquirer::install_payload(&descriptor(Vec::new()), &root, &dest).unwrap();
        assert_eq!(copied, 1);
        assert!(!dest.join("nested").exists());
    }

    #[test]
    fn payload_copy_without_x64_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactAcquirer::install_payload(
            &descriptor(Vec::new()),
            dir.path(),
            &dir.path().join("dest"),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::MissingPayload(_)));
    }
}
