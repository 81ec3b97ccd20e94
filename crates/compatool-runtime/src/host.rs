use std::fmt;

const OSRELEASE_PATH: &str = "/proc/sys/kernel/osrelease";
const FSYNC_MIN_KERNEL: (u32, u32) = (5, 16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncSupport {
    Supported,
    UnsupportedPlatform,
    OutdatedKernel,
}

impl fmt::Display for FsyncSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supported => write!(f, "supported"),
            Self::UnsupportedPlatform => write!(f, "fsync is only available on Linux"),
            Self::OutdatedKernel => write!(
                f,
                "fsync requires Linux {}.{} or newer",
                FSYNC_MIN_KERNEL.0, FSYNC_MIN_KERNEL.1
            ),
        }
    }
}

/// Whether the running kernel provides futex waitv, which fsync needs.
pub fn fsync_support() -> FsyncSupport {
    if !cfg!(target_os = "linux") {
        return FsyncSupport::UnsupportedPlatform;
    }
    match std::fs::read_to_string(OSRELEASE_PATH) {
        Ok(release) => fsync_support_for_release(&release),
        Err(e) => {
            tracing::debug!("cannot read {OSRELEASE_PATH}: {e}");
            FsyncSupport::OutdatedKernel
        }
    }
}

/// Classify a kernel release string such as `6.8.0-45-generic`.
/// Unparseable strings count as outdated.
pub fn fsync_support_for_release(release: &str) -> FsyncSupport {
    let mut parts = release.trim().split(['.', '-']);
    let major = parts.next().and_then(|p| p.parse::<u32>().ok());
    let minor = parts.next().and_then(|p| p.parse::<u32>().ok());
    match (major, minor) {
        (Some(major), Some(minor)) if (major, minor) >= FSYNC_MIN_KERNEL => FsyncSupport::Supported,
        _ => FsyncSupport::OutdatedKernel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_versions() {
        assert_eq!(fsync_support_for_release("5.16.0"), FsyncSupport::Supported);
        assert_eq!(
            fsync_support_for_release("6.8.0-45-generic\n"),
            FsyncSupport::Supported
        );
        assert_eq!(
            fsync_support_for_release("6.1-arch1"),
            FsyncSupport::Supported
        );
        assert_eq!(
            fsync_support_for_release("5.15.0-91-generic"),
            FsyncSupport::OutdatedKernel
        );
        assert_eq!(
            fsync_support_for_release("4.19.0"),
            FsyncSupport::OutdatedKernel
        );
        assert_eq!(fsync_support_for_release("garbage"), FsyncSupport::OutdatedKernel);
    }

    #[test]
    fn display_is_actionable() {
        assert!(FsyncSupport::OutdatedKernel.to_string().contains("5.16"));
    }
}
