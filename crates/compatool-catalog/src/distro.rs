use std::fmt;
use std::path::Path;

pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Distribution family a runtime build is published for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Distro {
    /// Most broadly compatible build; used whenever detection is inconclusive.
    #[default]
    Ubuntu,
    Fedora,
    Arch,
    MacOs,
}

impl Distro {
    /// Token used in release download URLs.
    pub fn release_id(self) -> &'static str {
        match self {
            Self::Ubuntu => "ubuntu",
            Self::Fedora => "fedora",
            Self::Arch => "arch",
            Self::MacOs => "macOS",
        }
    }
}

impl fmt::Display for Distro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.release_id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Container {
    #[default]
    None,
    Flatpak,
    Snap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub distro: Distro,
    pub container: Container,
    pub name: String,
}

impl Default for HostInfo {
    fn default() -> Self {
        Self {
            distro: Distro::Ubuntu,
            container: Container::None,
            name: "Unknown distribution".to_owned(),
        }
    }
}

/// Detect the distribution family of the running host.
pub fn detect_distro() -> Distro {
    detect_host().distro
}

pub fn detect_host() -> HostInfo {
    if cfg!(target_os = "macos") {
        return HostInfo {
            distro: Distro::MacOs,
            container: Container::None,
            name: "macOS".to_owned(),
        };
    }
    probe_os_release(Path::new(OS_RELEASE_PATH))
}

/// Read an os-release file. Any read failure yields the default host.
pub fn probe_os_release(path: &Path) -> HostInfo {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_os_release(&content),
        Err(e) => {
            tracing::debug!("cannot read {}: {e}; assuming ubuntu", path.display());
            HostInfo::default()
        }
    }
}

pub fn parse_os_release(content: &str) -> HostInfo {
    // File order matters: the first value naming a known family wins.
    let entries: Vec<(&str, &str)> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| line.split_once('=').unwrap_or((line, "")))
        .collect();

    let get = |key: &str| {
        entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| unquote(v))
    };

    let pretty = get("PRETTY_NAME").unwrap_or_default();
    let plain = get("NAME").unwrap_or_default();
    let name = if !pretty.is_empty() {
        pretty.to_owned()
    } else if !plain.is_empty() {
        plain.to_owned()
    } else {
        "Unknown distribution".to_owned()
    };

    let container = match (get("ID"), get("HOME_URL")) {
        (Some("org.freedesktop.platform"), _) => Container::Flatpak,
        (Some("ubuntu-core"), Some("https://snapcraft.io")) => Container::Snap,
        _ => Container::None,
    };

    if container != Container::None {
        return HostInfo {
            distro: Distro::Ubuntu,
            container,
            name,
        };
    }

    let distro = entries
        .iter()
        .find_map(|(_, value)| family_of(&value.to_lowercase()))
        .unwrap_or_default();

    HostInfo {
        distro,
        container,
        name,
    }
}

fn family_of(value: &str) -> Option<Distro> {
    if value.contains("fedora") || value.contains("tumbleweed") {
        Some(Distro::Fedora)
    } else if value.contains("arch") {
        Some(Distro::Arch)
    } else if value.contains("ubuntu") || value.contains("debian") {
        Some(Distro::Ubuntu)
    } else {
        None
    }
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEDORA: &str = r#"NAME="Fedora Linux"
VERSION="41 (Workstation Edition)"
ID=fedora
PRETTY_NAME="Fedora Linux 41 (Workstation Edition)"
"#;

    const ARCH: &str = r#"NAME="Arch Linux"
PRETTY_NAME="Arch Linux"
ID=arch
BUILD_ID=rolling
"#;

    const TUMBLEWEED: &str = r#"NAME="openSUSE Tumbleweed"
ID="opensuse-tumbleweed"
ID_LIKE="opensuse suse"
"#;

    const FLATPAK: &str = "NAME=\"Freedesktop SDK\"\nID=org.freedesktop.platform\nVERSION_ID=\"23.08\"\n";

    const SNAP: &str =
        "NAME=\"Ubuntu Core\"\nID=ubuntu-core\nHOME_URL=https://snapcraft.io\n";

    #[test]
    fn detects_fedora() {
        let info = parse_os_release(FEDORA);
        assert_eq!(info.distro, Distro::Fedora);
        assert_eq!(info.name, "Fedora Linux 41 (Workstation Edition)");
    }

    #[test]
    fn tumbleweed_uses_fedora_build() {
        assert_eq!(parse_os_release(TUMBLEWEED).distro, Distro::Fedora);
    }

    #[test]
    fn detects_arch() {
        assert_eq!(parse_os_release(ARCH).distro, Distro::Arch);
    }

    #[test]
    fn debian_maps_to_ubuntu() {
        let info = parse_os_release("NAME=\"Debian GNU/Linux\"\nID=debian\n");
        assert_eq!(info.distro, Distro::Ubuntu);
        assert_eq!(info.name, "Debian GNU/Linux");
    }

    #[test]
    fn flatpak_and_snap_are_containers() {
        let fp = parse_os_release(FLATPAK);
        assert_eq!(fp.container, Container::Flatpak);
        assert_eq!(fp.distro, Distro::Ubuntu);

        let snap = parse_os_release(SNAP);
        assert_eq!(snap.container, Container::Snap);
        assert_eq!(snap.distro, Distro::Ubuntu);
    }

    #[test]
    fn unrecognised_content_defaults_to_ubuntu() {
        let info = parse_os_release("NAME=Gentoo\nID=gentoo\n");
        assert_eq!(info.distro, Distro::Ubuntu);
        assert_eq!(info.container, Container::None);
    }

    #[test]
    fn empty_file_defaults() {
        let info = parse_os_release("");
        assert_eq!(info, HostInfo::default());
    }

    #[test]
    fn missing_file_defaults_to_ubuntu() {
        let dir = tempfile::tempdir().unwrap();
        let info = probe_os_release(&dir.path().join("os-release"));
        assert_eq!(info.distro, Distro::Ubuntu);
    }

    #[test]
    fn lines_without_equals_are_tolerated() {
        let info = parse_os_release("garbage\nNAME=\"Arch Linux\"\n");
        assert_eq!(info.distro, Distro::Arch);
    }
}
