use crate::distro::Distro;
use crate::CatalogError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three kinds of artifact kept in separate cache roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Runtime,
    GraphicsShim,
    UpscalerShim,
}

impl ArtifactKind {
    /// Directory name of this kind's cache root under the tools root.
    pub fn cache_dir_name(self) -> &'static str {
        match self {
            Self::Runtime => "wine",
            Self::GraphicsShim => "dxvk",
            Self::UpscalerShim => "nvapi",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Runtime => "runtime",
            Self::GraphicsShim => "graphics shim",
            Self::UpscalerShim => "upscaler shim",
        };
        f.write_str(s)
    }
}

/// One installable version of one artifact kind.
///
/// Checksums are lowercase hex SHA-512 digests. An empty list means the
/// provider publishes no digest and the download is accepted unverified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub kind: ArtifactKind,
    pub name: String,
    pub download_url: String,
    pub checksums: Vec<String>,
}

impl ArtifactDescriptor {
    pub fn is_verified(&self) -> bool {
        !self.checksums.is_empty()
    }
}

struct ReleaseRecord {
    name: &'static str,
    url: &'static str,
    checksums: &'static [&'static str],
}

impl ReleaseRecord {
    fn descriptor(&self, kind: ArtifactKind) -> ArtifactDescriptor {
        ArtifactDescriptor {
            kind,
            name: self.name.to_owned(),
            download_url: self.url.to_owned(),
            checksums: self.checksums.iter().map(|c| (*c).to_owned()).collect(),
        }
    }
}

const DISTRO_PLACEHOLDER: &str = "{distro}";

const WINE_STABLE: ReleaseRecord = ReleaseRecord {
    name: "wine-xiv-staging-fsync-git-10.5.r0.g835c92a2",
    url: "https://github.com/rankynbass/unofficial-wine-xiv-git/releases/download/10.5.r0.g835c92a2/wine-xiv-staging-fsync-git-{distro}-10.5.r0.g835c92a2.tar.xz",
    checksums: &[],
};

const WINE_LEGACY: ReleaseRecord = ReleaseRecord {
    name: "wine-xiv-staging-fsync-git-8.5.r4.g4211bac7",
    url: "https://github.com/goatcorp/wine-xiv-git/releases/download/8.5.r4.g4211bac7/wine-xiv-staging-fsync-git-{distro}-8.5.r4.g4211bac7.tar.xz",
    // One digest per distribution tarball of the same logical release.
    checksums: &[
        "832de4d834bdbd6e1e069f13efcb56fa1508c9d7ba0609e1161a52d814f2c6f7c89c8e2d1bcff05da7f0b5cab0662f7e5d57865ab7a5c9d144e6bd55051adee5",
        "5158108788f21f03c895216265824eba0080c6aceacd901a1f60e242ed161db2d6cb65304bbc0187310b08513df2a5c40c62a41838ac1765a422f85387109930",
        "ff77e19d35c598bc5602222d4bb4c0b85ae375f99f9ae0000f847a904ef80c120d89e59da921ee05fe54b0bd583e9cf1fb7f142b95f3ad2d3aba9891b6605f08",
    ],
};

const DXVK_STABLE: ReleaseRecord = ReleaseRecord {
    name: "dxvk-gplasync-v2.6-1",
    url: "https://gitlab.com/Ph42oN/dxvk-gplasync/-/raw/447db06ecff8a64f900b12741dbd8d1c8d8eae22/releases/dxvk-gplasync-v2.6-1.tar.gz",
    checksums: &[],
};

const DXVK_BETA: ReleaseRecord = ReleaseRecord {
    name: "dxvk-gplasync-v2.7-1",
    url: "https://raw.githubusercontent.com/goatcorp/xlcore-distrib/refs/heads/main/dxvk-gplasync-v2.7-1.tar.gz",
    checksums: &["1fe59a91f3d3a09a132d1f9c3f7e94d47154e53e58f935daa090aa6dea5c8e6c64800334a6f3014751492a2f32002d8ce63e8086284df0b8d4cbace0353e0f3b"],
};

const DXVK_PREVIOUS_STABLE: ReleaseRecord = ReleaseRecord {
    name: "dxvk-gplasync-v2.6.1-1",
    url: "https://raw.githubusercontent.com/goatcorp/xlcore-distrib/refs/heads/main/dxvk-gplasync-v2.6.1-1.tar.gz",
    checksums: &["4196972aa26ffd7da94542fef065bdb2a4a0926498fe4834ef75f43dd2a8c393db8b0edffa21a2906f664a99679cfea4c371c5a9577eb025410b76d63df8a872"],
};

const DXVK_LEGACY: ReleaseRecord = ReleaseRecord {
    name: "dxvk-async-1.10.3",
    url: "https://github.com/Sporif/dxvk-async/releases/download/1.10.3/dxvk-async-1.10.3.tar.gz",
    checksums: &["afc856b859f1c36d919055e471ae1dd1900424ea42139ab8c1ae231fe9617234d1dfa53f6bf0e5d183575a224f2b8bc950f258108607f39cc419823d68f06ff2"],
};

const NVAPI_STABLE: ReleaseRecord = ReleaseRecord {
    name: "dxvk-nvapi-v0.9.0",
    url: "https://github.com/jp7677/dxvk-nvapi/releases/download/v0.9.0/dxvk-nvapi-v0.9.0.tar.gz",
    checksums: &["c69fefee7e9b4efc2521bd96de4d413a130a8c509b62572673acd70a884ec2c0799eb973d65c466e66ece0df10e03410ed94e35c3fc10a5f42ff2b9c392f18e0"],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WineVersion {
    /// Wine 10.5 based build, recommended for most users.
    #[default]
    Stable,
    /// Wine 8.5 based build, for compatibility with older plugins.
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DxvkVersion {
    #[default]
    Stable,
    Beta,
    PreviousStable,
    Legacy,
    /// Fall back to the translation layer's own OpenGL renderer.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NvapiVersion {
    Stable,
    #[default]
    Disabled,
}

macro_rules! version_tokens {
    ($ty:ident, $what:literal, { $($variant:ident => $token:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $token),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = CatalogError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($token => Ok($ty::$variant),)+
                    other => Err(CatalogError::InvalidConfiguration(format!(
                        "unknown {} version '{other}', expected one of: {}",
                        $what,
                        [$($token),+].join(", ")
                    ))),
                }
            }
        }

        impl TryFrom<String> for $ty {
            type Error = CatalogError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$ty> for String {
            fn from(v: $ty) -> Self {
                v.as_str().to_owned()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

version_tokens!(WineVersion, "runtime", {
    Stable => "stable",
    Legacy => "legacy",
});

version_tokens!(DxvkVersion, "graphics shim", {
    Stable => "stable",
    Beta => "beta",
    PreviousStable => "previous-stable",
    Legacy => "legacy",
    Disabled => "disabled",
});

version_tokens!(NvapiVersion, "upscaler shim", {
    Stable => "stable",
    Disabled => "disabled",
});

/// Resolve the runtime build for a version and host distribution.
pub fn wine_release(version: WineVersion, distro: Distro) -> ArtifactDescriptor {
    let record = match version {
        WineVersion::Stable => &WINE_STABLE,
        WineVersion::Legacy => &WINE_LEGACY,
    };
    let mut descriptor = record.descriptor(ArtifactKind::Runtime);
    descriptor.download_url = descriptor
        .download_url
        .replace(DISTRO_PLACEHOLDER, distro.release_id());
    descriptor
}

/// Resolve the graphics shim build. `None` is the disabled sentinel.
pub fn dxvk_release(version: DxvkVersion) -> Option<ArtifactDescriptor> {
    let record = match version {
        DxvkVersion::Stable => &DXVK_STABLE,
        DxvkVersion::Beta => &DXVK_BETA,
        DxvkVersion::PreviousStable => &DXVK_PREVIOUS_STABLE,
        DxvkVersion::Legacy => &DXVK_LEGACY,
        DxvkVersion::Disabled => return None,
    };
    Some(record.descriptor(ArtifactKind::GraphicsShim))
}

/// Resolve the upscaler shim build. `None` is the disabled sentinel.
pub fn nvapi_release(version: NvapiVersion) -> Option<ArtifactDescriptor> {
    match version {
        NvapiVersion::Stable => Some(NVAPI_STABLE.descriptor(ArtifactKind::UpscalerShim)),
        NvapiVersion::Disabled => None,
    }
}
