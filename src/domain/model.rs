use serde::{Deserialize, Serialize};
use std::fmt;

/// Debian architecture names the build farm accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebianArchitecture {
    Amd64,
    Arm64,
    Armhf,
    I386,
    Ppc64el,
    Riscv64,
    S390x,
}

pub const SUPPORTED_ARCHS: [&str; 7] = [
    "amd64", "arm64", "armhf", "i386", "ppc64el", "riscv64", "s390x",
];

/// Pseudo-architecture for architecture-independent snaps. Only valid as build-for.
pub const ARCH_ALL: &str = "all";

impl DebianArchitecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
            Self::Armhf => "armhf",
            Self::I386 => "i386",
            Self::Ppc64el => "ppc64el",
            Self::Riscv64 => "riscv64",
            Self::S390x => "s390x",
        }
    }

    pub fn from_host() -> Self {
        Self::from_rust_arch(std::env::consts::ARCH).unwrap_or(Self::Amd64)
    }

    fn from_rust_arch(arch: &str) -> Option<Self> {
        match arch {
            "x86_64" => Some(Self::Amd64),
            "aarch64" => Some(Self::Arm64),
            "arm" => Some(Self::Armhf),
            "x86" => Some(Self::I386),
            "powerpc64" => Some(Self::Ppc64el),
            "riscv64" => Some(Self::Riscv64),
            "s390x" => Some(Self::S390x),
            _ => None,
        }
    }
}

impl fmt::Display for DebianArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn is_supported_arch(arch: &str) -> bool {
    SUPPORTED_ARCHS.contains(&arch)
}

pub fn is_valid_build_for(arch: &str) -> bool {
    arch == ARCH_ALL || is_supported_arch(arch)
}

/// One resolved entry of a build plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub platform: String,
    pub build_on: String,
    pub build_for: String,
}

impl BuildInfo {
    pub fn new(platform: &str, build_on: &str, build_for: &str) -> Self {
        Self {
            platform: platform.to_string(),
            build_on: build_on.to_string(),
            build_for: build_for.to_string(),
        }
    }
}

pub type BuildPlan = Vec<BuildInfo>;

/// State of a single build on the farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildState {
    Pending,
    Building,
    Gathering,
    Uploading,
    Success,
    Failed,
    FailedToUpload,
    ChrootProblem,
    DependencyWait,
    Cancelling,
    Cancelled,
    Superseded,
}

impl BuildState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Building | Self::Gathering | Self::Cancelling)
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            Self::Success
                | Self::Failed
                | Self::FailedToUpload
                | Self::ChrootProblem
                | Self::DependencyWait
                | Self::Cancelled
                | Self::Superseded
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::FailedToUpload | Self::ChrootProblem)
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Building => "building",
            Self::Gathering => "gathering",
            Self::Uploading => "uploading",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::FailedToUpload => "failed-to-upload",
            Self::ChrootProblem => "chroot-problem",
            Self::DependencyWait => "dependency-wait",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Superseded => "superseded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub arch: String,
    pub state: BuildState,
}

/// Which remote builder implementation handles the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuilderVariant {
    Current,
    Legacy,
}

impl fmt::Display for BuilderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}
