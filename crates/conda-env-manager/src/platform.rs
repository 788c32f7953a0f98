//! Platform detection and installer naming.

use crate::error::BootstrapError;

/// Default location of the Miniconda installers.
pub const DEFAULT_INSTALLER_BASE_URL: &str = "https://repo.anaconda.com/miniconda/";

/// File name the installer is cached under in the work directory.
pub const INSTALLER_FILE_NAME: &str = "miniconda.sh";

/// Platforms Miniconda publishes a shell installer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    LinuxX86_64,
    LinuxAarch64,
    MacosX86_64,
    MacosArm64,
}

impl Platform {
    /// Platform of the running process.
    pub fn detect() -> Result<Self, BootstrapError> {
        Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust's OS/arch names onto an installer platform.
    pub fn from_parts(os: &str, arch: &str) -> Result<Self, BootstrapError> {
        match (os, arch) {
            ("linux", "x86_64") => Ok(Platform::LinuxX86_64),
            ("linux", "aarch64") => Ok(Platform::LinuxAarch64),
            ("macos", "x86_64") => Ok(Platform::MacosX86_64),
            ("macos", "aarch64") => Ok(Platform::MacosArm64),
            _ => Err(BootstrapError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            }),
        }
    }

    /// Platform tag used in installer file names.
    pub fn tag(&self) -> &'static str {
        match self {
            Platform::LinuxX86_64 => "Linux-x86_64",
            Platform::LinuxAarch64 => "Linux-aarch64",
            Platform::MacosX86_64 => "MacOSX-x86_64",
            Platform::MacosArm64 => "MacOSX-arm64",
        }
    }

    pub fn installer_name(&self) -> String {
        format!("Miniconda3-latest-{}.sh", self.tag())
    }
}

/// Full download URL of the installer for `platform` under `base_url`.
pub fn installer_url(base_url: &str, platform: Platform) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        platform.installer_name()
    )
}
