//! The Miniconda installation root.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Location of the private Miniconda installation.
///
/// Passed explicitly to every component that needs conda; nothing in this
/// crate consults or mutates the parent process's `PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondaRoot {
    prefix: PathBuf,
}

impl CondaRoot {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Installation prefix (`-p` argument of the installer).
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    pub fn condabin_dir(&self) -> PathBuf {
        self.prefix.join("condabin")
    }

    /// The conda executable; its presence marks a completed install.
    pub fn conda_exe(&self) -> PathBuf {
        self.bin_dir().join("conda")
    }

    pub fn envs_dir(&self) -> PathBuf {
        self.prefix.join("envs")
    }

    /// Prefix a named environment lives at.
    pub fn env_prefix(&self, name: &str) -> PathBuf {
        self.envs_dir().join(name)
    }

    /// Whether the conda executable is present.
    pub fn is_installed(&self) -> bool {
        self.conda_exe().is_file()
    }

    /// `PATH` for a child: `first`, then conda's `bin` and `condabin`, then
    /// the inherited `PATH`.
    pub fn search_path(&self, first: Option<&Path>) -> OsString {
        let mut dirs: Vec<PathBuf> = Vec::new();
        if let Some(dir) = first {
            dirs.push(dir.to_path_buf());
        }
        dirs.push(self.bin_dir());
        dirs.push(self.condabin_dir());
        if let Some(inherited) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&inherited));
        }
        // Only fails if a directory contains the separator itself.
        std::env::join_paths(&dirs).unwrap_or_else(|_| self.bin_dir().into_os_string())
    }
}
