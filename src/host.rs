//! Host filesystem queries.

use std::{
    io,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Read-only view of the host used for toolchain discovery and path
/// validation.
pub trait Host {
    /// Returns `true` if `path` is an existing regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a file this process may execute.
    fn is_executable(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is an existing directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Lists the immediate children of `dir`.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Resolves `program` through the executable search path.
    fn which(&self, program: &str) -> Option<PathBuf>;
}

/// The machine this process runs on.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemHost;

impl Host for SystemHost {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_executable(&self, path: &Path) -> bool {
        // A path with a separator is checked in place, including the execute bit.
        path.is_file() && which::which(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| entry.map(walkdir::DirEntry::into_path).map_err(io::Error::from))
            .collect()
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}
