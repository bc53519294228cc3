//! Thin filesystem seam the generic sharded-file store is parameterized
//! over: path composition, file CRUD, and directory listing. A real
//! `std::fs`-backed driver for production use and an in-memory fake for
//! tests that never touch disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Operations the sharded-file algorithm needs from a filesystem. Paths are
/// `/`-separated, relative to the driver's root.
pub trait FilesystemDriver {
    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<(), StoreError>;
    fn delete_file(&mut self, path: &str) -> Result<(), StoreError>;

    /// Every file path nested under `dir` (recursively), relative to the
    /// driver's root. Empty if `dir` does not exist.
    fn list_files_under(&self, dir: &str) -> Result<Vec<String>, StoreError>;

    /// Remove `dir` and everything under it. No-op if it does not exist.
    fn remove_dir_all(&mut self, dir: &str) -> Result<(), StoreError>;
}

/// Real, `std::fs`-backed driver rooted at a base directory on disk.
pub struct RealFilesystemDriver {
    root: PathBuf,
}

impl RealFilesystemDriver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn io_err(err: std::io::Error) -> StoreError {
        StoreError::Storage(err.to_string())
    }

    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) -> Result<(), StoreError> {
        for entry in fs::read_dir(dir).map_err(Self::io_err)? {
            let entry = entry.map_err(Self::io_err)?;
            let path = entry.path();
            if path.is_dir() {
                Self::walk(&path, root, out)?;
            } else {
                let rel = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace(std::path::MAIN_SEPARATOR, "/");
                out.push(rel);
            }
        }
        Ok(())
    }
}

impl FilesystemDriver for RealFilesystemDriver {
    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.full_path(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_err(e)),
        }
    }

    fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<(), StoreError> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(Self::io_err)?;
        }
        fs::write(full, contents).map_err(Self::io_err)
    }

    fn delete_file(&mut self, path: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.full_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(e)),
        }
    }

    fn list_files_under(&self, dir: &str) -> Result<Vec<String>, StoreError> {
        let full = self.full_path(dir);
        if !full.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        Self::walk(&full, &self.root, &mut out)?;
        Ok(out)
    }

    fn remove_dir_all(&mut self, dir: &str) -> Result<(), StoreError> {
        match fs::remove_dir_all(self.full_path(dir)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(e)),
        }
    }
}

/// In-memory fake used by tests: a flat map of path to contents, with
/// directory semantics derived from path prefixes.
#[derive(Default)]
pub struct FakeFilesystemDriver {
    files: BTreeMap<String, Vec<u8>>,
}

impl FakeFilesystemDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }
}

impl FilesystemDriver for FakeFilesystemDriver {
    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.files.get(path).cloned())
    }

    fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<(), StoreError> {
        self.files.insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    fn delete_file(&mut self, path: &str) -> Result<(), StoreError> {
        self.files.remove(path);
        Ok(())
    }

    fn list_files_under(&self, dir: &str) -> Result<Vec<String>, StoreError> {
        let prefix = format!("{dir}/");
        Ok(self
            .files
            .keys()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect())
    }

    fn remove_dir_all(&mut self, dir: &str) -> Result<(), StoreError> {
        let prefix = format!("{dir}/");
        self.files.retain(|p, _| !p.starts_with(&prefix));
        Ok(())
    }
}
