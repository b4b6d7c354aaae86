//! Filesystem access used by the pipeline. Everything the pipeline reads or
//! deletes goes through [`FileSystem`] so tests can substitute failures.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub trait FileSystem {
    fn exists(&self, path: &Path) -> bool;
    /// Fails unless `path` is a regular file that can be opened for reading.
    fn check_readable(&self, path: &Path) -> Result<()>;
    fn is_empty_dir(&self, path: &Path) -> Result<bool>;
    /// Fails unless a file can be created inside the directory `path`.
    fn check_writable(&self, path: &Path) -> Result<()>;
    /// Entries of `dir`, in no particular order.
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn check_readable(&self, path: &Path) -> Result<()> {
        let meta =
            std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
        if !meta.is_file() {
            anyhow::bail!("not a regular file: {}", path.display());
        }
        std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
        Ok(())
    }

    fn is_empty_dir(&self, path: &Path) -> Result<bool> {
        let mut entries =
            std::fs::read_dir(path).with_context(|| format!("read_dir {}", path.display()))?;
        Ok(entries.next().is_none())
    }

    fn check_writable(&self, path: &Path) -> Result<()> {
        let marker = path.join(".slidepush-write-check");
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&marker)
            .with_context(|| format!("directory not writable: {}", path.display()))?;
        std::fs::remove_file(&marker)
            .with_context(|| format!("remove_file {}", marker.display()))
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in
            std::fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))?
        {
            let entry = entry.with_context(|| format!("read_dir entry in {}", dir.display()))?;
            out.push(entry.path());
        }
        Ok(out)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("create_dir_all {}", path.display()))
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::copy(from, to)
            .with_context(|| format!("copy {} -> {}", from.display(), to.display()))?;
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).with_context(|| format!("remove_file {}", path.display()))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("remove_dir_all {}", path.display()))
    }
}
