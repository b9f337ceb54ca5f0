//! Staging area lifecycle.
//!
//! Each recipe invocation owns a scratch tree at `<package_dir>/../tmp/<name>`
//! holding the unpacked, stamped, metadata-overlaid source before packaging.
//! The area is wiped at pipeline start and removed only on full success; a
//! failed run leaves it in place for inspection. Exclusive ownership by a
//! single pipeline instance is the caller's responsibility — nothing here
//! locks against a second concurrent run on the same directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Subdirectory holding the staged source tree.
pub const SOURCE_TREE: &str = "source_tree";

#[derive(Debug, Clone)]
pub struct WorkArea {
    root: PathBuf,
}

impl WorkArea {
    pub fn new(package_dir: &Path, package: &str) -> Self {
        Self {
            root: package_dir.join("..").join("tmp").join(package),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_tree(&self) -> PathBuf {
        self.root.join(SOURCE_TREE)
    }

    /// Create the area, or a named subdirectory of it, returning the path.
    ///
    /// `clean` wipes anything already there first; without it an existing
    /// directory is reused as-is.
    pub fn ensure(&self, subdir: Option<&str>, clean: bool) -> Result<PathBuf> {
        let dir = match subdir {
            Some(s) => self.root.join(s),
            None => self.root.clone(),
        };
        if clean && dir.exists() {
            fs::remove_dir_all(&dir)
                .map_err(Error::io(format!("cleaning staging dir '{}'", dir.display())))?;
        }
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .map_err(Error::io(format!("creating staging dir '{}'", dir.display())))?;
        }
        Ok(dir)
    }

    /// Remove the whole area. Success paths only; failures keep it around.
    pub fn remove(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(Error::io(format!(
                "removing staging dir '{}'",
                self.root.display()
            )))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn work_area(tmp: &TempDir) -> WorkArea {
        let package_dir = tmp.path().join("linux");
        fs::create_dir_all(&package_dir).unwrap();
        WorkArea::new(&package_dir, "linux")
    }

    #[test]
    fn ensure_creates_and_reuses() {
        let tmp = TempDir::new().unwrap();
        let work = work_area(&tmp);

        let tree = work.ensure(Some(SOURCE_TREE), false).unwrap();
        assert!(tree.is_dir());
        fs::write(tree.join("marker"), b"x").unwrap();

        // Reuse keeps contents.
        work.ensure(Some(SOURCE_TREE), false).unwrap();
        assert!(tree.join("marker").exists());
    }

    #[test]
    fn clean_wipes_previous_contents() {
        let tmp = TempDir::new().unwrap();
        let work = work_area(&tmp);

        let tree = work.ensure(Some(SOURCE_TREE), false).unwrap();
        fs::write(tree.join("stale"), b"x").unwrap();

        let tree = work.ensure(Some(SOURCE_TREE), true).unwrap();
        assert!(tree.is_dir());
        assert!(!tree.join("stale").exists());
    }

    #[test]
    fn remove_tears_the_area_down() {
        let tmp = TempDir::new().unwrap();
        let work = work_area(&tmp);

        work.ensure(None, true).unwrap();
        assert!(work.root().exists());
        work.remove().unwrap();
        assert!(!work.root().exists());

        // Removing an absent area is fine.
        work.remove().unwrap();
    }
}
