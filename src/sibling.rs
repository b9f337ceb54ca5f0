//! Cross-package artifact resolution.
//!
//! Sibling package checkouts live adjacent to the current one at the fixed
//! relative path `../<name>`. The resolver reads them strictly read-only:
//! it instantiates the sibling's own recipe to reuse its version and
//! artifact naming, and locates produced artifacts by glob, requiring
//! exactly one match. Resolution failures abort the pipeline before any
//! external configuration tool runs.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::recipe::Recipe;

pub struct SiblingResolver {
    package_dir: PathBuf,
}

impl SiblingResolver {
    pub fn new(package_dir: &Path) -> Self {
        Self {
            package_dir: package_dir.to_path_buf(),
        }
    }

    /// The sibling checkout directory for `name`.
    pub fn dir(&self, name: &str) -> PathBuf {
        self.package_dir.join("..").join(name)
    }

    /// Instantiate the sibling's recipe so its naming logic is reused
    /// rather than duplicated here.
    pub fn recipe(&self, name: &str) -> Result<Recipe> {
        Recipe::for_dir(&self.dir(name))
    }

    /// Resolve a glob relative to the current package dir to exactly one path.
    pub fn unique_match(&self, pattern: &str) -> Result<PathBuf> {
        unique_glob(&self.package_dir.join(pattern))
    }
}

/// All filesystem matches for a glob pattern, in sorted order.
pub(crate) fn glob_paths(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern_str = pattern.to_string_lossy();
    let walker = glob::glob(&pattern_str).map_err(|e| Error::Io {
        context: format!("invalid glob pattern '{}'", pattern_str),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
    })?;
    let mut paths: Vec<PathBuf> = walker.filter_map(|entry| entry.ok()).collect();
    paths.sort();
    Ok(paths)
}

/// Require exactly one match for a glob pattern.
pub(crate) fn unique_glob(pattern: &Path) -> Result<PathBuf> {
    let mut paths = glob_paths(pattern)?;
    if paths.len() != 1 {
        return Err(Error::AmbiguousArtifact {
            pattern: pattern.display().to_string(),
            count: paths.len(),
        });
    }
    Ok(paths.remove(0))
}
