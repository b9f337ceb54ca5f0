//! Build-service metadata for a package checkout.
//!
//! The build service knows three things about a working directory that the
//! pipeline cannot derive from the files themselves: which package the
//! directory is a checkout of, the monotonic rebuild counter for the
//! current upstream version, and the identity to credit in changelog
//! entries. They are injected as `.obs/service.toml` in the package dir.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Metadata file path relative to the package directory.
pub const SERVICE_FILE: &str = ".obs/service.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceMetadata {
    /// Package name; selects the recipe variant.
    pub package: String,
    /// Rebuild counter for the current upstream version. Absent on the
    /// first local rebuild.
    #[serde(default)]
    pub revision: u64,
    pub author: Author,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl ServiceMetadata {
    /// Read the metadata for a package directory.
    pub fn read(package_dir: &Path) -> Result<Self> {
        let path = package_dir.join(SERVICE_FILE);
        if !path.exists() {
            return Err(Error::NotFound {
                what: "service metadata",
                path,
            });
        }
        let text = fs::read_to_string(&path)
            .map_err(Error::io(format!("reading '{}'", path.display())))?;
        let meta: ServiceMetadata = toml::from_str(&text).map_err(|e| Error::Metadata {
            path: path.clone(),
            reason: format!("invalid service metadata: {}", e),
        })?;
        if meta.package.trim().is_empty() {
            return Err(Error::Metadata {
                path,
                reason: "invalid service metadata: empty package name".to_string(),
            });
        }
        Ok(meta)
    }

    /// Author in the quoted form changelog trailers use.
    pub fn author_line(&self) -> String {
        format!("\"{}\" <{}>", self.author.name, self.author.email)
    }
}
