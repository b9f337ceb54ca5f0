//! Error taxonomy for the source package pipeline.
//!
//! Every failure a stage can raise is a variant here. External-process
//! variants carry the command and exit code for diagnostics; a failed
//! pipeline leaves the staging area in place, so the path context in
//! these errors is what the operator has to go on.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Registry miss. Fatal; the driver aborts.
    #[error("no recipe registered for package '{0}'")]
    UnknownPackage(String),

    /// An expected file or artifact is absent.
    #[error("{what} not found: {path}")]
    NotFound { what: &'static str, path: PathBuf },

    #[error("malformed changelog '{path}': {reason}")]
    MalformedChangelog { path: PathBuf, reason: String },

    /// Bad or missing metadata around the package checkout.
    #[error("{reason}: {path}")]
    Metadata { path: PathBuf, reason: String },

    #[error("package '{0}' has no source tarball URL template")]
    MissingUrl(&'static str),

    #[error("failed to extract '{tarball}' (exit {code})")]
    Extraction { tarball: String, code: i32 },

    #[error("`git archive` failed (exit {code})")]
    Snapshot { code: i32 },

    #[error("`{command}` failed (exit {code})")]
    PackagingTool { command: String, code: i32 },

    #[error("`{command}` failed (exit {code})")]
    ConfigurationTool { command: String, code: i32 },

    /// Cross-package resolution found something other than one match.
    #[error("{count} artifacts matched '{pattern}' (expected exactly one)")]
    AmbiguousArtifact { pattern: String, count: usize },

    #[error("download from '{url}' produced an empty file")]
    EmptyDownload { url: String },

    #[error("fetching '{url}': {source}")]
    Fetch {
        url: String,
        source: reqwest::Error,
    },

    #[error("missing required host tools:\n{0}")]
    MissingTools(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl Error {
    /// Adapter for `map_err` on filesystem calls: `map_err(Error::io("..."))`.
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Error {
        let context = context.into();
        move |source| Error::Io { context, source }
    }
}
