//! Source package preparation for Open Build Service farms.
//!
//! Given a package checkout, this crate resolves the build recipe for the
//! package, fetches or derives the upstream source artifact, synthesizes
//! packaging metadata (changelog/version), and produces a Debian source
//! package ready for farm ingestion.
//!
//! # Architecture
//!
//! ```text
//! obs-prep (binary)
//!     │
//!     ├── recipe::catalog  - package name → RecipeSpec (fixed catalog)
//!     ├── recipe::Recipe   - the staged pipeline bound to one checkout:
//!     │                      init → fetch → unpack → version-stamp →
//!     │                      overlay-metadata → configure → package →
//!     │                      teardown
//!     ├── changelog        - ledger parsing, tilde rebuild versions
//!     ├── tarball          - cached artifacts, idempotent download
//!     ├── sibling          - read-only resolution of ../<package> artifacts
//!     └── process          - blocking external tool invocation
//! ```
//!
//! The pipeline is single-threaded and sequential; every external tool
//! call blocks until it exits. One invocation owns its staging area
//! exclusively — running two pipelines against the same package directory
//! concurrently is the caller's to avoid, not enforced here.

pub mod changelog;
pub mod error;
pub mod preflight;
pub mod process;
pub mod recipe;
pub mod service;
pub mod sibling;
pub mod staging;
pub mod tarball;
pub mod version;

pub use error::{Error, Result};
pub use recipe::{BuildContext, Recipe};
