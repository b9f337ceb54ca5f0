//! Source artifacts cached in the package directory.
//!
//! A tarball's filename is a pure function of (name, version, extension),
//! so an artifact already on disk is never fetched again. Checksum and
//! size are derived from the file bytes on demand, never stored.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// One artifact slot in the package directory.
#[derive(Debug, Clone)]
pub struct Tarball {
    dir: PathBuf,
    filename: String,
}

impl Tarball {
    /// The separate-upstream artifact: `<name>_<version>.orig.tar.<ext>`.
    pub fn orig(dir: &Path, name: &str, version: &str, ext: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            filename: format!("{}_{}.orig.tar.{}", name, version, ext),
        }
    }

    /// The native artifact: `<name>_<version>.tar.<ext>`.
    pub fn native(dir: &Path, name: &str, version: &str, ext: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            filename: format!("{}_{}.tar.{}", name, version, ext),
        }
    }

    /// An artifact with an explicit filename (rebuild downloads).
    pub fn named(dir: &Path, filename: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            filename: filename.to_string(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Streaming SHA-256 and size of the file bytes.
    pub fn checksum(&self) -> Result<(String, u64)> {
        sha256_file(&self.path())
    }

    /// Download `url` into this slot.
    ///
    /// A file already present short-circuits with a log line; no request is
    /// made. A completed download must be non-empty. Blocking, no retries,
    /// no timeout: a stalled transfer stalls the pipeline.
    pub fn fetch(&self, url: &str) -> Result<()> {
        if self.exists() {
            println!("    Already exists; doing nothing");
            return Ok(());
        }

        println!("    Downloading from '{}'", url);
        let response = reqwest::blocking::get(url)
            .and_then(|r| r.error_for_status())
            .map_err(|source| Error::Fetch {
                url: url.to_string(),
                source,
            })?;

        let path = self.path();
        let mut out = File::create(&path)
            .map_err(Error::io(format!("creating '{}'", path.display())))?;
        let mut response = response;
        response.copy_to(&mut out).map_err(|source| Error::Fetch {
            url: url.to_string(),
            source,
        })?;
        drop(out);

        let (digest, size) = self.checksum()?;
        if size == 0 {
            return Err(Error::EmptyDownload {
                url: url.to_string(),
            });
        }
        println!("    Done; size {}k, sha256 {}", size / 1024, digest);
        Ok(())
    }
}

/// Hash a file in 1 MiB chunks, returning `(hex_digest, size_bytes)`.
pub fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let f = File::open(path).map_err(Error::io(format!("opening '{}'", path.display())))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1024 * 1024];
    let mut size = 0u64;
    loop {
        let n = r
            .read(&mut buf)
            .map_err(Error::io(format!("reading '{}'", path.display())))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn filenames_are_deterministic() {
        let dir = Path::new(".");
        assert_eq!(
            Tarball::orig(dir, "linux", "3.8.13", "xz").file_name(),
            "linux_3.8.13.orig.tar.xz"
        );
        assert_eq!(
            Tarball::native(dir, "xenomai", "2.6.3", "bz2").file_name(),
            "xenomai_2.6.3.tar.bz2"
        );
    }

    #[test]
    fn versions_never_alias() {
        let dir = Path::new(".");
        let a = Tarball::orig(dir, "jansson", "2.5", "bz2");
        let b = Tarball::orig(dir, "jansson", "2.6", "bz2");
        assert_ne!(a.file_name(), b.file_name());
    }

    #[test]
    fn checksum_matches_known_digest() {
        let tmp = TempDir::new().unwrap();
        let tb = Tarball::named(tmp.path(), "blob.tar.gz");
        fs::write(tb.path(), b"hello").unwrap();

        let (digest, size) = tb.checksum().unwrap();
        assert_eq!(size, 5);
        assert_eq!(
            digest,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn fetch_is_idempotent_for_cached_artifacts() {
        let tmp = TempDir::new().unwrap();
        let tb = Tarball::orig(tmp.path(), "jansson", "2.5", "bz2");
        fs::write(tb.path(), b"cached bytes").unwrap();

        // The URL is unresolvable; an existing file must short-circuit
        // before any request is attempted.
        tb.fetch("http://invalid.invalid/jansson.tar.bz2").unwrap();
        assert_eq!(fs::read(tb.path()).unwrap(), b"cached bytes");
    }

    #[test]
    fn missing_artifact_does_not_exist() {
        let tmp = TempDir::new().unwrap();
        assert!(!Tarball::orig(tmp.path(), "czmq", "2.1.0", "gz").exists());
    }
}
