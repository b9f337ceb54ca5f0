//! Debian version parsing and ordering.
//!
//! A version is `[epoch:]upstream[-revision]`. Comparison follows dpkg's
//! algorithm: numeric epoch first, then the upstream and revision parts
//! compared as alternating non-digit/digit runs, with `~` sorting before
//! everything else including the end of the string. That last rule is what
//! makes the tilde-suffixed rebuild versions produced by this tool sort
//! strictly before the next real upstream release.

use std::cmp::Ordering;
use std::fmt;

/// A parsed Debian package version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebVersion {
    epoch: u64,
    upstream: String,
    revision: String,
}

impl DebVersion {
    /// Parse a version string.
    ///
    /// The epoch is everything before the first `:` when it is all digits;
    /// the revision is everything after the last `-`. Both are optional.
    pub fn parse(s: &str) -> Self {
        let (epoch, rest) = match s.split_once(':') {
            Some((e, rest)) if !e.is_empty() && e.bytes().all(|b| b.is_ascii_digit()) => {
                (e.parse::<u64>().unwrap_or(0), rest)
            }
            _ => (0, s),
        };

        let (upstream, revision) = match rest.rsplit_once('-') {
            Some((u, r)) => (u.to_string(), r.to_string()),
            None => (rest.to_string(), String::new()),
        };

        Self {
            epoch,
            upstream,
            revision,
        }
    }

    /// The upstream (non-packaging) part of the version.
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// The Debian revision part, empty for native versions.
    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn compare(&self, other: &DebVersion) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match verrevcmp(&self.upstream, &other.upstream) {
            Ordering::Equal => {}
            ord => return ord,
        }
        verrevcmp(&self.revision, &other.revision)
    }
}

impl fmt::Display for DebVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.upstream)?;
        if !self.revision.is_empty() {
            write!(f, "-{}", self.revision)?;
        }
        Ok(())
    }
}

impl Ord for DebVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for DebVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort weight of a byte in the non-digit phase.
///
/// `~` sorts before the end of the string (weight 0), letters by their
/// code point, everything else after the letters.
fn char_order(b: u8) -> i32 {
    match b {
        b'~' => -1,
        b'0'..=b'9' => 0,
        b'A'..=b'Z' | b'a'..=b'z' => i32::from(b),
        _ => i32::from(b) + 256,
    }
}

/// dpkg's fragment comparison: alternating non-digit and digit runs.
fn verrevcmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);

    while i < a.len() || j < b.len() {
        // Non-digit run, including end-of-string at weight 0.
        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let oa = if i < a.len() && !a[i].is_ascii_digit() {
                char_order(a[i])
            } else {
                0
            };
            let ob = if j < b.len() && !b[j].is_ascii_digit() {
                char_order(b[j])
            } else {
                0
            };
            if oa != ob {
                return oa.cmp(&ob);
            }
            if i < a.len() && !a[i].is_ascii_digit() {
                i += 1;
            }
            if j < b.len() && !b[j].is_ascii_digit() {
                j += 1;
            }
        }

        // Digit run: strip leading zeros, longer run wins, then lexicographic.
        while i < a.len() && a[i] == b'0' {
            i += 1;
        }
        while j < b.len() && b[j] == b'0' {
            j += 1;
        }
        let si = i;
        while i < a.len() && a[i].is_ascii_digit() {
            i += 1;
        }
        let sj = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        match (i - si).cmp(&(j - sj)) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match a[si..i].cmp(&b[sj..j]) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }

    Ordering::Equal
}
