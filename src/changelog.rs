//! Debian changelog ledger: parse, append, serialize.
//!
//! The ledger is the newest-first entry history that `dpkg-source` and the
//! build service read back out of the source package. Appending never drops
//! prior entries, and serialization rewrites the whole history, so the file
//! round-trips through a read/stamp/write cycle.

use std::fs;
use std::path::Path;

use regex::Regex;
use time::format_description::well_known::Rfc2822;
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::version::DebVersion;

/// One changelog block.
///
/// `changes` holds the lines between the header and the trailer verbatim,
/// including the blank lines bracketing the free text; downstream packaging
/// tools parse the structured fields around that formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogEntry {
    pub package: String,
    pub version: DebVersion,
    pub distributions: String,
    pub urgency: String,
    pub changes: Vec<String>,
    pub author: String,
    pub date: String,
}

/// Entry history, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changelog {
    entries: Vec<ChangelogEntry>,
}

impl Changelog {
    /// Read and parse the ledger at `path`.
    ///
    /// The file must exist and contain at least one well-formed entry.
    pub fn read(path: &Path) -> Result<Changelog> {
        if !path.exists() {
            return Err(Error::NotFound {
                what: "changelog",
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path)
            .map_err(Error::io(format!("reading changelog '{}'", path.display())))?;
        Self::parse(&text, path)
    }

    /// Parse changelog text; `origin` only labels errors.
    pub fn parse(text: &str, origin: &Path) -> Result<Changelog> {
        let header_re = Regex::new(r"^(\S+) \(([^)]+)\) ([^;]+); urgency=(\S+)\s*$")
            .expect("static regex");
        let trailer_re = Regex::new(r"^ -- (.+)  (.+)$").expect("static regex");

        let malformed = |line_no: usize, reason: &str| Error::MalformedChangelog {
            path: origin.to_path_buf(),
            reason: format!("line {}: {}", line_no, reason),
        };

        let mut entries = Vec::new();
        let mut lines = text.lines().enumerate().peekable();

        while let Some(&(_, line)) = lines.peek() {
            if line.trim().is_empty() {
                lines.next();
                continue;
            }

            let (header_no, header) = match lines.next() {
                Some(pair) => pair,
                None => break,
            };
            let caps = header_re
                .captures(header)
                .ok_or_else(|| malformed(header_no + 1, "expected an entry header"))?;

            let mut changes = Vec::new();
            let mut trailer = None;
            for (no, line) in lines.by_ref() {
                if let Some(t) = trailer_re.captures(line) {
                    trailer = Some((t[1].to_string(), t[2].to_string()));
                    break;
                }
                if line.is_empty() || line.starts_with(' ') || line.starts_with('\t') {
                    changes.push(line.to_string());
                } else {
                    return Err(malformed(no + 1, "expected a change line or trailer"));
                }
            }
            let (author, date) = trailer
                .ok_or_else(|| malformed(header_no + 1, "entry has no ` -- author  date` trailer"))?;

            entries.push(ChangelogEntry {
                package: caps[1].to_string(),
                version: DebVersion::parse(&caps[2]),
                distributions: caps[3].to_string(),
                urgency: caps[4].to_string(),
                changes,
                author,
                date,
            });
        }

        if entries.is_empty() {
            return Err(Error::MalformedChangelog {
                path: origin.to_path_buf(),
                reason: "no entries found".to_string(),
            });
        }

        Ok(Changelog { entries })
    }

    /// The most recent entry (a parsed changelog always has at least one).
    pub fn latest(&self) -> &ChangelogEntry {
        &self.entries[0]
    }

    pub fn entries(&self) -> &[ChangelogEntry] {
        &self.entries
    }

    /// Prepend a new entry; prior history is untouched.
    pub fn prepend(&mut self, entry: ChangelogEntry) {
        self.entries.insert(0, entry);
    }

    /// Serialize the full history, newest first.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (i, e) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!(
                "{} ({}) {}; urgency={}\n",
                e.package, e.version, e.distributions, e.urgency
            ));
            for line in &e.changes {
                out.push_str(line);
                out.push('\n');
            }
            out.push_str(&format!(" -- {}  {}\n", e.author, e.date));
        }
        out
    }

    /// Write the full history to `path`, replacing any existing file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_text())
            .map_err(Error::io(format!("writing changelog '{}'", path.display())))
    }
}

/// The rebuild version derived from a base entry: `<base>~<counter+1>`.
///
/// The tilde keeps every rebuild strictly before the base version under
/// dpkg ordering, and the injected counter keeps successive rebuilds of
/// the same upstream release strictly increasing.
pub fn next_version(base: &DebVersion, counter: u64) -> DebVersion {
    DebVersion::parse(&format!("{}~{}", base, counter + 1))
}

/// Current time in the RFC 2822 form changelog trailers use.
pub fn date_now() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc2822)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = "\
linux (3.8.13-1) wheezy; urgency=low

  * Rebuild in OBS

 -- \"Jane Doe\" <jane@example.com>  Tue, 05 Aug 2014 10:00:00 +0000

linux (3.8.11-1) wheezy; urgency=low

  * Initial packaging

 -- \"Jane Doe\" <jane@example.com>  Mon, 04 Aug 2014 09:00:00 +0000
";

    fn origin() -> PathBuf {
        PathBuf::from("changelog")
    }

    #[test]
    fn parses_newest_first() {
        let log = Changelog::parse(SAMPLE, &origin()).unwrap();
        assert_eq!(log.entries().len(), 2);

        let base = log.latest();
        assert_eq!(base.package, "linux");
        assert_eq!(base.version.to_string(), "3.8.13-1");
        assert_eq!(base.distributions, "wheezy");
        assert_eq!(base.urgency, "low");
        assert_eq!(base.changes, vec!["", "  * Rebuild in OBS", ""]);
        assert_eq!(base.author, "\"Jane Doe\" <jane@example.com>");
        assert_eq!(base.date, "Tue, 05 Aug 2014 10:00:00 +0000");
    }

    #[test]
    fn round_trips_canonical_text() {
        let log = Changelog::parse(SAMPLE, &origin()).unwrap();
        assert_eq!(log.to_text(), SAMPLE);
    }

    #[test]
    fn prepend_preserves_history() {
        let mut log = Changelog::parse(SAMPLE, &origin()).unwrap();
        let base = log.latest().clone();
        let version = next_version(&base.version, 3);
        log.prepend(ChangelogEntry {
            package: base.package.clone(),
            version: version.clone(),
            distributions: base.distributions.clone(),
            urgency: base.urgency.clone(),
            changes: vec![String::new(), "  * Rebuild in OBS".into(), String::new()],
            author: base.author.clone(),
            date: "Wed, 06 Aug 2014 11:00:00 +0000".into(),
        });

        assert_eq!(log.entries().len(), 3);
        assert_eq!(log.latest().version.to_string(), "3.8.13-1~4");

        // Everything that was there before is still there, in order.
        let reparsed = Changelog::parse(&log.to_text(), &origin()).unwrap();
        assert_eq!(reparsed.entries()[1..], log.entries()[1..]);
        assert_eq!(reparsed.latest().version, version);
    }

    #[test]
    fn next_version_is_monotonic_and_below_base() {
        let base = DebVersion::parse("3.8.13-1");
        let mut prev = next_version(&base, 0);
        assert_eq!(prev.to_string(), "3.8.13-1~1");
        for counter in 1..5 {
            let next = next_version(&base, counter);
            assert!(prev < next);
            assert!(next < base);
            prev = next;
        }
    }

    #[test]
    fn rejects_garbage_header() {
        let err = Changelog::parse("not a changelog\n", &origin()).unwrap_err();
        assert!(matches!(err, Error::MalformedChangelog { .. }));
    }

    #[test]
    fn rejects_unterminated_entry() {
        let text = "linux (1.0-1) wheezy; urgency=low\n\n  * Orphaned entry\n";
        let err = Changelog::parse(text, &origin()).unwrap_err();
        assert!(matches!(err, Error::MalformedChangelog { .. }));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = Changelog::read(Path::new("/nonexistent/changelog")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
