//! External command invocation.
//!
//! Every external tool call is a blocking `Command` whose exit status the
//! caller inspects; nothing here retries or times out. Command lines are
//! logged before running so the progress output reads as a transcript.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Render a command line the way it was logged.
pub fn display_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Log and run a command, returning its exit code.
///
/// Only spawn failures are errors here; a nonzero exit is the caller's to
/// interpret (some generators fail by contract).
pub fn run_status(cmd: &mut Command) -> Result<i32> {
    let line = display_command(cmd);
    println!("    Running command:  {}", line);
    let status = cmd
        .status()
        .map_err(Error::io(format!("spawning `{}`", line)))?;
    Ok(status.code().unwrap_or(-1))
}

/// Extract a tarball into `dest`, stripping leading path components.
///
/// Shells out to system `tar`, which picks the decompressor from the file.
pub fn extract_tarball(tarball: &Path, dest: &Path, strip_components: u32) -> Result<()> {
    let mut cmd = Command::new("tar");
    cmd.arg("xCf")
        .arg(dest)
        .arg(tarball)
        .arg(format!("--strip-components={}", strip_components));
    let code = run_status(&mut cmd)?;
    if code != 0 {
        return Err(Error::Extraction {
            tarball: tarball.display().to_string(),
            code,
        });
    }
    Ok(())
}

/// Unpack a `git archive` snapshot of `repo_dir`'s tracked tree into `dest`,
/// with every path prefixed by `prefix`.
///
/// The archive stream is consumed in-process; only git runs externally.
pub fn git_archive_overlay(repo_dir: &Path, prefix: &str, dest: &Path) -> Result<()> {
    let mut cmd = Command::new("git");
    cmd.arg("archive")
        .arg(format!("--prefix={}", prefix))
        .arg("HEAD")
        .current_dir(repo_dir)
        .stdout(Stdio::piped());
    println!("    Running command:  {}", display_command(&cmd));

    let mut child = cmd
        .spawn()
        .map_err(Error::io("spawning `git archive`".to_string()))?;
    let stdout = child.stdout.take().ok_or_else(|| Error::Io {
        context: "capturing `git archive` output".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "no stdout handle"),
    })?;

    let unpacked = tar::Archive::new(stdout)
        .unpack(dest)
        .map_err(Error::io(format!("unpacking snapshot into '{}'", dest.display())));

    let status = child
        .wait()
        .map_err(Error::io("waiting for `git archive`".to_string()))?;
    unpacked?;
    if !status.success() {
        return Err(Error::Snapshot {
            code: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}
