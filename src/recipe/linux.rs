//! Configure hooks for the kernel family.
//!
//! The linux source package cannot be configured standalone: its control
//! generator needs a real-time patch out of the sibling rtai checkout and
//! an unpacked xenomai source tree. Both are resolved before the generator
//! runs; a missing or ambiguous sibling artifact aborts the pipeline first.
//!
//! The generators themselves are `debian/rules debian/control` runs. For
//! linux-tools and linux-latest that command exits nonzero every time by
//! design of the packaging scripts; its exit status is discarded and only
//! its side-effect files are used.

use std::fs;
use std::path::Path;
use std::process::Command;

use regex::Regex;

use crate::error::{Error, Result};
use crate::process;
use crate::sibling::{glob_paths, SiblingResolver};
use crate::staging::SOURCE_TREE;

use super::{BuildContext, Recipe};

/// Generated Python bytecode that makes `dpkg-source` reject the tree.
const LINUX_CONFIGURE_CRUFT: &[&str] = &[
    "debian/lib/python/debian_linux/debian.pyc",
    "debian/lib/python/debian_linux/gencontrol.pyc",
    "debian/lib/python/debian_linux/utils.pyc",
    "debian/lib/python/debian_linux/__init__.pyc",
    "debian/lib/python/debian_linux/config.pyc",
];

const LINUX_TOOLS_CONFIGURE_CRUFT: &[&str] = &[
    "debian/lib/python/debian_linux/debian.pyc",
    "debian/lib/python/debian_linux/gencontrol.pyc",
    "debian/lib/python/debian_linux/utils.pyc",
    "debian/lib/python/debian_linux/__init__.pyc",
];

const XENOMAI_TARBALL_GLOB: &str = "../xenomai/xenomai-*.tar.bz2";
const RTAI_PATCH_SUBDIR: &str = "base/arch/x86/patches";

pub(crate) fn configure_linux(recipe: &Recipe, ctx: &mut BuildContext) -> Result<()> {
    println!("Configuring Debian source package");

    resolve_xenomai_tree(recipe, ctx)?;
    resolve_rtai_patch(recipe, ctx)?;

    let tree = recipe.work().ensure(Some(SOURCE_TREE), false)?;
    let mut cmd = Command::new("debian/rules");
    cmd.arg("debian/control")
        .arg("NOFAIL=true")
        .args(&ctx.configure_args)
        .current_dir(&tree);
    let code = process::run_status(&mut cmd)?;
    if code != 0 {
        return Err(Error::ConfigurationTool {
            command: "debian/rules debian/control".to_string(),
            code,
        });
    }

    remove_cruft(&tree, LINUX_CONFIGURE_CRUFT)
}

pub(crate) fn configure_linux_tools(recipe: &Recipe, _ctx: &mut BuildContext) -> Result<()> {
    println!("Configuring Debian source package");

    let tree = recipe.work().ensure(Some(SOURCE_TREE), false)?;
    let mut cmd = Command::new("debian/rules");
    cmd.arg("debian/control").current_dir(&tree);
    // The control generator exits nonzero every time; status discarded by
    // contract, only its side-effect files are used.
    let _ = process::run_status(&mut cmd)?;

    remove_cruft(&tree, LINUX_TOOLS_CONFIGURE_CRUFT)?;
    println!("Configured source package");
    Ok(())
}

pub(crate) fn configure_linux_latest(recipe: &Recipe, _ctx: &mut BuildContext) -> Result<()> {
    println!("Configuring Debian source package");
    println!("    Checking for correct linux-support package");

    let resolver = SiblingResolver::new(recipe.package_dir());
    let sibling = resolver.recipe("linux")?;
    let mut sibling_ctx = BuildContext::new();
    let linux_version = sibling.upstream_version(&mut sibling_ctx)?;

    let subversion = linux_subversion(&linux_version).ok_or_else(|| Error::Metadata {
        path: sibling.package_dir().to_path_buf(),
        reason: format!("cannot determine linux sub-version from '{}'", linux_version),
    })?;
    let abiname = linux_abiname(sibling.package_dir())?;

    let support = format!("linux-support-{}-{}", subversion, abiname);
    println!("    Checking for package '{}'", support);
    let mut cmd = Command::new("dpkg-query");
    cmd.arg("-W").arg(&support);
    let code = process::run_status(&mut cmd)?;
    if code != 0 {
        return Err(Error::ConfigurationTool {
            command: format!("dpkg-query -W {}", support),
            code,
        });
    }

    println!("    Configuring source package");
    let tree = recipe.work().ensure(Some(SOURCE_TREE), false)?;
    let mut cmd = Command::new("debian/rules");
    cmd.arg("debian/control").current_dir(&tree);
    // Always fails; status discarded by contract.
    let _ = process::run_status(&mut cmd)?;
    Ok(())
}

/// Unpack the sibling xenomai tarball and inject its tree path.
fn resolve_xenomai_tree(recipe: &Recipe, ctx: &mut BuildContext) -> Result<()> {
    println!("    Unpacking Xenomai tarball for patch generation");
    let resolver = SiblingResolver::new(recipe.package_dir());
    let tarball = resolver.unique_match(XENOMAI_TARBALL_GLOB)?;

    let dest = recipe.work().ensure(Some("xenomai_source"), true)?;
    process::extract_tarball(&tarball, &dest, 1)?;
    ctx.configure_args.push(format!("XENO_SRCDIR={}", dest.display()));
    Ok(())
}

/// Unpack the sibling rtai tarball and inject the hal patch matching the
/// current linux upstream version. Exactly one patch must match.
fn resolve_rtai_patch(recipe: &Recipe, ctx: &mut BuildContext) -> Result<()> {
    println!("    Unpacking RTAI tarball for hal patch");
    let resolver = SiblingResolver::new(recipe.package_dir());
    let rtai = resolver.recipe("rtai")?;
    let mut rtai_ctx = BuildContext::new();
    let tarball = rtai.tarball(&mut rtai_ctx)?;
    if !tarball.exists() {
        return Err(Error::NotFound {
            what: "RTAI source tarball",
            path: tarball.path(),
        });
    }

    let dest = recipe.work().ensure(Some("rtai_source"), true)?;
    process::extract_tarball(&tarball.path(), &dest, 1)?;

    println!("    Locating RTAI hal patch");
    let version = recipe.upstream_version(ctx)?;
    let patch = find_hal_patch(&dest, &version)?;
    println!("        Found RTAI hal patch: {}", patch.display());
    ctx.configure_args
        .push(format!("RTAI_PATCH_SRC={}", patch.display()));
    Ok(())
}

/// Find the single `hal-linux-<version>-x86-<n>.patch` under the unpacked
/// rtai tree.
fn find_hal_patch(rtai_tree: &Path, linux_version: &str) -> Result<std::path::PathBuf> {
    let pattern = rtai_tree
        .join(RTAI_PATCH_SUBDIR)
        .join(format!("hal-linux-{}-x86-*.patch", linux_version));
    let name_re = Regex::new(&format!(
        r"^hal-linux-{}-x86-[0-9]+\.patch$",
        regex::escape(linux_version)
    ))
    .expect("static patch regex");

    let matches: Vec<_> = glob_paths(&pattern)?
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| name_re.is_match(n))
        })
        .collect();

    if matches.len() != 1 {
        return Err(Error::AmbiguousArtifact {
            pattern: pattern.display().to_string(),
            count: matches.len(),
        });
    }
    Ok(matches.into_iter().next().expect("exactly one match"))
}

/// `3.8.13` → `3.8`: the sub-version without the minor release.
fn linux_subversion(version: &str) -> Option<&str> {
    let re = Regex::new(r"^([0-9.]+)\.([0-9]+)$").expect("static regex");
    re.captures(version)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Read the kernel package abiname from `config/defines`.
fn linux_abiname(linux_dir: &Path) -> Result<String> {
    let defines = linux_dir.join("config/defines");
    if !defines.exists() {
        return Err(Error::NotFound {
            what: "linux defines file",
            path: defines,
        });
    }
    let text = fs::read_to_string(&defines)
        .map_err(Error::io(format!("reading '{}'", defines.display())))?;

    let re = Regex::new(r"^abiname:\s*(.+)$").expect("static regex");
    text.lines()
        .find_map(|line| re.captures(line).map(|caps| caps[1].trim().to_string()))
        .ok_or_else(|| Error::Metadata {
            path: defines,
            reason: "cannot determine linux package abiname".to_string(),
        })
}

fn remove_cruft(tree: &Path, paths: &[&str]) -> Result<()> {
    for rel in paths {
        let path = tree.join(rel);
        fs::remove_file(&path).map_err(Error::io(format!("removing '{}'", path.display())))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn subversion_strips_the_minor_release() {
        assert_eq!(linux_subversion("3.8.13"), Some("3.8"));
        assert_eq!(linux_subversion("3.10.1"), Some("3.10"));
        assert_eq!(linux_subversion("3.8"), Some("3"));
        assert_eq!(linux_subversion("not-a-version"), None);
    }

    #[test]
    fn abiname_is_read_from_defines() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(
            tmp.path().join("config/defines"),
            "[abi]\nabiname: 1\n\n[base]\narches: amd64 i386\n",
        )
        .unwrap();

        assert_eq!(linux_abiname(tmp.path()).unwrap(), "1");
    }

    #[test]
    fn missing_abiname_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(tmp.path().join("config/defines"), "[base]\n").unwrap();

        assert!(matches!(
            linux_abiname(tmp.path()).unwrap_err(),
            Error::Metadata { .. }
        ));
    }

    #[test]
    fn hal_patch_requires_exactly_one_match() {
        let tmp = TempDir::new().unwrap();
        let patches = tmp.path().join(RTAI_PATCH_SUBDIR);
        fs::create_dir_all(&patches).unwrap();

        // Zero matches.
        let err = find_hal_patch(tmp.path(), "3.8.13").unwrap_err();
        assert!(matches!(err, Error::AmbiguousArtifact { count: 0, .. }));

        // One match.
        fs::write(patches.join("hal-linux-3.8.13-x86-4.patch"), b"--- a\n").unwrap();
        let patch = find_hal_patch(tmp.path(), "3.8.13").unwrap();
        assert!(patch.ends_with("hal-linux-3.8.13-x86-4.patch"));

        // Two matches.
        fs::write(patches.join("hal-linux-3.8.13-x86-5.patch"), b"--- a\n").unwrap();
        let err = find_hal_patch(tmp.path(), "3.8.13").unwrap_err();
        assert!(matches!(err, Error::AmbiguousArtifact { count: 2, .. }));
    }

    #[test]
    fn hal_patch_for_other_versions_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let patches = tmp.path().join(RTAI_PATCH_SUBDIR);
        fs::create_dir_all(&patches).unwrap();
        fs::write(patches.join("hal-linux-3.8.12-x86-4.patch"), b"--- a\n").unwrap();

        let err = find_hal_patch(tmp.path(), "3.8.13").unwrap_err();
        assert!(matches!(err, Error::AmbiguousArtifact { count: 0, .. }));
    }
}
