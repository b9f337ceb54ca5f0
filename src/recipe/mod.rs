//! Recipe resolution and the staged build pipeline.
//!
//! Every package in the catalog maps to one [`RecipeSpec`]: a closed
//! variant kind plus the per-package data the shared pipeline consumes
//! (URL template, compression, stage flags, optional configure hook).
//! A [`Recipe`] binds a spec to a package checkout for one invocation;
//! everything computed along the way (parsed changelog, next version,
//! accumulated configure arguments) lives in an explicit [`BuildContext`]
//! rather than hidden lazy state.
//!
//! Stage order is fixed: init → fetch → unpack → version-stamp →
//! overlay-metadata → configure → package → teardown. Three entry points
//! compose it: a full build, a prepare-only run that leaves the staging
//! tree for inspection, and a package-only retry against a previously
//! prepared tree. Teardown runs on success only — a failed pipeline keeps
//! the staging area for forensics.

pub mod catalog;
pub mod linux;
pub mod machinekit;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::changelog::{self, Changelog, ChangelogEntry};
use crate::error::{Error, Result};
use crate::process;
use crate::service::ServiceMetadata;
use crate::sibling::glob_paths;
use crate::staging::{WorkArea, SOURCE_TREE};
use crate::tarball::Tarball;
use crate::version::DebVersion;

/// How a package's sources and packaging metadata relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeKind {
    /// Separate upstream tarball, packaging overlaid from version control.
    Standard,
    /// The upstream tarball already contains the packaging metadata.
    Native,
    /// All sources live directly in the package directory.
    NoSource,
    /// Authoritative packaging artifacts are built and hosted elsewhere.
    Rebuild(RebuildSpec),
}

/// Where a rebuild package's pre-built artifacts are hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildSpec {
    /// Base URL; may contain `{rev}`.
    pub base_url: &'static str,
    /// Debian release suffix of the hosted artifacts, e.g. `1~bpo70+1`.
    pub debian_release: &'static str,
    /// Compression of the hosted debianization tarball when it differs
    /// from the upstream compression.
    pub debian_compression: Option<Compression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gz,
    Bz2,
    Xz,
}

impl Compression {
    pub fn ext(self) -> &'static str {
        match self {
            Compression::Gz => "gz",
            Compression::Bz2 => "bz2",
            Compression::Xz => "xz",
        }
    }

    /// The `-Z` compressor name `dpkg-source` expects.
    pub fn dpkg_tool(self) -> &'static str {
        match self {
            Compression::Gz => "gzip",
            Compression::Bz2 => "bzip2",
            Compression::Xz => "xz",
        }
    }
}

/// How the version-stamp stage derives the new changelog version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPolicy {
    /// `<base>~<counter+1>`: strictly before the base, increasing per rebuild.
    TildeRevision,
    /// The pinned upstream version verbatim.
    PinnedUpstream,
}

pub type ConfigureHook = fn(&Recipe, &mut BuildContext) -> Result<()>;

/// Per-package behavior bundle consumed by the shared pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RecipeSpec {
    pub name: &'static str,
    pub kind: RecipeKind,
    /// Upstream tarball URL with `{rev}`, `{git}`, `{comp}` placeholders.
    pub source_url: Option<&'static str>,
    pub compression: Compression,
    /// Leading path components stripped on extraction.
    pub strip_components: u32,
    /// Changelog location relative to the package dir (or the staged tree).
    pub changelog_file: &'static str,
    /// Read the changelog out of the staged source tree instead of the
    /// package dir (native packages whose ledger ships in the tarball).
    pub changelog_in_staging: bool,
    /// Pinned upstream version; absent means "read it from the changelog".
    pub upstream_version: Option<&'static str>,
    pub git_rev: &'static str,
    /// Derive the git revision from the upstream version's trailing
    /// dot-separated component.
    pub git_rev_from_version: bool,
    pub version_policy: VersionPolicy,
    pub dpkg_source_args: &'static [&'static str],
    pub configure: Option<ConfigureHook>,
}

/// Render a URL template against the pipeline's substitution variables.
pub fn render_url(template: &str, rev: &str, git: &str, comp: &str) -> String {
    template
        .replace("{rev}", rev)
        .replace("{git}", git)
        .replace("{comp}", comp)
}

/// Per-invocation pipeline state: computed once, carried explicitly.
#[derive(Debug, Default)]
pub struct BuildContext {
    changelog: Option<Changelog>,
    /// The version stamped by this invocation, once computed.
    pub next_version: Option<DebVersion>,
    /// `KEY=value` parameters accumulated for the configure generator.
    pub configure_args: Vec<String>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A recipe bound to one package checkout for one invocation.
pub struct Recipe {
    spec: &'static RecipeSpec,
    package_dir: PathBuf,
    service: ServiceMetadata,
    work: WorkArea,
}

impl Recipe {
    /// Resolve the recipe for a package directory from its service
    /// metadata and the catalog.
    pub fn for_dir(package_dir: &Path) -> Result<Recipe> {
        let package_dir = package_dir.canonicalize().map_err(Error::io(format!(
            "resolving package directory '{}'",
            package_dir.display()
        )))?;
        let service = ServiceMetadata::read(&package_dir)?;
        let spec = catalog::resolve(&service.package)?;
        let work = WorkArea::new(&package_dir, spec.name);
        Ok(Recipe {
            spec,
            package_dir,
            service,
            work,
        })
    }

    pub fn spec(&self) -> &'static RecipeSpec {
        self.spec
    }

    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    pub fn work(&self) -> &WorkArea {
        &self.work
    }

    pub fn service(&self) -> &ServiceMetadata {
        &self.service
    }

    fn changelog_path(&self) -> PathBuf {
        if self.spec.changelog_in_staging {
            self.work.source_tree().join(self.spec.changelog_file)
        } else {
            self.package_dir.join(self.spec.changelog_file)
        }
    }

    /// The parsed ledger, read once per invocation.
    pub fn changelog<'a>(&self, ctx: &'a mut BuildContext) -> Result<&'a mut Changelog> {
        if ctx.changelog.is_none() {
            ctx.changelog = Some(Changelog::read(&self.changelog_path())?);
        }
        Ok(ctx.changelog.as_mut().expect("changelog initialized above"))
    }

    /// Pinned upstream version, or the one in the base changelog entry.
    pub fn upstream_version(&self, ctx: &mut BuildContext) -> Result<String> {
        if let Some(v) = self.spec.upstream_version {
            return Ok(v.to_string());
        }
        Ok(self.changelog(ctx)?.latest().version.upstream().to_string())
    }

    fn git_rev(&self, ctx: &mut BuildContext) -> Result<String> {
        if !self.spec.git_rev.is_empty() {
            return Ok(self.spec.git_rev.to_string());
        }
        if self.spec.git_rev_from_version {
            let version = self.upstream_version(ctx)?;
            return match version.rsplit_once('.') {
                Some((_, git)) if !git.is_empty() => Ok(git.to_string()),
                _ => Err(Error::MalformedChangelog {
                    path: self.changelog_path(),
                    reason: format!(
                        "cannot derive git revision from upstream version '{}'",
                        version
                    ),
                }),
            };
        }
        Ok(String::new())
    }

    /// The source artifact slot for this package.
    pub fn tarball(&self, ctx: &mut BuildContext) -> Result<Tarball> {
        let version = self.upstream_version(ctx)?;
        let ext = self.spec.compression.ext();
        Ok(match self.spec.kind {
            RecipeKind::Native => Tarball::native(&self.package_dir, self.spec.name, &version, ext),
            _ => Tarball::orig(&self.package_dir, self.spec.name, &version, ext),
        })
    }

    fn source_url(&self, ctx: &mut BuildContext) -> Result<String> {
        let template = self
            .spec
            .source_url
            .ok_or(Error::MissingUrl(self.spec.name))?;
        let rev = self.upstream_version(ctx)?;
        let git = self.git_rev(ctx)?;
        Ok(render_url(template, &rev, &git, self.spec.compression.ext()))
    }

    // ── stages ──────────────────────────────────────────────────────────

    fn fetch_source(&self, ctx: &mut BuildContext) -> Result<()> {
        if matches!(self.spec.kind, RecipeKind::NoSource | RecipeKind::Rebuild(_)) {
            // Sources live in the package dir, or arrive at the package stage.
            return Ok(());
        }
        let tarball = self.tarball(ctx)?;
        println!("Original source tarball '{}':", tarball.file_name());
        if tarball.exists() {
            println!("    Already exists; doing nothing");
            return Ok(());
        }
        let url = self.source_url(ctx)?;
        tarball.fetch(&url)
    }

    fn unpack_source(&self, ctx: &mut BuildContext) -> Result<()> {
        if matches!(self.spec.kind, RecipeKind::NoSource | RecipeKind::Rebuild(_)) {
            return Ok(());
        }
        println!("Unpacking original source tarball");
        let tree = self.work.ensure(Some(SOURCE_TREE), true)?;
        let tarball = self.tarball(ctx)?;
        process::extract_tarball(&tarball.path(), &tree, self.spec.strip_components)
    }

    fn stamp_version(&self, ctx: &mut BuildContext) -> Result<()> {
        if matches!(self.spec.kind, RecipeKind::Rebuild(_)) {
            println!("Not generating new changelog entry for rebuilt package");
            return Ok(());
        }

        let (base_version, distributions, urgency) = {
            let base = self.changelog(ctx)?.latest();
            (
                base.version.clone(),
                base.distributions.clone(),
                base.urgency.clone(),
            )
        };
        let next = match self.spec.version_policy {
            VersionPolicy::TildeRevision => {
                changelog::next_version(&base_version, self.service.revision)
            }
            VersionPolicy::PinnedUpstream => DebVersion::parse(&self.upstream_version(ctx)?),
        };
        println!("Stamping new changelog entry: {} ({})", self.spec.name, next);

        let entry = ChangelogEntry {
            package: self.spec.name.to_string(),
            version: next.clone(),
            distributions,
            urgency,
            changes: vec![
                String::new(),
                "  * Rebuild in OBS".to_string(),
                String::new(),
            ],
            author: self.service.author_line(),
            date: changelog::date_now(),
        };
        self.changelog(ctx)?.prepend(entry);
        ctx.next_version = Some(next);
        Ok(())
    }

    fn overlay_metadata(&self, ctx: &mut BuildContext) -> Result<()> {
        match self.spec.kind {
            RecipeKind::Native => {
                println!("Debianizing source tree:  not needed for native package");
                Ok(())
            }
            RecipeKind::Rebuild(_) => Ok(()),
            RecipeKind::Standard | RecipeKind::NoSource => {
                println!("Debianizing source tree from version control");
                let tree = self.work.ensure(Some(SOURCE_TREE), false)?;
                process::git_archive_overlay(&self.package_dir, "debian/", &tree)?;

                let dest = tree.join("debian/changelog");
                println!("    Writing changelog to {}", dest.display());
                self.changelog(ctx)?.write_to(&dest)
            }
        }
    }

    fn run_configure(&self, ctx: &mut BuildContext) -> Result<()> {
        match self.spec.configure {
            Some(hook) => hook(self, ctx),
            None => Ok(()),
        }
    }

    fn package_source(&self, ctx: &mut BuildContext) -> Result<()> {
        if let RecipeKind::Rebuild(rebuild) = self.spec.kind {
            return self.fetch_rebuild_artifacts(&rebuild, ctx);
        }

        println!("Building Debian source package");
        let ext = self.spec.compression.ext();
        if matches!(self.spec.kind, RecipeKind::NoSource) {
            // All sources are tracked here; stray cached tarballs would be
            // picked up by dpkg-source.
            purge_matching(
                &self.package_dir,
                &format!("{}_*.tar.{}", self.spec.name, ext),
            )?;
        }
        purge_matching(
            &self.package_dir,
            &format!("{}_*.debian.tar.{}", self.spec.name, ext),
        )?;
        purge_matching(&self.package_dir, &format!("{}_*.dsc", self.spec.name))?;

        let tree = self.work.ensure(Some(SOURCE_TREE), false)?;
        let mut cmd = Command::new("dpkg-source");
        cmd.args(self.spec.dpkg_source_args)
            .arg(format!("-Z{}", self.spec.compression.dpkg_tool()))
            .arg("-b")
            .arg(&tree)
            .current_dir(&self.package_dir);
        let code = process::run_status(&mut cmd)?;
        if code != 0 {
            return Err(Error::PackagingTool {
                command: "dpkg-source".to_string(),
                code,
            });
        }
        Ok(())
    }

    /// The deterministic names of a rebuild package's hosted artifacts:
    /// `(debianization_tarball, dsc_file)`.
    pub fn rebuild_filenames(
        &self,
        rebuild: &RebuildSpec,
        ctx: &mut BuildContext,
    ) -> Result<(String, String)> {
        let rev = self.upstream_version(ctx)?;
        let deb_comp = rebuild.debian_compression.unwrap_or(self.spec.compression);
        let debianization = format!(
            "{}_{}-{}.debian.tar.{}",
            self.spec.name,
            rev,
            rebuild.debian_release,
            deb_comp.ext()
        );
        let dsc = format!("{}_{}-{}.dsc", self.spec.name, rev, rebuild.debian_release);
        Ok((debianization, dsc))
    }

    fn fetch_rebuild_artifacts(
        &self,
        rebuild: &RebuildSpec,
        ctx: &mut BuildContext,
    ) -> Result<()> {
        let rev = self.upstream_version(ctx)?;
        let base = render_url(rebuild.base_url, &rev, "", self.spec.compression.ext());
        let (debianization, dsc) = self.rebuild_filenames(rebuild, ctx)?;

        println!("Fetching debianization tarball '{}':", debianization);
        Tarball::named(&self.package_dir, &debianization)
            .fetch(&format!("{}/{}", base, debianization))?;

        println!("Fetching Debian source control file '{}':", dsc);
        Tarball::named(&self.package_dir, &dsc).fetch(&format!("{}/{}", base, dsc))?;
        Ok(())
    }

    // ── entry points ────────────────────────────────────────────────────

    /// Prepare the staging tree: init → fetch → unpack → version-stamp →
    /// overlay-metadata → configure. No packaging, no teardown.
    pub fn prepare_source_tree(&self, ctx: &mut BuildContext) -> Result<()> {
        self.work.ensure(None, true)?;
        self.fetch_source(ctx)?;
        self.unpack_source(ctx)?;
        self.stamp_version(ctx)?;
        self.overlay_metadata(ctx)?;
        self.run_configure(ctx)
    }

    /// Full build: prepare, package, tear the staging area down.
    pub fn build_source_package(&self, ctx: &mut BuildContext) -> Result<()> {
        self.prepare_source_tree(ctx)?;
        self.package_source(ctx)?;
        self.work.remove()
    }

    /// Re-run the packaging stage against an already prepared staging tree,
    /// tearing down on success.
    pub fn package_only(&self, ctx: &mut BuildContext) -> Result<()> {
        self.package_source(ctx)?;
        self.work.remove()
    }
}

/// Delete every file in `dir` matching `pattern`, logging each removal.
fn purge_matching(dir: &Path, pattern: &str) -> Result<()> {
    for path in glob_paths(&dir.join(pattern))? {
        println!("    Removing existing file '{}'", path.display());
        fs::remove_file(&path).map_err(Error::io(format!("removing '{}'", path.display())))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_package_dir(root: &Path, name: &str, revision: u64, changelog: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(dir.join(".obs")).unwrap();
        fs::write(
            dir.join(".obs/service.toml"),
            format!(
                "package = \"{}\"\nrevision = {}\n\n[author]\nname = \"Jane Doe\"\nemail = \"jane@example.com\"\n",
                name, revision
            ),
        )
        .unwrap();
        if !changelog.is_empty() {
            fs::write(dir.join("changelog"), changelog).unwrap();
        }
        dir
    }

    fn changelog_text(package: &str, version: &str) -> String {
        format!(
            "{} ({}) wheezy; urgency=low\n\n  * Initial packaging\n\n -- \"Jane Doe\" <jane@example.com>  Mon, 04 Aug 2014 09:00:00 +0000\n",
            package, version
        )
    }

    #[test]
    fn render_url_substitutes_all_placeholders() {
        let url = render_url(
            "https://github.com/shabbyx/rtai/archive/{git}.tar.{comp}",
            "4.0.1",
            "abc123",
            "gz",
        );
        assert_eq!(url, "https://github.com/shabbyx/rtai/archive/abc123.tar.gz");

        let url = render_url(
            "https://www.kernel.org/pub/linux/kernel/v3.x/linux-{rev}.tar.{comp}",
            "3.8.13",
            "",
            "xz",
        );
        assert_eq!(
            url,
            "https://www.kernel.org/pub/linux/kernel/v3.x/linux-3.8.13.tar.xz"
        );
    }

    #[test]
    fn stamp_version_appends_tilde_entry() {
        let tmp = TempDir::new().unwrap();
        let dir = write_package_dir(
            tmp.path(),
            "zeromq4",
            3,
            &changelog_text("zeromq4", "4.0.4-1"),
        );

        let recipe = Recipe::for_dir(&dir).unwrap();
        let mut ctx = BuildContext::new();
        recipe.stamp_version(&mut ctx).unwrap();

        assert_eq!(ctx.next_version.as_ref().unwrap().to_string(), "4.0.4-1~4");
        let log = recipe.changelog(&mut ctx).unwrap();
        let latest = log.latest();
        assert_eq!(latest.version.to_string(), "4.0.4-1~4");
        assert_eq!(latest.distributions, "wheezy");
        assert_eq!(latest.changes, vec!["", "  * Rebuild in OBS", ""]);
        assert_eq!(log.entries().len(), 2);
    }

    #[test]
    fn upstream_version_comes_from_changelog_unless_pinned() {
        let tmp = TempDir::new().unwrap();
        let dir = write_package_dir(tmp.path(), "jansson", 0, &changelog_text("jansson", "2.5-1"));

        let recipe = Recipe::for_dir(&dir).unwrap();
        let mut ctx = BuildContext::new();
        assert_eq!(recipe.upstream_version(&mut ctx).unwrap(), "2.5");

        // Pinned specs never read the ledger.
        let dir = write_package_dir(tmp.path(), "cython", 0, "");
        let recipe = Recipe::for_dir(&dir).unwrap();
        let mut ctx = BuildContext::new();
        assert_eq!(
            recipe.upstream_version(&mut ctx).unwrap(),
            "0.19.1+git34-gac3e3a2"
        );
    }

    #[test]
    fn rtai_git_rev_is_derived_from_version() {
        let tmp = TempDir::new().unwrap();
        let dir = write_package_dir(
            tmp.path(),
            "rtai",
            0,
            &changelog_text("rtai", "4.0.0.ab12cd3-1"),
        );

        let recipe = Recipe::for_dir(&dir).unwrap();
        let mut ctx = BuildContext::new();
        assert_eq!(recipe.git_rev(&mut ctx).unwrap(), "ab12cd3");
        assert_eq!(
            recipe.source_url(&mut ctx).unwrap(),
            "https://github.com/shabbyx/rtai/archive/ab12cd3.tar.gz"
        );
    }

    #[test]
    fn native_changelog_is_read_from_staging() {
        let tmp = TempDir::new().unwrap();
        let dir = write_package_dir(tmp.path(), "xenomai", 0, "");

        let recipe = Recipe::for_dir(&dir).unwrap();
        let path = recipe.changelog_path();
        assert!(path.ends_with("tmp/xenomai/source_tree/debian/changelog"));

        // Native tarball filename omits the `.orig` qualifier.
        let mut ctx = BuildContext::new();
        let tarball = recipe.tarball(&mut ctx).unwrap();
        assert_eq!(tarball.file_name(), "xenomai_2.6.3.tar.bz2");
    }

    #[test]
    fn rebuild_filenames_follow_the_hosted_naming() {
        let tmp = TempDir::new().unwrap();

        let dir = write_package_dir(tmp.path(), "ghdl", 0, "");
        let recipe = Recipe::for_dir(&dir).unwrap();
        let mut ctx = BuildContext::new();
        let RecipeKind::Rebuild(rebuild) = recipe.spec().kind else {
            panic!("ghdl must be a rebuild recipe");
        };
        let (debianization, dsc) = recipe.rebuild_filenames(&rebuild, &mut ctx).unwrap();
        assert_eq!(debianization, "ghdl_0.31-2wheezy1.debian.tar.gz");
        assert_eq!(dsc, "ghdl_0.31-2wheezy1.dsc");

        // dh-python's debianization tarball is gz even though upstream is xz.
        let dir = write_package_dir(tmp.path(), "dh-python", 0, "");
        let recipe = Recipe::for_dir(&dir).unwrap();
        let mut ctx = BuildContext::new();
        let RecipeKind::Rebuild(rebuild) = recipe.spec().kind else {
            panic!("dh-python must be a rebuild recipe");
        };
        let (debianization, dsc) = recipe.rebuild_filenames(&rebuild, &mut ctx).unwrap();
        assert_eq!(debianization, "dh-python_1.20140511-1~bpo70+1.debian.tar.gz");
        assert_eq!(dsc, "dh-python_1.20140511-1~bpo70+1.dsc");
    }

    #[test]
    fn purge_matching_removes_only_matches() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("czmq_2.1.0-1.dsc"), b"x").unwrap();
        fs::write(tmp.path().join("czmq_2.1.0-1.debian.tar.gz"), b"x").unwrap();
        fs::write(tmp.path().join("czmq_2.1.0.orig.tar.gz"), b"x").unwrap();

        purge_matching(tmp.path(), "czmq_*.dsc").unwrap();
        purge_matching(tmp.path(), "czmq_*.debian.tar.gz").unwrap();

        assert!(!tmp.path().join("czmq_2.1.0-1.dsc").exists());
        assert!(!tmp.path().join("czmq_2.1.0-1.debian.tar.gz").exists());
        assert!(tmp.path().join("czmq_2.1.0.orig.tar.gz").exists());
    }

    #[test]
    fn stamped_ledger_survives_a_write_read_cycle() {
        let tmp = TempDir::new().unwrap();
        let dir = write_package_dir(
            tmp.path(),
            "zeromq4",
            0,
            &changelog_text("zeromq4", "4.0.4-1"),
        );

        let recipe = Recipe::for_dir(&dir).unwrap();
        let mut ctx = BuildContext::new();
        recipe.stamp_version(&mut ctx).unwrap();

        let dest = tmp.path().join("stamped-changelog");
        recipe.changelog(&mut ctx).unwrap().write_to(&dest).unwrap();

        let reread = Changelog::read(&dest).unwrap();
        assert_eq!(reread.entries().len(), 2);
        assert_eq!(reread.latest().version.to_string(), "4.0.4-1~1");
    }
}
