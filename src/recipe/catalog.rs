//! The fixed package catalog.
//!
//! One entry per package the build farm knows how to prepare. The table is
//! built at compile time; resolution is a name lookup with no registration
//! side effects. Pinned versions and git revisions live here so a catalog
//! bump is a one-line diff.

use super::{
    linux, machinekit, Compression, RebuildSpec, RecipeKind, RecipeSpec, VersionPolicy,
};
use crate::error::{Error, Result};

const BASE: RecipeSpec = RecipeSpec {
    name: "",
    kind: RecipeKind::Standard,
    source_url: None,
    compression: Compression::Gz,
    strip_components: 1,
    changelog_file: "changelog",
    changelog_in_staging: false,
    upstream_version: None,
    git_rev: "",
    git_rev_from_version: false,
    version_policy: VersionPolicy::TildeRevision,
    dpkg_source_args: &[],
    configure: None,
};

pub static CATALOG: &[RecipeSpec] = &[
    RecipeSpec {
        name: "xenomai",
        kind: RecipeKind::Native,
        upstream_version: Some("2.6.3"),
        compression: Compression::Bz2,
        source_url: Some("http://download.gna.org/xenomai/stable/xenomai-{rev}.tar.{comp}"),
        changelog_file: "debian/changelog",
        changelog_in_staging: true,
        dpkg_source_args: &["--format=3.0 (native)"],
        ..BASE
    },
    RecipeSpec {
        name: "rtai",
        source_url: Some("https://github.com/shabbyx/rtai/archive/{git}.tar.{comp}"),
        git_rev_from_version: true,
        ..BASE
    },
    RecipeSpec {
        name: "linux-tools",
        compression: Compression::Xz,
        source_url: Some("https://www.kernel.org/pub/linux/kernel/v3.x/linux-{rev}.tar.{comp}"),
        configure: Some(linux::configure_linux_tools),
        ..BASE
    },
    RecipeSpec {
        name: "linux",
        compression: Compression::Xz,
        source_url: Some("https://www.kernel.org/pub/linux/kernel/v3.x/linux-{rev}.tar.{comp}"),
        configure: Some(linux::configure_linux),
        ..BASE
    },
    RecipeSpec {
        name: "linux-latest",
        kind: RecipeKind::NoSource,
        configure: Some(linux::configure_linux_latest),
        ..BASE
    },
    RecipeSpec {
        name: "libsodium",
        source_url: Some(
            "https://download.libsodium.org/libsodium/releases/libsodium-{rev}.tar.{comp}",
        ),
        ..BASE
    },
    RecipeSpec {
        name: "zeromq4",
        source_url: Some("http://download.zeromq.org/zeromq-{rev}.tar.{comp}"),
        ..BASE
    },
    RecipeSpec {
        name: "cython",
        kind: RecipeKind::Rebuild(RebuildSpec {
            base_url: "http://ftp.de.debian.org/debian/pool/main/c/cython",
            debian_release: "1~bpo70+1",
            debian_compression: None,
        }),
        upstream_version: Some("0.19.1+git34-gac3e3a2"),
        ..BASE
    },
    RecipeSpec {
        name: "dh-python",
        kind: RecipeKind::Rebuild(RebuildSpec {
            base_url: "http://ftp.de.debian.org/debian/pool/main/d/dh-python",
            debian_release: "1~bpo70+1",
            debian_compression: Some(Compression::Gz),
        }),
        upstream_version: Some("1.20140511"),
        compression: Compression::Xz,
        ..BASE
    },
    RecipeSpec {
        name: "pyzmq",
        source_url: Some("https://github.com/zeromq/pyzmq/archive/v{rev}.tar.{comp}"),
        ..BASE
    },
    RecipeSpec {
        name: "czmq",
        source_url: Some("http://download.zeromq.org/czmq-{rev}.tar.{comp}"),
        ..BASE
    },
    RecipeSpec {
        name: "libwebsockets",
        git_rev: "95a8abb",
        // Snapshot URL embeds the pinned revision directly.
        source_url: Some(
            "http://git.libwebsockets.org/cgi-bin/cgit/libwebsockets/snapshot/libwebsockets-95a8abb.tar.gz",
        ),
        ..BASE
    },
    RecipeSpec {
        name: "jansson",
        compression: Compression::Bz2,
        source_url: Some("http://www.digip.org/jansson/releases/jansson-{rev}.tar.{comp}"),
        ..BASE
    },
    RecipeSpec {
        name: "python-pyftpdlib",
        source_url: Some("https://github.com/giampaolo/pyftpdlib/archive/release-{rev}.tar.{comp}"),
        ..BASE
    },
    RecipeSpec {
        name: "dovetail-automata-keyring",
        kind: RecipeKind::NoSource,
        ..BASE
    },
    RecipeSpec {
        name: "ghdl",
        kind: RecipeKind::Rebuild(RebuildSpec {
            base_url: "http://downloads.sourceforge.net/ghdl-updates/Builds/ghdl-{rev}/Debian",
            debian_release: "2wheezy1",
            debian_compression: None,
        }),
        upstream_version: Some("0.31"),
        ..BASE
    },
    RecipeSpec {
        name: "machinekit",
        kind: RecipeKind::Native,
        source_url: Some("https://github.com/zultron/machinekit/archive/{git}.tar.{comp}"),
        git_rev: "7468d44d",
        // 0.2.<update>.<git_rev>; bump the update number on upstream moves.
        upstream_version: Some("0.2.10.7468d44d"),
        changelog_file: "debian/changelog",
        version_policy: VersionPolicy::PinnedUpstream,
        dpkg_source_args: &["--format=3.0 (native)"],
        configure: Some(machinekit::configure),
        ..BASE
    },
];

/// Look the recipe for `name` up in the catalog.
pub fn resolve(name: &str) -> Result<&'static RecipeSpec> {
    CATALOG
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| Error::UnknownPackage(name.to_string()))
}
