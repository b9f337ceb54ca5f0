use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use obs_prep::{preflight, BuildContext, Recipe};

fn usage() -> &'static str {
    "Usage:\n  obs-prep [package_dir]          build a Debian source package\n  obs-prep unpack [package_dir]   prepare the Debianized source tree only\n  obs-prep build [package_dir]    package an already prepared source tree\n\npackage_dir defaults to the current directory and must contain\n.obs/service.toml naming the package."
}

#[derive(Clone, Copy)]
enum Mode {
    Full,
    Unpack,
    PackageOnly,
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let (mode, dir) = match args.as_slice() {
        [] => (Mode::Full, None),
        [flag] if flag == "--help" || flag == "-h" => {
            println!("{}", usage());
            return Ok(());
        }
        [mode] if mode == "unpack" => (Mode::Unpack, None),
        [mode] if mode == "build" => (Mode::PackageOnly, None),
        [mode, dir] if mode == "unpack" => (Mode::Unpack, Some(dir.as_str())),
        [mode, dir] if mode == "build" => (Mode::PackageOnly, Some(dir.as_str())),
        [dir] => (Mode::Full, Some(dir.as_str())),
        _ => bail!(usage()),
    };

    let package_dir = match dir {
        Some(d) => PathBuf::from(d),
        None => std::env::current_dir().context("resolving current directory")?,
    };

    preflight::check_host_tools()?;

    let recipe = Recipe::for_dir(&package_dir)
        .with_context(|| format!("resolving recipe for '{}'", package_dir.display()))?;
    let mut ctx = BuildContext::new();

    match mode {
        Mode::Unpack => {
            println!("Unpacking Debianized source tree");
            recipe.prepare_source_tree(&mut ctx)?;
        }
        Mode::PackageOnly => {
            println!("Building package from Debianized source tree");
            recipe.package_only(&mut ctx)?;
        }
        Mode::Full => {
            println!("Building source package");
            recipe.build_source_package(&mut ctx)?;
        }
    }

    Ok(())
}
