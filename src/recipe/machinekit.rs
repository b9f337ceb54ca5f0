//! Configure hook for the machinekit package.
//!
//! Machinekit is native but generates its debian/ tree with its own
//! `debian/configure` script, parameterized by the kernel package ABI it
//! builds against. The stamped changelog is written into the staged tree
//! here because the overlay stage is a no-op for native packages.

use std::process::Command;

use crate::error::{Error, Result};
use crate::process;
use crate::staging::SOURCE_TREE;

use super::{BuildContext, Recipe};

/// Kernel package ABI version the real-time flavors are built against.
const LINUX_PACKAGE_ABIVER: &str = "3.8-1";

pub(crate) fn configure(recipe: &Recipe, ctx: &mut BuildContext) -> Result<()> {
    let tree = recipe.work().ensure(Some(SOURCE_TREE), false)?;

    let mut cmd = Command::new("debian/configure");
    cmd.arg("-prxD")
        .arg("-X")
        .arg(LINUX_PACKAGE_ABIVER)
        .arg("-R")
        .arg(LINUX_PACKAGE_ABIVER)
        .current_dir(&tree);
    let code = process::run_status(&mut cmd)?;
    if code != 0 {
        return Err(Error::ConfigurationTool {
            command: "debian/configure".to_string(),
            code,
        });
    }

    let dest = tree.join("debian/changelog");
    println!("    Writing changelog to {}", dest.display());
    recipe.changelog(ctx)?.write_to(&dest)?;

    println!("Configured source package");
    Ok(())
}
