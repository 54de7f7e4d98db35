//! `tl pending`: the administrator's approval queue.

use crate::cmd::show::InitiativeView;
use crate::cmd::{Globals, Workspace};
use crate::output::{fail, render_list};
use anyhow::Result;
use clap::Args;
use std::path::Path;

#[derive(Args, Debug, Default)]
pub struct PendingArgs {}

/// Execute `tl pending`. Administrators only.
///
/// # Errors
///
/// Returns an error if the caller is not an administrator.
pub fn run_pending(_args: &PendingArgs, globals: &Globals<'_>, project_root: &Path) -> Result<()> {
    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);
    let _lock = workspace.read_lock(globals.output)?;
    let engine = workspace.engine(globals.output)?;

    let queue = engine
        .pending(&identity)
        .map_err(|err| fail(globals.output, &err))?;

    if queue.is_empty() && !globals.output.is_json() {
        if !globals.quiet {
            println!("Nothing awaiting approval.");
        }
        return Ok(());
    }
    let views: Vec<InitiativeView<'_>> = queue.iter().map(InitiativeView).collect();
    render_list(&views, globals.output)?;
    Ok(())
}
