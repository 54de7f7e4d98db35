use crate::cmd::{Globals, Workspace, initiative_id, render_outcome};
use crate::output::fail;
use anyhow::Result;
use clap::Args;
use std::path::Path;

#[derive(Args, Debug)]
pub struct RejectArgs {
    /// Initiative id.
    pub id: String,

    /// Why the request was turned down; sent to the requester.
    #[arg(long, default_value = "")]
    pub reason: String,
}

/// Execute `tl reject <id>`. Administrators only.
///
/// A rejected create stays visible to its entity as `rejected`; a rejected
/// update or deletion leaves the live record as it was.
///
/// # Errors
///
/// Returns an error if the caller is not an administrator or the
/// initiative has no pending request.
pub fn run_reject(args: &RejectArgs, globals: &Globals<'_>, project_root: &Path) -> Result<()> {
    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);
    let id = initiative_id(&args.id);

    let _lock = workspace.write_lock(globals.output)?;
    let mut engine = workspace.engine(globals.output)?;
    let outcome = engine
        .reject(&identity, &id, args.reason.trim())
        .map_err(|err| fail(globals.output, &err))?;
    render_outcome(globals, &outcome, id.as_str())
}
