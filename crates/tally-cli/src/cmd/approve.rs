use crate::cmd::{Globals, Workspace, initiative_id, render_outcome};
use crate::output::fail;
use anyhow::Result;
use clap::Args;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ApproveArgs {
    /// Initiative id.
    pub id: String,

    /// Note appended to the notification sent to the requester.
    #[arg(long)]
    pub note: Option<String>,
}

/// Execute `tl approve <id>`. Administrators only.
///
/// # Errors
///
/// Returns an error if the caller is not an administrator or the
/// initiative has no pending request.
pub fn run_approve(args: &ApproveArgs, globals: &Globals<'_>, project_root: &Path) -> Result<()> {
    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);
    let id = initiative_id(&args.id);

    let _lock = workspace.write_lock(globals.output)?;
    let mut engine = workspace.engine(globals.output)?;
    let note = args.note.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let outcome = engine
        .approve(&identity, &id, note)
        .map_err(|err| fail(globals.output, &err))?;
    render_outcome(globals, &outcome, id.as_str())
}
