use crate::cmd::{Globals, Workspace, initiative_id, render_outcome};
use crate::output::fail;
use anyhow::Result;
use clap::Args;
use std::path::Path;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Initiative id.
    pub id: String,
}

/// Execute `tl delete <id>`. Administrators delete immediately; members
/// request deletion of their own approved initiatives.
///
/// # Errors
///
/// Returns an error if the initiative is not visible or the caller may not
/// delete it.
pub fn run_delete(args: &DeleteArgs, globals: &Globals<'_>, project_root: &Path) -> Result<()> {
    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);
    let id = initiative_id(&args.id);

    let _lock = workspace.write_lock(globals.output)?;
    let mut engine = workspace.engine(globals.output)?;
    let outcome = engine
        .submit_delete(&identity, &id)
        .map_err(|err| fail(globals.output, &err))?;
    render_outcome(globals, &outcome, id.as_str())
}
