use crate::cmd::{Globals, Workspace};
use crate::output::{CliError, fail, render_error, render_success};
use anyhow::Result;
use clap::Args;
use std::path::Path;
use tally_core::error::ErrorCode;

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Notification number as shown by `tl inbox`.
    pub id: u64,
}

/// Execute `tl read <id>`: mark one inbox notification as read.
///
/// # Errors
///
/// Returns an error if the notification is not in the caller's inbox.
pub fn run_read(args: &ReadArgs, globals: &Globals<'_>, project_root: &Path) -> Result<()> {
    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);

    let _lock = workspace.write_lock(globals.output)?;
    let mut engine = workspace.engine(globals.output)?;
    let found = engine
        .mark_read(&identity, args.id)
        .map_err(|err| fail(globals.output, &err))?;

    if !found {
        render_error(
            globals.output,
            &CliError::with_details(
                format!("notification #{} is not in your inbox", args.id),
                "run `tl inbox` to list notification numbers",
                ErrorCode::InitiativeNotFound.code(),
            ),
        )?;
        anyhow::bail!("notification #{} not found", args.id);
    }
    render_success(globals.output, &format!("Marked #{} as read", args.id))
}
