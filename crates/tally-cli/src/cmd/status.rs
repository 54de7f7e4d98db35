use crate::cmd::{Globals, Workspace, initiative_id, render_outcome};
use crate::output::{CliError, fail, render_error};
use anyhow::Result;
use clap::Args;
use std::path::Path;
use tally_core::error::ErrorCode;
use tally_core::model::Status;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Initiative id.
    pub id: String,

    /// One of: not_started, on_going, done, hold, carry_over, cancelled.
    /// `hold`, `carry_over` and `cancelled` pin the status; any other value
    /// hands it back to the progress rollup.
    pub status: String,
}

/// Execute `tl status <id> <status>`. Administrators only.
///
/// # Errors
///
/// Returns an error for an unknown status name, a non-admin caller, or a
/// missing initiative.
pub fn run_status(args: &StatusArgs, globals: &Globals<'_>, project_root: &Path) -> Result<()> {
    let status: Status = match args.status.parse() {
        Ok(status) => status,
        Err(err) => {
            let code = ErrorCode::InvalidEnumValue;
            render_error(
                globals.output,
                &CliError::with_details(
                    format!("{err}"),
                    code.hint().unwrap_or_default(),
                    code.code(),
                ),
            )?;
            anyhow::bail!("{err}");
        }
    };

    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);
    let id = initiative_id(&args.id);

    let _lock = workspace.write_lock(globals.output)?;
    let mut engine = workspace.engine(globals.output)?;
    let outcome = engine
        .set_status(&identity, &id, status)
        .map_err(|err| fail(globals.output, &err))?;
    render_outcome(globals, &outcome, id.as_str())
}
