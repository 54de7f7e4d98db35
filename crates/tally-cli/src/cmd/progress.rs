use crate::cmd::{Globals, Workspace, initiative_id, render_outcome};
use crate::output::fail;
use anyhow::Result;
use clap::Args;
use std::path::Path;
use tally_core::workflow::ProgressTarget;

#[derive(Args, Debug)]
pub struct ProgressArgs {
    /// Initiative id.
    pub id: String,

    /// New progress (0-100).
    pub value: u8,

    /// Key activity to update, counting from 1. Without it the initiative's
    /// own progress is set, which is only allowed when it has no activities.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub activity: Option<u16>,
}

fn target(activity: Option<u16>) -> ProgressTarget {
    match activity {
        Some(position) => ProgressTarget::Activity(usize::from(position).saturating_sub(1)),
        None => ProgressTarget::Overall,
    }
}

/// Execute `tl progress <id> <value>`.
///
/// # Errors
///
/// Returns an error if the caller may not update the initiative, the
/// activity does not exist, or the value is out of range.
pub fn run_progress(args: &ProgressArgs, globals: &Globals<'_>, project_root: &Path) -> Result<()> {
    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);
    let id = initiative_id(&args.id);

    let _lock = workspace.write_lock(globals.output)?;
    let mut engine = workspace.engine(globals.output)?;
    let outcome = engine
        .update_activity_progress(&identity, &id, target(args.activity), args.value)
        .map_err(|err| fail(globals.output, &err))?;
    render_outcome(globals, &outcome, id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_positions_are_one_based() {
        assert_eq!(target(Some(1)), ProgressTarget::Activity(0));
        assert_eq!(target(Some(3)), ProgressTarget::Activity(2));
        assert_eq!(target(None), ProgressTarget::Overall);
    }
}
