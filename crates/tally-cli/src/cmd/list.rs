//! `tl list`: initiatives visible to the acting user.

use crate::cmd::show::InitiativeView;
use crate::cmd::{Globals, Workspace};
use crate::output::{CliError, fail, render_error, render_list};
use anyhow::Result;
use clap::Args;
use std::path::Path;
use tally_core::error::ErrorCode;
use tally_core::model::{ApprovalKind, EntityId, Initiative, Status};

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Only this entity.
    #[arg(long)]
    pub entity: Option<String>,

    /// Only this status (e.g. `on_going`).
    #[arg(long)]
    pub status: Option<String>,

    /// Only this approval state.
    #[arg(long, value_parser = parse_approval)]
    pub approval: Option<ApprovalKind>,
}

fn parse_approval(raw: &str) -> Result<ApprovalKind, String> {
    match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "approved" => Ok(ApprovalKind::Approved),
        "pending_create" => Ok(ApprovalKind::PendingCreate),
        "pending_update" => Ok(ApprovalKind::PendingUpdate),
        "pending_delete" => Ok(ApprovalKind::PendingDelete),
        "rejected" => Ok(ApprovalKind::Rejected),
        other => Err(format!(
            "unknown approval state '{other}' (expected approved, pending_create, pending_update, pending_delete or rejected)"
        )),
    }
}

#[derive(Debug, Default)]
struct Filter {
    entity: Option<EntityId>,
    status: Option<Status>,
    approval: Option<ApprovalKind>,
}

impl Filter {
    fn matches(&self, initiative: &Initiative) -> bool {
        self.entity.as_ref().is_none_or(|e| initiative.entity() == e)
            && self.status.is_none_or(|s| initiative.status() == s)
            && self.approval.is_none_or(|a| initiative.approval_kind() == a)
    }
}

/// Execute `tl list`.
///
/// Filters narrow the caller's visible set; they never widen it.
///
/// # Errors
///
/// Returns an error for an unknown status name or when the workspace cannot
/// be read.
pub fn run_list(args: &ListArgs, globals: &Globals<'_>, project_root: &Path) -> Result<()> {
    let status = match args.status.as_deref().map(str::parse::<Status>).transpose() {
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
    let filter = Filter {
        entity: args.entity.as_deref().map(|e| EntityId::new(e.trim())),
        status,
        approval: args.approval,
    };

    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);
    let _lock = workspace.read_lock(globals.output)?;
    let engine = workspace.engine(globals.output)?;

    let initiatives: Vec<Initiative> = engine
        .list(&identity)
        .map_err(|err| fail(globals.output, &err))?
        .into_iter()
        .filter(|i| filter.matches(i))
        .collect();
    tracing::debug!(count = initiatives.len(), "listed initiatives");

    if initiatives.is_empty() && !globals.output.is_json() {
        if !globals.quiet {
            println!("No initiatives.");
        }
        return Ok(());
    }
    let views: Vec<InitiativeView<'_>> = initiatives.iter().map(InitiativeView).collect();
    render_list(&views, globals.output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::model::{InitiativeFields, InitiativeId, Proposal, UserId};

    fn initiative(entity: &str, status: Status) -> Initiative {
        Initiative::new(
            InitiativeId::new("in-x"),
            UserId::new("dina"),
            InitiativeFields::from_proposal(Proposal::new("x", "Dina", entity), status),
        )
    }

    #[test]
    fn approval_names_parse() {
        assert_eq!(parse_approval("pending-update"), Ok(ApprovalKind::PendingUpdate));
        assert_eq!(parse_approval("Rejected"), Ok(ApprovalKind::Rejected));
        assert!(parse_approval("maybe").is_err());
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::default().matches(&initiative("sgn", Status::Done)));
    }

    #[test]
    fn filters_combine() {
        let filter = Filter {
            entity: Some(EntityId::new("sgn")),
            status: Some(Status::OnGoing),
            approval: Some(ApprovalKind::Approved),
        };
        assert!(filter.matches(&initiative("sgn", Status::OnGoing)));
        assert!(!filter.matches(&initiative("lpp", Status::OnGoing)));
        assert!(!filter.matches(&initiative("sgn", Status::Done)));
    }
}
