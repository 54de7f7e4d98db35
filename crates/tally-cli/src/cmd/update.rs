use crate::cmd::create::{parse_activity, parse_indicator};
use crate::cmd::{Globals, Workspace, initiative_id, render_outcome};
use crate::output::fail;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use std::path::Path;
use tally_core::model::{EntityId, Indicator, Initiative, KeyActivity, Money, Proposal};

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Initiative id.
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub owner: Option<String>,

    /// Move to another entity (administrators only).
    #[arg(long)]
    pub entity: Option<String>,

    /// New due date (YYYY-MM-DD).
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<NaiveDate>,

    /// Remove the due date.
    #[arg(long)]
    pub clear_due: bool,

    #[arg(long, allow_negative_numbers = true)]
    pub budget: Option<Money>,

    #[arg(long, allow_negative_numbers = true)]
    pub cost: Option<Money>,

    /// Overall progress. Only meaningful without key activities.
    #[arg(long)]
    pub progress: Option<u8>,

    /// Replace the key activities (repeatable, `name:weight[:progress[:due]]`).
    #[arg(long = "activity", value_name = "NAME:WEIGHT[:PROGRESS[:DUE]]", value_parser = parse_activity, conflicts_with = "clear_activities")]
    pub activities: Vec<KeyActivity>,

    /// Drop every key activity.
    #[arg(long)]
    pub clear_activities: bool,

    #[arg(long)]
    pub output: Option<String>,

    /// Replace the indicators (repeatable, `kind:metric:uom:target[:realization]`).
    #[arg(long = "indicator", value_name = "KIND:METRIC:UOM:TARGET[:REALIZED]", value_parser = parse_indicator, conflicts_with = "clear_indicators")]
    pub indicators: Vec<Indicator>,

    /// Drop every indicator.
    #[arg(long)]
    pub clear_indicators: bool,
}

/// The full replacement to submit: the live fields with the flags applied on
/// top. A staged change never leaks into the base.
fn build_proposal(current: &Initiative, args: &UpdateArgs) -> Proposal {
    let mut proposal = current.fields().to_proposal();

    if let Some(name) = &args.name {
        proposal.name = name.trim().to_string();
    }
    if let Some(owner) = &args.owner {
        proposal.owner = owner.trim().to_string();
    }
    if let Some(entity) = &args.entity {
        proposal.entity = EntityId::new(entity.trim());
    }
    if args.clear_due {
        proposal.due_date = None;
    } else if let Some(due) = args.due {
        proposal.due_date = Some(due);
    }
    if let Some(budget) = args.budget {
        proposal.budget = budget;
    }
    if let Some(cost) = args.cost {
        proposal.cost = cost;
    }
    if let Some(progress) = args.progress {
        proposal.progress = progress;
    }
    if args.clear_activities {
        proposal.key_activities.clear();
    } else if !args.activities.is_empty() {
        proposal.key_activities.clone_from(&args.activities);
    }
    if let Some(output) = &args.output {
        proposal.output = output.trim().to_string();
    }
    if args.clear_indicators {
        proposal.indicators.clear();
    } else if !args.indicators.is_empty() {
        proposal.indicators.clone_from(&args.indicators);
    }
    proposal
}

/// Execute `tl update <id>`.
///
/// Administrators apply the change immediately; members submit it for
/// approval.
///
/// # Errors
///
/// Returns an error if the initiative is not visible, the caller may not
/// edit it, or the resulting fields fail validation.
pub fn run_update(args: &UpdateArgs, globals: &Globals<'_>, project_root: &Path) -> Result<()> {
    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);
    let id = initiative_id(&args.id);

    let _lock = workspace.write_lock(globals.output)?;
    let mut engine = workspace.engine(globals.output)?;
    let current = engine
        .show(&identity, &id)
        .map_err(|err| fail(globals.output, &err))?;

    let proposal = build_proposal(&current, args);
    let outcome = engine
        .submit_update(&identity, &id, proposal)
        .map_err(|err| fail(globals.output, &err))?;
    render_outcome(globals, &outcome, id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tally_core::model::{
        Approval, InitiativeFields, InitiativeId, StagedChange, Status, UserId,
    };

    fn current() -> Initiative {
        let proposal = Proposal::new("Digital HR", "Dina", "sgn")
            .with_due_date(NaiveDate::from_ymd_opt(2026, 6, 30).expect("date"))
            .with_activity(KeyActivity::new("Design", 60, 50));
        Initiative::new(
            InitiativeId::new("in-abc"),
            UserId::new("dina"),
            InitiativeFields::from_proposal(proposal, Status::OnGoing),
        )
    }

    fn args() -> UpdateArgs {
        UpdateArgs {
            id: "in-abc".to_string(),
            ..UpdateArgs::default()
        }
    }

    #[test]
    fn untouched_flags_keep_current_values() {
        let proposal = build_proposal(&current(), &args());
        assert_eq!(proposal, current().fields().to_proposal());
    }

    #[test]
    fn flags_override_and_clear() {
        let mut update = args();
        update.name = Some(" HR Portal ".to_string());
        update.budget = Some(-5);
        update.clear_due = true;
        update.clear_activities = true;
        let proposal = build_proposal(&current(), &update);
        assert_eq!(proposal.name, "HR Portal");
        assert_eq!(proposal.budget, -5);
        assert!(proposal.due_date.is_none());
        assert!(proposal.key_activities.is_empty());
        assert_eq!(proposal.owner, "Dina");
    }

    #[test]
    fn activities_replace_the_whole_list() {
        let mut update = args();
        update.activities = vec![KeyActivity::new("Rollout", 40, 0)];
        let proposal = build_proposal(&current(), &update);
        assert_eq!(proposal.key_activities.len(), 1);
        assert_eq!(proposal.key_activities[0].name, "Rollout");
    }

    #[test]
    fn output_and_indicators_replace() {
        let mut update = args();
        update.output = Some(" Portal live ".to_string());
        update.indicators = vec![parse_indicator("lagging:Adoption:%:80:20").expect("parse")];
        let proposal = build_proposal(&current(), &update);
        assert_eq!(proposal.output, "Portal live");
        assert_eq!(proposal.indicators.len(), 1);

        let mut cleared = args();
        cleared.clear_indicators = true;
        let with_kpi = {
            let mut fields = current().fields().clone();
            fields.indicators = proposal.indicators;
            Initiative::new(InitiativeId::new("in-abc"), UserId::new("dina"), fields)
        };
        assert!(build_proposal(&with_kpi, &cleared).indicators.is_empty());
    }

    #[test]
    fn staged_change_never_becomes_the_base() {
        let mut staged = current().fields().clone();
        staged.name = "UNAPPROVED".to_string();
        staged.budget = 999_999;
        let pending = current().with_approval(Approval::PendingUpdate(StagedChange {
            fields: staged,
            submitted_by: UserId::new("dina"),
            submitted_at: Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap(),
            base_revision: 0,
        }));
        let mut update = args();
        update.owner = Some("Rudi".to_string());
        let proposal = build_proposal(&pending, &update);
        assert_eq!(proposal.name, "Digital HR");
        assert_eq!(proposal.budget, 0);
        assert_eq!(proposal.owner, "Rudi");
    }
}
