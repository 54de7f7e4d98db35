use crate::cmd::{Globals, Workspace, render_outcome};
use crate::output::{CliError, fail, render_error};
use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use std::path::Path;
use tally_core::IdentityContext;
use tally_core::error::ErrorCode;
use tally_core::model::{EntityScope, Indicator, IndicatorKind, KeyActivity, Money, Proposal};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Initiative name.
    #[arg(long)]
    pub name: String,

    /// Person accountable for the initiative. Defaults to the acting user.
    #[arg(long)]
    pub owner: Option<String>,

    /// Owning entity. Defaults to a member's own entity; administrators must
    /// pass it.
    #[arg(long)]
    pub entity: Option<String>,

    /// Due date (YYYY-MM-DD).
    #[arg(long)]
    pub due: Option<NaiveDate>,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub budget: Money,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub cost: Money,

    /// Overall progress (0-100). Ignored when key activities are given.
    #[arg(long, default_value_t = 0)]
    pub progress: u8,

    /// Key activity as `name:weight[:progress[:due]]` (repeatable).
    #[arg(long = "activity", value_name = "NAME:WEIGHT[:PROGRESS[:DUE]]", value_parser = parse_activity)]
    pub activities: Vec<KeyActivity>,

    /// Expected deliverable.
    #[arg(long)]
    pub output: Option<String>,

    /// Indicator as `leading|lagging:metric:uom:target[:realization]` (repeatable).
    #[arg(long = "indicator", value_name = "KIND:METRIC:UOM:TARGET[:REALIZED]", value_parser = parse_indicator)]
    pub indicators: Vec<Indicator>,
}

/// Parse a `name:weight[:progress[:due]]` key activity.
///
/// # Errors
///
/// Returns a message naming the malformed part.
pub fn parse_activity(raw: &str) -> Result<KeyActivity, String> {
    let mut parts = raw.split(':').map(str::trim);
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
        return Err(format!("activity '{raw}' has no name"));
    }
    let weight = parts
        .next()
        .ok_or_else(|| format!("activity '{raw}' is missing a weight"))?
        .parse::<u8>()
        .map_err(|e| format!("activity '{raw}': bad weight: {e}"))?;
    let progress = match parts.next() {
        Some(p) if !p.is_empty() => p
            .parse::<u8>()
            .map_err(|e| format!("activity '{raw}': bad progress: {e}"))?,
        _ => 0,
    };
    let mut activity = KeyActivity::new(name, weight, progress);
    if let Some(due) = parts.next().filter(|d| !d.is_empty()) {
        let date = due
            .parse::<NaiveDate>()
            .map_err(|e| format!("activity '{raw}': bad due date: {e}"))?;
        activity = activity.due(date);
    }
    if parts.next().is_some() {
        return Err(format!("activity '{raw}' has too many fields"));
    }
    Ok(activity)
}

/// Parse a `kind:metric:uom:target[:realization]` indicator.
///
/// # Errors
///
/// Returns a message naming the malformed part.
pub fn parse_indicator(raw: &str) -> Result<Indicator, String> {
    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    let [kind, metric, uom, target, rest @ ..] = parts.as_slice() else {
        return Err(format!("indicator '{raw}' needs kind, metric, unit and target"));
    };
    if rest.len() > 1 {
        return Err(format!("indicator '{raw}' has too many fields"));
    }
    let kind = kind
        .parse::<IndicatorKind>()
        .map_err(|e| format!("indicator '{raw}': {e}"))?;
    if metric.is_empty() {
        return Err(format!("indicator '{raw}' has no metric"));
    }
    let number = |field: &str, value: &str| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| format!("indicator '{raw}': bad {field} '{value}'"))
    };
    let target = number("target", target)?;
    let realization = match rest.first() {
        Some(value) if !value.is_empty() => number("realization", value)?,
        _ => 0.0,
    };
    Ok(Indicator::new(kind, *metric, *uom).values(target, realization))
}

/// Execute `tl create`.
///
/// # Errors
///
/// Returns an error on permission or validation failures, or when the
/// workspace cannot be written.
pub fn run_create(args: &CreateArgs, globals: &Globals<'_>, project_root: &Path) -> Result<()> {
    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);

    let current = identity.current_user();
    let entity = match (&args.entity, current.as_ref().map(|u| u.entity())) {
        (Some(entity), _) => entity.trim().to_string(),
        (None, Some(EntityScope::Entity(own))) => own.to_string(),
        // anonymous callers are turned away by the engine
        (None, None) => String::new(),
        (None, Some(EntityScope::All)) => {
            let code = ErrorCode::ValidationFailed;
            render_error(
                globals.output,
                &CliError::with_details(
                    "--entity is required for administrators",
                    "pass --entity <ENTITY>",
                    code.code(),
                ),
            )?;
            anyhow::bail!("--entity is required");
        }
    };
    let owner = args
        .owner
        .clone()
        .or_else(|| current.as_ref().map(|u| u.id().to_string()))
        .unwrap_or_default();

    let mut proposal = Proposal::new(args.name.trim(), owner, entity)
        .with_money(args.budget, args.cost)
        .with_progress(args.progress);
    if let Some(due) = args.due {
        proposal = proposal.with_due_date(due);
    }
    for activity in &args.activities {
        proposal = proposal.with_activity(activity.clone());
    }
    if let Some(output) = &args.output {
        proposal = proposal.with_output(output.trim());
    }
    for indicator in &args.indicators {
        proposal = proposal.with_indicator(indicator.clone());
    }

    let _lock = workspace.write_lock(globals.output)?;
    let mut engine = workspace.engine(globals.output)?;
    let outcome = engine
        .submit_create(&identity, proposal)
        .map_err(|err| fail(globals.output, &err))?;
    render_outcome(globals, &outcome, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_with_all_fields() {
        let activity = parse_activity("Design: 60 :50:2026-03-01").expect("parse");
        assert_eq!(activity.name, "Design");
        assert_eq!(activity.weight, 60);
        assert_eq!(activity.progress, 50);
        assert_eq!(activity.due_date, NaiveDate::from_ymd_opt(2026, 3, 1));
    }

    #[test]
    fn activity_progress_defaults_to_zero() {
        let activity = parse_activity("Rollout:40").expect("parse");
        assert_eq!(activity.progress, 0);
        assert!(activity.due_date.is_none());
    }

    #[test]
    fn malformed_activities_are_rejected() {
        assert!(parse_activity("Design").is_err());
        assert!(parse_activity(":40").is_err());
        assert!(parse_activity("Design:heavy").is_err());
        assert!(parse_activity("Design:40:300").is_err());
        assert!(parse_activity("Design:40:10:tomorrow").is_err());
        assert!(parse_activity("Design:40:10:2026-03-01:x").is_err());
    }

    #[test]
    fn indicator_with_realization() {
        let kpi = parse_indicator("Lagging: Retention :%:90:45.5").expect("parse");
        assert_eq!(kpi.kind, IndicatorKind::Lagging);
        assert_eq!(kpi.metric, "Retention");
        assert_eq!(kpi.uom, "%");
        assert_eq!(kpi.achievement(), 51);
    }

    #[test]
    fn indicator_realization_defaults_to_zero() {
        let kpi = parse_indicator("leading:Trainings:count:12").expect("parse");
        assert!(kpi.realization.abs() < f64::EPSILON);
        assert_eq!(kpi.achievement(), 0);
    }

    #[test]
    fn malformed_indicators_are_rejected() {
        assert!(parse_indicator("leading:Trainings:count").is_err());
        assert!(parse_indicator("sideways:Trainings:count:12").is_err());
        assert!(parse_indicator("leading::count:12").is_err());
        assert!(parse_indicator("leading:Trainings:count:-3").is_err());
        assert!(parse_indicator("leading:Trainings:count:12:x").is_err());
        assert!(parse_indicator("leading:Trainings:count:12:3:9").is_err());
    }
}
