//! `tl show`: full details of one initiative, including any staged change
//! and the audit trail.

use crate::cmd::{Globals, Workspace, initiative_id};
use crate::output::{Renderable, fail, pretty_kv, pretty_rule, pretty_section, render_item};
use chrono::{DateTime, Local, Utc};
use clap::Args;
use std::io::{self, Write};
use std::path::Path;
use tally_core::model::{Indicator, Initiative, InitiativeFields, KeyActivity};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Initiative id (e.g. `in-3f9a0c12de`).
    pub id: String,
}

/// Renders an initiative in every output mode.
#[derive(Debug)]
pub struct InitiativeView<'a>(pub &'a Initiative);

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn write_activities(w: &mut dyn Write, activities: &[KeyActivity]) -> io::Result<()> {
    for (i, activity) in activities.iter().enumerate() {
        let due = activity
            .due_date
            .map(|d| format!("  due {d}"))
            .unwrap_or_default();
        writeln!(
            w,
            "  {:>2}. {:<32} weight {:>3}  progress {:>3}%{due}",
            i + 1,
            activity.name,
            activity.weight,
            activity.progress
        )?;
    }
    Ok(())
}

fn write_indicators(w: &mut dyn Write, indicators: &[Indicator]) -> io::Result<()> {
    for indicator in indicators {
        writeln!(
            w,
            "  [{}] {:<32} {} / {} {}  ({}%)",
            indicator.kind,
            indicator.metric,
            indicator.realization,
            indicator.target,
            indicator.uom,
            indicator.achievement()
        )?;
    }
    Ok(())
}

fn write_fields(w: &mut dyn Write, fields: &InitiativeFields) -> io::Result<()> {
    pretty_kv(w, "owner", &fields.owner)?;
    pretty_kv(w, "entity", fields.entity.as_str())?;
    pretty_kv(w, "status", fields.status.to_string())?;
    pretty_kv(w, "progress", format!("{}%", fields.progress))?;
    pretty_kv(w, "urgency", fields.urgency.to_string())?;
    if let Some(due) = fields.due_date {
        pretty_kv(w, "due", due.to_string())?;
    }
    pretty_kv(w, "budget", fields.budget.to_string())?;
    pretty_kv(w, "cost", fields.cost.to_string())?;
    if !fields.key_activities.is_empty() {
        writeln!(w, "activities:")?;
        write_activities(w, &fields.key_activities)?;
    }
    if !fields.output.is_empty() {
        pretty_kv(w, "output", &fields.output)?;
    }
    if !fields.indicators.is_empty() {
        writeln!(w, "indicators:")?;
        write_indicators(w, &fields.indicators)?;
    }
    Ok(())
}

impl Renderable for InitiativeView<'_> {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let initiative = self.0;
        pretty_section(w, &format!("{} ({})", initiative.fields().name, initiative.id()))?;
        pretty_kv(w, "approval", initiative.approval_kind().as_str())?;
        pretty_kv(w, "created by", initiative.created_by().as_str())?;
        pretty_kv(w, "revision", initiative.revision().to_string())?;
        write_fields(w, initiative.fields())?;

        if let Some(change) = initiative.pending_change() {
            writeln!(w)?;
            writeln!(
                w,
                "pending change by {} at {}:",
                change.submitted_by,
                local_time(change.submitted_at)
            )?;
            pretty_kv(w, "name", &change.fields.name)?;
            write_fields(w, &change.fields)?;
        }

        let audit = initiative.audit();
        if let (Some(by), Some(at)) = (&audit.approved_by, audit.approved_at) {
            pretty_kv(w, "approved", format!("{by} at {}", local_time(at)))?;
        }
        if let (Some(by), Some(at)) = (&audit.rejected_by, audit.rejected_at) {
            let reason = audit
                .rejection_reason
                .as_deref()
                .map(|r| format!(": {r}"))
                .unwrap_or_default();
            pretty_kv(w, "rejected", format!("{by} at {}{reason}", local_time(at)))?;
        }
        if let (Some(by), Some(at)) = (&audit.updated_by, audit.updated_at) {
            pretty_kv(w, "updated", format!("{by} at {}", local_time(at)))?;
        }
        pretty_rule(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *w, self.0).map_err(io::Error::other)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let initiative = self.0;
        writeln!(
            w,
            "{}  {}  {}  {}%  {}  {}  {}",
            initiative.id(),
            initiative.approval_kind().as_str(),
            initiative.status(),
            initiative.progress(),
            initiative.fields().urgency,
            initiative.entity(),
            initiative.fields().name
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "APPROVAL", "STATUS", "PROGRESS", "URGENCY", "ENTITY", "NAME"]
    }
}

/// Execute `tl show <id>`.
///
/// # Errors
///
/// Returns an error if the initiative is missing or not visible to the
/// acting user, or if the workspace cannot be read.
pub fn run_show(args: &ShowArgs, globals: &Globals<'_>, project_root: &Path) -> anyhow::Result<()> {
    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);
    let _lock = workspace.read_lock(globals.output)?;
    let engine = workspace.engine(globals.output)?;

    let initiative = engine
        .show(&identity, &initiative_id(&args.id))
        .map_err(|err| fail(globals.output, &err))?;
    render_item(&InitiativeView(&initiative), globals.output)?;
    Ok(())
}
