//! `tl alerts`: overdue, nearly-done and completed initiatives.

use crate::cmd::{Globals, Workspace};
use crate::output::{fail, render_mode};
use anyhow::Result;
use clap::Args;
use std::io::{self, Write};
use std::path::Path;
use tally_core::alerts::{Alert, Priority};

#[derive(Args, Debug, Default)]
pub struct AlertsArgs {}

const fn marker(priority: Priority) -> &'static str {
    match priority {
        Priority::Critical => "!!",
        Priority::Normal => " !",
        Priority::Low => "  ",
    }
}

const fn priority_name(priority: Priority) -> &'static str {
    match priority {
        Priority::Critical => "critical",
        Priority::Normal => "normal",
        Priority::Low => "low",
    }
}

fn write_text(alerts: &[Alert], w: &mut dyn Write) -> io::Result<()> {
    for alert in alerts {
        writeln!(
            w,
            "{}  {}  {}  {}",
            alert.initiative,
            priority_name(alert.priority),
            alert.entity,
            alert.message
        )?;
    }
    Ok(())
}

fn write_pretty(alerts: &[Alert], w: &mut dyn Write) -> io::Result<()> {
    if alerts.is_empty() {
        return writeln!(w, "No alerts.");
    }
    for alert in alerts {
        writeln!(
            w,
            "{} {} ({}, {})",
            marker(alert.priority),
            alert.name,
            alert.initiative,
            alert.entity
        )?;
        writeln!(w, "   {}", alert.message)?;
    }
    Ok(())
}

/// Execute `tl alerts`.
///
/// # Errors
///
/// Returns an error if the workspace cannot be read.
pub fn run_alerts(_args: &AlertsArgs, globals: &Globals<'_>, project_root: &Path) -> Result<()> {
    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);
    let _lock = workspace.read_lock(globals.output)?;
    let engine = workspace.engine(globals.output)?;

    let alerts = engine
        .alerts(&identity)
        .map_err(|err| fail(globals.output, &err))?;
    render_mode(
        globals.output,
        &alerts,
        |a, w| write_text(a, w),
        |a, w| write_pretty(a, w),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::alerts::AlertKind;
    use tally_core::model::{EntityId, InitiativeId};

    fn overdue() -> Alert {
        Alert {
            initiative: InitiativeId::new("in-late"),
            name: "Late one".to_string(),
            entity: EntityId::new("sgn"),
            kind: AlertKind::Overdue { days: 3 },
            priority: Priority::Critical,
            message: "This initiative is 3 days overdue. Immediate action required.".to_string(),
        }
    }

    #[test]
    fn text_row_names_priority() {
        let mut buf = Vec::new();
        write_text(&[overdue()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("in-late  critical  sgn  This initiative is 3 days overdue."));
    }

    #[test]
    fn pretty_marks_critical_alerts() {
        let mut buf = Vec::new();
        write_pretty(&[overdue()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("!! Late one (in-late, sgn)"));

        let mut buf = Vec::new();
        write_pretty(&[], &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "No alerts.\n");
    }
}
