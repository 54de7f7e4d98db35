//! `tl stats`: dashboard figures over the caller's visible initiatives.

use crate::cmd::{Globals, Workspace};
use crate::output::{fail, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use std::io::{self, Write};
use std::path::Path;
use tally_core::visibility::Stats;

#[derive(Args, Debug, Default)]
pub struct StatsArgs {}

fn write_text(stats: &Stats, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "total  {}  {}%", stats.overall.count, stats.overall.average_progress)?;
    for (entity, tally) in &stats.by_entity {
        writeln!(w, "entity  {entity}  {}  {}%", tally.count, tally.average_progress)?;
    }
    for (status, count) in &stats.by_status {
        writeln!(w, "status  {status}  {count}")?;
    }
    writeln!(w, "pending  {}", stats.pending)
}

fn write_pretty(stats: &Stats, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Initiatives")?;
    pretty_kv(w, "total", stats.overall.count.to_string())?;
    pretty_kv(w, "avg progress", format!("{}%", stats.overall.average_progress))?;
    pretty_kv(w, "pending", stats.pending.to_string())?;

    if !stats.by_entity.is_empty() {
        writeln!(w)?;
        pretty_section(w, "By entity")?;
        for (entity, tally) in &stats.by_entity {
            pretty_kv(
                w,
                entity.as_str(),
                format!("{} initiatives, {}% avg", tally.count, tally.average_progress),
            )?;
        }
    }
    if !stats.by_status.is_empty() {
        writeln!(w)?;
        pretty_section(w, "By status")?;
        for (status, count) in &stats.by_status {
            pretty_kv(w, status, count.to_string())?;
        }
    }
    Ok(())
}

/// Execute `tl stats`.
///
/// # Errors
///
/// Returns an error if the workspace cannot be read.
pub fn run_stats(_args: &StatsArgs, globals: &Globals<'_>, project_root: &Path) -> Result<()> {
    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);
    let _lock = workspace.read_lock(globals.output)?;
    let engine = workspace.engine(globals.output)?;

    let stats = engine
        .stats(&identity)
        .map_err(|err| fail(globals.output, &err))?;
    render_mode(globals.output, &stats, write_text, write_pretty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::model::EntityId;
    use tally_core::visibility::Tally;

    fn sample() -> Stats {
        let mut stats = Stats {
            overall: Tally {
                count: 2,
                average_progress: 45,
            },
            pending: 1,
            ..Stats::default()
        };
        stats.by_entity.insert(
            EntityId::new("sgn"),
            Tally {
                count: 2,
                average_progress: 45,
            },
        );
        stats.by_status.insert("on_going".to_string(), 2);
        stats
    }

    #[test]
    fn text_rows_are_stable() {
        let mut buf = Vec::new();
        write_text(&sample(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "total  2  45%\nentity  sgn  2  45%\nstatus  on_going  2\npending  1\n"
        );
    }

    #[test]
    fn pretty_output_has_sections() {
        let mut buf = Vec::new();
        write_pretty(&sample(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("By entity"));
        assert!(text.contains("2 initiatives, 45% avg"));
    }
}
