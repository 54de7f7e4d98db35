//! `tl inbox`: notifications addressed to the acting user.

use crate::cmd::{Globals, Workspace};
use crate::output::{Renderable, fail, render_list};
use anyhow::Result;
use chrono::Local;
use clap::Args;
use std::io::{self, Write};
use std::path::Path;
use tally_core::notify::Notification;

#[derive(Args, Debug, Default)]
pub struct InboxArgs {
    /// Only unread notifications.
    #[arg(long)]
    pub unread: bool,
}

#[derive(Debug)]
struct NotificationView<'a>(&'a Notification);

impl Renderable for NotificationView<'_> {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let n = self.0;
        let flag = if n.read { " " } else { "*" };
        let when = n.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        writeln!(w, "{flag} #{:<4} {when}  {}", n.id, n.kind)?;
        writeln!(w, "        {}", n.message)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *w, self.0).map_err(io::Error::other)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let n = self.0;
        let initiative = n.initiative.as_ref().map_or("-", |id| id.as_str());
        writeln!(
            w,
            "{}  {}  {}  {}  {}",
            n.id,
            if n.read { "read" } else { "unread" },
            n.kind,
            initiative,
            n.message
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "STATE", "KIND", "INITIATIVE", "MESSAGE"]
    }
}

/// Execute `tl inbox`.
///
/// # Errors
///
/// Returns an error without an acting user or when the workspace cannot be
/// read.
pub fn run_inbox(args: &InboxArgs, globals: &Globals<'_>, project_root: &Path) -> Result<()> {
    let workspace = Workspace::open(project_root, globals.output)?;
    let identity = workspace.identity(globals);
    let _lock = workspace.read_lock(globals.output)?;
    let engine = workspace.engine(globals.output)?;

    let mut notifications = engine
        .inbox(&identity)
        .map_err(|err| fail(globals.output, &err))?;
    if args.unread {
        notifications.retain(|n| !n.read);
    }

    if notifications.is_empty() && !globals.output.is_json() {
        if !globals.quiet {
            println!("Inbox is empty.");
        }
        return Ok(());
    }
    let views: Vec<NotificationView<'_>> = notifications.iter().map(NotificationView).collect();
    render_list(&views, globals.output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tally_core::model::{InitiativeId, UserId};
    use tally_core::notify::{NotificationKind, Recipient};

    fn notification(read: bool) -> Notification {
        Notification {
            id: 7,
            recipient: Recipient::User(UserId::new("dina")),
            kind: NotificationKind::Approved,
            message: "Your initiative \"Digital HR\" has been approved by root.".to_string(),
            initiative: Some(InitiativeId::new("in-abc")),
            created_at: Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap(),
            read,
        }
    }

    #[test]
    fn table_row_shows_read_state() {
        let mut buf = Vec::new();
        NotificationView(&notification(false)).render_table(&mut buf).unwrap();
        let row = String::from_utf8(buf).unwrap();
        assert!(row.starts_with("7  unread  approved  in-abc  Your initiative"));

        let mut buf = Vec::new();
        NotificationView(&notification(true)).render_table(&mut buf).unwrap();
        assert!(String::from_utf8(buf).unwrap().starts_with("7  read  "));
    }

    #[test]
    fn unread_items_are_starred() {
        let mut buf = Vec::new();
        NotificationView(&notification(false)).render_human(&mut buf).unwrap();
        assert!(String::from_utf8(buf).unwrap().starts_with("* #7"));
    }
}
