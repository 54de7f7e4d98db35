//! Command handlers. Each `run_<name>` opens the workspace, calls the engine
//! and renders the result in the requested output mode.

pub mod alerts;
pub mod approve;
pub mod completions;
pub mod create;
pub mod delete;
pub mod inbox;
pub mod init;
pub mod list;
pub mod pending;
pub mod progress;
pub mod read;
pub mod reject;
pub mod show;
pub mod stats;
pub mod status;
pub mod update;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tally_core::clock::SystemClock;
use tally_core::config::{self, ProjectConfig, TALLY_DIR, WorkspacePaths};
use tally_core::error::ErrorCode;
use tally_core::lock::{DEFAULT_LOCK_TIMEOUT, ReadLock, WorkspaceLock};
use tally_core::model::InitiativeId;
use tally_core::notify::SqliteNotifier;
use tally_core::store::SqliteStore;
use tally_core::workflow::Effect;
use tally_core::{Engine, Outcome, Settings, StaticIdentity};

use crate::identity;
use crate::output::{CliError, OutputMode, pretty_kv, render_error, render_mode};

/// Engine wired to the workspace database and the wall clock.
pub type CliEngine = Engine<SqliteStore, SqliteNotifier, SystemClock>;

/// Global flags every handler needs.
#[derive(Debug, Clone, Copy)]
pub struct Globals<'a> {
    /// `--user` override.
    pub user: Option<&'a str>,
    /// Default user from the per-user config.
    pub configured_user: Option<&'a str>,
    pub output: OutputMode,
    pub quiet: bool,
}

/// Find the project root holding `.tally` by walking up from `start`.
pub fn find_tally_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(TALLY_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// An opened `.tally` workspace.
#[derive(Debug)]
pub struct Workspace {
    paths: WorkspacePaths,
    config: ProjectConfig,
}

impl Workspace {
    /// Locate and load the workspace containing `start`.
    ///
    /// # Errors
    ///
    /// Returns an error (after rendering it) if there is no workspace or its
    /// config cannot be parsed.
    pub fn open(start: &Path, output: OutputMode) -> Result<Self> {
        let Some(root) = find_tally_root(start) else {
            let code = ErrorCode::NotInitialized;
            render_error(
                output,
                &CliError::with_details(
                    "Not a tally workspace: .tally directory not found",
                    code.hint().unwrap_or_default(),
                    code.code(),
                ),
            )?;
            anyhow::bail!("{}", code.message());
        };

        let config = match config::load_project_config(&root) {
            Ok(config) => config,
            Err(err) => {
                let code = ErrorCode::ConfigParseError;
                render_error(
                    output,
                    &CliError::with_details(
                        format!("{err:#}"),
                        code.hint().unwrap_or_default(),
                        code.code(),
                    ),
                )?;
                return Err(err);
            }
        };

        tracing::debug!(root = %root.display(), users = config.users.len(), "workspace opened");
        Ok(Self {
            paths: WorkspacePaths::new(root),
            config,
        })
    }

    /// The acting user, looked up in the project directory.
    pub fn identity(&self, globals: &Globals<'_>) -> StaticIdentity {
        identity::resolve_identity(
            &self.config.directory(),
            globals.user,
            globals.configured_user,
        )
    }

    /// Open the record store and notifier.
    ///
    /// # Errors
    ///
    /// Returns an error (after rendering it) if the database cannot be opened.
    pub fn engine(&self, output: OutputMode) -> Result<CliEngine> {
        let db = self.paths.db();
        let opened = SqliteStore::open(&db).and_then(|store| {
            let notifier = SqliteNotifier::open(&db, self.config.notifications.max_retained)?;
            Ok((store, notifier))
        });
        match opened {
            Ok((store, notifier)) => Ok(Engine::with_settings(
                store,
                notifier,
                SystemClock,
                Settings::from_config(&self.config),
            )),
            Err(err) => {
                let code = ErrorCode::StorageUnavailable;
                render_error(
                    output,
                    &CliError::with_details(
                        format!("{err:#}"),
                        code.hint().unwrap_or_default(),
                        code.code(),
                    ),
                )?;
                Err(err)
            }
        }
    }

    /// Exclusive lock for a read-modify-write command.
    ///
    /// # Errors
    ///
    /// Returns an error (after rendering it) on lock timeout or I/O failure.
    pub fn write_lock(&self, output: OutputMode) -> Result<WorkspaceLock> {
        WorkspaceLock::acquire(&self.paths.lock(), DEFAULT_LOCK_TIMEOUT).map_err(|err| {
            render_error(output, &CliError::from(&err)).ok();
            anyhow::Error::new(err)
        })
    }

    /// Shared lock for read-only commands.
    ///
    /// # Errors
    ///
    /// Returns an error (after rendering it) while a writer holds the lock
    /// past the timeout.
    pub fn read_lock(&self, output: OutputMode) -> Result<ReadLock> {
        ReadLock::acquire(&self.paths.lock(), DEFAULT_LOCK_TIMEOUT).map_err(|err| {
            render_error(output, &CliError::from(&err)).ok();
            anyhow::Error::new(err)
        })
    }
}

/// Parse a user-supplied initiative id.
pub fn initiative_id(raw: &str) -> InitiativeId {
    InitiativeId::new(raw.trim())
}

/// Human headline for a committed transition.
fn headline(outcome: &Outcome, fallback_id: &str) -> String {
    let name = outcome
        .initiative
        .as_ref()
        .map_or_else(|| fallback_id.to_string(), |i| format!("{} ({})", i.fields().name, i.id()));
    let what = match outcome.effect {
        Effect::Created => "Created",
        Effect::SubmittedCreate => "Submitted for approval",
        Effect::Updated => "Updated",
        Effect::SubmittedUpdate => "Update submitted for approval",
        Effect::Deleted => "Deleted",
        Effect::SubmittedDelete => "Deletion submitted for approval",
        Effect::ProgressUpdated => "Progress updated",
        Effect::ProgressStaged => "Progress change submitted for approval",
        Effect::ApprovedCreate | Effect::ApprovedUpdate => "Approved",
        Effect::ApprovedDelete => "Approved deletion",
        Effect::RejectedCreate | Effect::RejectedUpdate | Effect::RejectedDelete => "Rejected",
        Effect::StatusSet => "Status set",
    };
    format!("{what}: {name}")
}

/// Render the result of a mutating command.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn render_outcome(globals: &Globals<'_>, outcome: &Outcome, fallback_id: &str) -> Result<()> {
    render_mode(
        globals.output,
        outcome,
        |o, w| {
            let id = o
                .initiative
                .as_ref()
                .map_or(fallback_id, |i| i.id().as_str());
            let approval = o
                .initiative
                .as_ref()
                .map_or("removed", |i| i.approval_kind().as_str());
            writeln!(w, "{}  {}  {}", o.effect, id, approval)
        },
        |o, w| {
            writeln!(w, "✓ {}", headline(o, fallback_id))?;
            if globals.quiet {
                return Ok(());
            }
            if let Some(initiative) = &o.initiative {
                pretty_kv(w, "approval", initiative.approval_kind().as_str())?;
                pretty_kv(w, "progress", format!("{}%", initiative.progress()))?;
                pretty_kv(w, "status", initiative.status().to_string())?;
            }
            if o.conflict {
                writeln!(
                    w,
                    "  note: the record changed after this request was made; the request replaced those changes"
                )?;
            }
            if o.effect.needs_review() {
                writeln!(w, "  An administrator will be notified to review it.")?;
            }
            Ok(())
        },
    )
}
