#![forbid(unsafe_code)]

mod cmd;
mod identity;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use tally_core::config;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tally: initiative tracking with entity-scoped approvals",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Act as this user (skips env and config resolution).
    #[arg(long, global = true)]
    user: Option<String>,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn user_flag(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a tally workspace",
        long_about = "Create .tally/ with a project config and an empty database in the current directory.",
        after_help = "EXAMPLES:\n    # Workspace with the default admin\n    tl init\n\n    # Named admin, two entities and a member\n    tl init --admin rina --entity sgn --entity lpp --member dina:sgn"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Initiatives",
        about = "Create an initiative",
        long_about = "Create an initiative. Administrators create it approved; members submit it for approval.",
        after_help = "EXAMPLES:\n    # Member creating in their own entity\n    tl create --name \"Digital HR\" --owner Dina\n\n    # With weighted key activities\n    tl create --name \"Digital HR\" --activity Design:60:50 --activity Rollout:40\n\n    # Administrator picking the entity\n    tl --user rina create --name \"Audit\" --entity lpp --due 2026-06-30"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Initiatives",
        about = "Edit an initiative",
        long_about = "Replace an initiative's fields. Unset flags keep their current values. Members' edits wait for approval.",
        after_help = "EXAMPLES:\n    # Rename\n    tl update in-3f9a0c12de --name \"HR Portal\"\n\n    # Replace the key activities\n    tl update in-3f9a0c12de --activity Design:50:100 --activity Build:50"
    )]
    Update(cmd::update::UpdateArgs),

    #[command(
        next_help_heading = "Initiatives",
        about = "Delete an initiative",
        long_about = "Delete an initiative. Members' deletions wait for approval.",
        after_help = "EXAMPLES:\n    tl delete in-3f9a0c12de"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Initiatives",
        about = "Report progress",
        long_about = "Set the progress of one key activity, or of the initiative itself when it has none.",
        after_help = "EXAMPLES:\n    # Second key activity is now 80% done\n    tl progress in-3f9a0c12de 80 --activity 2\n\n    # Initiative without key activities\n    tl progress in-3f9a0c12de 35"
    )]
    Progress(cmd::progress::ProgressArgs),

    #[command(
        next_help_heading = "Approvals",
        about = "Approve a pending request",
        after_help = "EXAMPLES:\n    tl approve in-3f9a0c12de\n    tl approve in-3f9a0c12de --note \"Budget confirmed\""
    )]
    Approve(cmd::approve::ApproveArgs),

    #[command(
        next_help_heading = "Approvals",
        about = "Reject a pending request",
        after_help = "EXAMPLES:\n    tl reject in-3f9a0c12de --reason \"Out of scope for this year\""
    )]
    Reject(cmd::reject::RejectArgs),

    #[command(
        next_help_heading = "Approvals",
        about = "List requests awaiting approval",
        after_help = "EXAMPLES:\n    tl pending\n    tl pending --json"
    )]
    Pending(cmd::pending::PendingArgs),

    #[command(
        next_help_heading = "Approvals",
        about = "Set an initiative's status",
        long_about = "Pin hold, carry_over or cancelled; any other status returns control to the progress rollup.",
        after_help = "EXAMPLES:\n    tl status in-3f9a0c12de hold\n    tl status in-3f9a0c12de on_going"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Read",
        about = "List visible initiatives",
        after_help = "EXAMPLES:\n    tl list\n    tl list --entity sgn --status on_going\n    tl list --approval pending_update --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one initiative",
        after_help = "EXAMPLES:\n    tl show in-3f9a0c12de\n    tl show in-3f9a0c12de --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "Dashboard statistics",
        after_help = "EXAMPLES:\n    tl stats\n    tl stats --json"
    )]
    Stats(cmd::stats::StatsArgs),

    #[command(
        next_help_heading = "Read",
        about = "Overdue and nearly-done initiatives",
        after_help = "EXAMPLES:\n    tl alerts"
    )]
    Alerts(cmd::alerts::AlertsArgs),

    #[command(
        next_help_heading = "Notifications",
        about = "Show your notifications",
        after_help = "EXAMPLES:\n    tl inbox\n    tl inbox --unread"
    )]
    Inbox(cmd::inbox::InboxArgs),

    #[command(
        next_help_heading = "Notifications",
        about = "Mark a notification read",
        after_help = "EXAMPLES:\n    tl read 12"
    )]
    Read(cmd::read::ReadArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    tl completions bash\n    tl completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "tally=debug,info"
        } else {
            "tally=info,warn"
        })
    });

    let format = env::var("TALLY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let user_config = config::load_user_config().unwrap_or_else(|err| {
        warn!("ignoring user config: {err:#}");
        config::UserConfig::default()
    });
    let env_format = env::var("FORMAT").ok();
    let output = OutputMode::from_resolved(&config::resolve_output(
        cli.json,
        user_config.output.as_deref(),
        env_format.as_deref(),
    ));
    debug!(?output, "output mode resolved");

    let globals = cmd::Globals {
        user: cli.user_flag(),
        configured_user: user_config.user.as_deref(),
        output,
        quiet: cli.quiet,
    };
    let project_root = env::current_dir()?;

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, &project_root),
        Commands::Create(args) => cmd::create::run_create(args, &globals, &project_root),
        Commands::Update(args) => cmd::update::run_update(args, &globals, &project_root),
        Commands::Delete(args) => cmd::delete::run_delete(args, &globals, &project_root),
        Commands::Progress(args) => cmd::progress::run_progress(args, &globals, &project_root),
        Commands::Approve(args) => cmd::approve::run_approve(args, &globals, &project_root),
        Commands::Reject(args) => cmd::reject::run_reject(args, &globals, &project_root),
        Commands::Pending(args) => cmd::pending::run_pending(args, &globals, &project_root),
        Commands::Status(args) => cmd::status::run_status(args, &globals, &project_root),
        Commands::List(args) => cmd::list::run_list(args, &globals, &project_root),
        Commands::Show(args) => cmd::show::run_show(args, &globals, &project_root),
        Commands::Stats(args) => cmd::stats::run_stats(args, &globals, &project_root),
        Commands::Alerts(args) => cmd::alerts::run_alerts(args, &globals, &project_root),
        Commands::Inbox(args) => cmd::inbox::run_inbox(args, &globals, &project_root),
        Commands::Read(args) => cmd::read::run_read(args, &globals, &project_root),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}
