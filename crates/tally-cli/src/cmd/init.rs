use anyhow::{Context as _, Result};
use clap::Args;
use std::path::Path;
use tally_core::config::{self, DB_FILE, LOCK_FILE, ProjectConfig, TALLY_DIR, WorkspacePaths};
use tally_core::model::{EntityId, Role, User};
use tally_core::store::SqliteStore;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force re-initialization even if `.tally/` already exists. Existing
    /// initiatives are kept; the config is rewritten.
    #[arg(long)]
    pub force: bool,

    /// Id of the first administrator.
    #[arg(long, default_value = "admin")]
    pub admin: String,

    /// Known entity (repeatable). Without any, every entity name is accepted.
    #[arg(long = "entity", value_name = "ENTITY")]
    pub entities: Vec<String>,

    /// Member account as `user:entity` (repeatable).
    #[arg(long = "member", value_name = "USER:ENTITY")]
    pub members: Vec<String>,
}

fn gitignore() -> String {
    format!("{DB_FILE}\n{DB_FILE}-wal\n{DB_FILE}-shm\n{LOCK_FILE}\n")
}

fn parse_member(raw: &str) -> Result<User> {
    let Some((id, entity)) = raw.split_once(':') else {
        anyhow::bail!("invalid member '{raw}': expected USER:ENTITY");
    };
    let (id, entity) = (id.trim(), entity.trim());
    if id.is_empty() || entity.is_empty() {
        anyhow::bail!("invalid member '{raw}': user and entity must be non-empty");
    }
    User::new(id, Role::Member, entity.into())
        .with_context(|| format!("invalid member '{raw}'"))
}

fn build_config(args: &InitArgs) -> Result<ProjectConfig> {
    let admin = args.admin.trim();
    if admin.is_empty() {
        anyhow::bail!("--admin must be non-empty");
    }

    let mut users = vec![User::admin(admin)];
    for raw in &args.members {
        let member = parse_member(raw)?;
        if users.iter().any(|u| u.id() == member.id()) {
            anyhow::bail!("user '{}' is listed twice", member.id());
        }
        users.push(member);
    }

    let entities: Vec<EntityId> = args
        .entities
        .iter()
        .map(|e| EntityId::new(e.trim()))
        .collect();
    if let Some(reserved) = entities.iter().find(|e| e.is_reserved()) {
        anyhow::bail!("'{reserved}' is reserved and cannot be used as an entity name");
    }

    Ok(ProjectConfig {
        entities,
        users,
        ..ProjectConfig::default()
    })
}

/// Execute `tl init`. Creates the workspace:
///
/// ```text
/// .tally/
///   config.toml   (entities, users, thresholds)
///   tally.sqlite3 (initiatives and notifications)
///   .gitignore
/// ```
///
/// # Errors
///
/// Returns an error if `.tally/` already exists and `--force` is not set,
/// if a `--member` value is malformed, or if any filesystem operation fails.
pub fn run_init(args: &InitArgs, project_root: &Path) -> Result<()> {
    let paths = WorkspacePaths::new(project_root);
    let tally_dir = paths.tally_dir();

    if tally_dir.exists() && !args.force {
        anyhow::bail!("{TALLY_DIR}/ already exists. Use `tl init --force` to reinitialize.");
    }

    let project = build_config(args)?;

    std::fs::create_dir_all(&tally_dir)
        .with_context(|| format!("Failed to create {}", tally_dir.display()))?;
    config::save_project_config(project_root, &project)?;

    let gitignore_path = tally_dir.join(".gitignore");
    std::fs::write(&gitignore_path, gitignore())
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    // Opening the store runs the migrations.
    SqliteStore::open(&paths.db())?;

    tracing::info!(
        root = %project_root.display(),
        users = project.users.len(),
        entities = project.entities.len(),
        "workspace initialized"
    );

    println!("✓ Initialized {TALLY_DIR}/ workspace.");
    println!();
    println!("  Config:   {TALLY_DIR}/config.toml");
    println!("  Database: {TALLY_DIR}/{DB_FILE}");
    println!("  Admin:    {}", args.admin.trim());
    println!();
    println!("Next steps:");
    println!("  Choose who you are (required for every command):");
    println!("    export TALLY_USER={}", args.admin.trim());
    println!();
    println!("  Add members under [[users]] in {TALLY_DIR}/config.toml, then:");
    println!("    tl create --name \"Digital HR\" --owner \"Dina\" --entity sgn");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::model::EntityScope;

    fn args(members: &[&str], entities: &[&str]) -> InitArgs {
        InitArgs {
            force: false,
            admin: "root".to_string(),
            entities: entities.iter().map(ToString::to_string).collect(),
            members: members.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn creates_workspace_with_config_and_db() {
        let dir = tempfile::tempdir().expect("tempdir");
        run_init(&args(&["dina:sgn"], &["sgn", "lpp"]), dir.path()).expect("init");

        let paths = WorkspacePaths::new(dir.path());
        assert!(paths.config().is_file());
        assert!(paths.db().is_file());
        assert!(paths.tally_dir().join(".gitignore").is_file());

        let config = config::load_project_config(dir.path()).expect("load");
        assert_eq!(config.users.len(), 2);
        assert!(config.users[0].is_admin());
        assert_eq!(
            config.users[1].entity(),
            &EntityScope::Entity(EntityId::new("sgn"))
        );
        assert_eq!(config.entities.len(), 2);
    }

    #[test]
    fn refuses_to_reinitialize_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        run_init(&args(&[], &[]), dir.path()).expect("first init");
        let err = run_init(&args(&[], &[]), dir.path()).expect_err("second init");
        assert!(err.to_string().contains("already exists"));

        let mut forced = args(&[], &[]);
        forced.force = true;
        run_init(&forced, dir.path()).expect("forced init");
    }

    #[test]
    fn malformed_members_are_rejected() {
        assert!(parse_member("dina").is_err());
        assert!(parse_member(":sgn").is_err());
        assert!(parse_member("dina:All").is_err());
        assert!(parse_member("dina:sgn").is_ok());
    }

    #[test]
    fn reserved_entity_name_is_rejected() {
        assert!(build_config(&args(&[], &["All"])).is_err());
    }

    #[test]
    fn duplicate_users_are_rejected() {
        assert!(build_config(&args(&["dina:sgn", "dina:lpp"], &[])).is_err());
        assert!(build_config(&args(&["root:sgn"], &[])).is_err());
    }
}
