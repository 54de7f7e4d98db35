use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::identity::Directory;
use crate::model::{EntityId, User};
use crate::notify::DEFAULT_MAX_RETAINED;
use crate::rollup::UrgencyThresholds;

/// Workspace directory name under the project root.
pub const TALLY_DIR: &str = ".tally";
pub const CONFIG_FILE: &str = "config.toml";
pub const DB_FILE: &str = "tally.sqlite3";
pub const LOCK_FILE: &str = "write.lock";

/// Paths inside a `.tally` workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    root: PathBuf,
}

impl WorkspacePaths {
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            root: project_root.into(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn tally_dir(&self) -> PathBuf {
        self.root.join(TALLY_DIR)
    }

    #[must_use]
    pub fn config(&self) -> PathBuf {
        self.tally_dir().join(CONFIG_FILE)
    }

    #[must_use]
    pub fn db(&self) -> PathBuf {
        self.tally_dir().join(DB_FILE)
    }

    #[must_use]
    pub fn lock(&self) -> PathBuf {
        self.tally_dir().join(LOCK_FILE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Known entity ids. Empty means any entity name is accepted.
    #[serde(default)]
    pub entities: Vec<EntityId>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub urgency: UrgencyThresholds,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl ProjectConfig {
    #[must_use]
    pub fn directory(&self) -> Directory {
        Directory::new(self.users.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_high_progress_threshold")]
    pub high_progress_threshold: u8,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            high_progress_threshold: default_high_progress_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_retained: default_max_retained(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Default acting user id.
    #[serde(default)]
    pub user: Option<String>,
}

/// Load `.tally/config.toml`, falling back to defaults when it is absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = WorkspacePaths::new(project_root).config();
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write `config` to `.tally/config.toml`.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_project_config(project_root: &Path, config: &ProjectConfig) -> Result<()> {
    let path = WorkspacePaths::new(project_root).config();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize project config")?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Load the per-user config from the platform config dir.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("tally/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// `--json` beats `FORMAT`, which beats the user config, which beats TTY
/// detection.
#[must_use]
pub fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_high_progress_threshold() -> u8 {
    75
}

const fn default_max_retained() -> usize {
    DEFAULT_MAX_RETAINED
}
