use crate::error::{FedorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Service configuration. Loaded once at startup and shared read-only.
///
/// Sources, later wins: defaults, optional YAML file, environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shared secret for `X-Hub-Signature-256`.
    #[serde(default)]
    pub webhook_secret: String,

    /// Agent executable.
    #[serde(default = "default_agent_command")]
    pub agent_command: String,

    /// Where `just review` clones pull requests; the agent may read below it.
    #[serde(default = "default_clone_dir")]
    pub clone_dir: PathBuf,

    /// Working directory of the agent (holds the `justfile`).
    #[serde(default = "default_project_dir")]
    pub project_dir: PathBuf,

    /// Skip the agent subprocess and report a placeholder result.
    #[serde(default)]
    pub dummy_mode: bool,

    /// Debounce quiet period in seconds.
    #[serde(default = "default_webhook_delay")]
    pub webhook_delay_secs: u64,

    /// Hard deadline for one agent run in seconds.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Only pull requests carrying this label are reviewed.
    #[serde(default)]
    pub required_label: Option<String>,

    /// The bot's own login; its comments never trigger a run.
    #[serde(default = "default_bot_login")]
    pub bot_login: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_agent_command() -> String {
    "claude".to_string()
}

fn default_clone_dir() -> PathBuf {
    PathBuf::from("/tmp/agent-fedor-repos")
}

fn default_project_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_webhook_delay() -> u64 {
    300
}

fn default_run_timeout() -> u64 {
    600
}

fn default_bot_login() -> String {
    "gcs-fedor[bot]".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_secret: String::new(),
            agent_command: default_agent_command(),
            clone_dir: default_clone_dir(),
            project_dir: default_project_dir(),
            dummy_mode: false,
            webhook_delay_secs: default_webhook_delay(),
            run_timeout_secs: default_run_timeout(),
            required_label: None,
            bot_login: default_bot_login(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load from an optional YAML file, then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`] with an injectable environment lookup.
    pub fn load_with<F>(path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(p) => {
                let data = std::fs::read_to_string(p)?;
                serde_yaml::from_str(&data)?
            }
            None => Config::default(),
        };
        config.apply_env(env)?;
        Ok(config)
    }

    /// Overlay environment variables on top of the current values.
    pub fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env("GITHUB_WEBHOOK_SECRET") {
            self.webhook_secret = v;
        }
        if let Some(v) = env("CLAUDE_COMMAND") {
            self.agent_command = v;
        }
        if let Some(v) = env("CLONE_DIR") {
            self.clone_dir = PathBuf::from(v);
        }
        if let Some(v) = env("PROJECT_DIR") {
            self.project_dir = PathBuf::from(v);
        }
        if let Some(v) = env("DUMMY_MODE") {
            self.dummy_mode = parse_flag(&v);
        }
        if let Some(v) = env("WEBHOOK_DELAY") {
            self.webhook_delay_secs = parse_number("WEBHOOK_DELAY", &v)?;
        }
        if let Some(v) = env("RUN_TIMEOUT") {
            self.run_timeout_secs = parse_number("RUN_TIMEOUT", &v)?;
        }
        if let Some(v) = env("GITHUB_PR_LABEL") {
            self.required_label = Some(v);
        }
        if let Some(v) = env("BOT_LOGIN") {
            self.bot_login = v;
        }
        if let Some(v) = env("PORT") {
            self.port = parse_number("PORT", &v)?;
        }
        // An empty label means "no filter".
        if self.required_label.as_deref().is_some_and(|l| l.trim().is_empty()) {
            self.required_label = None;
        }
        Ok(())
    }

    pub fn webhook_delay(&self) -> Duration {
        Duration::from_secs(self.webhook_delay_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// Validate and return any warnings. Entries with [`WarnLevel::Error`]
    /// must stop the service from starting.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.webhook_secret.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "GITHUB_WEBHOOK_SECRET is empty; every delivery would be rejected"
                    .to_string(),
            });
        }

        if self.run_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "run timeout must be greater than zero".to_string(),
            });
        }

        if self.agent_command.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "agent command is empty".to_string(),
            });
        } else if !self.dummy_mode && which::which(&self.agent_command).is_err() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "agent command '{}' not found on PATH; runs will fail until it is installed",
                    self.agent_command
                ),
            });
        }

        if self.webhook_delay_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "webhook delay is 0; bursts of events will not be coalesced".to_string(),
            });
        }

        if self.bot_login.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "bot login is empty; the agent's own comments will retrigger reviews"
                    .to_string(),
            });
        }

        warnings
    }

    /// Run [`Config::validate`] and turn the first error into a
    /// [`FedorError::InvalidConfig`]; warnings are returned to the caller.
    pub fn ensure_valid(&self) -> Result<Vec<ConfigWarning>> {
        let warnings = self.validate();
        if let Some(err) = warnings.iter().find(|w| w.level == WarnLevel::Error) {
            return Err(FedorError::InvalidConfig(err.message.clone()));
        }
        Ok(warnings)
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_number<T: std::str::FromStr>(key: &str, v: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    v.trim()
        .parse::<T>()
        .map_err(|e| FedorError::InvalidSetting {
            key: key.to_string(),
            reason: format!("'{v}': {e}"),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
