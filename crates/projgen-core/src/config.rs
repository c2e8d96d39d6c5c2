use crate::error::{ProjgenError, Result};
use crate::io::atomic_write;
use crate::paths;
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
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// JobsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBackend {
    Memory,
    Redb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Deadline for one generation call; `0` disables it.
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,
    #[serde(default = "default_status_backend")]
    pub status_backend: StatusBackend,
    #[serde(default = "default_status_db")]
    pub status_db: PathBuf,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_generation_timeout() -> u64 {
    600
}

fn default_status_backend() -> StatusBackend {
    StatusBackend::Memory
}

fn default_status_db() -> PathBuf {
    PathBuf::from(paths::DEFAULT_STATUS_DB)
}

impl JobsConfig {
    pub fn generation_timeout(&self) -> Option<Duration> {
        (self.generation_timeout_secs > 0).then(|| Duration::from_secs(self.generation_timeout_secs))
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            generation_timeout_secs: default_generation_timeout(),
            status_backend: default_status_backend(),
            status_db: default_status_db(),
        }
    }
}

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Pipe the prompt to a local executable and read the reply from stdout.
    Command,
    /// POST the request to an HTTP endpoint.
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_kind")]
    pub kind: AgentKind,
    #[serde(default = "default_agent_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Model preference passed to the agent when the request names none.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the fallback API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_agent_kind() -> AgentKind {
    AgentKind::Command
}

fn default_agent_command() -> String {
    "llm".to_string()
}

fn default_model() -> String {
    "default".to_string()
}

fn default_api_key_env() -> String {
    "PROJGEN_API_KEY".to_string()
}

impl AgentConfig {
    /// The fallback API key from the configured environment variable.
    pub fn fallback_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            kind: default_agent_kind(),
            command: default_agent_command(),
            args: Vec::new(),
            endpoint: None,
            model: default_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Contents of `projgen.yaml`. Every field has a default, so an absent or
/// partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_projects_dir")]
    pub projects_dir: PathBuf,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_projects_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_PROJECTS_DIR)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
            server: ServerConfig::default(),
            jobs: JobsConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl Config {
    /// Load `projgen.yaml` from `root`, or defaults if the file is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        atomic_write(&paths::config_path(root), data.as_bytes())
    }

    /// Materialization root, resolved against `root` when relative.
    pub fn projects_path(&self, root: &Path) -> PathBuf {
        resolve(root, &self.projects_dir)
    }

    pub fn status_db_path(&self, root: &Path) -> PathBuf {
        resolve(root, &self.jobs.status_db)
    }

    /// Check for settings that load fine but cannot work.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.jobs.max_concurrent == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "jobs.max_concurrent is 0: no build would ever start".into(),
            });
        }

        match self.agent.kind {
            AgentKind::Http if self.agent.endpoint.as_deref().unwrap_or("").is_empty() => {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "agent.kind is 'http' but agent.endpoint is not set".into(),
                });
            }
            AgentKind::Command if self.agent.command.trim().is_empty() => {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "agent.kind is 'command' but agent.command is empty".into(),
                });
            }
            _ => {}
        }

        if self.jobs.generation_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "jobs.generation_timeout_secs is 0: a hung generation call hangs its job forever".into(),
            });
        }

        warnings
    }

    /// Fail on any [`WarnLevel::Error`] from [`Config::validate`].
    pub fn ensure_valid(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProjgenError::Config(errors.join("; ")))
        }
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
