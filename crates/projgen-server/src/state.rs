use std::path::{Path, PathBuf};
use std::sync::Arc;

use llm_agent::{CommandGenerator, Credentials, Generator, HttpGenerator};
use projgen_core::config::{AgentConfig, AgentKind, Config, StatusBackend};
use projgen_core::materialize::Materializer;
use projgen_core::status::{MemoryStatusStore, RedbStatusStore, StatusStore};
use projgen_core::{ProjgenError, Result};
use tracing::{info, warn};

use crate::build::{BuildOptions, BuildOrchestrator};

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub orchestrator: BuildOrchestrator,
}

impl AppState {
    /// Wire the status store, materializer and orchestrator from `config`,
    /// using the given generator.
    pub fn new(root: PathBuf, config: Config, generator: Arc<dyn Generator>) -> Result<Self> {
        config.ensure_valid()?;
        let store = open_status_store(&root, &config)?;
        let materializer = Materializer::new(config.projects_path(&root));
        let orchestrator =
            BuildOrchestrator::new(store, generator, materializer, BuildOptions::from(&config.jobs));
        Ok(Self {
            root,
            config: Arc::new(config),
            orchestrator,
        })
    }

    /// Like [`AppState::new`], with the generator built from `config.agent`.
    pub fn from_config(root: PathBuf, config: Config) -> Result<Self> {
        let generator = generator_from_config(&config.agent)?;
        Self::new(root, config, generator)
    }

    pub fn projects_dir(&self) -> &Path {
        self.orchestrator.projects_dir()
    }

    /// Per-request credentials: the request's key and model when given,
    /// otherwise the configured fallbacks.
    pub fn resolve_credentials(&self, api_key: Option<String>, model: Option<String>) -> Credentials {
        Credentials {
            api_key: api_key
                .filter(|k| !k.trim().is_empty())
                .or_else(|| self.config.agent.fallback_api_key()),
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| self.config.agent.model.clone()),
        }
    }
}

pub fn generator_from_config(agent: &AgentConfig) -> Result<Arc<dyn Generator>> {
    match agent.kind {
        AgentKind::Command => Ok(Arc::new(CommandGenerator::new(
            agent.command.clone(),
            agent.args.clone(),
        ))),
        AgentKind::Http => {
            let endpoint = agent
                .endpoint
                .clone()
                .filter(|e| !e.is_empty())
                .ok_or_else(|| ProjgenError::Config("agent.endpoint is required for kind 'http'".into()))?;
            Ok(Arc::new(HttpGenerator::new(endpoint)))
        }
    }
}

/// Open the configured status backend. The redb backend first marks jobs
/// left `processing` by a previous process as interrupted.
pub fn open_status_store(root: &Path, config: &Config) -> Result<Arc<dyn StatusStore>> {
    match config.jobs.status_backend {
        StatusBackend::Memory => Ok(Arc::new(MemoryStatusStore::new())),
        StatusBackend::Redb => {
            let path = config.status_db_path(root);
            let store = RedbStatusStore::open(&path)?;
            let recovered = store.startup_recovery()?;
            if recovered > 0 {
                warn!(recovered, "status store: marked interrupted jobs as failed");
            }
            info!(path = %path.display(), "status store: redb");
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use projgen_core::status::JobStatus;
    use tempfile::TempDir;

    #[tokio::test]
    async fn new_state_resolves_projects_dir_under_root() {
        let dir = TempDir::new().unwrap();
        let state = AppState::from_config(dir.path().to_path_buf(), Config::default()).unwrap();
        assert_eq!(state.projects_dir(), dir.path().join("generated_projects"));
    }

    #[tokio::test]
    async fn request_credentials_override_config() {
        let dir = TempDir::new().unwrap();
        let state = AppState::from_config(dir.path().to_path_buf(), Config::default()).unwrap();

        let creds = state.resolve_credentials(Some("k-req".into()), Some("big".into()));
        assert_eq!(creds.api_key.as_deref(), Some("k-req"));
        assert_eq!(creds.model, "big");

        let creds = state.resolve_credentials(None, Some("  ".into()));
        assert_eq!(creds.model, "default");
    }

    #[test]
    fn http_agent_requires_endpoint() {
        let agent = AgentConfig {
            kind: AgentKind::Http,
            ..AgentConfig::default()
        };
        assert!(matches!(
            generator_from_config(&agent),
            Err(ProjgenError::Config(_))
        ));
    }

    #[test]
    fn redb_backend_is_opened_under_root() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.jobs.status_backend = StatusBackend::Redb;
        let store = open_status_store(dir.path(), &config).unwrap();
        assert!(dir.path().join(".projgen/status.db").exists());
        assert_eq!(store.get("7").unwrap().record.status, JobStatus::Idle);
    }
}
