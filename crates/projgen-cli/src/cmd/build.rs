use anyhow::Context;
use clap::Args;
use projgen_core::config::Config;
use projgen_server::build::BuildRequest;
use projgen_server::AppState;
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;

use crate::output::print_json;

#[derive(Args)]
pub struct BuildArgs {
    /// Owner id the project is generated for
    #[arg(long)]
    pub owner: String,

    /// Tech stack, e.g. "Python, Pygame"
    #[arg(long, short)]
    pub technology: String,

    /// Difficulty level, e.g. "Beginner"
    #[arg(long, short, default_value = "Beginner")]
    pub difficulty: String,

    /// Learner context appended to the description
    #[arg(long)]
    pub context: Option<String>,

    /// API key for this build (default: agent.api_key_env)
    #[arg(long, env = "PROJGEN_BUILD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model preference (default: agent.model)
    #[arg(long)]
    pub model: Option<String>,

    /// What to build; the first three words name the project folder
    #[arg(required = true, num_args = 1..)]
    pub description: Vec<String>,
}

pub fn run(root: &Path, args: BuildArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load projgen.yaml")?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(build(root, config, args, json))
}

async fn build(root: &Path, config: Config, args: BuildArgs, json: bool) -> anyhow::Result<()> {
    let state = AppState::from_config(root.to_path_buf(), config)?;
    let request = BuildRequest {
        owner: args.owner,
        description: args.description.join(" "),
        technology: args.technology,
        difficulty: args.difficulty,
        context: args.context.unwrap_or_default(),
        credentials: state.resolve_credentials(args.api_key, args.model),
    };

    let mut events = state.orchestrator.subscribe();
    let handle = state.orchestrator.submit(request)?;
    let job_id = handle.job_id();

    loop {
        match events.recv().await {
            Ok(ev) if ev.job_id == job_id => {
                if !json {
                    println!(
                        "[{:>3}%] {}",
                        ev.record.progress,
                        ev.record.step.as_deref().unwrap_or(ev.record.status.as_str())
                    );
                }
                if ev.record.status.is_terminal() {
                    break;
                }
            }
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }

    match handle.wait().await {
        Ok(report) => {
            if json {
                print_json(&serde_json::json!({
                    "status": "completed",
                    "job_id": job_id,
                    "project": report.project,
                    "path": report.path,
                    "files": report.files,
                    "skipped": report.skipped,
                }))?;
            } else {
                println!("{} file(s) written to {}", report.files.len(), report.path.display());
                for skipped in &report.skipped {
                    println!("  skipped {}: {}", skipped.name, skipped.reason);
                }
            }
            Ok(())
        }
        Err(failure) => {
            if json {
                print_json(&serde_json::json!({
                    "status": "error",
                    "job_id": job_id,
                    "error_kind": failure.kind,
                    "step": failure.step(),
                }))?;
            }
            anyhow::bail!("build failed: {}", failure.message)
        }
    }
}
