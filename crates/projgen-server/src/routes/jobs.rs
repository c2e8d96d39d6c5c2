use axum::extract::{Path, State};
use axum::Json;
use projgen_core::paths::validate_owner;
use projgen_core::status::{JobId, JobRecord, JobSnapshot};
use serde::Deserialize;
use tracing::info;

use crate::build::BuildRequest;
use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Owner ids arrive either as JSON numbers (account ids) or strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OwnerField {
    Number(u64),
    Text(String),
}

impl OwnerField {
    pub fn into_owner(self) -> String {
        match self {
            OwnerField::Number(n) => n.to_string(),
            OwnerField::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateProjectBody {
    pub user_id: OwnerField,
    pub description: String,
    pub technology: String,
    pub difficulty: String,
    #[serde(default)]
    pub user_context: Option<String>,
    /// Overrides the configured fallback key for this job only.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/generate-project — submit a build and return immediately.
pub async fn generate_project(
    State(app): State<AppState>,
    Json(body): Json<GenerateProjectBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.description.trim().is_empty() {
        return Err(AppError::bad_request("description must not be empty"));
    }

    let credentials = app.resolve_credentials(body.api_key, body.model);
    let request = BuildRequest {
        owner: body.user_id.into_owner(),
        description: body.description,
        technology: body.technology,
        difficulty: body.difficulty,
        context: body.user_context.unwrap_or_default(),
        credentials,
    };
    let owner = request.owner.clone();

    // The handle is dropped: the job runs detached and reports through the store.
    let orchestrator = app.orchestrator.clone();
    let handle = tokio::task::spawn_blocking(move || orchestrator.submit(request))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    info!(owner = %owner, job_id = %handle.job_id(), "generate-project: started");

    Ok(Json(serde_json::json!({
        "status": "started",
        "job_id": handle.job_id(),
    })))
}

/// GET /api/v1/project-status/{owner} — the owner's latest job, or the idle
/// default when the owner never submitted anything.
pub async fn project_status(
    State(app): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<JobSnapshot>, AppError> {
    // A malformed owner can never have submitted a job.
    if validate_owner(&owner).is_err() {
        return Ok(Json(JobSnapshot::idle()));
    }
    let store = app.orchestrator.store().clone();
    let snapshot = tokio::task::spawn_blocking(move || store.get(&owner))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(snapshot))
}

/// GET /api/v1/project-status/{owner}/{job_id} — one specific job.
pub async fn job_status(
    State(app): State<AppState>,
    Path((owner, job_id)): Path<(String, String)>,
) -> Result<Json<JobRecord>, AppError> {
    validate_owner(&owner)?;
    let id: JobId = job_id
        .parse()
        .map_err(|_| AppError::bad_request(format!("invalid job id '{job_id}'")))?;
    let store = app.orchestrator.store().clone();
    let owner_c = owner.clone();
    tokio::task::spawn_blocking(move || store.get_job(&owner_c, id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("job '{job_id}' not found for owner '{owner}'")))
}
