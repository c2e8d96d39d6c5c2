use axum::extract::{Path, State};
use axum::Json;
use projgen_core::project::{self, ProjectInfo};

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/v1/projects/{owner} — every project of the owner with its files.
pub async fn list_projects(
    State(app): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let projects_dir = app.projects_dir().to_path_buf();
    let owner_c = owner.clone();
    let projects = tokio::task::spawn_blocking(move || project::list_projects(&projects_dir, &owner_c))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(serde_json::json!({
        "owner": owner,
        "projects": projects,
    })))
}

/// GET /api/v1/projects/{owner}/{project}/info — the `project_info.json` sidecar.
pub async fn project_info(
    State(app): State<AppState>,
    Path((owner, project)): Path<(String, String)>,
) -> Result<Json<ProjectInfo>, AppError> {
    let projects_dir = app.projects_dir().to_path_buf();
    let (owner_c, project_c) = (owner.clone(), project.clone());
    let info = tokio::task::spawn_blocking(move || {
        let dir = project::resolve_project_dir(&projects_dir, &owner_c, &project_c)?;
        ProjectInfo::load(&dir)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    info.map(Json)
        .ok_or_else(|| AppError::not_found(format!("no project info for '{owner}/{project}'")))
}

/// GET /api/v1/projects/{owner}/{project}/files/{*path} — read one generated
/// file. Paths resolving outside the project directory are refused with 403.
pub async fn read_file(
    State(app): State<AppState>,
    Path((owner, project, path)): Path<(String, String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let projects_dir = app.projects_dir().to_path_buf();
    let (owner_c, project_c, path_c) = (owner.clone(), project.clone(), path.clone());
    let content = tokio::task::spawn_blocking(move || {
        project::read_project_file(&projects_dir, &owner_c, &project_c, &path_c)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(serde_json::json!({
        "owner": owner,
        "project": project,
        "path": path,
        "content": content,
    })))
}
