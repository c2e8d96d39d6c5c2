pub mod build;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::root))
        // Events (SSE)
        .route("/api/v1/events", get(routes::events::sse_events))
        // Jobs
        .route(
            "/api/v1/generate-project",
            post(routes::jobs::generate_project),
        )
        .route(
            "/api/v1/project-status/{owner}",
            get(routes::jobs::project_status),
        )
        .route(
            "/api/v1/project-status/{owner}/{job_id}",
            get(routes::jobs::job_status),
        )
        // Projects
        .route(
            "/api/v1/projects/{owner}",
            get(routes::projects::list_projects),
        )
        .route(
            "/api/v1/projects/{owner}/{project}/info",
            get(routes::projects::project_info),
        )
        .route(
            "/api/v1/projects/{owner}/{project}/files/{*path}",
            get(routes::projects::read_file),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the build service on `0.0.0.0:{port}`.
pub async fn serve(app_state: AppState, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(app_state, listener).await
}

/// Start the build service on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port). On Ctrl-C the server stops accepting requests
/// and every queued or in-flight job is cancelled.
pub async fn serve_on(app_state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let orchestrator = app_state.orchestrator.clone();
    let app = build_router(app_state);

    tracing::info!("projgen server listening on http://localhost:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            orchestrator.shutdown();
        })
        .await?;
    Ok(())
}
