use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use projgen_core::error::ProjgenError;

// ---------------------------------------------------------------------------
// Internal sentinels for explicit 400 / 404 errors
// ---------------------------------------------------------------------------

/// Private sentinel error type used to carry an explicit HTTP 400 through
/// the `anyhow::Error` chain without touching the `ProjgenError` enum.
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

/// Private sentinel error type used to carry an explicit HTTP 404 through
/// the `anyhow::Error` chain without touching the `ProjgenError` enum.
#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    /// Construct a 404 Not Found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }
}

fn status_for(e: &ProjgenError) -> StatusCode {
    match e {
        ProjgenError::AccessDenied(_) => StatusCode::FORBIDDEN,
        ProjgenError::ProjectNotFound(_) | ProjgenError::FileNotFound(_) => StatusCode::NOT_FOUND,
        ProjgenError::InvalidOwner(_)
        | ProjgenError::InvalidProjectName(_)
        | ProjgenError::BinaryFile(_) => StatusCode::BAD_REQUEST,
        ProjgenError::NoJsonFound | ProjgenError::MalformedJson(_) | ProjgenError::NotAnObject => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ProjgenError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        ProjgenError::StatusStore(_)
        | ProjgenError::Config(_)
        | ProjgenError::Io(_)
        | ProjgenError::Yaml(_)
        | ProjgenError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Check for explicit sentinel types before falling through to ProjgenError.
        if let Some(b) = self.0.downcast_ref::<BadRequestError>() {
            let body = serde_json::json!({ "error": b.0.clone() });
            return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
        }
        if let Some(n) = self.0.downcast_ref::<NotFoundError>() {
            let body = serde_json::json!({ "error": n.0.clone() });
            return (StatusCode::NOT_FOUND, axum::Json(body)).into_response();
        }

        let status = self
            .0
            .downcast_ref::<ProjgenError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
