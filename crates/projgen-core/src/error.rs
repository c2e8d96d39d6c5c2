use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjgenError {
    #[error("no JSON object found in generation output")]
    NoJsonFound,

    #[error("generation output contained malformed JSON: {0}")]
    MalformedJson(String),

    #[error("generation output is not a filename-to-content object")]
    NotAnObject,

    #[error("access denied: '{0}' resolves outside the project directory")]
    AccessDenied(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("binary file or invalid encoding: {0}")]
    BinaryFile(String),

    #[error("invalid owner id '{0}': must be 1-64 letters, digits, hyphens, or underscores")]
    InvalidOwner(String),

    #[error("invalid project name '{0}'")]
    InvalidProjectName(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("status store error: {0}")]
    StatusStore(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProjgenError>;
