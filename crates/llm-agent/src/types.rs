use serde::{Deserialize, Serialize};

// ─── Credentials ──────────────────────────────────────────────────────────

/// Per-owner credentials, resolved by the caller before a job starts.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: Option<String>,
    /// Model preference string, interpreted by the agent.
    pub model: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .finish()
    }
}

// ─── GenerationRequest ────────────────────────────────────────────────────

/// Everything a generator needs to produce one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub description: String,
    pub technology: String,
    pub difficulty: String,
    /// Free-text learner context (skill level, learning style), may be empty.
    #[serde(default)]
    pub context: String,
    #[serde(skip)]
    pub credentials: Credentials,
}

impl GenerationRequest {
    /// The description as sent to the model, with learner context appended.
    pub fn enhanced_description(&self) -> String {
        if self.context.trim().is_empty() {
            self.description.clone()
        } else {
            format!("{}\n\nUser Context: {}", self.description, self.context)
        }
    }
}

// ─── GenerationOutput ─────────────────────────────────────────────────────

/// What a generation call returned.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutput {
    /// Free-form model text; the filename mapping still has to be extracted.
    Text(String),
    /// An already-structured JSON value.
    Structured(serde_json::Value),
}
