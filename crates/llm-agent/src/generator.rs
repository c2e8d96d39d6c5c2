use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::types::{GenerationOutput, GenerationRequest};
use crate::Result;

/// Produces the raw project output for one request.
///
/// Implementations must return promptly with [`crate::AgentError::Cancelled`]
/// once `cancel` fires. Rate-limit failures should surface as
/// [`crate::AgentError::RateLimited`] so callers can report them distinctly.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutput>;
}
