//! `llm-agent` is the generation-call boundary for projgen.
//!
//! A [`Generator`] turns a [`GenerationRequest`] into raw model output. Two
//! drivers ship with the crate:
//!
//! - [`CommandGenerator`] spawns a local agent executable, writes the rendered
//!   prompt to its stdin and collects its stdout.
//! - [`HttpGenerator`] POSTs the prompt to a remote endpoint with bearer auth.
//!
//! Both honour a [`tokio_util::sync::CancellationToken`] and classify provider
//! rate limits as [`AgentError::RateLimited`].

pub mod command;
pub mod error;
pub mod generator;
pub mod http;
pub mod prompt;
pub mod types;

pub use command::CommandGenerator;
pub use error::AgentError;
pub use generator::Generator;
pub use http::HttpGenerator;
pub use types::{Credentials, GenerationOutput, GenerationRequest};

pub type Result<T> = std::result::Result<T, AgentError>;
