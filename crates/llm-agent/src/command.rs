use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::generator::Generator;
use crate::types::{GenerationOutput, GenerationRequest};
use crate::{prompt, AgentError, Result};

/// Environment variable carrying the model preference to the child process.
pub const MODEL_ENV: &str = "PROJGEN_MODEL";
/// Environment variable carrying the API key to the child process.
pub const API_KEY_ENV: &str = "PROJGEN_API_KEY";

// ─── CommandGenerator ─────────────────────────────────────────────────────

/// Drives a local agent executable.
///
/// The rendered prompt is written to the child's stdin, which is then closed;
/// the child's whole stdout is the generation output. Stderr is drained in a
/// background task and surfaced when the child exits non-zero, where it is
/// also inspected for rate-limit markers.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn build_command(&self, request: &GenerationRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env(MODEL_ENV, &request.credentials.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        match &request.credentials.api_key {
            Some(key) => cmd.env(API_KEY_ENV, key),
            None => cmd.env_remove(API_KEY_ENV),
        };
        cmd
    }

    async fn run(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        let mut child = self.build_command(request).spawn()?;

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let stderr_task = child.stderr.take().map(|stderr| {
            let buf = Arc::clone(&stderr_buf);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if let Ok(mut b) = buf.lock() {
                        if !b.is_empty() {
                            b.push('\n');
                        }
                        b.push_str(&line);
                    }
                }
            })
        });

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::Process("stdin not captured".into()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Process("stdout not captured".into()))?;

        let prompt = prompt::render(request);
        // Write and read concurrently so a chatty child cannot deadlock on a full pipe.
        let write = async move {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.flush().await?;
            drop(stdin);
            Ok::<_, std::io::Error>(())
        };
        let mut out = String::new();
        let read = stdout.read_to_string(&mut out);
        let (written, read) = tokio::join!(write, read);
        if let Err(e) = written {
            // A child that exits without reading its input is judged by its exit status.
            debug!(program = %self.program, error = %e, "command generator: stdin write failed");
        }
        read?;

        let status = child.wait().await?;
        if status.success() {
            return Ok(GenerationOutput::Text(out));
        }

        // The reader hits EOF once the child is gone; wait for it so no stderr is lost.
        if let Some(task) = stderr_task {
            if let Err(e) = task.await {
                debug!(program = %self.program, error = %e, "command generator: stderr reader failed");
            }
        }

        let stderr = stderr_buf.lock().map(|b| b.clone()).unwrap_or_default();
        let msg = match status.code() {
            Some(code) if stderr.is_empty() => format!("{} exited with code {code}", self.program),
            Some(code) => format!("{} exited with code {code}\nstderr: {stderr}", self.program),
            None => format!("{} terminated by signal\nstderr: {stderr}", self.program),
        };
        warn!(program = %self.program, "command generator failed");
        Err(AgentError::from_message(msg))
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutput> {
        tokio::select! {
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            result = self.run(request) => result,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
