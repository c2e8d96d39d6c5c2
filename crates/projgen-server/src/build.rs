//! Build orchestrator: runs one generation job from submission to a terminal
//! status.
//!
//! A job moves through `architecting (20) → coding (50) → saving (80) →
//! completed (100)`, or to `error` with progress 0 from any phase. Every
//! transition is written to the [`StatusStore`] under `(owner, job_id)` and
//! broadcast as a [`StatusEvent`]. Failures never propagate to the submitter;
//! they are only observable through the store.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use llm_agent::{AgentError, Credentials, GenerationOutput, GenerationRequest, Generator};
use projgen_core::config::JobsConfig;
use projgen_core::extract::extract_object;
use projgen_core::materialize::{MaterializeReport, Materializer};
use projgen_core::paths::{project_name_from_description, validate_owner};
use projgen_core::project::ProjectInfo;
use projgen_core::status::{FailureKind, JobId, JobRecord, StatusStore};
use projgen_core::ProjgenError;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const STEP_QUEUED: &str = "Waiting for a free worker";
pub const STEP_ARCHITECT: &str = "Architect designing structure";
pub const STEP_CODING: &str = "Agents writing code";
pub const STEP_SAVING: &str = "Saving files";
pub const STEP_DONE: &str = "Project built successfully";
pub const RATE_LIMIT_STEP: &str = "Rate limit reached. Please try later.";

const EVENT_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Requests, events, outcomes
// ---------------------------------------------------------------------------

/// One submission, with credentials already resolved by the caller.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub owner: String,
    pub description: String,
    pub technology: String,
    pub difficulty: String,
    pub context: String,
    pub credentials: Credentials,
}

impl BuildRequest {
    fn generation_request(&self) -> GenerationRequest {
        GenerationRequest {
            description: self.description.clone(),
            technology: self.technology.clone(),
            difficulty: self.difficulty.clone(),
            context: self.context.clone(),
            credentials: self.credentials.clone(),
        }
    }

    fn project_info(&self) -> ProjectInfo {
        ProjectInfo {
            original_description: self.description.clone(),
            tech_stack: self.technology.clone(),
            difficulty: self.difficulty.clone(),
        }
    }
}

/// A status transition, as sent to SSE subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    pub owner: String,
    pub job_id: JobId,
    #[serde(flatten)]
    pub record: JobRecord,
}

/// Why a job ended in error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "Job cancelled")
    }

    /// The user-facing step text recorded with the error status.
    pub fn step(&self) -> String {
        match self.kind {
            FailureKind::RateLimited => RATE_LIMIT_STEP.to_string(),
            FailureKind::Timeout | FailureKind::Cancelled | FailureKind::Interrupted => {
                self.message.clone()
            }
            FailureKind::Config => format!("Config Error: {}", self.message),
            FailureKind::NoJsonFound | FailureKind::MalformedJson => {
                "Error: the generated output could not be parsed into project files".to_string()
            }
            FailureKind::Materialization | FailureKind::Unknown => {
                format!("Error: {}", self.message)
            }
        }
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.step())
    }
}

impl From<AgentError> for JobFailure {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::RateLimited(msg) => Self::new(FailureKind::RateLimited, msg),
            AgentError::Timeout(limit) => Self::new(
                FailureKind::Timeout,
                format!("Generation timed out after {}s", limit.as_secs()),
            ),
            AgentError::Cancelled => Self::cancelled(),
            AgentError::MissingCredentials(msg) => Self::new(FailureKind::Config, msg),
            other if other.is_rate_limited() => {
                Self::new(FailureKind::RateLimited, other.to_string())
            }
            other => Self::new(FailureKind::Unknown, other.to_string()),
        }
    }
}

impl From<ProjgenError> for JobFailure {
    fn from(e: ProjgenError) -> Self {
        match e {
            ProjgenError::NoJsonFound => Self::new(FailureKind::NoJsonFound, e.to_string()),
            ProjgenError::MalformedJson(_) | ProjgenError::NotAnObject => {
                Self::new(FailureKind::MalformedJson, e.to_string())
            }
            ProjgenError::Cancelled => Self::cancelled(),
            ProjgenError::Io(_) => Self::new(FailureKind::Materialization, e.to_string()),
            other => Self::new(FailureKind::Unknown, other.to_string()),
        }
    }
}

pub type JobOutcome = std::result::Result<MaterializeReport, JobFailure>;

/// Handle to a submitted job. Dropping it detaches the job.
#[derive(Debug)]
pub struct JobHandle {
    job_id: JobId,
    cancel: CancellationToken,
    join: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Request cancellation. The job records `error` with kind `cancelled`
    /// at its next suspension point; files already written stay on disk.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> JobOutcome {
        self.join.await.unwrap_or_else(|e| {
            Err(JobFailure::new(
                FailureKind::Unknown,
                format!("task join error: {e}"),
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// BuildOrchestrator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub max_concurrent: usize,
    /// `None` lets a generation call run indefinitely.
    pub generation_timeout: Option<Duration>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from(&JobsConfig::default())
    }
}

impl From<&JobsConfig> for BuildOptions {
    fn from(jobs: &JobsConfig) -> Self {
        Self {
            max_concurrent: jobs.max_concurrent.max(1),
            generation_timeout: jobs.generation_timeout(),
        }
    }
}

/// Runs builds detached from the submitting request, at most
/// `max_concurrent` at a time.
#[derive(Clone)]
pub struct BuildOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn StatusStore>,
    generator: Arc<dyn Generator>,
    materializer: Materializer,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    generation_timeout: Option<Duration>,
    events: broadcast::Sender<StatusEvent>,
}

struct Job {
    id: JobId,
    project: String,
    request: BuildRequest,
}

impl BuildOrchestrator {
    pub fn new(
        store: Arc<dyn StatusStore>,
        generator: Arc<dyn Generator>,
        materializer: Materializer,
        options: BuildOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                generator,
                materializer,
                permits: Arc::new(Semaphore::new(options.max_concurrent.max(1))),
                shutdown: CancellationToken::new(),
                generation_timeout: options.generation_timeout,
                events,
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.inner.store
    }

    pub fn projects_dir(&self) -> &Path {
        self.inner.materializer.projects_dir()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.inner.events.subscribe()
    }

    /// Cancel every queued and in-flight job.
    pub fn shutdown(&self) {
        info!("build: shutting down, cancelling jobs");
        self.inner.shutdown.cancel();
    }

    /// Register a new job and spawn it. Returns as soon as the job is recorded;
    /// only input validation and the initial status write can fail here.
    pub fn submit(&self, request: BuildRequest) -> projgen_core::Result<JobHandle> {
        validate_owner(&request.owner)?;
        let project = project_name_from_description(&request.description)?;
        let job_id = JobId::new();

        let queued = JobRecord::processing(STEP_QUEUED, 0);
        self.inner.store.begin(&request.owner, job_id, queued.clone())?;
        self.inner.broadcast(&request.owner, job_id, queued);
        info!(owner = %request.owner, %job_id, %project, "build: submitted");

        let cancel = self.inner.shutdown.child_token();
        let job = Job {
            id: job_id,
            project,
            request,
        };
        let inner = Arc::clone(&self.inner);
        let task_cancel = cancel.clone();
        let join = tokio::spawn(async move { inner.run(job, task_cancel).await });

        Ok(JobHandle {
            job_id,
            cancel,
            join,
        })
    }
}

impl Inner {
    async fn run(self: Arc<Self>, job: Job, cancel: CancellationToken) -> JobOutcome {
        let owner = job.request.owner.clone();
        let outcome = match AssertUnwindSafe(self.execute(&job, &cancel))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => Err(JobFailure::new(
                FailureKind::Unknown,
                panic_message(payload.as_ref()),
            )),
        };

        match &outcome {
            Ok(report) => {
                info!(
                    owner = %owner,
                    job_id = %job.id,
                    project = %report.project,
                    files = report.files.len(),
                    "build: completed"
                );
                self.report(&owner, job.id, JobRecord::completed(STEP_DONE)).await;
            }
            Err(failure) => {
                warn!(owner = %owner, job_id = %job.id, kind = ?failure.kind, error = %failure.message, "build: failed");
                self.report(&owner, job.id, JobRecord::failed(failure.kind, failure.step())).await;
            }
        }
        outcome
    }

    async fn execute(&self, job: &Job, cancel: &CancellationToken) -> JobOutcome {
        let owner = job.request.owner.as_str();

        let _permit = tokio::select! {
            permit = Arc::clone(&self.permits).acquire_owned() => {
                permit.map_err(|_| JobFailure::cancelled())?
            }
            _ = cancel.cancelled() => return Err(JobFailure::cancelled()),
        };

        self.report(owner, job.id, JobRecord::processing(STEP_ARCHITECT, 20)).await;
        let request = job.request.generation_request();

        self.report(owner, job.id, JobRecord::processing(STEP_CODING, 50)).await;
        let output = self.generate(&request, cancel).await?;

        self.report(owner, job.id, JobRecord::processing(STEP_SAVING, 80)).await;
        let files = match output {
            GenerationOutput::Text(text) => extract_object(&text)?,
            GenerationOutput::Structured(Value::Object(map)) => map,
            GenerationOutput::Structured(_) => return Err(ProjgenError::NotAnObject.into()),
        };

        let materializer = self.materializer.clone();
        let owner = owner.to_string();
        let project = job.project.clone();
        let info = job.request.project_info();
        let cancel = cancel.clone();
        let report = tokio::task::spawn_blocking(move || -> projgen_core::Result<MaterializeReport> {
            let report =
                materializer.materialize_until(&owner, &project, &files, || cancel.is_cancelled())?;
            if let Err(e) = materializer.write_project_info(&owner, &project, &info) {
                warn!(owner = %owner, project = %project, error = %e, "build: project info not written");
            }
            Ok(report)
        })
        .await
        .map_err(|e| JobFailure::new(FailureKind::Unknown, format!("task join error: {e}")))??;

        Ok(report)
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<GenerationOutput, JobFailure> {
        let call = async {
            tokio::select! {
                _ = cancel.cancelled() => Err(AgentError::Cancelled),
                result = self.generator.generate(request, cancel) => result,
            }
        };
        let result = match self.generation_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(AgentError::Timeout(limit))),
            None => call.await,
        };
        result.map_err(JobFailure::from)
    }

    /// Persist `record` off the async workers, then fan it out.
    async fn report(&self, owner: &str, job_id: JobId, record: JobRecord) {
        let store = Arc::clone(&self.store);
        let owner_c = owner.to_string();
        let persisted = record.clone();
        let result = tokio::task::spawn_blocking(move || store.update(&owner_c, job_id, persisted)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(owner, %job_id, error = %e, "build: status update failed"),
            Err(e) => error!(owner, %job_id, error = %e, "build: status update task failed"),
        }
        self.broadcast(owner, job_id, record);
    }

    fn broadcast(&self, owner: &str, job_id: JobId, record: JobRecord) {
        // No subscribers is fine.
        let _ = self.events.send(StatusEvent {
            owner: owner.to_string(),
            job_id,
            record,
        });
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "job panicked".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
