//! Job status records and the store that holds them.
//!
//! Each submission gets its own [`JobId`]; records are keyed by
//! `(owner, job_id)` and every owner has a pointer to its most recently
//! submitted job. Polling by owner follows that pointer, so late updates from
//! an older job never show up as the owner's current progress.

pub mod db;
pub mod memory;

pub use db::RedbStatusStore;
pub use memory::MemoryStatusStore;

use crate::error::{ProjgenError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FailureKind
// ---------------------------------------------------------------------------

/// Why a job ended in [`JobStatus::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    Timeout,
    Cancelled,
    Config,
    NoJsonFound,
    MalformedJson,
    Materialization,
    Interrupted,
    Unknown,
}

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for JobId {
    type Err = ProjgenError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ProjgenError::StatusStore(format!("invalid job id: {s}")))
    }
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// Latest known state of one job. Every update replaces the record wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// The record reported for an owner that never submitted anything.
    pub fn idle() -> Self {
        Self {
            status: JobStatus::Idle,
            step: None,
            progress: 0,
            error_kind: None,
            updated_at: None,
        }
    }

    pub fn processing(step: impl Into<String>, progress: u8) -> Self {
        Self {
            status: JobStatus::Processing,
            step: Some(step.into()),
            progress: progress.min(100),
            error_kind: None,
            updated_at: Some(Utc::now()),
        }
    }

    pub fn completed(step: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            step: Some(step.into()),
            progress: 100,
            error_kind: None,
            updated_at: Some(Utc::now()),
        }
    }

    pub fn failed(kind: FailureKind, step: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            step: Some(step.into()),
            progress: 0,
            error_kind: Some(kind),
            updated_at: Some(Utc::now()),
        }
    }
}

impl Default for JobRecord {
    fn default() -> Self {
        Self::idle()
    }
}

/// Poll result: the owner's latest job, if any, and its record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(flatten)]
    pub record: JobRecord,
}

impl JobSnapshot {
    pub fn idle() -> Self {
        Self {
            job_id: None,
            record: JobRecord::idle(),
        }
    }
}

// ---------------------------------------------------------------------------
// StatusStore
// ---------------------------------------------------------------------------

/// Backing store for job status.
///
/// Implementations must be safe to share across tasks. Methods are
/// synchronous and may block on disk (a redb write commit syncs to disk), so
/// async callers run them on the blocking pool.
pub trait StatusStore: Send + Sync {
    /// Register `job_id` as the owner's latest job with an initial record.
    fn begin(&self, owner: &str, job_id: JobId, record: JobRecord) -> Result<()>;

    /// Replace the record of `job_id`. Does not move the owner's latest pointer
    /// unless the owner has no latest job yet.
    fn update(&self, owner: &str, job_id: JobId, record: JobRecord) -> Result<()>;

    /// The owner's latest job, or [`JobSnapshot::idle`] if none was submitted.
    fn get(&self, owner: &str) -> Result<JobSnapshot>;

    /// The record of a specific job, if known.
    fn get_job(&self, owner: &str, job_id: JobId) -> Result<Option<JobRecord>>;
}
