//! File-backed status store using redb.
//!
//! # Table design
//!
//! ```text
//! JOBS    "<owner>/<job_id>"  -> JSON StoredJob
//! LATEST  "<owner>"           -> job_id (16 raw bytes)
//! ```

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use super::{FailureKind, JobId, JobRecord, JobSnapshot, JobStatus, StatusStore};
use crate::error::{ProjgenError, Result};

const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");
const LATEST: TableDefinition<&str, &[u8]> = TableDefinition::new("latest");

#[derive(Debug, Serialize, Deserialize)]
struct StoredJob {
    owner: String,
    job_id: JobId,
    record: JobRecord,
}

fn job_key(owner: &str, job_id: JobId) -> String {
    format!("{owner}/{job_id}")
}

fn db_err(e: impl std::fmt::Display) -> ProjgenError {
    ProjgenError::StatusStore(e.to_string())
}

// ---------------------------------------------------------------------------
// RedbStatusStore
// ---------------------------------------------------------------------------

/// Persistent status store; survives restarts and can be inspected offline.
pub struct RedbStatusStore {
    db: Database,
}

impl RedbStatusStore {
    /// Open or create the database at `path`, creating both tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(JOBS).map_err(db_err)?;
        wt.open_table(LATEST).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }

    /// Mark every job still `processing` as failed.
    ///
    /// Jobs run inside the server process, so after a restart nothing is left
    /// to finish them. Returns the number of jobs recovered.
    pub fn startup_recovery(&self) -> Result<u32> {
        let stale: Vec<StoredJob> = {
            let rt = self.db.begin_read().map_err(db_err)?;
            let table = rt.open_table(JOBS).map_err(db_err)?;
            let mut out = Vec::new();
            for entry in table.iter().map_err(db_err)? {
                let (_, v) = entry.map_err(db_err)?;
                let job: StoredJob = serde_json::from_slice(v.value())?;
                if job.record.status == JobStatus::Processing {
                    out.push(job);
                }
            }
            out
        };

        let count = stale.len() as u32;
        for job in stale {
            self.put_job(
                &job.owner,
                job.job_id,
                JobRecord::failed(FailureKind::Interrupted, "Interrupted by server restart"),
                false,
            )?;
        }
        Ok(count)
    }

    fn put_job(&self, owner: &str, job_id: JobId, record: JobRecord, make_latest: bool) -> Result<()> {
        let stored = StoredJob {
            owner: owner.to_string(),
            job_id,
            record,
        };
        let value = serde_json::to_vec(&stored)?;
        let key = job_key(owner, job_id);

        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut jobs = wt.open_table(JOBS).map_err(db_err)?;
            jobs.insert(key.as_str(), value.as_slice()).map_err(db_err)?;

            let mut latest = wt.open_table(LATEST).map_err(db_err)?;
            let has_latest = latest.get(owner).map_err(db_err)?.is_some();
            if make_latest || !has_latest {
                latest
                    .insert(owner, job_id.as_bytes().as_slice())
                    .map_err(db_err)?;
            }
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn latest_id(&self, owner: &str) -> Result<Option<JobId>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(LATEST).map_err(db_err)?;
        let Some(guard) = table.get(owner).map_err(db_err)? else {
            return Ok(None);
        };
        let bytes: [u8; 16] = guard
            .value()
            .try_into()
            .map_err(|_| ProjgenError::StatusStore(format!("corrupt latest entry for {owner}")))?;
        Ok(Some(JobId::from_bytes(bytes)))
    }
}

impl StatusStore for RedbStatusStore {
    fn begin(&self, owner: &str, job_id: JobId, record: JobRecord) -> Result<()> {
        self.put_job(owner, job_id, record, true)
    }

    fn update(&self, owner: &str, job_id: JobId, record: JobRecord) -> Result<()> {
        self.put_job(owner, job_id, record, false)
    }

    fn get(&self, owner: &str) -> Result<JobSnapshot> {
        let Some(job_id) = self.latest_id(owner)? else {
            return Ok(JobSnapshot::idle());
        };
        Ok(match self.get_job(owner, job_id)? {
            Some(record) => JobSnapshot {
                job_id: Some(job_id),
                record,
            },
            None => JobSnapshot::idle(),
        })
    }

    fn get_job(&self, owner: &str, job_id: JobId) -> Result<Option<JobRecord>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(JOBS).map_err(db_err)?;
        let key = job_key(owner, job_id);
        match table.get(key.as_str()).map_err(db_err)? {
            Some(v) => {
                let job: StoredJob = serde_json::from_slice(v.value())?;
                Ok(Some(job.record))
            }
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
