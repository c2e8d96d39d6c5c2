use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::{JobId, JobRecord, JobSnapshot, StatusStore};
use crate::error::{ProjgenError, Result};

/// Jobs remembered per owner; older ones are dropped first.
const MAX_JOBS_PER_OWNER: usize = 16;

#[derive(Debug, Default)]
struct OwnerJobs {
    latest: Option<JobId>,
    /// Submission order, oldest first.
    order: VecDeque<JobId>,
    records: HashMap<JobId, JobRecord>,
}

impl OwnerJobs {
    fn insert(&mut self, job_id: JobId, record: JobRecord) {
        if self.records.insert(job_id, record).is_none() {
            self.order.push_back(job_id);
        }
        while self.order.len() > MAX_JOBS_PER_OWNER {
            if let Some(old) = self.order.pop_front() {
                self.records.remove(&old);
                if self.latest == Some(old) {
                    self.latest = None;
                }
            }
        }
    }
}

/// Process-local status store for single-instance deployments.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    owners: Mutex<HashMap<String, OwnerJobs>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, OwnerJobs>>> {
        self.owners
            .lock()
            .map_err(|_| ProjgenError::StatusStore("status map lock poisoned".into()))
    }
}

impl StatusStore for MemoryStatusStore {
    fn begin(&self, owner: &str, job_id: JobId, record: JobRecord) -> Result<()> {
        let mut owners = self.lock()?;
        let jobs = owners.entry(owner.to_string()).or_default();
        jobs.latest = Some(job_id);
        jobs.insert(job_id, record);
        Ok(())
    }

    fn update(&self, owner: &str, job_id: JobId, record: JobRecord) -> Result<()> {
        let mut owners = self.lock()?;
        let jobs = owners.entry(owner.to_string()).or_default();
        if jobs.latest.is_none() {
            jobs.latest = Some(job_id);
        }
        jobs.insert(job_id, record);
        Ok(())
    }

    fn get(&self, owner: &str) -> Result<JobSnapshot> {
        let owners = self.lock()?;
        let snapshot = owners
            .get(owner)
            .and_then(|jobs| {
                let id = jobs.latest?;
                let record = jobs.records.get(&id)?.clone();
                Some(JobSnapshot {
                    job_id: Some(id),
                    record,
                })
            })
            .unwrap_or_else(JobSnapshot::idle);
        Ok(snapshot)
    }

    fn get_job(&self, owner: &str, job_id: JobId) -> Result<Option<JobRecord>> {
        let owners = self.lock()?;
        Ok(owners
            .get(owner)
            .and_then(|jobs| jobs.records.get(&job_id).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{FailureKind, JobStatus};

    #[test]
    fn unknown_owner_is_idle() {
        let store = MemoryStatusStore::new();
        let snap = store.get("nobody").unwrap();
        assert_eq!(snap, JobSnapshot::idle());
    }

    #[test]
    fn update_replaces_record_wholesale() {
        let store = MemoryStatusStore::new();
        let job = JobId::new();
        store
            .begin("1", job, JobRecord::processing("queued", 0))
            .unwrap();
        store
            .update("1", job, JobRecord::failed(FailureKind::Unknown, "boom"))
            .unwrap();
        store
            .update("1", job, JobRecord::processing("again", 50))
            .unwrap();

        let snap = store.get("1").unwrap();
        assert_eq!(snap.job_id, Some(job));
        assert_eq!(snap.record.status, JobStatus::Processing);
        assert_eq!(snap.record.error_kind, None);
        assert_eq!(snap.record.progress, 50);
    }

    #[test]
    fn older_job_cannot_stomp_newer_job() {
        let store = MemoryStatusStore::new();
        let first = JobId::new();
        let second = JobId::new();
        store
            .begin("1", first, JobRecord::processing("a", 20))
            .unwrap();
        store
            .begin("1", second, JobRecord::processing("b", 0))
            .unwrap();
        store.update("1", first, JobRecord::completed("done")).unwrap();

        let snap = store.get("1").unwrap();
        assert_eq!(snap.job_id, Some(second));
        assert_eq!(snap.record.step.as_deref(), Some("b"));
        assert_eq!(
            store.get_job("1", first).unwrap().unwrap().status,
            JobStatus::Completed
        );
    }

    #[test]
    fn owners_are_isolated() {
        let store = MemoryStatusStore::new();
        store
            .begin("1", JobId::new(), JobRecord::completed("x"))
            .unwrap();
        assert_eq!(store.get("2").unwrap(), JobSnapshot::idle());
    }

    #[test]
    fn retention_drops_oldest_jobs() {
        let store = MemoryStatusStore::new();
        let first = JobId::new();
        store
            .begin("1", first, JobRecord::processing("0", 0))
            .unwrap();
        for _ in 0..MAX_JOBS_PER_OWNER {
            store
                .begin("1", JobId::new(), JobRecord::processing("n", 0))
                .unwrap();
        }
        assert!(store.get_job("1", first).unwrap().is_none());
        assert!(store.get("1").unwrap().job_id.is_some());
    }
}
