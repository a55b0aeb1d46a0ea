use std::collections::BTreeMap;

use crate::auction::job::{Job, JobId, JobStatus};
use crate::error::{AuctionError, Result};

/// Authoritative set of jobs that are not yet owned by an agent.
///
/// Jobs are keyed by [`JobId`]. Ids handed out by [`JobRegistry::allocate_id`]
/// are monotonic, so iteration order is insertion order.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: BTreeMap<JobId, Job>,
    next_id: u64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next job id
    pub fn allocate_id(&mut self) -> JobId {
        let id = JobId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert a job. Its status is reset to `Available`.
    pub fn add_job(&mut self, mut job: Job) -> JobId {
        job.status = JobStatus::Available;
        let id = job.id;
        self.next_id = self.next_id.max(id.0 + 1);
        self.jobs.insert(id, job);
        id
    }

    /// Put back a job that was removed, keeping its status.
    pub(crate) fn reinsert(&mut self, job: Job) {
        self.jobs.insert(job.id, job);
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.jobs.get_mut(&id)
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.contains_key(&id)
    }

    /// Move a job along one lifecycle edge. Returns the status it left.
    pub fn set_status(&mut self, id: JobId, status: JobStatus) -> Result<JobStatus> {
        let job = self.jobs.get_mut(&id).ok_or(AuctionError::JobNotFound(id))?;
        let from = job.status;
        if !from.can_transition_to(status) {
            return Err(AuctionError::InvalidTransition {
                job: id,
                from,
                to: status,
            });
        }
        job.status = status;
        Ok(from)
    }

    /// Ids of all `Available` jobs in insertion order
    pub fn list_available(&self) -> Vec<JobId> {
        self.jobs
            .values()
            .filter(|j| j.status == JobStatus::Available)
            .map(|j| j.id)
            .collect()
    }

    /// Take a job out of the registry, typically because an agent now owns it.
    pub fn remove_job(&mut self, id: JobId) -> Option<Job> {
        self.jobs.remove(&id)
    }

    /// All jobs in insertion order
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn count_by_status(&self, status: JobStatus) -> usize {
        self.jobs.values().filter(|j| j.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Position;

    fn job(registry: &mut JobRegistry, name: &str) -> JobId {
        let id = registry.allocate_id();
        registry.add_job(Job::new(id, name.to_string(), Position::origin()))
    }

    #[test]
    fn add_and_list_in_insertion_order() {
        let mut registry = JobRegistry::new();
        let a = job(&mut registry, "a");
        let b = job(&mut registry, "b");
        let c = job(&mut registry, "c");
        assert_eq!(registry.list_available(), vec![a, b, c]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn list_available_skips_other_states() {
        let mut registry = JobRegistry::new();
        let a = job(&mut registry, "a");
        let b = job(&mut registry, "b");
        registry.set_status(a, JobStatus::Bidding).unwrap();
        assert_eq!(registry.list_available(), vec![b]);
        assert_eq!(registry.count_by_status(JobStatus::Bidding), 1);
    }

    #[test]
    fn set_status_rejects_illegal_edge() {
        let mut registry = JobRegistry::new();
        let a = job(&mut registry, "a");
        let err = registry.set_status(a, JobStatus::Assigned).unwrap_err();
        assert_eq!(
            err,
            AuctionError::InvalidTransition {
                job: a,
                from: JobStatus::Available,
                to: JobStatus::Assigned,
            }
        );
        assert_eq!(registry.get(a).unwrap().status, JobStatus::Available);
    }

    #[test]
    fn set_status_returns_previous() {
        let mut registry = JobRegistry::new();
        let a = job(&mut registry, "a");
        assert_eq!(
            registry.set_status(a, JobStatus::Bidding).unwrap(),
            JobStatus::Available
        );
        assert_eq!(
            registry.set_status(a, JobStatus::Pending).unwrap(),
            JobStatus::Bidding
        );
    }

    #[test]
    fn set_status_unknown_job() {
        let mut registry = JobRegistry::new();
        assert_eq!(
            registry.set_status(JobId(42), JobStatus::Bidding),
            Err(AuctionError::JobNotFound(JobId(42)))
        );
    }

    #[test]
    fn remove_job_transfers_ownership() {
        let mut registry = JobRegistry::new();
        let a = job(&mut registry, "a");
        let removed = registry.remove_job(a).unwrap();
        assert_eq!(removed.name, "a");
        assert!(!registry.contains(a));
        assert!(registry.is_empty());
        assert!(registry.remove_job(a).is_none());
    }

    #[test]
    fn add_job_keeps_ids_unique() {
        let mut registry = JobRegistry::new();
        registry.add_job(Job::new(JobId(10), "x".to_string(), Position::origin()));
        assert_eq!(registry.allocate_id(), JobId(11));
    }
}
