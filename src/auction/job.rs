use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::Position;

/// Stable handle for a job within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to whatever a rendering collaborator draws for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Available,
    Bidding,
    Assigned,
    Pending,
    Completed,
}

impl JobStatus {
    /// Whether `self -> next` is an edge of the job lifecycle.
    ///
    /// ```text
    /// Available -> Bidding -> Assigned -> Completed
    ///                 |
    ///                 v
    ///              Pending -> Available
    /// ```
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Available, JobStatus::Bidding)
                | (JobStatus::Bidding, JobStatus::Assigned)
                | (JobStatus::Bidding, JobStatus::Pending)
                | (JobStatus::Pending, JobStatus::Available)
                | (JobStatus::Assigned, JobStatus::Completed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Available => write!(f, "available"),
            JobStatus::Bidding => write!(f, "bidding"),
            JobStatus::Assigned => write!(f, "assigned"),
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub target: Position,
    pub status: JobStatus,
    pub marker: Option<MarkerHandle>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: JobId, name: String, target: Position) -> Self {
        Self {
            id,
            name,
            target,
            status: JobStatus::Available,
            marker: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_marker(mut self, marker: MarkerHandle) -> Self {
        self.marker = Some(marker);
        self
    }
}
