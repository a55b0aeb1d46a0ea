//! Worker agents and the cost oracle they bid with.
//!
//! An agent is either `Idle` or `Working` on exactly one job. It only takes
//! part in the auction through three notifications:
//!
//! - [`Agent::on_announce`]: price a job, or abstain
//! - [`Agent::award`]: take the job, unless already working
//! - [`Agent::on_lose`]: observation only
//!
//! Moving to the job is someone else's concern; the movement collaborator
//! calls [`Agent::complete`] on arrival.

pub mod oracle;

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auction::{Job, JobId, JobStatus};
use crate::error::{AuctionError, Result};
use crate::geometry::Position;

pub use oracle::{CostOracle, EuclideanOracle, FieldOracle, Zone};

/// Zero-cost bids are raised to this so a real bid never looks like "no cost".
pub const MIN_BID_COST: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Idle,
    Working,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Idle => write!(f, "idle"),
            AgentState::Working => write!(f, "working"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Agent {
    name: String,
    position: Position,
    home: Position,
    state: AgentState,
    assigned: Option<Job>,
    oracle: Arc<dyn CostOracle>,
}

impl Agent {
    /// A new idle agent parked at `home`.
    pub fn new(name: impl Into<String>, home: Position, oracle: Arc<dyn CostOracle>) -> Self {
        Self {
            name: name.into(),
            position: home,
            home,
            state: AgentState::Idle,
            assigned: None,
            oracle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn home(&self) -> Position {
        self.home
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == AgentState::Idle
    }

    pub fn assigned_job(&self) -> Option<&Job> {
        self.assigned.as_ref()
    }

    /// Price a job announcement. Returns the bid cost, or `None` to abstain.
    ///
    /// Working agents never bid. Unreachable, negative, or non-finite oracle
    /// answers mean no bid.
    pub fn on_announce(&self, job: &Job) -> Option<f64> {
        if !self.is_idle() {
            return None;
        }

        match self.oracle.cost(self.position, job.target) {
            Some(cost) if cost.is_finite() && cost >= 0.0 => {
                let cost = if cost == 0.0 { MIN_BID_COST } else { cost };
                tracing::debug!(agent = %self.name, job_id = %job.id, job = %job.name, cost, "Computed bid");
                Some(cost)
            }
            _ => {
                tracing::debug!(agent = %self.name, job_id = %job.id, job = %job.name, "No path to job, abstaining");
                None
            }
        }
    }

    /// Take ownership of an awarded job. Rejected without side effects when
    /// the agent is already working.
    pub fn award(&mut self, id: AgentId, job: Job) -> std::result::Result<(), (AuctionError, Job)> {
        if !self.is_idle() {
            tracing::warn!(agent = %self.name, job_id = %job.id, "Already working, rejecting award");
            let err = AuctionError::AgentBusy { agent: id, job: job.id };
            return Err((err, job));
        }

        tracing::info!(agent = %self.name, job_id = %job.id, job = %job.name, target = %job.target, "Won job");
        self.assigned = Some(job);
        self.state = AgentState::Working;
        Ok(())
    }

    pub fn on_lose(&self, job: JobId) {
        tracing::debug!(agent = %self.name, job_id = %job, "Lost bid");
    }

    /// Arrival at the job target: the job is finished and the agent is free.
    pub fn complete(&mut self, id: AgentId) -> Result<Job> {
        let mut job = self.assigned.take().ok_or(AuctionError::AgentIdle(id))?;
        self.state = AgentState::Idle;
        self.position = job.target;

        job.status = JobStatus::Completed;
        job.completed_at = Some(Utc::now());
        if let Some(marker) = job.marker.take() {
            tracing::debug!(job_id = %job.id, marker = marker.0, "Released job marker");
        }
        tracing::info!(agent = %self.name, job_id = %job.id, job = %job.name, "Job completed");
        Ok(job)
    }

    /// Park an idle agent back at its home base. No-op while working.
    pub fn return_home(&mut self) {
        if self.is_idle() {
            self.position = self.home;
        }
    }
}
