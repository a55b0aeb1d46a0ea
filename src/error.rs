use thiserror::Error;

use crate::agent::AgentId;
use crate::auction::{JobId, JobStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuctionError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Agent {agent} is already working, cannot take job {job}")]
    AgentBusy { agent: AgentId, job: JobId },

    #[error("Agent {0} has no job to complete")]
    AgentIdle(AgentId),

    #[error("Job {job} is not open for bids (status: {status})")]
    NotBidding { job: JobId, status: JobStatus },

    #[error("Agent {agent} already bid on job {job}")]
    DuplicateBid { job: JobId, agent: AgentId },

    #[error("Invalid bid cost: {0}")]
    InvalidCost(f64),

    #[error("Job {job} cannot move from {from} to {to}")]
    InvalidTransition {
        job: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AuctionError>;
