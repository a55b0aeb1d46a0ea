use serde::Serialize;

use crate::agent::AgentId;
use crate::auction::job::{JobId, JobStatus};
use crate::geometry::Position;

/// Observable transitions, published for rendering and telemetry collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuctionEvent {
    JobPublished {
        job: JobId,
        name: String,
        target: Position,
    },
    JobStatusChanged {
        job: JobId,
        from: JobStatus,
        to: JobStatus,
    },
    BidSubmitted {
        job: JobId,
        agent: AgentId,
        cost: f64,
    },
    JobAwarded {
        job: JobId,
        agent: AgentId,
        cost: f64,
    },
    BidLost {
        job: JobId,
        agent: AgentId,
    },
    /// The agent refused an award because it was already working.
    AwardRejected {
        job: JobId,
        agent: AgentId,
    },
    JobCompleted {
        job: JobId,
        agent: AgentId,
    },
}

impl AuctionEvent {
    pub fn job(&self) -> JobId {
        match self {
            AuctionEvent::JobPublished { job, .. }
            | AuctionEvent::JobStatusChanged { job, .. }
            | AuctionEvent::BidSubmitted { job, .. }
            | AuctionEvent::JobAwarded { job, .. }
            | AuctionEvent::BidLost { job, .. }
            | AuctionEvent::AwardRejected { job, .. }
            | AuctionEvent::JobCompleted { job, .. } => *job,
        }
    }
}
