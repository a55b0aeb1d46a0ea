use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::agent::{Agent, AgentId, AgentState};
use crate::auction::bid::{select_winner, Bid, BidBook};
use crate::auction::event::AuctionEvent;
use crate::auction::job::{Job, JobId, JobStatus, MarkerHandle};
use crate::auction::registry::JobRegistry;
use crate::config::AuctionConfig;
use crate::error::{AuctionError, Result};
use crate::geometry::Position;
use crate::timer::TimerQueue;

/// Delayed protocol steps, keyed by job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Close the bidding window opened in `round` and pick a winner
    Evaluate { job: JobId, round: u64 },
    /// Put a pending job back up for auction
    Requeue(JobId),
}

/// How an evaluation ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Assigned { agent: AgentId, cost: f64 },
    NoBids,
    /// The cheapest bidder was no longer idle at commit time.
    StaleWinner { agent: AgentId },
    /// The job was gone, not in `Bidding`, or its window had already been
    /// closed when the timer fired.
    Skipped,
}

/// What a fired timer did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fired {
    Evaluated { job: JobId, resolution: Resolution },
    Requeued { job: JobId, reopened: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuctionStats {
    pub published: u64,
    pub announced: u64,
    pub bids: u64,
    pub assigned: u64,
    pub completed: u64,
    pub no_bid_requeues: u64,
    pub stale_winner_requeues: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub name: String,
    pub target: Position,
    pub status: JobStatus,
    pub assigned_to: Option<AgentId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentView {
    pub id: AgentId,
    pub name: String,
    pub state: AgentState,
    pub position: Position,
    pub job: Option<JobId>,
}

/// Read-only picture of the auction for rendering and telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct FleetSnapshot {
    pub now_ms: u64,
    pub jobs: Vec<JobView>,
    pub agents: Vec<AgentView>,
    pub stats: AuctionStats,
}

/// Contract-net coordinator.
///
/// Every job gets its own independent auction:
///
/// ```text
/// Available --announce--> Bidding --evaluate--> Assigned
///     ^                      |
///     |                      v
///     +-----requeue------ Pending
/// ```
///
/// All state lives here and is only touched from the caller's turn. Time is
/// virtual: the caller passes "now" to [`Auctioneer::tick`] and delayed
/// phases fire once their deadline has been reached.
#[derive(Debug)]
pub struct Auctioneer {
    config: AuctionConfig,
    registry: JobRegistry,
    agents: Vec<Agent>,
    bids: BidBook,
    timers: TimerQueue<Phase>,
    now: Duration,
    events: broadcast::Sender<AuctionEvent>,
    stats: AuctionStats,
}

impl Auctioneer {
    pub fn new(config: AuctionConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            registry: JobRegistry::new(),
            agents: Vec::new(),
            bids: BidBook::new(),
            timers: TimerQueue::new(),
            now: Duration::ZERO,
            events,
            stats: AuctionStats::default(),
        }
    }

    pub fn config(&self) -> &AuctionConfig {
        &self.config
    }

    /// Subscribe to state transitions. Slow receivers lag, they never block the auction.
    pub fn subscribe(&self) -> broadcast::Receiver<AuctionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: AuctionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn transition(&mut self, job: JobId, to: JobStatus) -> Result<()> {
        let from = self.registry.set_status(job, to)?;
        self.emit(AuctionEvent::JobStatusChanged { job, from, to });
        Ok(())
    }

    /// Add a new job in `Available` state. It is picked up on the next tick.
    pub fn publish_job(&mut self, name: impl Into<String>, target: Position) -> JobId {
        let id = self.registry.allocate_id();
        let job = Job::new(id, name.into(), target);
        let name = job.name.clone();
        self.registry.add_job(job);
        self.stats.published += 1;

        tracing::info!(job_id = %id, job = %name, target = %target, "Job published");
        self.emit(AuctionEvent::JobPublished { job: id, name, target });
        id
    }

    /// Attach a rendering marker to a job that is still in the registry.
    pub fn attach_marker(&mut self, job: JobId, marker: MarkerHandle) -> Result<()> {
        let entry = self
            .registry
            .get_mut(job)
            .ok_or(AuctionError::JobNotFound(job))?;
        entry.marker = Some(marker);
        Ok(())
    }

    /// Add an agent to the set that receives announcements.
    pub fn register_agent(&mut self, agent: Agent) -> AgentId {
        let id = AgentId(self.agents.len() as u64);
        tracing::info!(agent_id = %id, agent = %agent.name(), home = %agent.home(), "Agent registered");
        self.agents.push(agent);
        id
    }

    /// Open the bidding window for one job and broadcast it to every agent.
    ///
    /// Returns false, doing nothing, unless the job is `Available`.
    pub fn announce(&mut self, id: JobId) -> bool {
        match self.registry.get(id).map(|j| j.status) {
            Some(JobStatus::Available) => {}
            Some(status) => {
                tracing::trace!(job_id = %id, status = %status, "Skipping announce");
                return false;
            }
            None => return false,
        }

        if let Err(e) = self.transition(id, JobStatus::Bidding) {
            tracing::error!(job_id = %id, error = %e, "Failed to open bidding");
            return false;
        }
        let round = self.bids.open(id);
        self.stats.announced += 1;

        let offers: Vec<(AgentId, f64)> = match self.registry.get(id) {
            Some(job) => {
                tracing::debug!(job_id = %id, job = %job.name, agents = self.agents.len(), "Announcing job");
                self.agents
                    .iter()
                    .enumerate()
                    .filter_map(|(i, agent)| {
                        agent.on_announce(job).map(|cost| (AgentId(i as u64), cost))
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        for (agent, cost) in offers {
            if let Err(e) = self.submit_bid(id, agent, cost) {
                tracing::warn!(job_id = %id, agent_id = %agent, error = %e, "Bid rejected");
            }
        }

        self.timers.after(
            self.now,
            self.config.bidding_window(),
            Phase::Evaluate { job: id, round },
        );
        true
    }

    /// Announce every `Available` job. Returns how many windows were opened.
    pub fn announce_available(&mut self) -> usize {
        self.registry
            .list_available()
            .into_iter()
            .filter(|&id| self.announce(id))
            .count()
    }

    /// Record a bid for a job whose window is open.
    pub fn submit_bid(&mut self, job: JobId, agent: AgentId, cost: f64) -> Result<()> {
        if !(cost.is_finite() && cost > 0.0) {
            return Err(AuctionError::InvalidCost(cost));
        }

        let status = self
            .registry
            .get(job)
            .map(|j| j.status)
            .ok_or(AuctionError::JobNotFound(job))?;
        if status != JobStatus::Bidding || !self.bids.is_open(job) {
            return Err(AuctionError::NotBidding { job, status });
        }

        let bidder = self
            .agents
            .get(agent.0 as usize)
            .ok_or(AuctionError::AgentNotFound(agent))?;
        if !bidder.is_idle() {
            return Err(AuctionError::AgentBusy { agent, job });
        }
        if self.bids.has_bid_from(job, agent) {
            return Err(AuctionError::DuplicateBid { job, agent });
        }

        self.bids.push(Bid::new(job, agent, cost));
        self.stats.bids += 1;
        tracing::debug!(job_id = %job, agent_id = %agent, cost, "Bid received");
        self.emit(AuctionEvent::BidSubmitted { job, agent, cost });
        Ok(())
    }

    fn park(&mut self, job: JobId, delay: Duration) {
        if let Err(e) = self.transition(job, JobStatus::Pending) {
            tracing::error!(job_id = %job, error = %e, "Failed to park job");
            return;
        }
        self.timers.after(self.now, delay, Phase::Requeue(job));
    }

    /// Close the window for `job` and commit the cheapest still-idle bidder.
    pub fn evaluate(&mut self, job: JobId) -> Resolution {
        let bids = self.bids.close(job);
        if self.registry.get(job).map(|j| j.status) != Some(JobStatus::Bidding) {
            return Resolution::Skipped;
        }

        let Some(best) = select_winner(&bids).copied() else {
            tracing::info!(job_id = %job, "No bids, parking job");
            self.stats.no_bid_requeues += 1;
            self.park(job, self.config.no_bid_requeue());
            return Resolution::NoBids;
        };

        let winner_idle = self
            .agents
            .get(best.bidder.0 as usize)
            .is_some_and(Agent::is_idle);
        if !winner_idle {
            tracing::warn!(job_id = %job, agent_id = %best.bidder, "Winner already busy, re-auctioning");
            self.stats.stale_winner_requeues += 1;
            self.park(job, self.config.stale_winner_requeue());
            return Resolution::StaleWinner { agent: best.bidder };
        }

        let Some(mut owned) = self.registry.remove_job(job) else {
            return Resolution::Skipped;
        };
        owned.status = JobStatus::Assigned;

        let award = match self.agents.get_mut(best.bidder.0 as usize) {
            Some(agent) => agent.award(best.bidder, owned),
            None => Err((AuctionError::AgentNotFound(best.bidder), owned)),
        };
        if let Err((e, mut returned)) = award {
            tracing::warn!(job_id = %job, error = %e, "Award rejected, re-auctioning");
            self.emit(AuctionEvent::AwardRejected {
                job,
                agent: best.bidder,
            });
            returned.status = JobStatus::Bidding;
            self.registry.reinsert(returned);
            self.stats.stale_winner_requeues += 1;
            self.park(job, self.config.stale_winner_requeue());
            return Resolution::StaleWinner { agent: best.bidder };
        }
        self.emit(AuctionEvent::JobStatusChanged {
            job,
            from: JobStatus::Bidding,
            to: JobStatus::Assigned,
        });

        self.stats.assigned += 1;
        tracing::info!(job_id = %job, agent_id = %best.bidder, cost = best.cost, bids = bids.len(), "Job awarded");
        self.emit(AuctionEvent::JobAwarded {
            job,
            agent: best.bidder,
            cost: best.cost,
        });

        for bid in bids.iter().filter(|b| b.bidder != best.bidder) {
            if let Some(agent) = self.agents.get(bid.bidder.0 as usize) {
                agent.on_lose(job);
            }
            self.emit(AuctionEvent::BidLost {
                job,
                agent: bid.bidder,
            });
        }

        Resolution::Assigned {
            agent: best.bidder,
            cost: best.cost,
        }
    }

    /// Timer-driven evaluation. Only closes the window it was scheduled for:
    /// if that window was already closed by hand, and maybe replaced by a
    /// newer one, the timer is stale.
    fn evaluate_round(&mut self, job: JobId, round: u64) -> Resolution {
        if self.bids.round(job) != Some(round) {
            tracing::trace!(job_id = %job, round, "Stale evaluation timer");
            return Resolution::Skipped;
        }
        self.evaluate(job)
    }

    /// Return a pending job to `Available`. No-op if it moved on meanwhile.
    pub fn requeue(&mut self, job: JobId) -> bool {
        if self.registry.get(job).map(|j| j.status) != Some(JobStatus::Pending) {
            return false;
        }
        match self.transition(job, JobStatus::Available) {
            Ok(()) => {
                tracing::info!(job_id = %job, "Job available again");
                true
            }
            Err(e) => {
                tracing::error!(job_id = %job, error = %e, "Failed to requeue job");
                false
            }
        }
    }

    /// Fire every delayed phase due at or before `now`, in deadline order.
    pub fn advance(&mut self, now: Duration) -> Vec<Fired> {
        self.now = self.now.max(now);
        let mut fired = Vec::new();
        while let Some((deadline, phase)) = self.timers.pop_due(self.now) {
            tracing::trace!(deadline_ms = deadline.as_millis() as u64, ?phase, "Timer fired");
            fired.push(match phase {
                Phase::Evaluate { job, round } => Fired::Evaluated {
                    job,
                    resolution: self.evaluate_round(job, round),
                },
                Phase::Requeue(job) => Fired::Requeued {
                    job,
                    reopened: self.requeue(job),
                },
            });
        }
        fired
    }

    /// One scheduler turn: fire due phases, then announce what is available.
    pub fn tick(&mut self, now: Duration) -> Vec<Fired> {
        let fired = self.advance(now);
        self.announce_available();
        fired
    }

    /// The movement collaborator reports that `agent` reached its job.
    pub fn complete_job(&mut self, agent: AgentId) -> Result<Job> {
        let job = self
            .agents
            .get_mut(agent.0 as usize)
            .ok_or(AuctionError::AgentNotFound(agent))?
            .complete(agent)?;

        self.stats.completed += 1;
        self.emit(AuctionEvent::JobStatusChanged {
            job: job.id,
            from: JobStatus::Assigned,
            to: JobStatus::Completed,
        });
        self.emit(AuctionEvent::JobCompleted { job: job.id, agent });
        Ok(job)
    }

    /// Send an idle agent back to its home base.
    pub fn return_home(&mut self, agent: AgentId) -> Result<()> {
        self.agents
            .get_mut(agent.0 as usize)
            .ok_or(AuctionError::AgentNotFound(agent))?
            .return_home();
        Ok(())
    }

    /// A job that is still in the registry or held by an agent.
    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.registry.get(id).or_else(|| {
            self.agents
                .iter()
                .filter_map(Agent::assigned_job)
                .find(|j| j.id == id)
        })
    }

    pub fn job_status(&self, id: JobId) -> Option<JobStatus> {
        self.job(id).map(|j| j.status)
    }

    /// The agent currently holding `job`, if any.
    pub fn assignee(&self, job: JobId) -> Option<AgentId> {
        self.agents()
            .find(|(_, a)| a.assigned_job().is_some_and(|j| j.id == job))
            .map(|(id, _)| id)
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id.0 as usize)
    }

    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents
            .iter()
            .enumerate()
            .map(|(i, a)| (AgentId(i as u64), a))
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Bids collected so far for a job whose window is open
    pub fn bids_for(&self, job: JobId) -> &[Bid] {
        self.bids.bids(job)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn stats(&self) -> &AuctionStats {
        &self.stats
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        let mut jobs: Vec<JobView> = self
            .registry
            .jobs()
            .map(|j| JobView {
                id: j.id,
                name: j.name.clone(),
                target: j.target,
                status: j.status,
                assigned_to: None,
            })
            .collect();

        let mut agents = Vec::with_capacity(self.agents.len());
        for (id, agent) in self.agents() {
            if let Some(job) = agent.assigned_job() {
                jobs.push(JobView {
                    id: job.id,
                    name: job.name.clone(),
                    target: job.target,
                    status: job.status,
                    assigned_to: Some(id),
                });
            }
            agents.push(AgentView {
                id,
                name: agent.name().to_string(),
                state: agent.state(),
                position: agent.position(),
                job: agent.assigned_job().map(|j| j.id),
            });
        }
        jobs.sort_by_key(|j| j.id);

        FleetSnapshot {
            now_ms: self.now.as_millis() as u64,
            jobs,
            agents,
            stats: self.stats.clone(),
        }
    }
}
