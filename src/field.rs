use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, AgentId, CostOracle};
use crate::auction::{AuctionEvent, Auctioneer, Fired, FleetSnapshot, Resolution};
use crate::config::{FleetConfig, MAX_TRAVEL};
use crate::error::Result;
use crate::source::JobSource;
use crate::timer::TimerQueue;

#[derive(Debug, Clone, Serialize)]
pub struct FieldReport {
    pub completed: usize,
    pub elapsed_ms: u64,
    pub snapshot: FleetSnapshot,
}

/// Drives an [`Auctioneer`] in real time: spawns jobs, simulates travel to
/// awarded jobs, and reports arrivals.
///
/// Everything runs on the one task that calls [`Field::run`]; timed phases
/// are interleaved, never parallel.
#[derive(Debug)]
pub struct Field {
    config: FleetConfig,
    auctioneer: Auctioneer,
    source: JobSource,
    arrivals: TimerQueue<AgentId>,
    next_spawn: Duration,
    spawned: usize,
    completed: usize,
}

impl Field {
    /// Build the field and register one agent per configured entry, all
    /// sharing `oracle`.
    pub fn new(config: FleetConfig, oracle: Arc<dyn CostOracle>) -> Result<Self> {
        config.validate()?;

        let mut auctioneer = Auctioneer::new(config.auction.clone());
        for spec in &config.agents {
            auctioneer.register_agent(Agent::new(spec.name.clone(), spec.home, oracle.clone()));
        }

        Ok(Self {
            source: JobSource::new(&config.field),
            next_spawn: config.field.spawn_interval(),
            auctioneer,
            config,
            arrivals: TimerQueue::new(),
            spawned: 0,
            completed: 0,
        })
    }

    pub fn auctioneer(&self) -> &Auctioneer {
        &self.auctioneer
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuctionEvent> {
        self.auctioneer.subscribe()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_done(&self) -> bool {
        self.config
            .field
            .max_jobs
            .is_some_and(|max| self.completed >= max)
    }

    fn spawning(&self) -> bool {
        self.config
            .field
            .max_jobs
            .map_or(true, |max| self.spawned < max)
    }

    /// Earliest moment something is due: a spawn, an arrival, or an auction phase.
    pub fn next_wakeup(&self) -> Duration {
        let spawn = self.spawning().then_some(self.next_spawn);
        [
            spawn,
            self.arrivals.next_deadline(),
            self.auctioneer.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or_else(|| self.auctioneer.now() + self.config.field.spawn_interval())
    }

    /// One turn at time `now`. Returns how many jobs were awarded.
    pub fn step(&mut self, now: Duration) -> usize {
        while self.spawning() && self.next_spawn <= now {
            let (name, target) = self.source.next_job();
            self.auctioneer.publish_job(name, target);
            self.spawned += 1;
            self.next_spawn += self.config.field.spawn_interval();
        }

        while let Some((_, agent)) = self.arrivals.pop_due(now) {
            match self.auctioneer.complete_job(agent) {
                Ok(_) => self.completed += 1,
                Err(e) => tracing::warn!(agent_id = %agent, error = %e, "Arrival without a job"),
            }
        }

        let mut awarded = 0;
        for fired in self.auctioneer.tick(now) {
            if let Fired::Evaluated {
                resolution: Resolution::Assigned { agent, cost },
                job,
            } = fired
            {
                let travel = self.config.field.travel_time(cost);
                if travel == MAX_TRAVEL {
                    tracing::warn!(job_id = %job, agent_id = %agent, cost, "Travel time capped");
                }
                tracing::debug!(job_id = %job, agent_id = %agent, travel_ms = travel.as_millis() as u64, "Agent departing");
                self.arrivals.after(now, travel, agent);
                awarded += 1;
            }
        }

        if self.auctioneer.registry().is_empty() {
            let idle: Vec<AgentId> = self
                .auctioneer
                .agents()
                .filter(|(_, a)| a.is_idle() && a.position() != a.home())
                .map(|(id, _)| id)
                .collect();
            for agent in idle {
                if let Err(e) = self.auctioneer.return_home(agent) {
                    tracing::warn!(agent_id = %agent, error = %e, "Failed to send agent home");
                }
            }
        }

        awarded
    }

    /// Run until cancelled or until `max_jobs` jobs have been completed.
    pub async fn run(mut self, cancel: CancellationToken) -> FieldReport {
        let start = Instant::now();
        tracing::info!(
            agents = self.config.agents.len(),
            max_jobs = ?self.config.field.max_jobs,
            "Field simulation started"
        );

        while !self.is_done() {
            let wake = start + self.next_wakeup();
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Field simulation cancelled");
                    break;
                }
                _ = tokio::time::sleep_until(wake) => {}
            }
            self.step(start.elapsed());
        }

        let elapsed = start.elapsed();
        tracing::info!(
            completed = self.completed,
            elapsed_ms = elapsed.as_millis() as u64,
            "Field simulation finished"
        );
        FieldReport {
            completed: self.completed,
            elapsed_ms: elapsed.as_millis() as u64,
            snapshot: self.auctioneer.snapshot(),
        }
    }
}
