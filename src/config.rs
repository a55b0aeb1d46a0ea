use std::time::Duration;

use crate::error::{AuctionError, Result};
use crate::geometry::Position;

/// Timing of the auction protocol.
///
/// The stale-winner requeue must be shorter than the no-bid requeue: a lost
/// race is retried quickly, a job nobody wants waits longer.
#[derive(Debug, Clone)]
pub struct AuctionConfig {
    /// Bidding window between announcement and evaluation
    pub bidding_window_ms: u64,
    /// Requeue delay after an auction closed with zero bids
    pub no_bid_requeue_ms: u64,
    /// Requeue delay after the winner turned out to be busy at commit time
    pub stale_winner_requeue_ms: u64,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            bidding_window_ms: 100,
            no_bid_requeue_ms: 1000,
            stale_winner_requeue_ms: 250,
            event_capacity: 256,
        }
    }
}

impl AuctionConfig {
    pub fn bidding_window(&self) -> Duration {
        Duration::from_millis(self.bidding_window_ms)
    }

    pub fn no_bid_requeue(&self) -> Duration {
        Duration::from_millis(self.no_bid_requeue_ms)
    }

    pub fn stale_winner_requeue(&self) -> Duration {
        Duration::from_millis(self.stale_winner_requeue_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bidding_window_ms == 0 {
            return Err(AuctionError::Config(
                "bidding window must be greater than zero".to_string(),
            ));
        }
        if self.stale_winner_requeue_ms >= self.no_bid_requeue_ms {
            return Err(AuctionError::Config(format!(
                "stale-winner requeue ({}ms) must be shorter than no-bid requeue ({}ms)",
                self.stale_winner_requeue_ms, self.no_bid_requeue_ms
            )));
        }
        if self.event_capacity == 0 {
            return Err(AuctionError::Config(
                "event capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Longest trip the field driver will schedule. Longer estimates are clamped.
pub const MAX_TRAVEL: Duration = Duration::from_secs(3600);

/// Operating area and job source settings for the field driver.
#[derive(Debug, Clone)]
pub struct FieldConfig {
    /// Jobs spawn within [-half_extent_x, half_extent_x] on x
    pub half_extent_x: f64,
    /// Jobs spawn within [-half_extent_z, half_extent_z] on z
    pub half_extent_z: f64,
    pub spawn_interval_ms: u64,
    /// Travel speed in units per second, used to time arrivals
    pub agent_speed: f64,
    /// Stop after this many completed jobs. Runs until cancelled when unset.
    pub max_jobs: Option<usize>,
    /// Seed for the job source. Uses OS entropy when unset.
    pub seed: Option<u64>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            half_extent_x: 14.5,
            half_extent_z: 14.5,
            spawn_interval_ms: 500,
            agent_speed: 3.5,
            max_jobs: None,
            seed: None,
        }
    }
}

impl FieldConfig {
    pub fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_interval_ms)
    }

    /// Time to cover `cost` distance units at `agent_speed`, capped at [`MAX_TRAVEL`].
    pub fn travel_time(&self, cost: f64) -> Duration {
        Duration::try_from_secs_f64(cost / self.agent_speed)
            .map_or(MAX_TRAVEL, |t| t.min(MAX_TRAVEL))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.half_extent_x > 0.0 && self.half_extent_z > 0.0) {
            return Err(AuctionError::Config(
                "field extents must be positive".to_string(),
            ));
        }
        if self.spawn_interval_ms == 0 {
            return Err(AuctionError::Config(
                "spawn interval must be greater than zero".to_string(),
            ));
        }
        if !(self.agent_speed.is_finite() && self.agent_speed > 0.0) {
            return Err(AuctionError::Config(format!(
                "agent speed must be positive, got {}",
                self.agent_speed
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub name: String,
    pub home: Position,
}

#[derive(Debug, Clone, Default)]
pub struct FleetConfig {
    pub auction: AuctionConfig,
    pub field: FieldConfig,
    pub agents: Vec<AgentSpec>,
}

impl FleetConfig {
    pub fn new(auction: AuctionConfig, field: FieldConfig) -> Self {
        Self {
            auction,
            field,
            agents: Vec::new(),
        }
    }

    pub fn with_agent(mut self, name: String, home: Position) -> Self {
        self.agents.push(AgentSpec { name, home });
        self
    }

    /// Add `count` agents with homes spread evenly along the southern edge.
    pub fn with_agents(mut self, count: usize) -> Self {
        let width = 2.0 * self.field.half_extent_x;
        for i in 0..count {
            let x = -self.field.half_extent_x + width * (i as f64 + 0.5) / count as f64;
            let home = Position::new(x, 0.0, -self.field.half_extent_z);
            self.agents.push(AgentSpec {
                name: format!("Tractor-{}", self.agents.len() + 1),
                home,
            });
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.auction.validate()?;
        self.field.validate()?;
        if self.agents.is_empty() {
            return Err(AuctionError::Config("fleet has no agents".to_string()));
        }
        Ok(())
    }
}
