use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::auction::job::JobId;

/// One agent's offer for one job during one bidding window. Lower cost wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub job: JobId,
    pub bidder: AgentId,
    pub cost: f64,
}

impl Bid {
    pub fn new(job: JobId, bidder: AgentId, cost: f64) -> Self {
        Self { job, bidder, cost }
    }
}

/// Pick the cheapest bid. On equal cost the earliest arrival wins.
pub fn select_winner(bids: &[Bid]) -> Option<&Bid> {
    bids.iter().fold(None, |best: Option<&Bid>, bid| match best {
        Some(b) if b.cost <= bid.cost => Some(b),
        _ => Some(bid),
    })
}

/// Bids collected during one bidding window.
#[derive(Debug, Default)]
struct Window {
    round: u64,
    bids: Vec<Bid>,
}

/// Bids collected per job, in arrival order, while the job's window is open.
///
/// Every window gets a round number that is unique across the book, so a
/// delayed evaluation can tell whether the window it was scheduled for is
/// still the one that is open.
#[derive(Debug, Default)]
pub struct BidBook {
    open: HashMap<JobId, Window>,
    next_round: u64,
}

impl BidBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh window for `job`, discarding any bids from an earlier
    /// one. Returns the new window's round.
    pub fn open(&mut self, job: JobId) -> u64 {
        self.next_round += 1;
        let round = self.next_round;
        self.open.insert(
            job,
            Window {
                round,
                bids: Vec::new(),
            },
        );
        round
    }

    pub fn is_open(&self, job: JobId) -> bool {
        self.open.contains_key(&job)
    }

    /// Round of the window currently open for `job`.
    pub fn round(&self, job: JobId) -> Option<u64> {
        self.open.get(&job).map(|w| w.round)
    }

    pub fn has_bid_from(&self, job: JobId, bidder: AgentId) -> bool {
        self.open
            .get(&job)
            .is_some_and(|w| w.bids.iter().any(|b| b.bidder == bidder))
    }

    /// Append a bid. Returns false when no window is open for the job.
    pub fn push(&mut self, bid: Bid) -> bool {
        match self.open.get_mut(&bid.job) {
            Some(window) => {
                window.bids.push(bid);
                true
            }
            None => false,
        }
    }

    pub fn bids(&self, job: JobId) -> &[Bid] {
        self.open
            .get(&job)
            .map(|w| w.bids.as_slice())
            .unwrap_or(&[])
    }

    /// Close the window for `job` and hand back what was collected.
    pub fn close(&mut self, job: JobId) -> Vec<Bid> {
        self.open.remove(&job).map(|w| w.bids).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(agent: u64, cost: f64) -> Bid {
        Bid::new(JobId(1), AgentId(agent), cost)
    }

    #[test]
    fn winner_is_cheapest() {
        let bids = vec![bid(1, 7.0), bid(2, 3.0), bid(3, 5.0)];
        assert_eq!(select_winner(&bids).map(|b| b.bidder), Some(AgentId(2)));
    }

    #[test]
    fn tie_goes_to_first_arrival() {
        let bids = vec![bid(1, 4.0), bid(2, 2.0), bid(3, 2.0), bid(4, 2.0)];
        assert_eq!(select_winner(&bids).map(|b| b.bidder), Some(AgentId(2)));
    }

    #[test]
    fn no_bids_no_winner() {
        assert!(select_winner(&[]).is_none());
    }

    #[test]
    fn push_requires_open_window() {
        let mut book = BidBook::new();
        assert!(!book.push(bid(1, 1.0)));
        book.open(JobId(1));
        assert!(book.push(bid(1, 1.0)));
        assert!(book.has_bid_from(JobId(1), AgentId(1)));
        assert!(!book.has_bid_from(JobId(1), AgentId(2)));
        assert_eq!(book.bids(JobId(1)).len(), 1);
    }

    #[test]
    fn reopen_clears_previous_bids() {
        let mut book = BidBook::new();
        let first = book.open(JobId(1));
        book.push(bid(1, 1.0));
        let second = book.open(JobId(1));
        assert!(book.bids(JobId(1)).is_empty());
        assert_ne!(first, second);
        assert_eq!(book.round(JobId(1)), Some(second));
    }

    #[test]
    fn rounds_are_unique_across_jobs() {
        let mut book = BidBook::new();
        let a = book.open(JobId(1));
        let b = book.open(JobId(2));
        book.close(JobId(1));
        let c = book.open(JobId(1));
        assert!(a < b && b < c);
        assert_eq!(book.round(JobId(2)), Some(b));
        book.close(JobId(2));
        assert_eq!(book.round(JobId(2)), None);
    }

    #[test]
    fn close_returns_bids_in_arrival_order() {
        let mut book = BidBook::new();
        book.open(JobId(1));
        book.push(bid(3, 9.0));
        book.push(bid(1, 2.0));
        let closed = book.close(JobId(1));
        assert_eq!(
            closed.iter().map(|b| b.bidder).collect::<Vec<_>>(),
            vec![AgentId(3), AgentId(1)]
        );
        assert!(!book.is_open(JobId(1)));
        assert!(book.close(JobId(1)).is_empty());
    }
}
