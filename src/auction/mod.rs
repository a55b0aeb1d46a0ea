pub mod auctioneer;
pub mod bid;
pub mod event;
pub mod job;
pub mod registry;

pub use auctioneer::{AuctionStats, Auctioneer, FleetSnapshot, Fired, Phase, Resolution};
pub use bid::{Bid, BidBook};
pub use event::AuctionEvent;
pub use job::{Job, JobId, JobStatus, MarkerHandle};
pub use registry::JobRegistry;
