pub mod agent;
pub mod auction;
pub mod config;
pub mod error;
pub mod field;
pub mod geometry;
pub mod shutdown;
pub mod source;
pub mod timer;
