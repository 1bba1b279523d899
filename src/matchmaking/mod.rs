//! Matchmaking queue engine

pub mod queue;

pub use queue::{QueueError, QueueManager, Ticket};
