//! Retry and polling plumbing shared by the wallet and the bootstrap sequencer

pub mod backoff;
pub mod poll;

pub use backoff::{calculate_backoff, Backoff};
pub use poll::{poll_until, PollError};
