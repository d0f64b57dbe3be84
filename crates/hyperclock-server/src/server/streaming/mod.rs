//! Server side of the clock subscription.
//!
//! - [`coordinator`] - starts one ticker task per subscription, tracks which
//!   are in flight, and drains them on shutdown.
//! - [`ticker`] - the per-subscription event loop and its monotonic clock.

pub mod coordinator;
pub mod ticker;
