//! Concurrency-bounded call harness.
//!
//! [`Harness::run`] dispatches a fixed number of workload invocations with at
//! most `max_concurrency` in flight, under one of two connection policies, and
//! summarises the outcome in a [`RunReport`].

mod limiter;
mod policy;
mod report;
mod runner;

pub use policy::ConnectionPolicy;
pub use report::{LatencySummary, RunReport};
pub use runner::Harness;
