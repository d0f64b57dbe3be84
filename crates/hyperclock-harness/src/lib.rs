#![doc = include_str!("../README.md")]

pub mod config;
mod error;
pub mod harness;
pub mod telemetry;
mod watch;
mod workload;

pub use error::HarnessError;
pub use harness::{ConnectionPolicy, Harness, LatencySummary, RunReport};
pub use watch::{WatchReport, watch_time};
pub use workload::Workload;
