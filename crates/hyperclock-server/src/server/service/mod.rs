//! gRPC service implementation and shared server state.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`HyperclockService`) implementing
//!   the `Calculator`, `Counter` and `TimeService` traits.
//! - [`counter`] - the atomically updated shared counter.

pub mod counter;
pub mod handler;
