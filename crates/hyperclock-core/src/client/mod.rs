//! Client plumbing: connections, stubs, cancellation and subscriptions.

mod connection;
mod context;
mod stub;
mod subscription;

pub use connection::{Connection, ConnectionOptions};
pub use context::CallContext;
pub use stub::Stub;
pub use subscription::{Pull, Subscription, Termination};
