use core::fmt;
use hyperclock_core::{RpcError, Stub};

/// The operations the harness binary can drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Workload {
    GetTime,
    Multiply { x: i64, y: i64 },
    Increment { delta: i64 },
}

impl Workload {
    /// Issues this workload's call once through `stub`.
    pub async fn execute(self, stub: Stub) -> Result<(), RpcError> {
        match self {
            Workload::GetTime => {
                let event = stub.get_time().await?;
                tracing::trace!(id = %event.id, time = ?event.time, "get_time");
            }
            Workload::Multiply { x, y } => {
                let product = stub.multiply(x, y).await?;
                tracing::trace!("{x} * {y} = {}", product.result);
            }
            Workload::Increment { delta } => {
                let counter = stub.increment(delta).await?;
                tracing::trace!("counter = {}", counter.result);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Workload::GetTime => write!(f, "get_time"),
            Workload::Multiply { x, y } => write!(f, "multiply({x}, {y})"),
            Workload::Increment { delta } => write!(f, "increment({delta})"),
        }
    }
}
