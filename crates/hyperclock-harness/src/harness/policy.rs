use core::fmt;
use hyperclock_core::{Connection, ConnectionError, ConnectionOptions, Stub};
use std::sync::Arc;

/// How invocations of one run obtain their connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionPolicy {
    /// Every invocation opens its own connection and closes it when done.
    PerCall,
    /// One connection is opened up front and multiplexes every invocation.
    Shared,
}

impl fmt::Display for ConnectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPolicy::PerCall => write!(f, "per-call"),
            ConnectionPolicy::Shared => write!(f, "shared"),
        }
    }
}

/// Where an invocation gets its [`Stub`] from.
#[derive(Clone, Debug)]
pub(crate) enum StubSource {
    PerCall {
        address: Arc<str>,
        options: ConnectionOptions,
    },
    Shared(Stub),
}

impl StubSource {
    /// Acquires a stub for one invocation. Under `PerCall` this opens a fresh
    /// connection owned by the lease.
    pub(crate) async fn lease(&self) -> Result<Lease, ConnectionError> {
        match self {
            StubSource::PerCall { address, options } => {
                let connection = Connection::open_with(address, *options).await?;
                let stub = connection.stub()?;
                Ok(Lease {
                    stub,
                    owned: Some(connection),
                })
            }
            StubSource::Shared(stub) => Ok(Lease {
                stub: stub.clone(),
                owned: None,
            }),
        }
    }
}

/// A stub scoped to one invocation. A connection opened for the lease is
/// closed when the lease drops, whether the invocation succeeded, failed or
/// panicked.
#[derive(Debug)]
pub(crate) struct Lease {
    stub: Stub,
    owned: Option<Connection>,
}

impl Lease {
    pub(crate) fn stub(&self) -> Stub {
        self.stub.clone()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(connection) = self.owned.take() {
            connection.close();
        }
    }
}
