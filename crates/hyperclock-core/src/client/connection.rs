use super::stub::Stub;
use crate::{ConnectionError, RpcError};
use core::time::Duration;
use parking_lot::RwLock;
use std::{error::Error as StdError, sync::Arc};
use tonic::{
    Code,
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};

/// Tunables fixed when a [`Connection`] is opened.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionOptions {
    /// Upper bound on establishing TCP and the HTTP/2 handshake.
    pub connect_timeout: Duration,
    /// Deadline applied to every unary call. Exceeding it yields
    /// [`RpcError::Timeout`]. Subscriptions are never subject to it.
    pub call_timeout: Option<Duration>,
    /// Compression used for both requests and responses.
    pub compression: Option<CompressionEncoding>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            call_timeout: None,
            compression: None,
        }
    }
}

/// A long-lived handle to one remote endpoint.
///
/// Internally this is a single HTTP/2 connection that multiplexes every call
/// issued through it, so clones and the stubs bound to it can be used from any
/// number of tasks at once without further locking.
///
/// The transport is released when [`Connection::close`] is called or when the
/// last clone (including those held by stubs) is dropped.
#[derive(Clone, Debug)]
pub struct Connection {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    address: String,
    options: ConnectionOptions,
    // `None` once closed.
    channel: RwLock<Option<Channel>>,
}

impl Connection {
    /// Opens a connection with default options.
    pub async fn open(address: &str) -> Result<Self, ConnectionError> {
        Self::open_with(address, ConnectionOptions::default()).await
    }

    /// Opens a connection, completing the transport handshake before
    /// returning.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::InvalidAddress`] if `address` is not a valid
    ///   `host:port` or `http(s)://` URI.
    /// - [`ConnectionError::Unreachable`] if the endpoint refuses, the connect
    ///   timeout elapses, or the handshake fails.
    #[tracing::instrument(level = "debug", skip(options))]
    pub async fn open_with(
        address: &str,
        options: ConnectionOptions,
    ) -> Result<Self, ConnectionError> {
        let uri = endpoint_uri(address);
        let endpoint = Endpoint::from_shared(uri)
            .map_err(|e| ConnectionError::InvalidAddress {
                address: address.to_string(),
                reason: describe(&e),
            })?
            .connect_timeout(options.connect_timeout)
            .tcp_nodelay(true);

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ConnectionError::Unreachable {
                address: address.to_string(),
                reason: describe(&e),
            })?;

        tracing::debug!("Connected to {address}");

        Ok(Self {
            inner: Arc::new(Inner {
                address: address.to_string(),
                options,
                channel: RwLock::new(Some(channel)),
            }),
        })
    }

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.inner.options
    }

    pub fn is_closed(&self) -> bool {
        self.inner.channel.read().is_none()
    }

    /// Binds a new [`Stub`] to this connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] if the connection was closed.
    pub fn stub(&self) -> Result<Stub, ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed {
                address: self.inner.address.clone(),
            });
        }
        Ok(Stub::new(self.clone()))
    }

    /// Releases the transport. Calls already in flight run to completion;
    /// later calls through any stub bound here fail with `UNAVAILABLE`.
    pub fn close(&self) {
        if self.inner.channel.write().take().is_some() {
            tracing::debug!("Closed connection to {}", self.inner.address);
        }
    }

    pub(crate) fn channel(&self) -> Result<Channel, RpcError> {
        self.inner.channel.read().clone().ok_or_else(|| {
            RpcError::transport(
                Code::Unavailable,
                format!("connection to `{}` is closed", self.inner.address),
            )
        })
    }
}

fn endpoint_uri(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

// tonic's transport errors only say "transport error" at the top level; the
// useful part lives in the source chain.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_addresses_get_an_http_scheme() {
        assert_eq!(endpoint_uri("127.0.0.1:10042"), "http://127.0.0.1:10042");
        assert_eq!(endpoint_uri("http://localhost:1"), "http://localhost:1");
        assert_eq!(endpoint_uri("https://example.com"), "https://example.com");
    }

    #[tokio::test]
    async fn rejects_unparsable_addresses() {
        let err = Connection::open("not an address").await.unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn reports_unreachable_endpoints() {
        // Bind then drop to get a port nobody is listening on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let options = ConnectionOptions {
            connect_timeout: Duration::from_secs(2),
            ..ConnectionOptions::default()
        };
        let err = Connection::open_with(&address, options).await.unwrap_err();
        match err {
            ConnectionError::Unreachable { address: a, .. } => assert_eq!(a, address),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
