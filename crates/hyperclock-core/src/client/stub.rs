use super::{connection::Connection, context::CallContext, subscription::Subscription};
use crate::{
    RpcError,
    proto::{
        GetTimeRequest, IncrementRequest, IncrementResult, MultiplyRequest, MultiplyResult,
        SubscribeRequest, calculator_client::CalculatorClient, counter_client::CounterClient,
        time_service_client::TimeServiceClient,
    },
    types::TimeEvent,
};
use core::future::Future;
use tonic::{Request, transport::Channel};

/// Typed proxy for every hyperclock operation, bound to one [`Connection`].
///
/// Stubs hold no per-call state: cloning one, or binding many to the same
/// connection, is cheap and all of them may issue calls concurrently.
#[derive(Clone, Debug)]
pub struct Stub {
    connection: Connection,
    context: CallContext,
}

// Builds a generated client on the stub's channel with the connection's
// compression applied.
macro_rules! client {
    ($stub:expr, $client:ident) => {{
        let mut client = $client::new($stub.channel()?);
        if let Some(encoding) = $stub.connection.options().compression {
            client = client.send_compressed(encoding).accept_compressed(encoding);
        }
        client
    }};
}

impl Stub {
    pub(crate) fn new(connection: Connection) -> Self {
        Self {
            connection,
            context: CallContext::new(),
        }
    }

    /// Returns a stub whose unary calls also stop with
    /// [`RpcError::Cancelled`] once `context` fires.
    pub fn with_context(&self, context: CallContext) -> Self {
        Self {
            connection: self.connection.clone(),
            context,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn multiply(&self, x: i64, y: i64) -> Result<MultiplyResult, RpcError> {
        let mut client = client!(self, CalculatorClient);
        let request = self.unary_request(MultiplyRequest { x, y });

        self.call(async move { Ok(client.multiply(request).await?.into_inner()) })
            .await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_time(&self) -> Result<TimeEvent, RpcError> {
        let mut client = client!(self, CalculatorClient);
        let request = self.unary_request(GetTimeRequest {});

        self.call(async move { TimeEvent::try_from(client.get_time(request).await?.into_inner()) })
            .await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn increment(&self, delta: i64) -> Result<IncrementResult, RpcError> {
        let mut client = client!(self, CounterClient);
        let request = self.unary_request(IncrementRequest { inc: delta });

        self.call(async move { Ok(client.increment(request).await?.into_inner()) })
            .await
    }

    /// Opens a server-push subscription of clock events that lasts until
    /// `context` fires, the subscription is cancelled, or the transport fails.
    ///
    /// The subscription owns a child of `context`, so cancelling the
    /// subscription never cancels the caller's context.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn subscribe(&self, context: CallContext) -> Result<Subscription, RpcError> {
        let mut client = client!(self, TimeServiceClient);
        // No call timeout here: the stream is meant to outlive any unary
        // deadline and is bounded by `context` instead.
        let request = Request::new(SubscribeRequest {});

        let stream = context
            .run(async move { Ok(client.subscribe(request).await?.into_inner()) })
            .await?;

        Ok(Subscription::new(stream, context.child()))
    }

    fn channel(&self) -> Result<Channel, RpcError> {
        if self.context.is_cancelled() {
            return Err(RpcError::Cancelled);
        }
        self.connection.channel()
    }

    // The deadline travels to the server as `grpc-timeout` and is enforced
    // locally as well, so a stalled peer still yields `Timeout`.
    async fn call<T, F>(&self, call: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        match self.connection.options().call_timeout {
            Some(timeout) => {
                let context = &self.context;
                context
                    .run(async move {
                        match tokio::time::timeout(timeout, call).await {
                            // tonic reports its own expired `grpc-timeout` as
                            // CANCELLED; only a fired context is a cancellation.
                            Ok(Err(RpcError::Cancelled)) if !context.is_cancelled() => {
                                Err(RpcError::Timeout)
                            }
                            Ok(result) => result,
                            Err(_) => Err(RpcError::Timeout),
                        }
                    })
                    .await
            }
            None => self.context.run(call).await,
        }
    }

    fn unary_request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(timeout) = self.connection.options().call_timeout {
            request.set_timeout(timeout);
        }
        request
    }
}
