//! gRPC service implementation for the calculator, counter and clock.
//!
//! [`HyperclockService`] implements all three services of the protobuf
//! contract over one shared state: the configuration, the
//! [`SharedCounter`], the subscription tracker and the shutdown token.
//! Cloning the service is cheap and every clone serves the same state, which
//! is how tonic hands it to concurrent requests.
//!
//! ## Responsibilities
//!
//! - Answer the pure unary calls (`Multiply`, `GetTime`).
//! - Serialise concurrent `Increment` calls through the shared counter.
//! - Start one ticker per `Subscribe` call via [`start_subscription`].
//! - Refuse new work and drain subscriptions on graceful shutdown.

use super::counter::SharedCounter;
use crate::server::{
    config::ServerConfig,
    streaming::coordinator::{SubscriptionTracker, start_subscription},
    telemetry::{increment_counter_updates, increment_requests},
};
use core::{pin::Pin, time::Duration};
use hyperclock_core::{
    Error,
    proto::{
        GetTimeRequest, IncrementRequest, IncrementResult, MultiplyRequest, MultiplyResult,
        SubscribeRequest, TimeResult, calculator_server::Calculator, counter_server::Counter,
        time_service_server::TimeService,
    },
    types::TimeEvent,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

#[derive(Clone)]
pub struct HyperclockService {
    config: ServerConfig,
    counter: Arc<SharedCounter>,
    subscriptions: SubscriptionTracker,
    accepting: Arc<AtomicBool>,
    shutdown_token: CancellationToken,
}

impl HyperclockService {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            counter: Arc::new(SharedCounter::new(config.initial_counter)),
            config,
            subscriptions: SubscriptionTracker::default(),
            accepting: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Current value of the shared counter.
    pub fn counter_value(&self) -> i64 {
        self.counter.value()
    }

    /// Number of subscriptions whose ticker is still running.
    pub fn subscriptions_inflight(&self) -> usize {
        self.subscriptions.inflight()
    }

    /// Gracefully shuts the service down.
    ///
    /// 1. New calls are refused with `UNAVAILABLE`.
    /// 2. Open subscriptions get up to `shutdown_timeout` to end on their own.
    /// 3. Remaining tickers are cancelled; each sends `UNAVAILABLE` to its
    ///    client.
    /// 4. Waits (up to 3 seconds) for the cancelled tickers to finish.
    pub async fn shutdown(&self) -> Result<(), Error> {
        tracing::info!("Refusing new requests");
        self.accepting.store(false, Ordering::Release);

        tracing::info!(
            "Draining in-flight subscriptions ({} active)",
            self.subscriptions.inflight()
        );
        if self.subscriptions.drain(self.config.shutdown_timeout).await {
            tracing::debug!("All in-flight subscriptions drained");
        } else {
            tracing::warn!(
                "Graceful drain timed out ({} subscriptions still active)",
                self.subscriptions.inflight()
            );
        }

        tracing::debug!("Cancelling remaining subscriptions via shutdown token");
        self.shutdown_token.cancel();

        if !self.subscriptions.drain(Duration::from_secs(3)).await {
            tracing::warn!(
                "{} subscriptions did not acknowledge shutdown",
                self.subscriptions.inflight()
            );
            return Err(Error::ChannelError {
                context: "subscriptions did not stop after cancellation".to_string(),
            });
        }

        tracing::info!("Service shutdown complete");
        Ok(())
    }

    fn ensure_accepting(&self) -> Result<(), Status> {
        if self.accepting.load(Ordering::Acquire) && !self.shutdown_token.is_cancelled() {
            Ok(())
        } else {
            Err(Error::ServiceShutdown.into())
        }
    }
}

#[tonic::async_trait]
impl Calculator for HyperclockService {
    #[tracing::instrument(skip_all, fields(x = req.get_ref().x, y = req.get_ref().y))]
    async fn multiply(
        &self,
        req: Request<MultiplyRequest>,
    ) -> Result<Response<MultiplyResult>, Status> {
        self.ensure_accepting()?;
        increment_requests();

        let MultiplyRequest { x, y } = req.into_inner();
        let result = x.checked_mul(y).ok_or_else(|| Error::Overflow {
            context: format!("{x} * {y} does not fit in 64 bits"),
        })?;

        Ok(Response::new(MultiplyResult { result }))
    }

    #[tracing::instrument(skip_all)]
    async fn get_time(
        &self,
        _req: Request<GetTimeRequest>,
    ) -> Result<Response<TimeResult>, Status> {
        self.ensure_accepting()?;
        increment_requests();

        Ok(Response::new(TimeEvent::new(SystemTime::now()).into()))
    }
}

#[tonic::async_trait]
impl Counter for HyperclockService {
    #[tracing::instrument(skip_all, fields(inc = req.get_ref().inc))]
    async fn increment(
        &self,
        req: Request<IncrementRequest>,
    ) -> Result<Response<IncrementResult>, Status> {
        self.ensure_accepting()?;
        increment_requests();

        let result = self.counter.increment(req.get_ref().inc)?;
        increment_counter_updates();
        tracing::debug!("Counter is now {result}");

        Ok(Response::new(IncrementResult { result }))
    }
}

#[tonic::async_trait]
impl TimeService for HyperclockService {
    type SubscribeStream = Pin<Box<dyn Stream<Item = Result<TimeResult, Status>> + Send>>;

    /// Starts an open-ended clock subscription.
    ///
    /// One event is pushed immediately and then one per configured tick
    /// interval until the client cancels or the service shuts down.
    #[tracing::instrument(skip_all)]
    async fn subscribe(
        &self,
        _req: Request<SubscribeRequest>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        self.ensure_accepting()?;
        increment_requests();

        let stream = start_subscription(
            &self.subscriptions,
            self.config.tick_interval,
            self.config.stream_buffer_size,
            self.shutdown_token.child_token(),
        );

        Ok(Response::new(Box::pin(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;
    use tonic::Code;

    fn service() -> HyperclockService {
        HyperclockService::new(ServerConfig {
            tick_interval: Duration::from_millis(5),
            shutdown_timeout: Duration::from_millis(50),
            ..ServerConfig::default()
        })
    }

    #[tokio::test]
    async fn multiplies() {
        let svc = service();
        let resp = svc
            .multiply(Request::new(MultiplyRequest { x: 12, y: 4 }))
            .await
            .unwrap();
        assert_eq!(resp.into_inner().result, 48);
    }

    #[tokio::test]
    async fn multiply_overflow_is_out_of_range() {
        let svc = service();
        let status = svc
            .multiply(Request::new(MultiplyRequest {
                x: i64::MAX,
                y: 2,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::OutOfRange);
    }

    #[tokio::test]
    async fn get_time_returns_a_fresh_event() {
        let svc = service();
        let a = svc.get_time(Request::new(GetTimeRequest {})).await.unwrap();
        let b = svc.get_time(Request::new(GetTimeRequest {})).await.unwrap();
        let (a, b) = (a.into_inner(), b.into_inner());
        assert_ne!(a.id, b.id);
        assert!(a.time.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_increments_through_the_handler() {
        let svc = HyperclockService::new(ServerConfig {
            initial_counter: 1_000,
            ..ServerConfig::default()
        });

        let tasks: Vec<_> = (0..500)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move {
                    svc.increment(Request::new(IncrementRequest { inc: 1 }))
                        .await
                        .map(|r| r.into_inner().result)
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(svc.counter_value(), 1_500);
    }

    #[tokio::test]
    async fn shutdown_ends_subscriptions_and_refuses_new_calls() {
        let svc = service();
        let mut stream = svc
            .subscribe(Request::new(SubscribeRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert!(stream.next().await.unwrap().is_ok());
        assert_eq!(svc.subscriptions_inflight(), 1);

        let shutdown = tokio::spawn({
            let svc = svc.clone();
            async move { svc.shutdown().await }
        });

        // Drain events until the shutdown status arrives.
        let status = loop {
            match stream.next().await {
                Some(Ok(_)) => continue,
                Some(Err(status)) => break status,
                None => panic!("stream ended without a status"),
            }
        };
        assert_eq!(status.code(), Code::Unavailable);

        shutdown.await.unwrap().unwrap();
        assert_eq!(svc.subscriptions_inflight(), 0);

        let refused = svc
            .increment(Request::new(IncrementRequest { inc: 1 }))
            .await
            .unwrap_err();
        assert_eq!(refused.code(), Code::Unavailable);
    }
}
