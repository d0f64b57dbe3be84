use super::ticker::feed_ticks;
use crate::server::telemetry::{
    decrement_subscriptions_inflight, increment_subscription_errors,
    increment_subscriptions_inflight, record_subscription_duration,
};
use core::time::Duration;
use hyperclock_core::proto::TimeResult;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};
use tokio::{sync::mpsc, time::sleep};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::Instrument;

/// Counts subscriptions whose ticker task is still running.
///
/// The count drives the shutdown drain: the service waits for it to reach
/// zero before and after cancelling the remaining tickers.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionTracker {
    inflight: Arc<AtomicUsize>,
}

impl SubscriptionTracker {
    /// Registers a new subscription. It stays in flight until the returned
    /// guard drops.
    pub fn track(&self) -> SubscriptionGuard {
        self.inflight.fetch_add(1, Ordering::AcqRel);
        increment_subscriptions_inflight();
        SubscriptionGuard {
            inflight: Arc::clone(&self.inflight),
            started: Instant::now(),
        }
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// Waits until no subscription is in flight, for at most `timeout`.
    /// Returns whether the drain completed.
    pub async fn drain(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.inflight() > 0 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }
}

/// Marks one subscription as in flight; dropping it ends the subscription's
/// accounting on every exit path of its ticker.
#[derive(Debug)]
pub struct SubscriptionGuard {
    inflight: Arc<AtomicUsize>,
    started: Instant,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_subscriptions_inflight();
        record_subscription_duration(self.started.elapsed().as_millis() as f64);
    }
}

/// Starts the ticker for one subscription and returns the stream that backs
/// the gRPC response.
///
/// The ticker runs on its own task and stops once the response stream is
/// dropped (client cancelled or disconnected) or `shutdown` fires.
pub fn start_subscription(
    tracker: &SubscriptionTracker,
    period: Duration,
    buffer_size: usize,
    shutdown: CancellationToken,
) -> ReceiverStream<Result<TimeResult, Status>> {
    let (resp_tx, resp_rx) = mpsc::channel(buffer_size);
    let guard = tracker.track();

    let fut = async move {
        match feed_ticks(resp_tx, period, shutdown, guard).await {
            Ok(emitted) => {
                tracing::debug!("Subscription closed by client after {emitted} events");
            }
            Err(e) => {
                increment_subscription_errors();
                tracing::debug!("Subscription ended: {e}");
            }
        }
    };

    tokio::spawn(fut.instrument(tracing::info_span!("subscription")));

    ReceiverStream::new(resp_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn drain_waits_for_guards() {
        let tracker = SubscriptionTracker::default();
        let guard = tracker.track();
        assert_eq!(tracker.inflight(), 1);
        assert!(!tracker.drain(Duration::from_millis(30)).await);

        drop(guard);
        assert!(tracker.drain(Duration::from_millis(30)).await);
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_the_ticker() {
        let tracker = SubscriptionTracker::default();
        let mut stream = start_subscription(
            &tracker,
            Duration::from_millis(5),
            2,
            CancellationToken::new(),
        );

        let mut last = None;
        for _ in 0..3 {
            let event = stream.next().await.unwrap().unwrap();
            let time = event.time.unwrap();
            if let Some((secs, nanos)) = last {
                assert!((time.seconds, time.nanos) >= (secs, nanos));
            }
            last = Some((time.seconds, time.nanos));
        }
        assert_eq!(tracker.inflight(), 1);

        drop(stream);
        assert!(tracker.drain(Duration::from_secs(1)).await);
    }
}
