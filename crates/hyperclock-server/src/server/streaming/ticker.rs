use super::coordinator::SubscriptionGuard;
use crate::server::telemetry::increment_ticks_emitted;
use core::time::Duration;
use hyperclock_core::{Error, proto::TimeResult, types::TimeEvent};
use std::time::SystemTime;
use tokio::{
    sync::mpsc,
    time::{MissedTickBehavior, interval, timeout},
};
use tokio_util::sync::CancellationToken;
use tonic::Status;

const SHUTDOWN_NOTICE_TIMEOUT: Duration = Duration::from_millis(250);

/// Wall clock that never goes backwards.
///
/// System time can step back (NTP adjustments, manual changes). Readings are
/// clamped to the latest one handed out, so a subscription's event times are
/// non-decreasing.
#[derive(Debug)]
pub struct TickClock {
    last: SystemTime,
}

impl Default for TickClock {
    fn default() -> Self {
        Self {
            last: SystemTime::UNIX_EPOCH,
        }
    }
}

impl TickClock {
    pub fn now(&mut self) -> SystemTime {
        self.observe(SystemTime::now())
    }

    fn observe(&mut self, reading: SystemTime) -> SystemTime {
        if reading > self.last {
            self.last = reading;
        }
        self.last
    }
}

/// Feeds one subscription with clock events until it ends.
///
/// The first event is sent immediately, then one per `period`. Missed ticks
/// are skipped rather than burst, and a full buffer stalls the ticker.
///
/// # Behavior
///
/// - Returns `Ok` with the number of events sent once the client goes away
///   (the response stream, and with it the receiver, was dropped).
/// - On service shutdown, tries briefly to send `UNAVAILABLE` to the client
///   and returns [`Error::ServiceShutdown`].
///
/// The `guard` is held for the lifetime of the ticker so the subscription
/// counts as in flight until this function returns.
pub async fn feed_ticks(
    resp_tx: mpsc::Sender<Result<TimeResult, Status>>,
    period: Duration,
    shutdown: CancellationToken,
    _guard: SubscriptionGuard,
) -> hyperclock_core::Result<u64> {
    let mut clock = TickClock::default();
    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut emitted = 0_u64;

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            () = resp_tx.closed() => {
                tracing::debug!("Subscriber went away after {emitted} events");
                return Ok(emitted);
            }
            _ = ticks.tick() => {}
        }

        let event = TimeResult::from(TimeEvent::new(clock.now()));
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            sent = resp_tx.send(Ok(event)) => {
                if sent.is_err() {
                    tracing::debug!("Subscriber went away after {emitted} events");
                    return Ok(emitted);
                }
            }
        }

        emitted += 1;
        increment_ticks_emitted(1);
    }

    // Best effort: the client may be gone or not reading. Either way the
    // stream ends when this sender drops.
    let status = resp_tx.send(Err(Error::ServiceShutdown.into()));
    if !matches!(timeout(SHUTDOWN_NOTICE_TIMEOUT, status).await, Ok(Ok(()))) {
        tracing::debug!("Could not deliver shutdown status to subscriber");
    }
    Err(Error::ServiceShutdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::streaming::coordinator::SubscriptionTracker;

    #[test]
    fn clock_never_steps_back() {
        let mut clock = TickClock::default();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);

        assert_eq!(clock.observe(t0), t0);
        assert_eq!(clock.observe(t0 - Duration::from_secs(5)), t0);
        assert_eq!(
            clock.observe(t0 + Duration::from_secs(1)),
            t0 + Duration::from_secs(1)
        );
    }

    #[tokio::test]
    async fn stops_when_the_subscriber_drops() {
        let tracker = SubscriptionTracker::default();
        let (tx, mut rx) = mpsc::channel(4);
        let ticker = tokio::spawn(feed_ticks(
            tx,
            Duration::from_millis(5),
            CancellationToken::new(),
            tracker.track(),
        ));

        for _ in 0..3 {
            assert!(rx.recv().await.unwrap().is_ok());
        }
        drop(rx);

        let emitted = ticker.await.unwrap().unwrap();
        assert!(emitted >= 3);
        assert_eq!(tracker.inflight(), 0);
    }

    #[tokio::test]
    async fn shutdown_ends_the_stream_with_unavailable() {
        let tracker = SubscriptionTracker::default();
        let shutdown = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(4);
        let ticker = tokio::spawn(feed_ticks(
            tx,
            Duration::from_secs(3600),
            shutdown.clone(),
            tracker.track(),
        ));

        // First tick is immediate.
        assert!(rx.recv().await.unwrap().is_ok());
        shutdown.cancel();

        let status = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unavailable);
        assert!(rx.recv().await.is_none());
        assert!(matches!(
            ticker.await.unwrap(),
            Err(Error::ServiceShutdown)
        ));
        assert_eq!(tracker.inflight(), 0);
    }
}
