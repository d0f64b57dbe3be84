use hyperclock_core::{CallContext, Pull, RpcError, Stub, Termination};

/// Summary of one [`watch_time`] session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchReport {
    /// Clock events received.
    pub events: u64,
    /// Secondary increments that succeeded.
    pub increments: u64,
    /// Secondary increments that failed. They never end the watch.
    pub increment_failures: u64,
    /// Counter value returned by the last successful increment.
    pub last_count: Option<i64>,
    pub termination: Termination,
}

/// Subscribes to the clock until `context` fires, bumping the shared counter
/// once per event through the same connection.
///
/// The increments observe `context` too, so a stalled call cannot hold the
/// watch past its deadline. A context that fires before the stream opens
/// yields an empty report ending in [`Termination::Cancelled`].
///
/// # Errors
///
/// Returns the error that prevented the subscription from starting, or the
/// transport error that broke it.
#[tracing::instrument(level = "debug", skip_all)]
pub async fn watch_time(stub: &Stub, context: CallContext) -> Result<WatchReport, RpcError> {
    let counter_stub = stub.with_context(context.clone());
    let mut events = 0;
    let mut increments = 0;
    let mut increment_failures = 0;
    let mut last_count = None;

    let mut subscription = match stub.subscribe(context).await {
        Ok(subscription) => subscription,
        Err(RpcError::Cancelled) => {
            tracing::debug!("Watch cancelled before the subscription opened");
            return Ok(WatchReport {
                events,
                increments,
                increment_failures,
                last_count,
                termination: Termination::Cancelled,
            });
        }
        Err(e) => return Err(e),
    };

    loop {
        match subscription.next().await? {
            Pull::Event(event) => {
                events += 1;
                tracing::info!(id = %event.id, time = ?event.time, "Clock event");

                match counter_stub.increment(1).await {
                    Ok(counter) => {
                        increments += 1;
                        last_count = Some(counter.result);
                        tracing::debug!("Counter is now {}", counter.result);
                    }
                    Err(e) => {
                        increment_failures += 1;
                        tracing::warn!("Increment after clock event failed: {e}");
                    }
                }
            }
            Pull::Done(termination) => {
                tracing::debug!("Watch ended ({termination:?}) after {events} events");
                return Ok(WatchReport {
                    events,
                    increments,
                    increment_failures,
                    last_count,
                    termination,
                });
            }
        }
    }
}
