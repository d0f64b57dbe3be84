use super::{
    limiter::ConcurrencyLimiter,
    policy::{ConnectionPolicy, StubSource},
    report::{LatencySummary, RunReport},
};
use crate::HarnessError;
use core::{future::Future, time::Duration};
use futures::stream::{FuturesUnordered, StreamExt};
use hyperclock_core::{ClientError, Connection, ConnectionOptions, RpcError, Stub};
use std::{sync::Arc, time::Instant};

/// Drives batches of concurrent calls against one endpoint.
#[derive(Clone, Debug)]
pub struct Harness {
    address: Arc<str>,
    options: ConnectionOptions,
}

#[derive(Default)]
struct Tally {
    success: usize,
    failure: usize,
    latencies: Vec<Duration>,
}

impl Harness {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: Arc::from(address.into()),
            options: ConnectionOptions::default(),
        }
    }

    /// Options for every connection the harness opens.
    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Runs `workload` `total_ops` times with at most `max_concurrency`
    /// invocations in flight and waits for all of them to finish.
    ///
    /// Each invocation gets a [`Stub`] according to `policy`. A failing or
    /// panicking invocation is counted and never aborts the batch.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::InvalidConcurrency`] if `max_concurrency` is zero.
    /// - [`HarnessError::Connection`] if the shared connection cannot be
    ///   opened. Nothing is dispatched in that case.
    #[tracing::instrument(skip(self, workload), fields(address = %self.address))]
    pub async fn run<W, Fut, T>(
        &self,
        total_ops: usize,
        max_concurrency: usize,
        policy: ConnectionPolicy,
        workload: W,
    ) -> Result<RunReport, HarnessError>
    where
        W: Fn(Stub) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RpcError>> + Send + 'static,
        T: Send + 'static,
    {
        if max_concurrency == 0 {
            return Err(HarnessError::InvalidConcurrency);
        }

        let start = Instant::now();
        let (source, shared) = match policy {
            ConnectionPolicy::PerCall => (
                StubSource::PerCall {
                    address: Arc::clone(&self.address),
                    options: self.options,
                },
                None,
            ),
            ConnectionPolicy::Shared => {
                let connection = Connection::open_with(&self.address, self.options).await?;
                (StubSource::Shared(connection.stub()?), Some(connection))
            }
        };

        let workload = Arc::new(workload);
        let limiter = ConcurrencyLimiter::new(max_concurrency);
        let mut tally = Tally {
            latencies: Vec::with_capacity(total_ops),
            ..Tally::default()
        };
        let mut tasks = FuturesUnordered::new();

        for _ in 0..total_ops {
            let permit = match limiter.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::warn!("Could not acquire a dispatch slot: {e}");
                    tally.failure += 1;
                    continue;
                }
            };
            let source = source.clone();
            let workload = Arc::clone(&workload);

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let started = Instant::now();
                let lease = source.lease().await?;
                (*workload)(lease.stub()).await?;
                Ok::<_, ClientError>(started.elapsed())
            }));
        }

        while let Some(joined) = tasks.next().await {
            match joined {
                Ok(Ok(latency)) => {
                    tally.success += 1;
                    tally.latencies.push(latency);
                }
                Ok(Err(e)) => {
                    tracing::debug!("Invocation failed: {e}");
                    tally.failure += 1;
                }
                Err(e) => {
                    tracing::warn!("Invocation did not complete: {e}");
                    tally.failure += 1;
                }
            }
        }
        let elapsed = start.elapsed();

        if let Some(connection) = shared {
            connection.close();
        }

        let report = RunReport {
            policy,
            total_ops,
            max_concurrency,
            elapsed,
            success_count: tally.success,
            failure_count: tally.failure,
            peak_in_flight: limiter.peak(),
            latency: LatencySummary::from_samples(&mut tally.latencies),
        };
        tracing::debug!("Run finished: {report}");
        Ok(report)
    }
}
