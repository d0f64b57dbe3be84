use super::policy::ConnectionPolicy;
use core::{fmt, time::Duration};

/// Latency distribution of the successful invocations of one run.
///
/// All fields are zero when nothing succeeded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LatencySummary {
    pub min: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p99: Duration,
    pub max: Duration,
}

impl LatencySummary {
    /// Summarises `samples`, sorting them in place.
    pub fn from_samples(samples: &mut [Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_unstable();

        let total: u128 = samples.iter().map(Duration::as_nanos).sum();
        let mean = total / samples.len() as u128;

        Self {
            min: samples[0],
            mean: Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX)),
            p50: percentile(samples, 50),
            p99: percentile(samples, 99),
            max: samples[samples.len() - 1],
        }
    }
}

// Nearest-rank percentile over sorted, non-empty samples.
fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    let rank = (sorted.len() * pct).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}

/// Outcome of one [`Harness::run`](super::Harness::run).
///
/// `success_count + failure_count == total_ops` always holds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunReport {
    pub policy: ConnectionPolicy,
    pub total_ops: usize,
    pub max_concurrency: usize,
    /// From dispatch start (including the shared connection's setup) until
    /// the last invocation finished.
    pub elapsed: Duration,
    pub success_count: usize,
    pub failure_count: usize,
    /// Highest number of invocations observed in flight at once.
    pub peak_in_flight: usize,
    pub latency: LatencySummary,
}

impl RunReport {
    /// Successful invocations per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.success_count as f64 / secs
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<9} | {:>7} ops | k={:<4} | ok {:>7} | failed {:>6} | {:>10.2} ms | {:>10.2} ops/sec | p50 {:>8.3} ms | p99 {:>8.3} ms",
            self.policy,
            self.total_ops,
            self.max_concurrency,
            self.success_count,
            self.failure_count,
            self.elapsed.as_secs_f64() * 1000.0,
            self.throughput(),
            self.latency.p50.as_secs_f64() * 1000.0,
            self.latency.p99.as_secs_f64() * 1000.0,
        )
    }
}
