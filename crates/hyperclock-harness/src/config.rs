use crate::{ConnectionPolicy, Workload};
use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use hyperclock_core::{ConnectionOptions, types::DEFAULT_ADDRESS};
use tonic::codec::CompressionEncoding;

/// Command line of the `hyperclock-harness` binary.
///
/// Every flag can also be set through the environment (a `.env` file is
/// loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "hyperclock-harness",
    version,
    about = "Drives concurrent calls against a hyperclock server and reports throughput"
)]
pub struct CliArgs {
    /// Server address, `host:port` or `http://host:port`.
    ///
    /// Environment variable: `HARNESS_ADDRESS`
    #[arg(long, env = "HARNESS_ADDRESS", default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Number of invocations per run.
    ///
    /// Environment variable: `TOTAL_OPS`
    #[arg(long, env = "TOTAL_OPS", default_value_t = 500)]
    pub total_ops: usize,

    /// Maximum number of invocations in flight at once.
    ///
    /// Environment variable: `MAX_CONCURRENCY`
    #[arg(long, env = "MAX_CONCURRENCY", default_value_t = 50)]
    pub max_concurrency: usize,

    /// Call issued by every invocation.
    ///
    /// Environment variable: `WORKLOAD`
    #[arg(long, env = "WORKLOAD", value_enum, default_value_t = WorkloadArg::GetTime)]
    pub workload: WorkloadArg,

    /// Connection policy to run under. `both` runs per-call, then shared.
    ///
    /// Environment variable: `POLICY`
    #[arg(long, env = "POLICY", value_enum, default_value_t = PolicyArg::Both)]
    pub policy: PolicyArg,

    /// Upper bound on opening one connection, in milliseconds.
    ///
    /// Environment variable: `CONNECT_TIMEOUT_MS`
    #[arg(long, env = "CONNECT_TIMEOUT_MS", default_value_t = 5_000)]
    pub connect_timeout_ms: u64,

    /// Deadline for every unary call, in milliseconds. Unbounded if unset.
    ///
    /// Environment variable: `CALL_TIMEOUT_MS`
    #[arg(long, env = "CALL_TIMEOUT_MS")]
    pub call_timeout_ms: Option<u64>,

    /// Message compression for requests and responses.
    ///
    /// Environment variable: `COMPRESSION`
    #[arg(long, env = "COMPRESSION", value_enum, default_value_t = CompressionArg::None)]
    pub compression: CompressionArg,

    /// After the runs, watch the clock subscription for this many seconds.
    ///
    /// Environment variable: `WATCH_SECS`
    #[arg(long, env = "WATCH_SECS")]
    pub watch_secs: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadArg {
    GetTime,
    Multiply,
    Increment,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyArg {
    PerCall,
    Shared,
    Both,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionArg {
    None,
    Deflate,
    Gzip,
    Zstd,
}

impl From<WorkloadArg> for Workload {
    fn from(value: WorkloadArg) -> Self {
        match value {
            WorkloadArg::GetTime => Workload::GetTime,
            WorkloadArg::Multiply => Workload::Multiply { x: 12, y: 4 },
            WorkloadArg::Increment => Workload::Increment { delta: 1 },
        }
    }
}

impl From<PolicyArg> for Vec<ConnectionPolicy> {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::PerCall => vec![ConnectionPolicy::PerCall],
            PolicyArg::Shared => vec![ConnectionPolicy::Shared],
            PolicyArg::Both => vec![ConnectionPolicy::PerCall, ConnectionPolicy::Shared],
        }
    }
}

impl From<CompressionArg> for Option<CompressionEncoding> {
    fn from(value: CompressionArg) -> Self {
        match value {
            CompressionArg::None => None,
            CompressionArg::Deflate => Some(CompressionEncoding::Deflate),
            CompressionArg::Gzip => Some(CompressionEncoding::Gzip),
            CompressionArg::Zstd => Some(CompressionEncoding::Zstd),
        }
    }
}

/// Validated harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub address: String,
    pub total_ops: usize,
    pub max_concurrency: usize,
    pub workload: Workload,
    pub policies: Vec<ConnectionPolicy>,
    pub options: ConnectionOptions,
    pub watch: Option<Duration>,
}

impl TryFrom<CliArgs> for HarnessConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.max_concurrency == 0 {
            bail!("MAX_CONCURRENCY must be greater than 0");
        }
        if args.connect_timeout_ms == 0 {
            bail!("CONNECT_TIMEOUT_MS must be greater than 0");
        }
        if args.call_timeout_ms == Some(0) {
            bail!("CALL_TIMEOUT_MS must be greater than 0 when set");
        }
        if args.watch_secs == Some(0) {
            bail!("WATCH_SECS must be greater than 0 when set");
        }

        Ok(Self {
            address: args.address,
            total_ops: args.total_ops,
            max_concurrency: args.max_concurrency,
            workload: args.workload.into(),
            policies: args.policy.into(),
            options: ConnectionOptions {
                connect_timeout: Duration::from_millis(args.connect_timeout_ms),
                call_timeout: args.call_timeout_ms.map(Duration::from_millis),
                compression: args.compression.into(),
            },
            watch: args.watch_secs.map(Duration::from_secs),
        })
    }
}
