use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use hyperclock_core::types::DEFAULT_PORT;

/// Runtime configuration for the `hyperclock-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults that match what the harness
/// dials.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "hyperclock-server",
    version,
    about = "A gRPC calculator, shared counter and streaming clock"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = format!("0.0.0.0:{DEFAULT_PORT}"))]
    pub server_addr: String,

    /// Milliseconds between two events of a clock subscription.
    ///
    /// Environment variable: `TICK_INTERVAL_MS`
    #[arg(long, env = "TICK_INTERVAL_MS", default_value_t = 1_000)]
    pub tick_interval_ms: u64,

    /// Capacity of the per-subscription buffer between the ticker task and
    /// the gRPC response stream. A slow client stalls its own ticker once
    /// this many events are queued.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Value the shared counter starts from.
    ///
    /// Environment variable: `INITIAL_COUNTER`
    #[arg(long, env = "INITIAL_COUNTER", default_value_t = 0, allow_negative_numbers = true)]
    pub initial_counter: i64,

    /// Seconds to wait for open subscriptions to drain on shutdown before they
    /// are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub tick_interval: Duration,
    pub stream_buffer_size: usize,
    pub initial_counter: i64,
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            tick_interval: Duration::from_secs(1),
            stream_buffer_size: 8,
            initial_counter: 0,
            shutdown_timeout: Duration::from_secs(3),
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.tick_interval_ms == 0 {
            bail!("TICK_INTERVAL_MS must be greater than 0");
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        Ok(Self {
            server_addr: args.server_addr,
            tick_interval: Duration::from_millis(args.tick_interval_ms),
            stream_buffer_size: args.stream_buffer_size,
            initial_counter: args.initial_counter,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}
