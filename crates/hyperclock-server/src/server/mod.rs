//! Server assembly: configuration, service, streaming and telemetry.
//!
//! - [`config`] - CLI/environment configuration.
//! - [`service`] - the gRPC handlers and shared counter.
//! - [`streaming`] - per-subscription ticker tasks.
//! - [`telemetry`] - logging and optional OpenTelemetry export.
//!
//! [`serve_with_incoming_shutdown`] wires the service into a tonic server with
//! health and reflection, so the binary and in-process tests start it the
//! same way.

pub mod config;
pub mod service;
pub mod streaming;
pub mod telemetry;

use core::future::Future;
use futures::Stream;
use hyperclock_core::proto::{
    FILE_DESCRIPTOR_SET, calculator_server::CalculatorServer, counter_server::CounterServer,
    time_service_server::TimeServiceServer,
};
use service::handler::HyperclockService;
use tokio::io::{AsyncRead, AsyncWrite};
use tonic::{
    codec::CompressionEncoding,
    transport::{Server, server::Connected},
};
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Serves `service` on `incoming` until `signal` completes, then shuts the
/// service down gracefully before returning.
pub async fn serve_with_incoming_shutdown<I, IO, IE, F>(
    incoming: I,
    service: HyperclockService,
    signal: F,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<BoxError>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    set_serving(&health_reporter, true).await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    Server::builder()
        .tcp_nodelay(true)
        .http2_adaptive_window(Some(true))
        .add_service(health_service)
        .add_service(reflection)
        .add_service(
            CalculatorServer::new(service.clone())
                .send_compressed(CompressionEncoding::Zstd)
                .send_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Deflate)
                .accept_compressed(CompressionEncoding::Zstd)
                .accept_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Deflate),
        )
        .add_service(
            CounterServer::new(service.clone())
                .send_compressed(CompressionEncoding::Zstd)
                .send_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Deflate)
                .accept_compressed(CompressionEncoding::Zstd)
                .accept_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Deflate),
        )
        .add_service(
            TimeServiceServer::new(service.clone())
                .send_compressed(CompressionEncoding::Zstd)
                .send_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Deflate)
                .accept_compressed(CompressionEncoding::Zstd)
                .accept_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Deflate),
        )
        .serve_with_incoming_shutdown(incoming, async move {
            signal.await;
            tracing::info!("Shutdown signal received, terminating gracefully...");

            // 1. Publish the status
            set_serving(&health_reporter, false).await;

            // 2. Drain and stop subscriptions so the server can finish
            if let Err(e) = service.shutdown().await {
                tracing::error!("Error during service shutdown: {e}");
            }
        })
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

async fn set_serving(reporter: &HealthReporter, serving: bool) {
    if serving {
        reporter
            .set_serving::<CalculatorServer<HyperclockService>>()
            .await;
        reporter.set_serving::<CounterServer<HyperclockService>>().await;
        reporter
            .set_serving::<TimeServiceServer<HyperclockService>>()
            .await;
    } else {
        reporter
            .set_not_serving::<CalculatorServer<HyperclockService>>()
            .await;
        reporter
            .set_not_serving::<CounterServer<HyperclockService>>()
            .await;
        reporter
            .set_not_serving::<TimeServiceServer<HyperclockService>>()
            .await;
    }
}
