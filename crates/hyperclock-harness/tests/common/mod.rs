#![allow(dead_code)]

use core::time::Duration;
use hyperclock_core::proto::{
    GetTimeRequest, IncrementRequest, IncrementResult, MultiplyRequest, MultiplyResult,
    TimeResult,
    calculator_server::{Calculator, CalculatorServer},
    counter_server::{Counter, CounterServer},
    time_service_server::TimeServiceServer,
};
use hyperclock_server::server::{
    config::ServerConfig, serve_with_incoming_shutdown, service::handler::HyperclockService,
};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, transport::Server};

/// An in-process server on an ephemeral loopback port.
pub struct TestServer {
    pub address: String,
    pub service: HyperclockService,
    shutdown: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(ServerConfig {
            tick_interval: Duration::from_millis(20),
            shutdown_timeout: Duration::from_millis(100),
            ..ServerConfig::default()
        })
        .await
    }

    pub async fn start_with(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let service = HyperclockService::new(config);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn({
            let service = service.clone();
            let shutdown = shutdown.clone();
            async move {
                serve_with_incoming_shutdown(
                    TcpListenerStream::new(listener),
                    service,
                    async move { shutdown.cancelled().await },
                )
                .await
            }
        });

        Self {
            address,
            service,
            shutdown,
            handle,
        }
    }

    /// Triggers graceful shutdown without waiting for it.
    pub fn begin_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.handle.await.unwrap().unwrap();
    }
}

/// An address nothing listens on.
pub async fn unused_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);
    address
}

/// Unary handlers that never answer in time.
#[derive(Clone, Copy, Debug)]
struct Stalling;

const STALL: Duration = Duration::from_secs(30);

#[tonic::async_trait]
impl Calculator for Stalling {
    async fn multiply(
        &self,
        _req: Request<MultiplyRequest>,
    ) -> Result<Response<MultiplyResult>, Status> {
        tokio::time::sleep(STALL).await;
        Err(Status::unavailable("stalled"))
    }

    async fn get_time(
        &self,
        _req: Request<GetTimeRequest>,
    ) -> Result<Response<TimeResult>, Status> {
        tokio::time::sleep(STALL).await;
        Err(Status::unavailable("stalled"))
    }
}

#[tonic::async_trait]
impl Counter for Stalling {
    async fn increment(
        &self,
        _req: Request<IncrementRequest>,
    ) -> Result<Response<IncrementResult>, Status> {
        tokio::time::sleep(STALL).await;
        Err(Status::unavailable("stalled"))
    }
}

/// A server whose unary calls stall while its clock subscription ticks
/// normally. Aborted on drop.
pub struct StallingServer {
    pub address: String,
    handle: JoinHandle<()>,
}

impl StallingServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let clock = HyperclockService::new(ServerConfig {
            tick_interval: Duration::from_millis(20),
            ..ServerConfig::default()
        });

        let handle = tokio::spawn(async move {
            let _ = Server::builder()
                .add_service(CalculatorServer::new(Stalling))
                .add_service(CounterServer::new(Stalling))
                .add_service(TimeServiceServer::new(clock))
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await;
        });

        Self { address, handle }
    }
}

impl Drop for StallingServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
