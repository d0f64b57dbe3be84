mod common;

use common::{StallingServer, TestServer};
use core::time::Duration;
use hyperclock_core::{CallContext, Connection, ConnectionOptions, RpcError};
use hyperclock_harness::{ConnectionPolicy, Harness, Workload};
use tokio::time::Instant;
use tonic::codec::CompressionEncoding;

const GRACE: Duration = Duration::from_millis(500);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn call_timeout_yields_timeout() {
    let server = StallingServer::start().await;
    let timeout = Duration::from_millis(50);
    let connection = Connection::open_with(
        &server.address,
        ConnectionOptions {
            call_timeout: Some(timeout),
            ..ConnectionOptions::default()
        },
    )
    .await
    .unwrap();
    let stub = connection.stub().unwrap();

    let started = Instant::now();
    let err = stub.multiply(3, 4).await.unwrap_err();
    assert_eq!(err, RpcError::Timeout);
    assert!(started.elapsed() <= timeout + GRACE);

    assert_eq!(stub.increment(1).await.unwrap_err(), RpcError::Timeout);

    connection.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn call_timeout_in_a_run_counts_as_failures() {
    let server = StallingServer::start().await;
    let harness = Harness::new(server.address.clone()).with_options(ConnectionOptions {
        call_timeout: Some(Duration::from_millis(50)),
        ..ConnectionOptions::default()
    });

    let report = harness
        .run(6, 3, ConnectionPolicy::Shared, |stub| {
            Workload::Multiply { x: 2, y: 3 }.execute(stub)
        })
        .await
        .unwrap();

    assert_eq!(report.success_count, 0);
    assert_eq!(report.failure_count, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fired_context_cancels_unary_calls() {
    let server = TestServer::start().await;
    let connection = Connection::open(&server.address).await.unwrap();
    let stub = connection.stub().unwrap();

    let context = CallContext::new();
    let bound = stub.with_context(context.clone());
    assert_eq!(bound.multiply(12, 4).await.unwrap().result, 48);

    context.cancel();
    assert_eq!(bound.multiply(12, 4).await.unwrap_err(), RpcError::Cancelled);
    assert_eq!(bound.increment(1).await.unwrap_err(), RpcError::Cancelled);

    // The unbound stub and the counter are untouched.
    assert_eq!(stub.multiply(12, 4).await.unwrap().result, 48);
    assert_eq!(server.service.counter_value(), 0);

    connection.close();
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelling_mid_call_returns_promptly() {
    let server = StallingServer::start().await;
    let connection = Connection::open(&server.address).await.unwrap();
    let context = CallContext::new();
    let stub = connection.stub().unwrap().with_context(context.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        context.cancel();
    });

    let started = Instant::now();
    assert_eq!(stub.multiply(1, 1).await.unwrap_err(), RpcError::Cancelled);
    assert!(started.elapsed() <= Duration::from_millis(50) + GRACE);
    canceller.await.unwrap();

    // A deadline-bound context behaves the same.
    let stub = stub.with_context(CallContext::with_timeout(Duration::from_millis(50)));
    assert_eq!(stub.get_time().await.unwrap_err(), RpcError::Cancelled);

    connection.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn compressed_calls_round_trip() {
    let server = TestServer::start().await;

    for encoding in [
        CompressionEncoding::Zstd,
        CompressionEncoding::Gzip,
        CompressionEncoding::Deflate,
    ] {
        let options = ConnectionOptions {
            compression: Some(encoding),
            ..ConnectionOptions::default()
        };

        let connection = Connection::open_with(&server.address, options)
            .await
            .unwrap();
        assert_eq!(
            connection.stub().unwrap().multiply(12, 4).await.unwrap().result,
            48
        );
        connection.close();

        let harness = Harness::new(server.address.clone()).with_options(options);
        for policy in [ConnectionPolicy::Shared, ConnectionPolicy::PerCall] {
            let report = harness
                .run(50, 10, policy, |stub| Workload::GetTime.execute(stub))
                .await
                .unwrap();
            assert_eq!(report.success_count, 50, "{encoding:?} {report}");
        }
    }

    server.stop().await;
}
