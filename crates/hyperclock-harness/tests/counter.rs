mod common;

use common::TestServer;
use core::time::Duration;
use hyperclock_core::{Connection, ConnectionError, RpcError};
use hyperclock_harness::{ConnectionPolicy, Harness, Workload};
use hyperclock_server::server::config::ServerConfig;
use tonic::Code;

const INITIAL: i64 = 1_000;

async fn counter_server(initial_counter: i64) -> TestServer {
    TestServer::start_with(ServerConfig {
        initial_counter,
        shutdown_timeout: Duration::from_millis(100),
        ..ServerConfig::default()
    })
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_are_atomic() {
    for m in [1_usize, 10, 500] {
        let server = counter_server(INITIAL).await;
        let harness = Harness::new(server.address.clone());

        for policy in [ConnectionPolicy::Shared, ConnectionPolicy::PerCall] {
            let before = server.service.counter_value();
            let report = harness
                .run(m, m.min(50), policy, |stub| {
                    Workload::Increment { delta: 1 }.execute(stub)
                })
                .await
                .unwrap();

            assert_eq!(report.success_count, m);
            assert_eq!(server.service.counter_value(), before + m as i64);
        }
        assert_eq!(server.service.counter_value(), INITIAL + 2 * m as i64);

        server.stop().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn increment_returns_the_updated_value() {
    let server = counter_server(-5).await;
    let connection = Connection::open(&server.address).await.unwrap();
    let stub = connection.stub().unwrap();

    assert_eq!(stub.increment(5).await.unwrap().result, 0);
    assert_eq!(stub.increment(-3).await.unwrap().result, -3);

    connection.close();
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overflowing_increment_is_rejected() {
    let server = counter_server(i64::MAX).await;
    let connection = Connection::open(&server.address).await.unwrap();
    let stub = connection.stub().unwrap();

    let err = stub.increment(1).await.unwrap_err();
    assert_eq!(err.code(), Code::OutOfRange);
    assert_eq!(server.service.counter_value(), i64::MAX);

    connection.close();
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn multiply_end_to_end() {
    let server = TestServer::start().await;
    let connection = Connection::open(&server.address).await.unwrap();
    let stub = connection.stub().unwrap();

    assert_eq!(stub.multiply(12, 4).await.unwrap().result, 48);
    assert_eq!(stub.multiply(-7, 6).await.unwrap().result, -42);

    let first = stub.get_time().await.unwrap();
    let second = stub.get_time().await.unwrap();
    assert_ne!(first.id, second.id);
    assert!(second.time >= first.time);

    connection.close();
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn closed_connection_refuses_new_calls() {
    let server = TestServer::start().await;
    let connection = Connection::open(&server.address).await.unwrap();
    let stub = connection.stub().unwrap();
    stub.multiply(1, 1).await.unwrap();

    connection.close();
    connection.close();
    assert!(connection.is_closed());

    assert!(matches!(
        connection.stub(),
        Err(ConnectionError::Closed { .. })
    ));
    match stub.multiply(1, 1).await {
        Err(RpcError::Transport { code, .. }) => assert_eq!(code, Code::Unavailable),
        other => panic!("unexpected result: {other:?}"),
    }

    server.stop().await;
}
