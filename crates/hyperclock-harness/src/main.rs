//! `hyperclock-harness` binary: checks the server answers, runs the chosen
//! workload under each connection policy and prints the reports.

use clap::Parser;
use hyperclock_core::{CallContext, Connection};
use hyperclock_harness::{
    Harness, RunReport,
    config::{CliArgs, HarnessConfig},
    telemetry::init_logging,
    watch_time,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let config = HarnessConfig::try_from(CliArgs::parse())?;
    init_logging()?;

    let connection = Connection::open_with(&config.address, config.options).await?;
    let product = connection.stub()?.multiply(12, 4).await?;
    anyhow::ensure!(
        product.result == 48,
        "multiply(12, 4) returned {}",
        product.result
    );
    tracing::info!("multiply(12, 4) = {}", product.result);

    let harness = Harness::new(config.address.clone()).with_options(config.options);
    let mut reports = Vec::with_capacity(config.policies.len());
    for &policy in &config.policies {
        tracing::info!(
            "Running {} x {} under {policy} (max {} in flight)",
            config.total_ops,
            config.workload,
            config.max_concurrency
        );
        let workload = config.workload;
        let report = harness
            .run(
                config.total_ops,
                config.max_concurrency,
                policy,
                move |stub| workload.execute(stub),
            )
            .await?;
        tracing::info!("{report}");
        reports.push(report);
    }

    print_summary(&reports);

    if let Some(window) = config.watch {
        tracing::info!("Watching the clock for {window:?}");
        let report = watch_time(&connection.stub()?, CallContext::with_timeout(window)).await?;
        tracing::info!(
            "Watch ended ({:?}): {} events, {} increments ({} failed), last count {:?}",
            report.termination,
            report.events,
            report.increments,
            report.increment_failures,
            report.last_count
        );
    }

    connection.close();
    Ok(())
}

fn print_summary(reports: &[RunReport]) {
    println!("\n=== Run Summary ===");
    for report in reports {
        println!("{report}");
    }

    if let [per_call, shared] = reports {
        let shared_secs = shared.elapsed.as_secs_f64();
        if shared_secs > 0.0 {
            println!(
                "shared connection was {:.2}x faster than per-call connections",
                per_call.elapsed.as_secs_f64() / shared_secs
            );
        }
    }
}
