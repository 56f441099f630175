use chanload::{IdPool, Scheduler, Traffic};
use chanload_runner::runner::config::{CliArgs, RunnerConfig};
use chanload_runner::runner::http::HttpService;
use chanload_runner::runner::sink::RunnerSink;
use chanload_runner::runner::telemetry::init_telemetry;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunnerConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let service = HttpService::new(&config.api_hosts, config.request_timeout)?;
    let sink = RunnerSink::new(&config)?;
    let traffic = Traffic::new(
        service,
        sink,
        IdPool::new(config.sample_rate),
        IdPool::new(config.sample_rate),
    );

    let scheduler = Scheduler::new(Arc::new(traffic), config.scheduler);
    scheduler.start(config.num_workers);

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, terminating gracefully...");

    scheduler.shutdown(config.shutdown_timeout).await;
    tracing::info!(
        "Sampled {} channels and {} subscribed channels",
        scheduler.traffic().channels().len(),
        scheduler.traffic().subscriptions().len()
    );

    // Releasing the sink drains the subscription stats log.
    drop(scheduler);
    providers.shutdown();
    Ok(())
}

fn log_startup_info(config: &RunnerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting load run with full config: {config:#?}");
    } else {
        tracing::info!(
            "Starting load run against {:?} with {} workers",
            config.api_hosts,
            config.num_workers
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
