use chanload_mock::{MockState, router};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "chanload-mock",
    version,
    about = "Serves an in-memory channel API for local load runs"
)]
struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `MOCK_ADDR`
    #[arg(long, env = "MOCK_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let listener = TcpListener::bind(&args.addr).await?;
    tracing::info!("Mock channel API listening on {}", listener.local_addr()?);

    let state = MockState::default();
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!(
        "Served {} channels and {} subscriptions",
        state.channel_count(),
        state.subscription_count()
    );
    Ok(())
}
