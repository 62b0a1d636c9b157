use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use gatekeeper::clock::SystemClock;
use gatekeeper::config::Args;
use gatekeeper::routes::router;
use gatekeeper::state::AppState;
use gatekeeper::{Gatekeeper, InMemoryStore};

// this is main async function with tokio
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();
    let upstream = args.upstream_url()?;

    let gate = Gatekeeper::from_args(&args, Arc::new(InMemoryStore::new()), Arc::new(SystemClock))?;
    let limits = *gate.limiter().config();

    // creating shared state
    let state = Arc::new(AppState::new(upstream.clone(), Arc::new(gate))?);

    gatekeeper::metrics::register();
    let app = router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        port = args.port,
        upstream = %upstream,
        "Gatekeeper running"
    );
    tracing::info!(
        max_requests = limits.max_requests,
        window_secs = limits.window.num_seconds(),
        block_secs = limits.block_duration.num_seconds(),
        cleanup_secs = limits.cleanup_interval.num_seconds(),
        "Rate limit configured"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
