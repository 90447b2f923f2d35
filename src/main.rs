use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use request_governor::batcher::Batcher;
use request_governor::client::VolunteerClient;
use request_governor::config::Args;
use request_governor::executor::RequestGovernor;
use request_governor::handlers::build_router;
use request_governor::perf::PerformanceMonitor;
use request_governor::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // parse cli arguments
    let args = Args::parse();
    request_governor::init_tracing();

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let client = VolunteerClient::new(http.clone(), &args.upstream, args.api_token.clone());

    let governor = RequestGovernor::new(args.governor_settings());
    let monitor = Arc::new(PerformanceMonitor::new());

    // background loops stop when their handles drop at the end of main
    let _sweeper = governor.start_sweeper();
    let _frames = monitor.start_frame_loop(args.frame_interval());
    let probe_url = format!(
        "{}/{}",
        client.base_url(),
        args.probe_path.trim_start_matches('/')
    );
    let _probe = monitor.start_probe_loop(http, probe_url, args.probe_interval());

    // creating shared state
    let state = Arc::new(AppState {
        client,
        governor,
        request_config: args.request_config(),
        batcher: Batcher::new(args.batch_delay()),
        monitor,
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("Gateway running on http://localhost:{}", args.port);
    info!("Forwarding to volunteer API at {}", args.upstream);
    info!("Cache TTL: {} seconds", args.cache_ttl);
    info!(
        "Rate limit: {} requests per {} seconds",
        args.rate_limit, args.rate_window
    );
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
