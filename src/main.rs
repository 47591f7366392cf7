use std::sync::Arc;

use toolbridge::api;
use toolbridge::config::{load_config, AppConfig};
use toolbridge::observability::init_tracing;
use toolbridge::state::AppState;
use toolbridge::transport::UpstreamClient;

fn main() {
    let config = load_config().unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {err}");
        std::process::exit(1);
    });

    init_tracing(&config.log_level);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .unwrap_or_else(|err| {
            eprintln!("Failed to initialize Tokio runtime: {err}");
            std::process::exit(1);
        });

    runtime.block_on(run(config));
}

async fn run(config: AppConfig) {
    let upstream = UpstreamClient::new(&config).unwrap_or_else(|err| {
        eprintln!("Failed to build upstream client: {err}");
        std::process::exit(1);
    });

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, upstream));

    tracing::info!("toolbridge starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|err| {
        eprintln!("Failed to bind to {addr}: {err}");
        std::process::exit(1);
    });

    if let Err(err) = axum::serve(listener, api::router(state)).await {
        tracing::error!("server error: {err}");
        std::process::exit(1);
    }
}
