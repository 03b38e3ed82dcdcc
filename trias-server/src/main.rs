use std::sync::Arc;

use trias_server::cache::{CacheConfig, CachedTriasClient};
use trias_server::config::AppConfig;
use trias_server::stops::{BuildConfig, CacheBuilder, StopCache};
use trias_server::trias::{TriasClient, TriasConfig};
use trias_server::web::{AppState, create_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trias_server=info".into()),
        )
        .with_target(true)
        .init();

    let config = AppConfig::from_env();
    let addr = config.bind_addr;
    let static_dir = config.static_dir.clone();

    // Create the TRIAS client
    let trias_config = TriasConfig::new()
        .with_endpoint(config.endpoint.clone())
        .with_requestor_ref(config.requestor_ref.clone())
        .with_timeout_secs(config.timeout_secs);
    let client = TriasClient::new(trias_config).expect("Failed to create TRIAS client");

    // The build job shares the client, so it competes for the same
    // upstream request permits as interactive traffic.
    let build_source = client.clone();

    // Cached client for departure boards
    let cached = CachedTriasClient::new(client, &CacheConfig::default());

    // Stop cache and its background builder
    let stops = StopCache::new();
    let builder = CacheBuilder::new(Arc::new(build_source), stops.clone(), BuildConfig::new());

    // Build app state
    let state = AppState::new(cached, stops, builder, config);

    // Create router
    let app = create_router(state, &static_dir);

    println!("TRIAS API Server listening on http://{addr}");
    println!();
    println!("Open http://{addr} in your browser for the web interface.");
    println!();
    println!("API Endpoints:");
    println!("  GET  /health                   - Health check");
    println!("  GET  /api                      - API information");
    println!("  GET  /api/search/location      - Search stops by name");
    println!("  GET  /api/search/nearby        - Search stops near coordinates");
    println!("  GET  /api/departures           - Departure board for a stop");
    println!("  GET  /api/trips                - Plan trips between two places");
    println!("  GET  /api/cache/stats          - Stop cache statistics");
    println!("  POST /api/cache/build          - Start a cache build");
    println!("  POST /api/cache/build/stop     - Stop a running build");
    println!("  GET  /api/cache/build/progress - Build progress");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
