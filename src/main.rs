use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use image_gen_service::app_state::{AppState, Upstream};
use image_gen_service::config::AppConfig;
use image_gen_service::routes;
use image_gen_service::services::storage::ImageStore;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing image-gen-service");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe();

    // Prepare local image storage
    let images = ImageStore::new(&config.images_dir);
    images
        .init()
        .await
        .expect("Failed to create images directory");
    tracing::info!(images_dir = %config.images_dir.display(), "Image storage ready");

    // Resolve the upstream credential once; a missing key keeps the server up
    let upstream = Upstream::from_config(&config);
    match &upstream {
        Upstream::Ready(_) => tracing::info!("Loaded API key from secret"),
        Upstream::Unconfigured(reason) => {
            tracing::error!(reason = %reason, "Failed to initialize API key; generation disabled")
        }
    }

    let state = AppState::new(upstream, images);

    let app = routes::router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    tracing::info!("Starting image-gen-service on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
