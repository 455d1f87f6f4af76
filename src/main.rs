use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studio_booking::{config::Config, controllers, services::cleanup::CleanupService, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting studio booking API");

    let (host, port) = (config.app.host.clone(), config.app.port);

    // Connects, runs migrations and builds the external-service clients.
    let app_state = AppState::new(config)
        .await
        .expect("Failed to initialize application state");
    info!("Database connected and migrations applied");

    // Sweep abandoned pending checkouts every 5 minutes.
    let cleanup = CleanupService::new(app_state.clone());
    task::spawn(async move {
        loop {
            cleanup.run().await;
            tokio::time::sleep(Duration::from_secs(300)).await;
        }
    });

    // The SPA is served from a different origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(|| async { "Studio Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("HOST and PORT must form a valid socket address");
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("Server error");
}
