use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use events_dashboard::backend::{
    on_auth_state_change, DataBackend, HostedAuth, HostedStorage, PgEventTable,
};
use events_dashboard::config::{BackendMode, Config, HostedConfig};
use events_dashboard::routes::create_routes;
use events_dashboard::session::AuthEvent;
use events_dashboard::AppState;

async fn hosted_backend(hosted: &HostedConfig) -> DataBackend {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&hosted.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    let events = PgEventTable::new(pool);
    events.migrate().await.expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let http = reqwest::Client::new();
    DataBackend::new(
        Arc::new(HostedAuth::new(
            http.clone(),
            &hosted.backend_url,
            &hosted.api_key,
        )),
        Arc::new(events),
        Arc::new(HostedStorage::new(http, &hosted.backend_url, &hosted.api_key)),
    )
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let backend = match (config.mode, &config.hosted) {
        (BackendMode::Hosted, Some(hosted)) => hosted_backend(hosted).await,
        _ => {
            tracing::warn!("Using in-memory backend; data is lost on restart");
            DataBackend::in_memory(&config.public_base_url, config.require_email_confirmation)
        }
    };

    let _auth_log = on_auth_state_change(backend.auth.as_ref(), |event| match event {
        AuthEvent::SignedIn(session) => {
            tracing::info!(user = %session.user.id, "Auth state changed: signed in")
        }
        AuthEvent::SignedOut { .. } => tracing::info!("Auth state changed: signed out"),
    });

    let addr = config.bind_addr;
    let app = create_routes(AppState::new(backend, config));

    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
