use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod database;
mod error;
mod menu;
mod routes;
mod telegram;
mod tenant;
mod transit;
mod utils;
mod weather;
mod youtube;

use config::{Config, TelegramMode};
use database::Database;
use routes::{create_router, AppState};
use weather::openweather::OpenWeatherClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signage_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tokio::fs::create_dir_all(&config.telegram_uploads_dir).await?;

    // Initialize database
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let database = Arc::new(Database::new(pool));
    database.init_tables().await?;
    database.health_check().await?;

    let weather_client = Arc::new(OpenWeatherClient::new(&config)?);
    let bind_addr = config.bind_addr.clone();
    let telegram_mode = config.telegram_mode;
    let state = AppState::build(config, database, weather_client)?;

    let shutdown = CancellationToken::new();
    let poller = match (&state.telegram, telegram_mode) {
        (Some(telegram), TelegramMode::Polling) => {
            Some(tokio::spawn(telegram.clone().poll_updates(shutdown.clone())))
        }
        (None, _) => {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set, Telegram bot disabled");
            None
        }
        _ => None,
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server starting on http://{}", bind_addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown signal received");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(poller) = poller {
        poller.await?;
    }

    Ok(())
}
