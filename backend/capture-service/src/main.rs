/// Capture Service - HTTP Server
///
/// Persists fundus capture batches and drives color synthesis.
use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use anyhow::Context;
use capture_service::db::{PgAuditSink, PgImageRepository};
use capture_service::handlers;
use capture_service::services::{
    CaptureOrchestrator, ChannelPersister, FileReader, HttpSynthesisClient, ImageNumberGenerator,
    SystemClock, ThumbnailCodec, ThumbnailConfig,
};
use capture_service::Config;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    let bind_address = format!("{}:{}", config.app.host, config.app.port);

    tracing::info!(env = %config.app.env, %bind_address, "Capture service starting");

    // Initialize database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;

    let synthesizer = HttpSynthesisClient::from_config(&config.synthesis)
        .context("Failed to create synthesis client")?;

    let images = Arc::new(PgImageRepository::new(db_pool.clone()));
    let files = FileReader::new(images.clone());
    let persister = ChannelPersister::new(
        images,
        Arc::new(PgAuditSink::new(db_pool)),
        ThumbnailCodec::new(ThumbnailConfig {
            jpeg_quality: config.thumbnail.jpeg_quality,
        }),
    );
    let orchestrator = CaptureOrchestrator::new(
        persister,
        Arc::new(synthesizer),
        Arc::new(ImageNumberGenerator::new(Arc::new(SystemClock))),
        config.storage.save_folder_path.clone(),
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(orchestrator.clone()))
            .app_data(web::Data::new(files.clone()))
            .app_data(handlers::json_config())
            .wrap(actix_middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await
    .context("HTTP server error")?;

    tracing::info!("Capture service shutting down");
    Ok(())
}
