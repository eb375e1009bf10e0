// region:    --- Imports
use crate::bidding::commands::SettlementEngine;
use crate::clock::SystemClock;
use crate::database::DatabaseManager;
use crate::handlers::AppEngine;
use crate::message_broker::{KafkaManager, EVENTS_TOPIC};
use crate::scheduler::ExpiryScheduler;
use crate::store::PostgresAuctionStore;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Modules
mod auction;
mod bidding;
mod clock;
mod database;
mod handlers;
mod message_broker;
mod scheduler;
mod store;

// endregion: --- Modules

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // configuration, env with defaults
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let kafka_brokers =
        std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    // database
    let db_manager = Arc::new(DatabaseManager::new(&database_url).await?);
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> database initialization failed: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> database initialized", "Main");

    // broadcast
    let kafka_manager = KafkaManager::new(&kafka_brokers)?;
    kafka_manager.create_topic(EVENTS_TOPIC, 5, 1).await?;
    info!("{:<12} --> kafka initialized", "Main");

    // settlement engine with its injected collaborators
    let engine: Arc<AppEngine> = Arc::new(SettlementEngine::new(
        PostgresAuctionStore::new(Arc::clone(&db_manager)),
        kafka_manager.get_producer(),
        SystemClock,
    ));

    // expiry sweep
    let scheduler = ExpiryScheduler::new(Arc::clone(&engine), Duration::from_secs(1));
    scheduler.start();

    // cors for the test page
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // routes
    let routes_all = Router::new()
        .route("/bid", post(handlers::handle_bid))
        .route("/buy-now", post(handlers::handle_buy_now))
        .route(
            "/auctions",
            get(handlers::handle_list_auctions).post(handlers::handle_create_auction),
        )
        .route("/auctions/:id", get(handlers::handle_get_auction))
        .route("/auctions/:id/bids", get(handlers::handle_list_bids))
        .route(
            "/auctions/:id/resolve",
            post(handlers::handle_resolve_expired),
        )
        .route(
            "/auctions/:id/reschedule",
            post(handlers::handle_reschedule),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(engine);

    // listener
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
