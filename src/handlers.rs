// region:    --- Imports
use crate::auction::model::NewAuction;
use crate::bidding::commands::SettlementEngine;
use crate::bidding::error::BidError;
use crate::clock::SystemClock;
use crate::message_broker::KafkaProducer;
use crate::store::PostgresAuctionStore;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

/// Engine wired to the production collaborators.
pub type AppEngine = SettlementEngine<PostgresAuctionStore, Arc<KafkaProducer>, SystemClock>;

// region:    --- Request Bodies

#[derive(Debug, Deserialize)]
pub struct PlaceBidRequest {
    pub auction_id: i64,
    pub bidder_id: String,
    pub bidder_name: String,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct BuyNowRequest {
    pub auction_id: i64,
    pub buyer_id: String,
    pub buyer_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub end_time: DateTime<Utc>,
}

// endregion: --- Request Bodies

// region:    --- Error Mapping

/// Rejections stay structured so a client can re-prompt without another
/// round trip; `BID_TOO_LOW` carries the exact minimum.
fn error_response(err: BidError) -> axum::response::Response {
    let status = match &err {
        BidError::AuctionNotFound => StatusCode::NOT_FOUND,
        BidError::InvalidAmount | BidError::BidTooLow { .. } | BidError::InvalidEndTime => {
            StatusCode::BAD_REQUEST
        }
        BidError::SelfBidNotAllowed => StatusCode::FORBIDDEN,
        BidError::AuctionClosed
        | BidError::AuctionExpired
        | BidError::AlreadySold
        | BidError::BuyNowUnavailable => StatusCode::CONFLICT,
        BidError::Contention => StatusCode::SERVICE_UNAVAILABLE,
        BidError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut body = serde_json::json!({
        "error": err.to_string(),
        "code": err.code(),
    });
    if let BidError::BidTooLow { minimum } = &err {
        body["min_required"] = serde_json::json!(minimum);
    }

    (status, Json(body)).into_response()
}

// endregion: --- Error Mapping

// region:    --- Command Handlers

/// Place an ascending bid.
pub async fn handle_bid(
    State(engine): State<Arc<AppEngine>>,
    Json(req): Json<PlaceBidRequest>,
) -> impl IntoResponse {
    info!("{:<12} --> bid request: {:?}", "Handler", req);
    match engine
        .place_bid(req.auction_id, &req.bidder_id, &req.bidder_name, req.amount)
        .await
    {
        Ok(auction) => (StatusCode::OK, Json(auction)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Settle immediately at the buy-now price.
pub async fn handle_buy_now(
    State(engine): State<Arc<AppEngine>>,
    Json(req): Json<BuyNowRequest>,
) -> impl IntoResponse {
    info!("{:<12} --> buy-now request: {:?}", "Handler", req);
    match engine
        .buy_now(req.auction_id, &req.buyer_id, &req.buyer_name)
        .await
    {
        Ok(auction) => (StatusCode::OK, Json(auction)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Create a listing.
pub async fn handle_create_auction(
    State(engine): State<Arc<AppEngine>>,
    Json(new): Json<NewAuction>,
) -> impl IntoResponse {
    info!("{:<12} --> create listing: {:?}", "Handler", new.title);
    match engine.create_auction(new).await {
        Ok(auction) => (StatusCode::CREATED, Json(auction)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Force expiry resolution; a no-op on running or terminal auctions.
pub async fn handle_resolve_expired(
    State(engine): State<Arc<AppEngine>>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> resolve expiry id: {}", "Handler", auction_id);
    match engine.resolve_expired(auction_id).await {
        Ok(auction) => (StatusCode::OK, Json(auction)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Move the deadline of an active auction.
pub async fn handle_reschedule(
    State(engine): State<Arc<AppEngine>>,
    Path(auction_id): Path<i64>,
    Json(req): Json<RescheduleRequest>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> reschedule id: {} to {}",
        "Handler", auction_id, req.end_time
    );
    match engine.reschedule(auction_id, req.end_time).await {
        Ok(auction) => (StatusCode::OK, Json(auction)).into_response(),
        Err(e) => error_response(e),
    }
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// Auction snapshot; expiry resolves lazily on read.
pub async fn handle_get_auction(
    State(engine): State<Arc<AppEngine>>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> get auction id: {}", "Handler", auction_id);
    match engine.get_auction(auction_id).await {
        Ok(auction) => Json(auction).into_response(),
        Err(e) => error_response(e),
    }
}

/// All auctions, newest first.
pub async fn handle_list_auctions(State(engine): State<Arc<AppEngine>>) -> impl IntoResponse {
    info!("{:<12} --> list auctions", "Handler");
    match engine.list_auctions().await {
        Ok(auctions) => Json(auctions).into_response(),
        Err(e) => error_response(e),
    }
}

/// Bid history, newest first.
pub async fn handle_list_bids(
    State(engine): State<Arc<AppEngine>>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> list bids id: {}", "Handler", auction_id);
    match engine.list_bids(auction_id).await {
        Ok(bids) => Json(bids).into_response(),
        Err(e) => error_response(e),
    }
}

// endregion: --- Query Handlers
