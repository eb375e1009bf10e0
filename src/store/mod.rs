// region:    --- Imports
use crate::auction::model::{Auction, AuctionStatus, Bid, NewBid};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

// endregion: --- Imports

pub mod memory;
pub mod postgres;
pub mod queries;

pub use memory::MemoryAuctionStore;
pub use postgres::PostgresAuctionStore;

// region:    --- Store Error
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("auction not found")]
    NotFound,

    /// The expected version no longer matches the stored record.
    #[error("version conflict")]
    VersionConflict,

    #[error("corrupt record: {0}")]
    Decode(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
// endregion: --- Store Error

// region:    --- Auction Patch
/// Field changes applied by a conditional update. `None` leaves the stored
/// value untouched; the store bumps `version` itself.
#[derive(Debug, Clone, Default)]
pub struct AuctionPatch {
    pub current_price: Option<i64>,
    pub last_bidder_id: Option<String>,
    pub status: Option<AuctionStatus>,
    pub winner_id: Option<String>,
    pub end_time: Option<DateTime<Utc>>,
}
// endregion: --- Auction Patch

// region:    --- Auction Store
/// Durable storage of auctions and their bid history.
///
/// All mutation goes through `conditional_update`: the write commits only if
/// the stored version still equals `expected_version`, and the version is
/// incremented in the same atomic step. At most one caller can ever commit a
/// given version number. When `bid` is supplied it is appended in the same
/// transaction, so a price change and its audit record are never observed
/// apart.
#[async_trait]
pub trait AuctionStore: Send + Sync {
    async fn insert_auction(&self, auction: Auction) -> Result<Auction, StoreError>;

    async fn get_auction(&self, id: i64) -> Result<Auction, StoreError>;

    async fn list_auctions(&self) -> Result<Vec<Auction>, StoreError>;

    async fn conditional_update(
        &self,
        id: i64,
        expected_version: i64,
        patch: AuctionPatch,
        bid: Option<NewBid>,
    ) -> Result<Auction, StoreError>;

    /// Bid history, newest first.
    async fn list_bids(&self, auction_id: i64) -> Result<Vec<Bid>, StoreError>;

    /// Candidates for the expiry sweep: active auctions whose end time has
    /// passed.
    async fn list_expired_active(&self, now: DateTime<Utc>) -> Result<Vec<i64>, StoreError>;
}

#[async_trait]
impl<S: AuctionStore + ?Sized> AuctionStore for std::sync::Arc<S> {
    async fn insert_auction(&self, auction: Auction) -> Result<Auction, StoreError> {
        (**self).insert_auction(auction).await
    }

    async fn get_auction(&self, id: i64) -> Result<Auction, StoreError> {
        (**self).get_auction(id).await
    }

    async fn list_auctions(&self) -> Result<Vec<Auction>, StoreError> {
        (**self).list_auctions().await
    }

    async fn conditional_update(
        &self,
        id: i64,
        expected_version: i64,
        patch: AuctionPatch,
        bid: Option<NewBid>,
    ) -> Result<Auction, StoreError> {
        (**self).conditional_update(id, expected_version, patch, bid).await
    }

    async fn list_bids(&self, auction_id: i64) -> Result<Vec<Bid>, StoreError> {
        (**self).list_bids(auction_id).await
    }

    async fn list_expired_active(&self, now: DateTime<Utc>) -> Result<Vec<i64>, StoreError> {
        (**self).list_expired_active(now).await
    }
}
// endregion: --- Auction Store
