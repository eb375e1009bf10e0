// region:    --- Imports
use super::{queries, AuctionPatch, AuctionStore, StoreError};
use crate::auction::model::{Auction, AuctionStatus, Bid, NewBid};
use crate::database::DatabaseManager;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Row Mapping
/// Raw auction row; status is TEXT in the schema.
#[derive(FromRow)]
struct AuctionRow {
    id: i64,
    title: String,
    description: String,
    seller_id: String,
    start_price: Option<i64>,
    current_price: Option<i64>,
    buy_now_price: Option<i64>,
    min_bid_increment: i64,
    status: String,
    end_time: DateTime<Utc>,
    last_bidder_id: Option<String>,
    winner_id: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuctionRow> for Auction {
    type Error = StoreError;

    fn try_from(row: AuctionRow) -> Result<Self, Self::Error> {
        let status = AuctionStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Decode(format!("unknown auction status {:?}", row.status)))?;
        Ok(Auction {
            id: row.id,
            title: row.title,
            description: row.description,
            seller_id: row.seller_id,
            start_price: row.start_price,
            current_price: row.current_price,
            buy_now_price: row.buy_now_price,
            min_bid_increment: row.min_bid_increment,
            status,
            end_time: row.end_time,
            last_bidder_id: row.last_bidder_id,
            winner_id: row.winner_id,
            version: row.version,
            created_at: row.created_at,
        })
    }
}
// endregion: --- Row Mapping

// region:    --- Postgres Store
pub struct PostgresAuctionStore {
    db_manager: Arc<DatabaseManager>,
}

impl PostgresAuctionStore {
    pub fn new(db_manager: Arc<DatabaseManager>) -> Self {
        Self { db_manager }
    }
}

#[async_trait]
impl AuctionStore for PostgresAuctionStore {
    async fn insert_auction(&self, auction: Auction) -> Result<Auction, StoreError> {
        info!("{:<12} --> insert auction: {}", "Store", auction.title);
        let row = sqlx::query_as::<_, AuctionRow>(queries::INSERT_AUCTION)
            .bind(&auction.title)
            .bind(&auction.description)
            .bind(&auction.seller_id)
            .bind(auction.start_price)
            .bind(auction.current_price)
            .bind(auction.buy_now_price)
            .bind(auction.min_bid_increment)
            .bind(auction.status.as_str())
            .bind(auction.end_time)
            .bind(&auction.last_bidder_id)
            .bind(&auction.winner_id)
            .bind(auction.version)
            .bind(auction.created_at)
            .fetch_one(self.db_manager.pool())
            .await?;
        row.try_into()
    }

    async fn get_auction(&self, id: i64) -> Result<Auction, StoreError> {
        let row = sqlx::query_as::<_, AuctionRow>(queries::GET_AUCTION)
            .bind(id)
            .fetch_optional(self.db_manager.pool())
            .await?
            .ok_or(StoreError::NotFound)?;
        row.try_into()
    }

    async fn list_auctions(&self) -> Result<Vec<Auction>, StoreError> {
        let rows = sqlx::query_as::<_, AuctionRow>(queries::LIST_AUCTIONS)
            .fetch_all(self.db_manager.pool())
            .await?;
        rows.into_iter().map(Auction::try_from).collect()
    }

    async fn conditional_update(
        &self,
        id: i64,
        expected_version: i64,
        patch: AuctionPatch,
        bid: Option<NewBid>,
    ) -> Result<Auction, StoreError> {
        self.db_manager
            .transaction(|tx| {
                Box::pin(async move {
                    let row = sqlx::query_as::<_, AuctionRow>(queries::CONDITIONAL_UPDATE_AUCTION)
                        .bind(id)
                        .bind(expected_version)
                        .bind(patch.current_price)
                        .bind(patch.last_bidder_id.as_deref())
                        .bind(patch.status.map(|s| s.as_str()))
                        .bind(patch.winner_id.as_deref())
                        .bind(patch.end_time)
                        .fetch_optional(&mut **tx)
                        .await?;

                    let row = match row {
                        Some(row) => row,
                        None => {
                            // No row updated: either the auction is gone or
                            // someone else committed this version first.
                            let exists = sqlx::query(queries::AUCTION_EXISTS)
                                .bind(id)
                                .fetch_optional(&mut **tx)
                                .await?
                                .is_some();
                            return Err(if exists {
                                StoreError::VersionConflict
                            } else {
                                StoreError::NotFound
                            });
                        }
                    };

                    if let Some(bid) = bid {
                        sqlx::query(queries::INSERT_BID)
                            .bind(bid.auction_id)
                            .bind(&bid.bidder_id)
                            .bind(&bid.bidder_name)
                            .bind(bid.amount)
                            .bind(bid.is_buy_now)
                            .bind(bid.created_at)
                            .execute(&mut **tx)
                            .await?;
                    }

                    row.try_into()
                })
            })
            .await
    }

    async fn list_bids(&self, auction_id: i64) -> Result<Vec<Bid>, StoreError> {
        let bids = sqlx::query_as::<_, Bid>(queries::LIST_BIDS)
            .bind(auction_id)
            .fetch_all(self.db_manager.pool())
            .await?;
        Ok(bids)
    }

    async fn list_expired_active(&self, now: DateTime<Utc>) -> Result<Vec<i64>, StoreError> {
        let ids = sqlx::query_scalar::<_, i64>(queries::LIST_EXPIRED_ACTIVE)
            .bind(now)
            .fetch_all(self.db_manager.pool())
            .await?;
        Ok(ids)
    }
}
// endregion: --- Postgres Store
