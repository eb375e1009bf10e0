// region:    --- Imports
use super::{AuctionPatch, AuctionStore, StoreError};
use crate::auction::model::{Auction, AuctionStatus, Bid, NewBid};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

// endregion: --- Imports

// region:    --- Memory Store
/// In-memory store with the same conditional-write semantics as the
/// Postgres store. Backs the unit and property tests; no database needed.
#[derive(Default)]
pub struct MemoryAuctionStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    auctions: HashMap<i64, Auction>,
    bids: Vec<Bid>,
    next_auction_id: i64,
    next_bid_id: i64,
}

impl MemoryAuctionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuctionStore for MemoryAuctionStore {
    async fn insert_auction(&self, mut auction: Auction) -> Result<Auction, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_auction_id += 1;
        auction.id = inner.next_auction_id;
        inner.auctions.insert(auction.id, auction.clone());
        Ok(auction)
    }

    async fn get_auction(&self, id: i64) -> Result<Auction, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner.auctions.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_auctions(&self) -> Result<Vec<Auction>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut auctions: Vec<Auction> = inner.auctions.values().cloned().collect();
        auctions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(auctions)
    }

    async fn conditional_update(
        &self,
        id: i64,
        expected_version: i64,
        patch: AuctionPatch,
        bid: Option<NewBid>,
    ) -> Result<Auction, StoreError> {
        // Single lock span makes the compare-and-swap atomic, mirroring the
        // guarded UPDATE in the Postgres store.
        let mut inner = self.inner.lock().unwrap();
        let auction = inner.auctions.get_mut(&id).ok_or(StoreError::NotFound)?;
        if auction.version != expected_version {
            return Err(StoreError::VersionConflict);
        }

        if let Some(price) = patch.current_price {
            auction.current_price = Some(price);
        }
        if let Some(bidder) = patch.last_bidder_id {
            auction.last_bidder_id = Some(bidder);
        }
        if let Some(status) = patch.status {
            auction.status = status;
        }
        if let Some(winner) = patch.winner_id {
            auction.winner_id = Some(winner);
        }
        if let Some(end_time) = patch.end_time {
            auction.end_time = end_time;
        }
        auction.version += 1;
        let updated = auction.clone();

        if let Some(bid) = bid {
            inner.next_bid_id += 1;
            let id = inner.next_bid_id;
            inner.bids.push(Bid {
                id,
                auction_id: bid.auction_id,
                bidder_id: bid.bidder_id,
                bidder_name: bid.bidder_name,
                amount: bid.amount,
                is_buy_now: bid.is_buy_now,
                created_at: bid.created_at,
            });
        }

        Ok(updated)
    }

    async fn list_bids(&self, auction_id: i64) -> Result<Vec<Bid>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut bids: Vec<Bid> = inner
            .bids
            .iter()
            .filter(|b| b.auction_id == auction_id)
            .cloned()
            .collect();
        bids.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(bids)
    }

    async fn list_expired_active(&self, now: DateTime<Utc>) -> Result<Vec<i64>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .auctions
            .values()
            .filter(|a| a.status == AuctionStatus::Active && a.end_time <= now)
            .map(|a| a.id)
            .collect())
    }
}
// endregion: --- Memory Store
