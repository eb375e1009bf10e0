/// Settlement commands over the auction record.
/// 1. place bid
/// 2. buy now
/// 3. resolve expiry
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::auction::model::{
    Auction, AuctionStatus, Bid, NewAuction, NewBid, DEFAULT_BID_INCREMENT,
};
use crate::bidding::error::BidError;
use crate::bidding::validator::{validate_bid, validate_buy_now};
use crate::clock::Clock;
use crate::message_broker::EventPublisher;
use crate::store::{AuctionPatch, AuctionStore, StoreError};
use tracing::{error, info, warn};

// endregion: --- Imports

// region:    --- Settlement Engine

/// Conflict retries per mutating request. Each retry re-reads the snapshot
/// and re-runs full validation; exhaustion surfaces as `Contention`.
const MAX_RETRIES: u32 = 3;

/// Applies accepted bids, buy-now purchases and expiry to the auction
/// record. The only writer during active bidding; correctness rests on the
/// store's conditional update, not on in-process locks, so multiple service
/// instances stay safe.
pub struct SettlementEngine<S, P, C> {
    store: S,
    publisher: P,
    clock: C,
}

impl<S, P, C> SettlementEngine<S, P, C>
where
    S: AuctionStore,
    P: EventPublisher,
    C: Clock,
{
    pub fn new(store: S, publisher: P, clock: C) -> Self {
        Self {
            store,
            publisher,
            clock,
        }
    }

    /// Create a listing with a validated starting state.
    pub async fn create_auction(&self, new: NewAuction) -> Result<Auction, BidError> {
        let now = self.clock.now();
        if new.end_time <= now {
            return Err(BidError::InvalidEndTime);
        }
        if new.start_price.is_some_and(|p| p < 0)
            || new.buy_now_price.is_some_and(|p| p <= 0)
            || new.min_bid_increment.is_some_and(|i| i <= 0)
        {
            return Err(BidError::InvalidAmount);
        }

        let auction = Auction {
            id: 0, // store assigns
            title: new.title,
            description: new.description,
            seller_id: new.seller_id,
            start_price: new.start_price,
            current_price: new.start_price,
            buy_now_price: new.buy_now_price,
            min_bid_increment: new.min_bid_increment.unwrap_or(DEFAULT_BID_INCREMENT),
            status: AuctionStatus::Active,
            end_time: new.end_time,
            last_bidder_id: None,
            winner_id: None,
            version: 0,
            created_at: now,
        };
        let auction = self
            .store
            .insert_auction(auction)
            .await
            .map_err(map_store_error)?;
        info!(
            "{:<12} --> listing created: id={} end_time={}",
            "Settlement", auction.id, auction.end_time
        );
        Ok(auction)
    }

    /// 1. Place an ascending bid.
    pub async fn place_bid(
        &self,
        auction_id: i64,
        bidder_id: &str,
        bidder_name: &str,
        amount: i64,
    ) -> Result<Auction, BidError> {
        info!(
            "{:<12} --> bid: auction={} bidder={} amount={}",
            "Settlement", auction_id, bidder_id, amount
        );

        let mut retries = 0;
        while retries < MAX_RETRIES {
            let snapshot = self
                .store
                .get_auction(auction_id)
                .await
                .map_err(map_store_error)?;
            let now = self.clock.now();
            validate_bid(&snapshot, bidder_id, amount, now)?;

            let patch = AuctionPatch {
                current_price: Some(amount),
                last_bidder_id: Some(bidder_id.to_owned()),
                ..Default::default()
            };
            let bid = NewBid {
                auction_id,
                bidder_id: bidder_id.to_owned(),
                bidder_name: bidder_name.to_owned(),
                amount,
                is_buy_now: false,
                created_at: now,
            };

            match self
                .store
                .conditional_update(auction_id, snapshot.version, patch, Some(bid))
                .await
            {
                Ok(updated) => {
                    // Crossing the buy-now price through ordinary bidding is
                    // observational only: the auction stays open and the
                    // fixed-price track becomes moot.
                    if updated
                        .buy_now_price
                        .is_some_and(|buy_now| amount >= buy_now)
                    {
                        warn!(
                            "{:<12} --> auction {} current price {} meets buy-now price; staying open",
                            "Settlement", auction_id, amount
                        );
                    }
                    self.publish(AuctionEvent::BidAccepted {
                        auction_id,
                        bidder_id: bidder_id.to_owned(),
                        amount,
                        timestamp: now,
                    })
                    .await;
                    return Ok(updated);
                }
                Err(StoreError::VersionConflict) => {
                    warn!(
                        "{:<12} --> version conflict on auction {}, re-validating",
                        "Settlement", auction_id
                    );
                    retries += 1;
                }
                Err(e) => return Err(map_store_error(e)),
            }
        }

        Err(BidError::Contention)
    }

    /// 2. Buy now: settle immediately at the fixed price.
    pub async fn buy_now(
        &self,
        auction_id: i64,
        buyer_id: &str,
        buyer_name: &str,
    ) -> Result<Auction, BidError> {
        info!(
            "{:<12} --> buy-now: auction={} buyer={}",
            "Settlement", auction_id, buyer_id
        );

        let mut retries = 0;
        while retries < MAX_RETRIES {
            let snapshot = self
                .store
                .get_auction(auction_id)
                .await
                .map_err(map_store_error)?;
            let now = self.clock.now();
            let price = validate_buy_now(&snapshot, buyer_id, now)?;

            let patch = AuctionPatch {
                current_price: Some(price),
                status: Some(AuctionStatus::Sold),
                winner_id: Some(buyer_id.to_owned()),
                end_time: Some(now),
                ..Default::default()
            };
            let bid = NewBid {
                auction_id,
                bidder_id: buyer_id.to_owned(),
                bidder_name: buyer_name.to_owned(),
                amount: price,
                is_buy_now: true,
                created_at: now,
            };

            match self
                .store
                .conditional_update(auction_id, snapshot.version, patch, Some(bid))
                .await
            {
                Ok(updated) => {
                    self.publish(AuctionEvent::AuctionSold {
                        auction_id,
                        winner_id: buyer_id.to_owned(),
                        price,
                        timestamp: now,
                    })
                    .await;
                    return Ok(updated);
                }
                Err(StoreError::VersionConflict) => {
                    // A concurrent buy-now or bid committed first; the next
                    // pass re-validates and reports AlreadySold or
                    // BuyNowUnavailable against the fresh snapshot.
                    warn!(
                        "{:<12} --> version conflict on auction {}, re-validating",
                        "Settlement", auction_id
                    );
                    retries += 1;
                }
                Err(e) => return Err(map_store_error(e)),
            }
        }

        Err(BidError::Contention)
    }

    /// 3. Finalize an auction whose end time passed without a sale.
    /// Idempotent: a terminal or still-running auction is returned untouched.
    pub async fn resolve_expired(&self, auction_id: i64) -> Result<Auction, BidError> {
        let mut retries = 0;
        while retries < MAX_RETRIES {
            let snapshot = self
                .store
                .get_auction(auction_id)
                .await
                .map_err(map_store_error)?;
            if snapshot.status.is_terminal() || self.clock.now() < snapshot.end_time {
                return Ok(snapshot);
            }

            // Highest bidder wins at the last accepted price; no bids means
            // the auction closes with no winner.
            let winner = snapshot.last_bidder_id.clone();
            let patch = AuctionPatch {
                status: Some(AuctionStatus::Expired),
                winner_id: winner,
                ..Default::default()
            };

            match self
                .store
                .conditional_update(auction_id, snapshot.version, patch, None)
                .await
            {
                Ok(updated) => {
                    info!(
                        "{:<12} --> auction {} expired, winner: {:?}",
                        "Settlement", auction_id, updated.winner_id
                    );
                    self.publish(AuctionEvent::AuctionExpired {
                        auction_id,
                        winner_id: updated.winner_id.clone(),
                        timestamp: self.clock.now(),
                    })
                    .await;
                    return Ok(updated);
                }
                Err(StoreError::VersionConflict) => {
                    // Lost the version race to a last-moment bid or buy-now;
                    // re-read and decide against the new state.
                    retries += 1;
                }
                Err(e) => return Err(map_store_error(e)),
            }
        }

        Err(BidError::Contention)
    }

    /// Snapshot read; resolves expiry lazily so a stale `active` flag is
    /// never served past the end time.
    pub async fn get_auction(&self, auction_id: i64) -> Result<Auction, BidError> {
        let snapshot = self
            .store
            .get_auction(auction_id)
            .await
            .map_err(map_store_error)?;
        if snapshot.status == AuctionStatus::Active && self.clock.now() >= snapshot.end_time {
            return self.resolve_expired(auction_id).await;
        }
        Ok(snapshot)
    }

    pub async fn list_auctions(&self) -> Result<Vec<Auction>, BidError> {
        self.store.list_auctions().await.map_err(map_store_error)
    }

    /// Bid history, newest first.
    pub async fn list_bids(&self, auction_id: i64) -> Result<Vec<Bid>, BidError> {
        self.store
            .list_bids(auction_id)
            .await
            .map_err(map_store_error)
    }

    /// Move the deadline of an active auction. The new end time must still
    /// be in the future at the moment of the edit.
    pub async fn reschedule(
        &self,
        auction_id: i64,
        new_end_time: chrono::DateTime<chrono::Utc>,
    ) -> Result<Auction, BidError> {
        let mut retries = 0;
        while retries < MAX_RETRIES {
            let snapshot = self
                .store
                .get_auction(auction_id)
                .await
                .map_err(map_store_error)?;
            if snapshot.status.is_terminal() {
                return Err(BidError::AuctionClosed);
            }
            if new_end_time <= self.clock.now() {
                return Err(BidError::InvalidEndTime);
            }

            let patch = AuctionPatch {
                end_time: Some(new_end_time),
                ..Default::default()
            };
            match self
                .store
                .conditional_update(auction_id, snapshot.version, patch, None)
                .await
            {
                Ok(updated) => return Ok(updated),
                Err(StoreError::VersionConflict) => retries += 1,
                Err(e) => return Err(map_store_error(e)),
            }
        }

        Err(BidError::Contention)
    }

    /// One pass of the expiry sweep. Returns how many auctions were pushed
    /// to a terminal state.
    pub async fn sweep_expired(&self) -> Result<usize, BidError> {
        let now = self.clock.now();
        let candidates = self
            .store
            .list_expired_active(now)
            .await
            .map_err(map_store_error)?;

        let mut resolved = 0;
        for auction_id in candidates {
            match self.resolve_expired(auction_id).await {
                Ok(auction) if auction.status == AuctionStatus::Expired => resolved += 1,
                Ok(_) => {} // settled by a racing buy-now; nothing to do
                Err(e) => error!(
                    "{:<12} --> failed to resolve auction {}: {:?}",
                    "Settlement", auction_id, e
                ),
            }
        }
        Ok(resolved)
    }

    /// Broadcast is best effort: the commit already happened, a delivery
    /// failure must not unwind it.
    async fn publish(&self, event: AuctionEvent) {
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(
                "{:<12} --> failed to publish {} for auction {}: {}",
                "Settlement",
                event.kind(),
                event.auction_id(),
                e
            );
        }
    }
}

fn map_store_error(e: StoreError) -> BidError {
    match e {
        StoreError::NotFound => BidError::AuctionNotFound,
        // Conflicts are handled by the retry loops; one that leaks out is
        // contention.
        StoreError::VersionConflict => BidError::Contention,
        e => BidError::Storage(e),
    }
}

// endregion: --- Settlement Engine

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryAuctionStore;
    use chrono::Duration;
    use std::sync::Mutex;

    /// Captures published events for assertions.
    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<AuctionEvent>>,
    }

    #[async_trait::async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, event: &AuctionEvent) -> Result<(), String> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    impl RecordingPublisher {
        fn kinds(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
        }
    }

    type TestEngine = SettlementEngine<MemoryAuctionStore, RecordingPublisher, FixedClock>;

    fn engine() -> TestEngine {
        SettlementEngine::new(
            MemoryAuctionStore::new(),
            RecordingPublisher::default(),
            FixedClock::at_epoch_secs(1_700_000_000),
        )
    }

    fn listing(engine: &TestEngine) -> NewAuction {
        NewAuction {
            title: "record player".into(),
            description: "plays 33 and 45".into(),
            seller_id: "seller".into(),
            start_price: Some(100),
            buy_now_price: Some(500),
            min_bid_increment: Some(20),
            end_time: engine.clock.now() + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn accepted_bid_moves_price_and_appends_history() {
        let engine = engine();
        let auction = engine.create_auction(listing(&engine)).await.unwrap();

        let updated = engine
            .place_bid(auction.id, "alice", "Alice", 120)
            .await
            .unwrap();
        assert_eq!(updated.current_price, Some(120));
        assert_eq!(updated.last_bidder_id.as_deref(), Some("alice"));
        assert_eq!(updated.version, auction.version + 1);
        assert_eq!(updated.status, AuctionStatus::Active);

        let bids = engine.list_bids(auction.id).await.unwrap();
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].amount, 120);
        assert!(!bids[0].is_buy_now);
        assert_eq!(engine.publisher.kinds(), vec!["BidAccepted"]);
    }

    #[tokio::test]
    async fn rejected_bid_leaves_no_trace() {
        let engine = engine();
        let auction = engine.create_auction(listing(&engine)).await.unwrap();

        let err = engine
            .place_bid(auction.id, "alice", "Alice", 119)
            .await
            .unwrap_err();
        assert!(matches!(err, BidError::BidTooLow { minimum: 120 }));

        let unchanged = engine.get_auction(auction.id).await.unwrap();
        assert_eq!(unchanged.current_price, Some(100));
        assert_eq!(unchanged.version, auction.version);
        assert!(engine.list_bids(auction.id).await.unwrap().is_empty());
        assert!(engine.publisher.kinds().is_empty());
    }

    #[tokio::test]
    async fn seller_cannot_bid_on_own_listing() {
        let engine = engine();
        let auction = engine.create_auction(listing(&engine)).await.unwrap();

        let err = engine
            .place_bid(auction.id, "seller", "Seller", 200)
            .await
            .unwrap_err();
        assert!(matches!(err, BidError::SelfBidNotAllowed));
        let unchanged = engine.get_auction(auction.id).await.unwrap();
        assert!(unchanged.last_bidder_id.is_none());
    }

    #[tokio::test]
    async fn bidding_past_buy_now_keeps_the_auction_open() {
        let engine = engine();
        let auction = engine.create_auction(listing(&engine)).await.unwrap();

        let updated = engine
            .place_bid(auction.id, "alice", "Alice", 600)
            .await
            .unwrap();
        assert_eq!(updated.status, AuctionStatus::Active);
        assert_eq!(updated.current_price, Some(600));

        // bidding continues, but the buy-now track is now unavailable
        let further = engine
            .place_bid(auction.id, "bob", "Bob", 620)
            .await
            .unwrap();
        assert_eq!(further.current_price, Some(620));
        let err = engine
            .buy_now(auction.id, "carol", "Carol")
            .await
            .unwrap_err();
        assert!(matches!(err, BidError::BuyNowUnavailable));
    }

    #[tokio::test]
    async fn buy_now_settles_a_bidless_auction() {
        let engine = engine();
        let mut new = listing(&engine);
        new.start_price = None; // buy-now-only listing, no price floor
        let auction = engine.create_auction(new).await.unwrap();
        assert_eq!(auction.current_price, None);

        let sold = engine.buy_now(auction.id, "bob", "Bob").await.unwrap();
        assert_eq!(sold.status, AuctionStatus::Sold);
        assert_eq!(sold.current_price, Some(500));
        assert_eq!(sold.winner_id.as_deref(), Some("bob"));
        assert_eq!(sold.end_time, engine.clock.now());

        let bids = engine.list_bids(auction.id).await.unwrap();
        assert_eq!(bids.len(), 1);
        assert!(bids[0].is_buy_now);
        assert_eq!(engine.publisher.kinds(), vec!["AuctionSold"]);
    }

    #[tokio::test]
    async fn second_buy_now_gets_already_sold() {
        let engine = engine();
        let auction = engine.create_auction(listing(&engine)).await.unwrap();

        engine.buy_now(auction.id, "bob", "Bob").await.unwrap();
        let err = engine
            .buy_now(auction.id, "carol", "Carol")
            .await
            .unwrap_err();
        assert!(matches!(err, BidError::AlreadySold));

        let unchanged = engine.get_auction(auction.id).await.unwrap();
        assert_eq!(unchanged.winner_id.as_deref(), Some("bob"));
        assert_eq!(engine.list_bids(auction.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bids_after_sale_are_rejected_without_mutation() {
        let engine = engine();
        let auction = engine.create_auction(listing(&engine)).await.unwrap();
        let sold = engine.buy_now(auction.id, "bob", "Bob").await.unwrap();

        let err = engine
            .place_bid(auction.id, "alice", "Alice", 700)
            .await
            .unwrap_err();
        assert!(matches!(err, BidError::AuctionClosed));

        let unchanged = engine.store.get_auction(auction.id).await.unwrap();
        assert_eq!(unchanged.version, sold.version);
        assert_eq!(unchanged.current_price, sold.current_price);
    }

    #[tokio::test]
    async fn expired_auction_rejects_bids_even_while_flag_says_active() {
        let engine = engine();
        let auction = engine.create_auction(listing(&engine)).await.unwrap();
        engine
            .place_bid(auction.id, "alice", "Alice", 120)
            .await
            .unwrap();

        engine.clock.advance(Duration::hours(2));
        let err = engine
            .place_bid(auction.id, "bob", "Bob", 200)
            .await
            .unwrap_err();
        assert!(matches!(err, BidError::AuctionExpired));
        let err = engine.buy_now(auction.id, "bob", "Bob").await.unwrap_err();
        assert!(matches!(err, BidError::AuctionExpired));
    }

    #[tokio::test]
    async fn expiry_awards_the_highest_bidder() {
        let engine = engine();
        let auction = engine.create_auction(listing(&engine)).await.unwrap();
        engine
            .place_bid(auction.id, "alice", "Alice", 120)
            .await
            .unwrap();
        engine.place_bid(auction.id, "bob", "Bob", 150).await.unwrap();

        engine.clock.advance(Duration::hours(2));
        let resolved = engine.resolve_expired(auction.id).await.unwrap();
        assert_eq!(resolved.status, AuctionStatus::Expired);
        assert_eq!(resolved.winner_id.as_deref(), Some("bob"));
        assert_eq!(resolved.current_price, Some(150));
        assert_eq!(
            engine.publisher.kinds(),
            vec!["BidAccepted", "BidAccepted", "AuctionExpired"]
        );
    }

    #[tokio::test]
    async fn expiry_without_bids_has_no_winner() {
        let engine = engine();
        let auction = engine.create_auction(listing(&engine)).await.unwrap();

        engine.clock.advance(Duration::hours(2));
        let resolved = engine.resolve_expired(auction.id).await.unwrap();
        assert_eq!(resolved.status, AuctionStatus::Expired);
        assert!(resolved.winner_id.is_none());
    }

    #[tokio::test]
    async fn resolve_expired_is_idempotent() {
        let engine = engine();
        let auction = engine.create_auction(listing(&engine)).await.unwrap();
        engine
            .place_bid(auction.id, "alice", "Alice", 120)
            .await
            .unwrap();

        engine.clock.advance(Duration::hours(2));
        let first = engine.resolve_expired(auction.id).await.unwrap();
        let second = engine.resolve_expired(auction.id).await.unwrap();
        assert_eq!(first.version, second.version);
        assert_eq!(first.winner_id, second.winner_id);
        assert_eq!(engine.list_bids(auction.id).await.unwrap().len(), 1);
        // only one AuctionExpired event for the one transition
        assert_eq!(
            engine.publisher.kinds(),
            vec!["BidAccepted", "AuctionExpired"]
        );
    }

    #[tokio::test]
    async fn resolve_expired_is_a_noop_on_running_and_sold_auctions() {
        let engine = engine();
        let auction = engine.create_auction(listing(&engine)).await.unwrap();

        let untouched = engine.resolve_expired(auction.id).await.unwrap();
        assert_eq!(untouched.status, AuctionStatus::Active);

        let sold = engine.buy_now(auction.id, "bob", "Bob").await.unwrap();
        engine.clock.advance(Duration::hours(2));
        let resolved = engine.resolve_expired(auction.id).await.unwrap();
        assert_eq!(resolved.status, AuctionStatus::Sold);
        assert_eq!(resolved.version, sold.version);
    }

    #[tokio::test]
    async fn get_auction_resolves_expiry_lazily() {
        let engine = engine();
        let auction = engine.create_auction(listing(&engine)).await.unwrap();
        engine
            .place_bid(auction.id, "alice", "Alice", 120)
            .await
            .unwrap();

        engine.clock.advance(Duration::hours(2));
        let read = engine.get_auction(auction.id).await.unwrap();
        assert_eq!(read.status, AuctionStatus::Expired);
        assert_eq!(read.winner_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn sweep_finalizes_all_overdue_auctions() {
        let engine = engine();
        let first = engine.create_auction(listing(&engine)).await.unwrap();
        let second = engine.create_auction(listing(&engine)).await.unwrap();
        let mut far_out = listing(&engine);
        far_out.end_time = engine.clock.now() + Duration::days(7);
        let third = engine.create_auction(far_out).await.unwrap();

        engine.clock.advance(Duration::hours(2));
        let resolved = engine.sweep_expired().await.unwrap();
        assert_eq!(resolved, 2);

        for id in [first.id, second.id] {
            let auction = engine.store.get_auction(id).await.unwrap();
            assert_eq!(auction.status, AuctionStatus::Expired);
        }
        let running = engine.store.get_auction(third.id).await.unwrap();
        assert_eq!(running.status, AuctionStatus::Active);
    }

    #[tokio::test]
    async fn create_auction_rejects_past_end_time() {
        let engine = engine();
        let mut new = listing(&engine);
        new.end_time = engine.clock.now() - Duration::minutes(1);
        let err = engine.create_auction(new).await.unwrap_err();
        assert!(matches!(err, BidError::InvalidEndTime));
    }

    #[tokio::test]
    async fn reschedule_requires_future_end_time_and_active_status() {
        let engine = engine();
        let auction = engine.create_auction(listing(&engine)).await.unwrap();

        let later = engine.clock.now() + Duration::hours(3);
        let updated = engine.reschedule(auction.id, later).await.unwrap();
        assert_eq!(updated.end_time, later);

        let err = engine
            .reschedule(auction.id, engine.clock.now() - Duration::minutes(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BidError::InvalidEndTime));

        engine.buy_now(auction.id, "bob", "Bob").await.unwrap();
        let err = engine
            .reschedule(auction.id, engine.clock.now() + Duration::hours(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BidError::AuctionClosed));
    }

    #[tokio::test]
    async fn unknown_auction_reports_not_found() {
        let engine = engine();
        let err = engine
            .place_bid(42, "alice", "Alice", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, BidError::AuctionNotFound));
        let err = engine.buy_now(42, "bob", "Bob").await.unwrap_err();
        assert!(matches!(err, BidError::AuctionNotFound));
    }
}
// endregion: --- Tests
