use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Increment applied when a listing does not carry its own.
pub const DEFAULT_BID_INCREMENT: i64 = 20;

/// Auction lifecycle status. `Sold` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionStatus {
    Active,
    Sold,
    Expired,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Active => "ACTIVE",
            AuctionStatus::Sold => "SOLD",
            AuctionStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(AuctionStatus::Active),
            "SOLD" => Some(AuctionStatus::Sold),
            "EXPIRED" => Some(AuctionStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AuctionStatus::Sold | AuctionStatus::Expired)
    }
}

// Auction record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub seller_id: String,
    /// Price set at listing creation; seeds `current_price`.
    pub start_price: Option<i64>,
    /// None means no bids yet and no starting price (legal for buy-now-only
    /// listings).
    pub current_price: Option<i64>,
    pub buy_now_price: Option<i64>,
    pub min_bid_increment: i64,
    pub status: AuctionStatus,
    pub end_time: DateTime<Utc>,
    pub last_bidder_id: Option<String>,
    pub winner_id: Option<String>,
    /// Optimistic-concurrency token; bumped on every accepted mutation.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Auction {
    /// Effective increment, falling back to the deployment default when the
    /// listing carries none.
    pub fn increment(&self) -> i64 {
        if self.min_bid_increment > 0 {
            self.min_bid_increment
        } else {
            DEFAULT_BID_INCREMENT
        }
    }

    /// Price floor a new bid is measured against.
    pub fn bid_floor(&self) -> i64 {
        self.current_price.or(self.start_price).unwrap_or(0)
    }

    /// Smallest amount the next bid may carry.
    pub fn min_acceptable_bid(&self) -> i64 {
        self.bid_floor() + self.increment()
    }
}

/// Input for listing creation; the store assigns id/version/created_at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuction {
    pub title: String,
    pub description: String,
    pub seller_id: String,
    pub start_price: Option<i64>,
    pub buy_now_price: Option<i64>,
    pub min_bid_increment: Option<i64>,
    pub end_time: DateTime<Utc>,
}

// Bid record. Immutable once written; bids form the per-auction audit log.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: String,
    /// Display-name snapshot taken at bid time.
    pub bidder_name: String,
    pub amount: i64,
    /// True for the audit record a buy-now settlement appends.
    pub is_buy_now: bool,
    pub created_at: DateTime<Utc>,
}

/// Bid awaiting insertion; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewBid {
    pub auction_id: i64,
    pub bidder_id: String,
    pub bidder_name: String,
    pub amount: i64,
    pub is_buy_now: bool,
    pub created_at: DateTime<Utc>,
}
