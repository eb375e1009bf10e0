use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Change events broadcast to viewers after a commit.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum AuctionEvent {
    // A bid was accepted and the current price moved
    BidAccepted {
        auction_id: i64,
        bidder_id: String,
        amount: i64,
        timestamp: DateTime<Utc>,
    },
    // Buy-now settled the auction
    AuctionSold {
        auction_id: i64,
        winner_id: String,
        price: i64,
        timestamp: DateTime<Utc>,
    },
    // End time passed without a sale
    AuctionExpired {
        auction_id: i64,
        winner_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl AuctionEvent {
    pub fn auction_id(&self) -> i64 {
        match self {
            AuctionEvent::BidAccepted { auction_id, .. }
            | AuctionEvent::AuctionSold { auction_id, .. }
            | AuctionEvent::AuctionExpired { auction_id, .. } => *auction_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuctionEvent::BidAccepted { .. } => "BidAccepted",
            AuctionEvent::AuctionSold { .. } => "AuctionSold",
            AuctionEvent::AuctionExpired { .. } => "AuctionExpired",
        }
    }
}
