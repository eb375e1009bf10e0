use crate::store::StoreError;
use thiserror::Error;

/// Outcomes of bid, buy-now, expiry and listing operations that a client is
/// expected to handle. Each rejection carries enough to explain itself
/// without another round trip.
#[derive(Debug, Error)]
pub enum BidError {
    #[error("auction not found")]
    AuctionNotFound,

    /// Auction reached a terminal status.
    #[error("auction is closed")]
    AuctionClosed,

    /// End time has passed, even if the stored status still says active.
    #[error("auction has expired")]
    AuctionExpired,

    #[error("sellers may not bid on or buy their own auction")]
    SelfBidNotAllowed,

    #[error("bid amount must be positive")]
    InvalidAmount,

    #[error("bid is below the minimum acceptable amount of {minimum}")]
    BidTooLow { minimum: i64 },

    /// Another buyer already settled the auction.
    #[error("auction has already been sold")]
    AlreadySold,

    /// No buy-now price, or bidding already met/exceeded it.
    #[error("buy-now is not available for this auction")]
    BuyNowUnavailable,

    #[error("end time must be in the future")]
    InvalidEndTime,

    /// Version-conflict retries exhausted; safe for the caller to retry.
    #[error("too many concurrent updates, try again")]
    Contention,

    #[error("storage unavailable")]
    Storage(#[source] StoreError),
}

impl BidError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            BidError::AuctionNotFound => "AUCTION_NOT_FOUND",
            BidError::AuctionClosed => "AUCTION_CLOSED",
            BidError::AuctionExpired => "AUCTION_EXPIRED",
            BidError::SelfBidNotAllowed => "SELF_BID_NOT_ALLOWED",
            BidError::InvalidAmount => "INVALID_AMOUNT",
            BidError::BidTooLow { .. } => "BID_TOO_LOW",
            BidError::AlreadySold => "ALREADY_SOLD",
            BidError::BuyNowUnavailable => "BUY_NOW_UNAVAILABLE",
            BidError::InvalidEndTime => "INVALID_END_TIME",
            BidError::Contention => "CONTENTION",
            BidError::Storage(_) => "STORAGE_UNAVAILABLE",
        }
    }
}
