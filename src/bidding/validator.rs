/// Bid and buy-now admission rules.
/// Pure decisions over an auction snapshot; no I/O, caller supplies the time.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionStatus};
use crate::bidding::error::BidError;
use chrono::{DateTime, Utc};

// endregion: --- Imports

// region:    --- Validator

/// Decide whether `bidder_id` may place `amount` against this snapshot.
///
/// Expiry is derived from the clock, not only from the stored status: the
/// sweep may lag, and a nominally active auction whose end time has passed
/// must still reject bids.
pub fn validate_bid(
    auction: &Auction,
    bidder_id: &str,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<(), BidError> {
    if auction.status != AuctionStatus::Active {
        return Err(BidError::AuctionClosed);
    }
    if now >= auction.end_time {
        return Err(BidError::AuctionExpired);
    }
    if bidder_id == auction.seller_id {
        return Err(BidError::SelfBidNotAllowed);
    }
    if amount <= 0 {
        return Err(BidError::InvalidAmount);
    }
    let minimum = auction.min_acceptable_bid();
    if amount < minimum {
        return Err(BidError::BidTooLow { minimum });
    }
    Ok(())
}

/// Decide whether `buyer_id` may settle this snapshot at the buy-now price.
pub fn validate_buy_now(
    auction: &Auction,
    buyer_id: &str,
    now: DateTime<Utc>,
) -> Result<i64, BidError> {
    match auction.status {
        AuctionStatus::Sold => return Err(BidError::AlreadySold),
        AuctionStatus::Expired => return Err(BidError::AuctionClosed),
        AuctionStatus::Active => {}
    }
    if now >= auction.end_time {
        return Err(BidError::AuctionExpired);
    }
    if buyer_id == auction.seller_id {
        return Err(BidError::SelfBidNotAllowed);
    }
    let buy_now_price = auction.buy_now_price.ok_or(BidError::BuyNowUnavailable)?;
    // Bidding already met or passed the buy-now price; the fixed-price track
    // is moot.
    if auction.current_price.is_some_and(|p| p >= buy_now_price) {
        return Err(BidError::BuyNowUnavailable);
    }
    Ok(buy_now_price)
}

// endregion: --- Validator

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::model::DEFAULT_BID_INCREMENT;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
    }

    fn auction() -> Auction {
        Auction {
            id: 1,
            title: "vintage camera".into(),
            description: "working condition".into(),
            seller_id: "seller".into(),
            start_price: Some(100),
            current_price: Some(100),
            buy_now_price: Some(500),
            min_bid_increment: 20,
            status: AuctionStatus::Active,
            end_time: t0() + Duration::hours(1),
            last_bidder_id: None,
            winner_id: None,
            version: 0,
            created_at: t0() - Duration::hours(1),
        }
    }

    #[test]
    fn accepts_bid_at_exact_minimum() {
        let a = auction();
        assert!(validate_bid(&a, "bidder", 120, t0()).is_ok());
    }

    #[test]
    fn rejects_bid_below_minimum_with_required_amount() {
        let a = auction();
        match validate_bid(&a, "bidder", 119, t0()) {
            Err(BidError::BidTooLow { minimum }) => assert_eq!(minimum, 120),
            other => panic!("expected BidTooLow, got {:?}", other),
        }
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let a = auction();
        assert!(matches!(
            validate_bid(&a, "bidder", 0, t0()),
            Err(BidError::InvalidAmount)
        ));
        assert!(matches!(
            validate_bid(&a, "bidder", -50, t0()),
            Err(BidError::InvalidAmount)
        ));
    }

    #[test]
    fn rejects_seller_bidding_on_own_auction() {
        let a = auction();
        assert!(matches!(
            validate_bid(&a, "seller", 200, t0()),
            Err(BidError::SelfBidNotAllowed)
        ));
    }

    #[test]
    fn rejects_bid_on_terminal_status() {
        let mut a = auction();
        a.status = AuctionStatus::Sold;
        assert!(matches!(
            validate_bid(&a, "bidder", 200, t0()),
            Err(BidError::AuctionClosed)
        ));
        a.status = AuctionStatus::Expired;
        assert!(matches!(
            validate_bid(&a, "bidder", 200, t0()),
            Err(BidError::AuctionClosed)
        ));
    }

    #[test]
    fn expiry_is_time_derived_even_while_status_says_active() {
        let a = auction();
        let late = a.end_time + Duration::seconds(1);
        assert!(matches!(
            validate_bid(&a, "bidder", 200, late),
            Err(BidError::AuctionExpired)
        ));
        // exactly at end_time counts as expired
        assert!(matches!(
            validate_bid(&a, "bidder", 200, a.end_time),
            Err(BidError::AuctionExpired)
        ));
    }

    #[test]
    fn floor_falls_back_to_start_price_then_zero() {
        let mut a = auction();
        a.current_price = None;
        assert_eq!(a.min_acceptable_bid(), 120);
        a.start_price = None;
        assert_eq!(a.min_acceptable_bid(), 20);
        assert!(validate_bid(&a, "bidder", 20, t0()).is_ok());
    }

    #[test]
    fn zero_increment_falls_back_to_default() {
        let mut a = auction();
        a.min_bid_increment = 0;
        assert_eq!(a.increment(), DEFAULT_BID_INCREMENT);
        assert_eq!(a.min_acceptable_bid(), 100 + DEFAULT_BID_INCREMENT);
    }

    #[test]
    fn buy_now_accepted_when_price_below_buy_now() {
        let a = auction();
        assert_eq!(validate_buy_now(&a, "buyer", t0()).unwrap(), 500);
    }

    #[test]
    fn buy_now_accepted_with_no_bids_and_no_floor() {
        let mut a = auction();
        a.start_price = None;
        a.current_price = None;
        assert_eq!(validate_buy_now(&a, "buyer", t0()).unwrap(), 500);
    }

    #[test]
    fn buy_now_rejected_without_a_buy_now_price() {
        let mut a = auction();
        a.buy_now_price = None;
        assert!(matches!(
            validate_buy_now(&a, "buyer", t0()),
            Err(BidError::BuyNowUnavailable)
        ));
    }

    #[test]
    fn buy_now_rejected_once_bidding_reached_it() {
        let mut a = auction();
        a.current_price = Some(500);
        assert!(matches!(
            validate_buy_now(&a, "buyer", t0()),
            Err(BidError::BuyNowUnavailable)
        ));
    }

    #[test]
    fn buy_now_rejected_on_sold_auction() {
        let mut a = auction();
        a.status = AuctionStatus::Sold;
        assert!(matches!(
            validate_buy_now(&a, "buyer", t0()),
            Err(BidError::AlreadySold)
        ));
    }

    #[test]
    fn buy_now_rejected_for_seller() {
        let a = auction();
        assert!(matches!(
            validate_buy_now(&a, "seller", t0()),
            Err(BidError::SelfBidNotAllowed)
        ));
    }
}
// endregion: --- Tests
