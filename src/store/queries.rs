/// Insert a new listing
pub const INSERT_AUCTION: &str = r#"
    INSERT INTO auctions (title, description, seller_id, start_price, current_price,
                          buy_now_price, min_bid_increment, status, end_time,
                          last_bidder_id, winner_id, version, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
    RETURNING id, title, description, seller_id, start_price, current_price,
              buy_now_price, min_bid_increment, status, end_time,
              last_bidder_id, winner_id, version, created_at
"#;

/// Fetch a single auction
pub const GET_AUCTION: &str = r#"
    SELECT id, title, description, seller_id, start_price, current_price,
           buy_now_price, min_bid_increment, status, end_time,
           last_bidder_id, winner_id, version, created_at
    FROM auctions
    WHERE id = $1
"#;

/// All auctions, newest first (history view includes sold)
pub const LIST_AUCTIONS: &str = r#"
    SELECT id, title, description, seller_id, start_price, current_price,
           buy_now_price, min_bid_increment, status, end_time,
           last_bidder_id, winner_id, version, created_at
    FROM auctions
    ORDER BY created_at DESC
"#;

/// Guarded read-modify-write: commits only when the stored version still
/// matches, and bumps the version in the same statement
pub const CONDITIONAL_UPDATE_AUCTION: &str = r#"
    UPDATE auctions
    SET current_price  = COALESCE($3, current_price),
        last_bidder_id = COALESCE($4, last_bidder_id),
        status         = COALESCE($5, status),
        winner_id      = COALESCE($6, winner_id),
        end_time       = COALESCE($7, end_time),
        version        = version + 1
    WHERE id = $1 AND version = $2
    RETURNING id, title, description, seller_id, start_price, current_price,
              buy_now_price, min_bid_increment, status, end_time,
              last_bidder_id, winner_id, version, created_at
"#;

/// Existence probe, to tell a version conflict apart from a missing row
pub const AUCTION_EXISTS: &str = "SELECT 1 FROM auctions WHERE id = $1";

/// Append a bid to the audit log
pub const INSERT_BID: &str = r#"
    INSERT INTO bids (auction_id, bidder_id, bidder_name, amount, is_buy_now, created_at)
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

/// Bid history, newest first
pub const LIST_BIDS: &str = r#"
    SELECT id, auction_id, bidder_id, bidder_name, amount, is_buy_now, created_at
    FROM bids
    WHERE auction_id = $1
    ORDER BY created_at DESC, id DESC
"#;

/// Expiry-sweep candidates
pub const LIST_EXPIRED_ACTIVE: &str =
    "SELECT id FROM auctions WHERE status = 'ACTIVE' AND end_time <= $1";
