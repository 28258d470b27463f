use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::player::Player;

/// Auction lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionStatus {
    /// Bidding open, countdown running
    Active,
    /// Settled with a winner
    Completed,
    /// Timer expired without a winning bid
    NoBids,
    /// Settlement reversed by an accepted appeal; bidding not yet re-opened
    AwaitingResume,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Active => "ACTIVE",
            AuctionStatus::Completed => "COMPLETED",
            AuctionStatus::NoBids => "NO_BIDS",
            AuctionStatus::AwaitingResume => "AWAITING_RESUME",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AuctionStatus::Completed | AuctionStatus::NoBids)
    }
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One bidding round for one player within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: Uuid,
    pub player: Player,
    pub nominator: String,
    pub base_price: Decimal,
    pub current_price: Decimal,
    pub status: AuctionStatus,
    pub opened_at: DateTime<Utc>,
}

impl Auction {
    pub fn open(player: Player, nominator: impl Into<String>, base_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            player,
            nominator: nominator.into(),
            base_price,
            current_price: base_price,
            status: AuctionStatus::Active,
            opened_at: Utc::now(),
        }
    }
}

/// Immutable append-only bid record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub auction_id: Uuid,
    pub bidder: String,
    pub amount: Decimal,
    /// Exactly one true bid per non-terminal auction.
    pub is_winning: bool,
    /// Set true only by a successful appeal.
    pub is_cancelled: bool,
    pub placed_at: DateTime<Utc>,
}

impl Bid {
    fn new(auction_id: Uuid, bidder: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            auction_id,
            bidder: bidder.into(),
            amount,
            is_winning: true,
            is_cancelled: false,
            placed_at: Utc::now(),
        }
    }
}

/// Append-only bid storage for one auction.
///
/// Bids are never removed; a reversed settlement marks its winning bid
/// cancelled and the book rolls back to the latest surviving bid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BidBook {
    bids: Vec<Bid>,
}

impl BidBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly accepted bid, demoting the previous winner.
    pub fn record_accepted(&mut self, auction_id: Uuid, bidder: &str, amount: Decimal) -> &Bid {
        for bid in self.bids.iter_mut() {
            bid.is_winning = false;
        }
        self.bids.push(Bid::new(auction_id, bidder, amount));
        self.bids.last().expect("bid just pushed")
    }

    /// The current winning bid, if any survives.
    pub fn winning_bid(&self) -> Option<&Bid> {
        self.bids.iter().find(|b| b.is_winning && !b.is_cancelled)
    }

    /// Cancel the winning bid (accepted appeal). Promotes the latest
    /// surviving earlier bid, if one exists, and returns the new winner.
    pub fn cancel_winning(&mut self) -> Option<&Bid> {
        if let Some(winner) = self
            .bids
            .iter_mut()
            .rev()
            .find(|b| b.is_winning && !b.is_cancelled)
        {
            winner.is_winning = false;
            winner.is_cancelled = true;
        }
        if let Some(last_valid) = self
            .bids
            .iter()
            .rposition(|b| !b.is_cancelled)
        {
            self.bids[last_valid].is_winning = true;
            return self.bids.get(last_valid);
        }
        None
    }

    pub fn bids(&self) -> &[Bid] {
        &self.bids
    }

    pub fn len(&self) -> usize {
        self.bids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }
}
