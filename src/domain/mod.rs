//! Domain value types for the auction engine.
//!
//! Everything here is a plain serializable value: the engine mutates these
//! through explicit transitions, and snapshots of them are what clients
//! poll to reconstruct state without relying on push delivery.

pub mod acknowledgment;
pub mod auction;
pub mod audit;
pub mod participant;
pub mod player;
pub mod session;

pub use acknowledgment::{Appeal, AppealStatus, PendingAcknowledgment};
pub use auction::{Auction, AuctionStatus, Bid, BidBook};
pub use audit::{AuditEntry, AuditKind};
pub use participant::Participant;
pub use player::{Player, Role};
pub use session::{PausedSnapshot, PendingNomination, Session, SessionState, StateTransition};

use rust_decimal::Decimal;

/// Minimum legal bid (and minimum opening price).
pub fn min_bid() -> Decimal {
    Decimal::ONE
}

/// Minimum contract commitment a won auction will add to the winner's
/// committed-salary total.
pub fn min_commitment() -> Decimal {
    Decimal::ONE
}

/// Minimum liquidity required to take a turn: one minimum bid plus the
/// minimum commitment that winning it would create.
pub fn min_entry_stake() -> Decimal {
    min_bid() + min_commitment()
}
