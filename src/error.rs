use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::session::SessionState;
use crate::ledger::LedgerError;

/// Main error type for the auction engine
#[derive(Error, Debug)]
pub enum EngineError {
    // Precondition errors — rejected locally with no mutation,
    // safe to retry after re-reading state
    #[error("Wrong session state: expected {expected}, found {actual}")]
    WrongState {
        expected: &'static str,
        actual: SessionState,
    },

    #[error("Not your turn: current turn belongs to {current}")]
    NotYourTurn { current: String },

    #[error("A nomination is already pending for player {player_id}")]
    AlreadyNominated { player_id: String },

    #[error("Player {player_id} is already assigned in this league")]
    PlayerAlreadyAssigned { player_id: String },

    #[error("Nomination has not been confirmed yet")]
    NominationUnconfirmed,

    #[error("Nomination is already confirmed")]
    NominationConfirmed,

    #[error("Only the nominator may do this (nominator is {nominator})")]
    NotNominator { nominator: String },

    #[error("Member {member_id} is not part of this session")]
    UnknownMember { member_id: String },

    #[error("Member {member_id} has declared finished and may not bid")]
    MemberFinished { member_id: String },

    #[error("No free {role} slot for member {member_id}")]
    NoFreeSlot { member_id: String, role: String },

    #[error("No auction is currently open")]
    NoActiveAuction,

    #[error("Admin privileges required")]
    AdminRequired,

    // Funds errors — rejected, no partial mutation
    #[error("Insufficient liquidity: available {available}, required {required}")]
    InsufficientLiquidity {
        available: Decimal,
        required: Decimal,
    },

    // Race-lost errors — client must re-fetch and retry with fresh data
    #[error("Stale price: offered {offered}, current price is {current}")]
    StalePrice { offered: Decimal, current: Decimal },

    #[error("Member {member_id} has already acknowledged")]
    AlreadyAcknowledged { member_id: String },

    #[error("An appeal is already open for this outcome")]
    AppealAlreadyOpen,

    #[error("No appeal is pending")]
    NoPendingAppeal,

    #[error("Member {member_id} is already marked ready")]
    AlreadyReady { member_id: String },

    // Settlement errors — all-or-nothing; the auction stays ACTIVE for retry
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Infrastructure errors
    #[error("Engine channel closed: {0}")]
    ChannelClosed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True when the caller lost a race and should re-fetch state and retry.
    pub fn is_race_lost(&self) -> bool {
        matches!(
            self,
            EngineError::StalePrice { .. }
                | EngineError::AlreadyAcknowledged { .. }
                | EngineError::AppealAlreadyOpen
                | EngineError::AlreadyReady { .. }
        )
    }

    /// True when the rejection carried no mutation at all.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            EngineError::WrongState { .. }
                | EngineError::NotYourTurn { .. }
                | EngineError::AlreadyNominated { .. }
                | EngineError::PlayerAlreadyAssigned { .. }
                | EngineError::NominationUnconfirmed
                | EngineError::NominationConfirmed
                | EngineError::NotNominator { .. }
                | EngineError::UnknownMember { .. }
                | EngineError::MemberFinished { .. }
                | EngineError::NoFreeSlot { .. }
                | EngineError::NoActiveAuction
                | EngineError::AdminRequired
        )
    }
}

/// Result type alias for EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_race_lost_classification() {
        let stale = EngineError::StalePrice {
            offered: dec!(10),
            current: dec!(11),
        };
        assert!(stale.is_race_lost());
        assert!(!stale.is_precondition());

        let turn = EngineError::NotYourTurn {
            current: "alice".to_string(),
        };
        assert!(turn.is_precondition());
        assert!(!turn.is_race_lost());
    }

    #[test]
    fn test_funds_error_message() {
        let err = EngineError::InsufficientLiquidity {
            available: dec!(3),
            required: dec!(6),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient liquidity: available 3, required 6"
        );
    }
}
