use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use super::contract::ContractTerms;
use crate::domain::{Participant, Player};

/// Errors surfaced by the ledger collaborators.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    #[error("Unknown member: {member_id}")]
    UnknownMember { member_id: String },

    #[error("Unknown transaction: {transaction_id}")]
    UnknownTransaction { transaction_id: Uuid },

    #[error("Player {player_id} is already assigned")]
    PlayerAlreadyAssigned { player_id: String },

    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
    },

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// How a roster membership was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AcquisitionType {
    Auction,
    FreeAgent,
    Trade,
}

/// One atomic settlement: debit the winner, assign the player, create the
/// contract. Either all three happen or none do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub league_id: String,
    pub auction_id: Uuid,
    pub member_id: String,
    pub player: Player,
    pub price: Decimal,
    pub acquisition: AcquisitionType,
    pub contract: ContractTerms,
}

/// Receipt for a completed settlement; required to reverse it later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub transaction_id: Uuid,
    pub member_id: String,
    pub player_id: String,
    pub price: Decimal,
    pub contract: ContractTerms,
}

/// Exact inverse of a prior settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReversalRequest {
    pub league_id: String,
    pub transaction_id: Uuid,
}

/// Atomic mutation of member budget, roster membership, and contracts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Perform the atomic debit+assign+contract transaction.
    async fn settle(&self, request: SettlementRequest)
        -> Result<SettlementReceipt, LedgerError>;

    /// Undo a prior settlement: restore budget, remove roster membership
    /// and contract.
    async fn reverse(&self, request: ReversalRequest) -> Result<(), LedgerError>;
}

/// Read-side collaborator: current roster membership, slot capacity, and
/// participant liquidity. Queried fresh at bid time and settlement time.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Directory: Send + Sync {
    /// Financial and roster profile for one member.
    async fn participant(
        &self,
        league_id: &str,
        member_id: &str,
    ) -> Result<Participant, LedgerError>;

    /// Whether the player already belongs to any roster in the league.
    async fn is_player_assigned(
        &self,
        league_id: &str,
        player_id: &str,
    ) -> Result<bool, LedgerError>;
}
