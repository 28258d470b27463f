use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::player::Player;

/// The settled outcome every active participant must confirm before the
/// turn advances. Created at settlement, destroyed when the barrier clears.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAcknowledgment {
    pub auction_id: Uuid,
    pub player: Player,
    /// None for a no-bid outcome.
    pub winner: Option<String>,
    pub price: Decimal,
    pub no_bids: bool,
    pub acknowledged_members: HashSet<String>,
    pub pending_members: HashSet<String>,
    pub opened_at: DateTime<Utc>,
}

impl PendingAcknowledgment {
    pub fn new(
        auction_id: Uuid,
        player: Player,
        winner: Option<String>,
        price: Decimal,
        participants: impl IntoIterator<Item = String>,
    ) -> Self {
        let no_bids = winner.is_none();
        Self {
            auction_id,
            player,
            winner,
            price,
            no_bids,
            acknowledged_members: HashSet::new(),
            pending_members: participants.into_iter().collect(),
            opened_at: Utc::now(),
        }
    }

    /// Move a member from pending to acknowledged.
    ///
    /// Returns `Err` with the member id when the member already
    /// acknowledged (or was never pending) — a race-lost condition.
    pub fn acknowledge(&mut self, member_id: &str) -> Result<(), String> {
        if !self.pending_members.remove(member_id) {
            return Err(member_id.to_string());
        }
        self.acknowledged_members.insert(member_id.to_string());
        Ok(())
    }

    pub fn is_cleared(&self) -> bool {
        self.pending_members.is_empty()
    }
}

/// Appeal decision status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppealStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A participant's formal dispute of a just-settled outcome.
///
/// Folded back into normal flow once resolved: a rejected appeal stays
/// attached to the session for audit, an accepted one drives the
/// reverse-and-resume sub-protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appeal {
    pub id: Uuid,
    pub auction_id: Uuid,
    pub reason: String,
    pub submitted_by: String,
    pub status: AppealStatus,
    pub admin_notes: Option<String>,
    /// Members who acknowledged the admin decision.
    pub decision_acked_members: HashSet<String>,
    /// Members who declared themselves ready to resume play.
    pub resume_ready_members: HashSet<String>,
    pub filed_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Appeal {
    pub fn new(auction_id: Uuid, submitted_by: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            auction_id,
            reason: reason.into(),
            submitted_by: submitted_by.into(),
            status: AppealStatus::Pending,
            admin_notes: None,
            decision_acked_members: HashSet::new(),
            resume_ready_members: HashSet::new(),
            filed_at: Utc::now(),
            decided_at: None,
        }
    }

    pub fn decide(&mut self, status: AppealStatus, notes: Option<String>) {
        self.status = status;
        self.admin_notes = notes;
        self.decided_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::player::Role;
    use rust_decimal_macros::dec;

    fn pending_ack() -> PendingAcknowledgment {
        PendingAcknowledgment::new(
            Uuid::new_v4(),
            Player::new("pl-1", "Maignan", Role::Goalkeeper),
            Some("bob".to_string()),
            dec!(12),
            ["alice".to_string(), "bob".to_string(), "carol".to_string()],
        )
    }

    #[test]
    fn test_acknowledge_moves_member() {
        let mut ack = pending_ack();
        ack.acknowledge("alice").unwrap();
        assert!(ack.acknowledged_members.contains("alice"));
        assert!(!ack.pending_members.contains("alice"));
        assert!(!ack.is_cleared());
    }

    #[test]
    fn test_double_acknowledge_rejected() {
        let mut ack = pending_ack();
        ack.acknowledge("alice").unwrap();
        assert!(ack.acknowledge("alice").is_err());
    }

    #[test]
    fn test_barrier_clears_when_all_acknowledge() {
        let mut ack = pending_ack();
        for member in ["alice", "bob", "carol"] {
            ack.acknowledge(member).unwrap();
        }
        assert!(ack.is_cleared());
    }

    #[test]
    fn test_no_bids_flag_follows_winner() {
        let ack = PendingAcknowledgment::new(
            Uuid::new_v4(),
            Player::new("pl-1", "Maignan", Role::Goalkeeper),
            None,
            dec!(1),
            ["alice".to_string()],
        );
        assert!(ack.no_bids);
    }
}
