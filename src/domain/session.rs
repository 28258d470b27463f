use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::acknowledgment::{Appeal, PendingAcknowledgment};
use super::audit::AuditEntry;
use super::player::Player;

/// Session state machine states
///
/// Normal loop: `Setup → ReadyCheck → Nomination → Auction → PendingAck →
/// ReadyCheck`, with `PendingAck` branching into the appeal sub-protocol
/// (`AppealReview → AwaitingAppealAck → AwaitingResume → Auction`) and any
/// non-terminal state reachable from `Paused`. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Session created, waiting for the admin to start
    Setup,
    /// Between auctions; the current-turn member may nominate or pass
    ReadyCheck,
    /// A nomination is pending confirmation and readiness
    Nomination,
    /// Bid war open, countdown running
    Auction,
    /// Settled outcome awaiting acknowledgment from every participant
    PendingAck,
    /// An appeal suspended the barrier; awaiting the admin decision
    AppealReview,
    /// Appeal accepted; every participant must acknowledge the decision
    AwaitingAppealAck,
    /// Decision acknowledged; every participant must declare ready to resume
    AwaitingResume,
    /// Admin-initiated pause; remaining timer seconds are snapshotted
    Paused,
    /// No participant can act any further
    Completed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Setup => "SETUP",
            SessionState::ReadyCheck => "READY_CHECK",
            SessionState::Nomination => "NOMINATION",
            SessionState::Auction => "AUCTION",
            SessionState::PendingAck => "PENDING_ACK",
            SessionState::AppealReview => "APPEAL_REVIEW",
            SessionState::AwaitingAppealAck => "AWAITING_APPEAL_ACK",
            SessionState::AwaitingResume => "AWAITING_RESUME",
            SessionState::Paused => "PAUSED",
            SessionState::Completed => "COMPLETED",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;

        // Any non-terminal, non-paused state can be paused by an admin.
        if target == Paused {
            return !matches!(self, Setup | Paused | Completed);
        }

        match (self, target) {
            (Setup, ReadyCheck) => true,

            (ReadyCheck, Nomination) => true, // current member nominated
            (ReadyCheck, Completed) => true,  // no eligible member remains

            (Nomination, ReadyCheck) => true, // nomination cancelled
            (Nomination, Auction) => true,    // confirmed and all ready

            (Auction, PendingAck) => true, // settlement ran (win or no-bid)

            (PendingAck, ReadyCheck) => true, // barrier cleared, turn advances
            (PendingAck, AppealReview) => true, // appeal filed
            (PendingAck, Completed) => true,  // barrier cleared, nobody left

            (AppealReview, PendingAck) => true, // appeal rejected
            (AppealReview, AwaitingAppealAck) => true, // appeal accepted

            (AwaitingAppealAck, AwaitingResume) => true,

            (AwaitingResume, Auction) => true, // bidding re-opens

            // Resume restores whatever state was paused.
            (Paused, to) => !matches!(to, Setup | Paused | Completed),

            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed)
    }

    /// States in which the appeal sub-protocol is in control.
    pub fn is_appeal_flow(&self) -> bool {
        matches!(
            self,
            SessionState::AppealReview
                | SessionState::AwaitingAppealAck
                | SessionState::AwaitingResume
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for SessionState {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "SETUP" => Ok(SessionState::Setup),
            "READY_CHECK" => Ok(SessionState::ReadyCheck),
            "NOMINATION" => Ok(SessionState::Nomination),
            "AUCTION" => Ok(SessionState::Auction),
            "PENDING_ACK" => Ok(SessionState::PendingAck),
            "APPEAL_REVIEW" => Ok(SessionState::AppealReview),
            "AWAITING_APPEAL_ACK" => Ok(SessionState::AwaitingAppealAck),
            "AWAITING_RESUME" => Ok(SessionState::AwaitingResume),
            "PAUSED" => Ok(SessionState::Paused),
            "COMPLETED" => Ok(SessionState::Completed),
            _ => Err(format!("Unknown state: {}", s)),
        }
    }
}

/// State transition record (for audit/debugging)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: SessionState,
    pub to: SessionState,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl StateTransition {
    pub fn new(from: SessionState, to: SessionState, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A proposed-but-not-yet-auctioned player.
///
/// Two-phase on purpose: an accidental nomination must be cheaply
/// reversible before any bidding or timers start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingNomination {
    pub player: Player,
    pub nominator: String,
    pub confirmed: bool,
    pub proposed_at: DateTime<Utc>,
}

/// Snapshot taken when an admin pauses the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PausedSnapshot {
    /// State to restore on resume.
    pub resume_to: SessionState,
    /// Remaining countdown seconds, restored verbatim on resume.
    pub timer_remaining_secs: Option<u64>,
}

/// One market event for a league. Mutated exclusively by engine transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub league_id: String,
    pub state: SessionState,
    /// Ordered participant ids; the turn pointer walks this modulo length.
    pub turn_order: Vec<String>,
    pub current_turn_index: usize,
    pub ready_members: HashSet<String>,
    pub passed_members: HashSet<String>,
    pub finished_members: HashSet<String>,
    pub pending_nomination: Option<PendingNomination>,
    pub pending_acknowledgment: Option<PendingAcknowledgment>,
    pub appeal: Option<Appeal>,
    /// Decided appeals folded back into normal flow, kept for audit.
    pub resolved_appeals: Vec<Appeal>,
    /// Configured countdown window in seconds.
    pub timer_secs: u64,
    pub paused: Option<PausedSnapshot>,
    /// During this sub-phase roster slot limits are not enforced on bids.
    pub no_slot_limit_phase: bool,
    pub transitions: Vec<StateTransition>,
    pub audit: Vec<AuditEntry>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(league_id: impl Into<String>, turn_order: Vec<String>, timer_secs: u64) -> Self {
        Self {
            league_id: league_id.into(),
            state: SessionState::Setup,
            turn_order,
            current_turn_index: 0,
            ready_members: HashSet::new(),
            passed_members: HashSet::new(),
            finished_members: HashSet::new(),
            pending_nomination: None,
            pending_acknowledgment: None,
            appeal: None,
            resolved_appeals: Vec::new(),
            timer_secs,
            paused: None,
            no_slot_limit_phase: false,
            transitions: Vec::new(),
            audit: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// The member whose turn it currently is.
    pub fn current_member(&self) -> Option<&str> {
        self.turn_order
            .get(self.current_turn_index)
            .map(String::as_str)
    }

    pub fn is_member(&self, member_id: &str) -> bool {
        self.turn_order.iter().any(|m| m == member_id)
    }

    /// Members still taking part in barriers: not passed, not finished.
    pub fn active_members(&self) -> Vec<String> {
        self.turn_order
            .iter()
            .filter(|m| !self.passed_members.contains(*m) && !self.finished_members.contains(*m))
            .cloned()
            .collect()
    }

    /// Apply a state transition, enforcing the transition table.
    ///
    /// Returns the previous state on success.
    pub fn transition_to(
        &mut self,
        target: SessionState,
        reason: impl Into<String>,
    ) -> Result<SessionState, String> {
        let from = self.state;
        if !from.can_transition_to(target) {
            return Err(format!("illegal transition {} -> {}", from, target));
        }
        self.transitions
            .push(StateTransition::new(from, target, reason));
        self.state = target;
        Ok(from)
    }

    pub fn record_audit(&mut self, entry: AuditEntry) {
        self.audit.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use SessionState::*;

        assert!(Setup.can_transition_to(ReadyCheck));
        assert!(ReadyCheck.can_transition_to(Nomination));
        assert!(ReadyCheck.can_transition_to(Completed));
        assert!(Nomination.can_transition_to(Auction));
        assert!(Nomination.can_transition_to(ReadyCheck));
        assert!(Auction.can_transition_to(PendingAck));
        assert!(PendingAck.can_transition_to(ReadyCheck));
        assert!(PendingAck.can_transition_to(AppealReview));
        assert!(AppealReview.can_transition_to(PendingAck));
        assert!(AppealReview.can_transition_to(AwaitingAppealAck));
        assert!(AwaitingAppealAck.can_transition_to(AwaitingResume));
        assert!(AwaitingResume.can_transition_to(Auction));

        // Invalid transitions
        assert!(!Setup.can_transition_to(Auction));
        assert!(!ReadyCheck.can_transition_to(PendingAck));
        assert!(!Auction.can_transition_to(ReadyCheck));
        assert!(!Completed.can_transition_to(ReadyCheck));
        assert!(!AwaitingResume.can_transition_to(PendingAck));
    }

    #[test]
    fn test_pause_reachability() {
        use SessionState::*;

        for state in [
            ReadyCheck,
            Nomination,
            Auction,
            PendingAck,
            AppealReview,
            AwaitingAppealAck,
            AwaitingResume,
        ] {
            assert!(state.can_transition_to(Paused), "{} should pause", state);
            assert!(Paused.can_transition_to(state), "{} should resume", state);
        }
        assert!(!Setup.can_transition_to(Paused));
        assert!(!Completed.can_transition_to(Paused));
        assert!(!Paused.can_transition_to(Completed));
    }

    #[test]
    fn test_state_from_str() {
        assert_eq!(
            SessionState::try_from("pending_ack").unwrap(),
            SessionState::PendingAck
        );
        assert_eq!(
            SessionState::try_from("AWAITING_RESUME").unwrap(),
            SessionState::AwaitingResume
        );
        assert!(SessionState::try_from("LIMBO").is_err());
    }

    #[test]
    fn test_transition_to_enforces_table() {
        let mut session = Session::new("lg-1", vec!["a".into(), "b".into()], 20);
        assert!(session
            .transition_to(SessionState::ReadyCheck, "start")
            .is_ok());
        assert_eq!(session.state, SessionState::ReadyCheck);
        assert!(session
            .transition_to(SessionState::PendingAck, "nope")
            .is_err());
        assert_eq!(session.state, SessionState::ReadyCheck);
        assert_eq!(session.transitions.len(), 1);
    }

    #[test]
    fn test_active_members_excludes_passed_and_finished() {
        let mut session = Session::new(
            "lg-1",
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            20,
        );
        session.passed_members.insert("b".to_string());
        session.finished_members.insert("d".to_string());
        assert_eq!(session.active_members(), vec!["a", "c"]);
    }
}
