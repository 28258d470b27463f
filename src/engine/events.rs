//! Engine events broadcast to participants.
//!
//! Fire-and-forget: delivery is never required for correctness. The
//! persisted session snapshot is authoritative and any client can re-fetch
//! it to reconstruct state.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineEvent {
    SessionStarted {
        league_id: String,
    },
    TurnAdvanced {
        member_id: String,
        index: usize,
    },
    SessionCompleted,
    MemberPassed {
        member_id: String,
    },
    MemberFinished {
        member_id: String,
    },
    NominationProposed {
        player_id: String,
        nominator: String,
    },
    NominationConfirmed {
        player_id: String,
    },
    NominationCancelled {
        by: String,
    },
    MemberReady {
        member_id: String,
    },
    AuctionOpened {
        auction_id: Uuid,
        player_id: String,
        base_price: Decimal,
    },
    BidAccepted {
        auction_id: Uuid,
        bidder: String,
        amount: Decimal,
    },
    AuctionClosed {
        auction_id: Uuid,
        winner: Option<String>,
        price: Decimal,
        no_bids: bool,
    },
    MemberAcknowledged {
        member_id: String,
    },
    BarrierCleared,
    AppealFiled {
        by: String,
        reason: String,
    },
    AppealRejected,
    AppealAccepted {
        reopen_price: Decimal,
    },
    AppealDecisionAcked {
        member_id: String,
    },
    ResumeReady {
        member_id: String,
    },
    AuctionReopened {
        auction_id: Uuid,
        price: Decimal,
    },
    SessionPaused {
        timer_remaining_secs: Option<u64>,
    },
    SessionResumed,
    TimerChanged {
        secs: u64,
    },
}
