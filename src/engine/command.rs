//! Engine Commands — every mutation arrives as one of these over the
//! command channel, each carrying a oneshot reply. The engine loop is the
//! single state owner per session, so commands are linearized by arrival.

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::domain::{Auction, Bid, Player, Session};
use crate::error::Result;
use crate::liveness::Presence;

pub type Reply<T> = oneshot::Sender<Result<T>>;

/// Member-facing commands.
#[derive(Debug)]
pub enum EngineCommand {
    Pass {
        member_id: String,
        reply: Reply<()>,
    },
    Nominate {
        member_id: String,
        player: Player,
        reply: Reply<()>,
    },
    ConfirmNomination {
        member_id: String,
        reply: Reply<()>,
    },
    CancelNomination {
        member_id: String,
        reply: Reply<()>,
    },
    MarkReady {
        member_id: String,
        reply: Reply<()>,
    },
    PlaceBid {
        member_id: String,
        amount: Decimal,
        reply: Reply<()>,
    },
    Acknowledge {
        member_id: String,
        reply: Reply<()>,
    },
    FileAppeal {
        member_id: String,
        reason: String,
        reply: Reply<()>,
    },
    AckAppealDecision {
        member_id: String,
        reply: Reply<()>,
    },
    MarkResumeReady {
        member_id: String,
        reply: Reply<()>,
    },
    DeclareFinished {
        member_id: String,
        reply: Reply<()>,
    },
    Snapshot {
        reply: oneshot::Sender<EngineSnapshot>,
    },
    Admin(AdminCommand),
}

/// Operator tooling surface. Every force path exists so that a stalled or
/// disconnected participant can never deadlock the league; all of them are
/// audited.
#[derive(Debug)]
pub enum AdminCommand {
    Start {
        reply: Reply<()>,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    SetTimerSecs {
        secs: u64,
        reply: Reply<()>,
    },
    SetNoSlotLimitPhase {
        enabled: bool,
        reply: Reply<()>,
    },
    ForceReady {
        member_id: String,
        reply: Reply<()>,
    },
    ForceAllReady {
        reply: Reply<()>,
    },
    ForceAck {
        member_id: String,
        reply: Reply<()>,
    },
    ForceAllAcks {
        reply: Reply<()>,
    },
    ForceFinished {
        member_id: String,
        reply: Reply<()>,
    },
    ForceCancelNomination {
        reply: Reply<()>,
    },
    DecideAppeal {
        accept: bool,
        notes: Option<String>,
        reply: Reply<()>,
    },
    ForceAllAppealAcks {
        reply: Reply<()>,
    },
    ForceAllResumeReady {
        reply: Reply<()>,
    },
    SimulateBotBid {
        member_id: String,
        reply: Reply<()>,
    },
}

/// Poll-safe view of the whole engine state: enough for any client to
/// reconstruct the current situation without push delivery.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub session: Session,
    pub auction: Option<Auction>,
    pub bids: Vec<Bid>,
    pub timer_remaining_secs: Option<u64>,
    pub presence: Vec<MemberPresence>,
    pub history: Vec<ClosedAuction>,
}

/// A retired auction kept for audit and history.
#[derive(Debug, Clone, Serialize)]
pub struct ClosedAuction {
    pub auction: Auction,
    pub bids: Vec<Bid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberPresence {
    pub member_id: String,
    pub presence: Presence,
}
