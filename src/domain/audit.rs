use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of auditable actions. Appeals and forced actions alter financial
/// outcomes after the fact, so they are recorded and never silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditKind {
    SessionStarted,
    SessionPaused,
    SessionResumed,
    SessionCompleted,
    TimerChanged,
    MemberPassed,
    MemberFinished,
    NominationCancelled,
    ForcedReady,
    ForcedAck,
    ForcedAppealAck,
    ForcedResumeReady,
    AppealFiled,
    AppealAccepted,
    AppealRejected,
    SettlementReversed,
}

/// One audit trail entry on a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub kind: AuditKind,
    /// Member or admin who triggered the action.
    pub actor: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(kind: AuditKind, actor: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            actor: actor.into(),
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}
