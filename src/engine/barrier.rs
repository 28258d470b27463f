//! Acknowledgment Barrier — everyone confirms the outcome before play
//! continues.
//!
//! The barrier clears when the pending set empties; only then may the
//! sequencer advance. An admin force produces exactly the same downstream
//! transition as individual acknowledgments, so a stalled or offline
//! participant can never deadlock the league.

use crate::domain::{AppealStatus, AuditEntry, AuditKind, PendingAcknowledgment, Session, SessionState};
use crate::error::{EngineError, Result};

/// Acknowledge the settled outcome. Returns `true` when the barrier
/// cleared with this acknowledgment.
pub fn acknowledge(session: &mut Session, member_id: &str) -> Result<bool> {
    if session.state != SessionState::PendingAck {
        return Err(EngineError::WrongState {
            expected: "PENDING_ACK",
            actual: session.state,
        });
    }
    if session
        .appeal
        .as_ref()
        .is_some_and(|a| a.status == AppealStatus::Pending)
    {
        return Err(EngineError::AppealAlreadyOpen);
    }
    if !session.is_member(member_id) {
        return Err(EngineError::UnknownMember {
            member_id: member_id.to_string(),
        });
    }
    let ack = session
        .pending_acknowledgment
        .as_mut()
        .ok_or(EngineError::Internal("pending-ack state without barrier".into()))?;
    ack.acknowledge(member_id)
        .map_err(|member_id| EngineError::AlreadyAcknowledged { member_id })?;
    Ok(ack.is_cleared())
}

/// Admin short-circuit: acknowledge on behalf of every pending member.
/// Audited, and downstream-identical to individual acknowledgments.
pub fn force_all(session: &mut Session, admin: &str) -> Result<()> {
    if session.state != SessionState::PendingAck {
        return Err(EngineError::WrongState {
            expected: "PENDING_ACK",
            actual: session.state,
        });
    }
    let ack = session
        .pending_acknowledgment
        .as_mut()
        .ok_or(EngineError::Internal("pending-ack state without barrier".into()))?;
    let forced: Vec<String> = ack.pending_members.drain().collect();
    for member in &forced {
        ack.acknowledged_members.insert(member.clone());
    }
    session.record_audit(AuditEntry::new(
        AuditKind::ForcedAck,
        admin,
        format!("forced acknowledgment for: {}", forced.join(", ")),
    ));
    Ok(())
}

/// Tear the barrier down once cleared, returning the outcome snapshot.
/// A decided appeal attached for audit is folded into the resolved list.
pub fn clear(session: &mut Session) -> Result<PendingAcknowledgment> {
    let ack = session
        .pending_acknowledgment
        .take()
        .ok_or(EngineError::Internal("clearing an absent barrier".into()))?;
    if !ack.is_cleared() {
        session.pending_acknowledgment = Some(ack);
        return Err(EngineError::Internal("barrier not cleared yet".into()));
    }
    if let Some(appeal) = session.appeal.take() {
        session.resolved_appeals.push(appeal);
    }
    Ok(ack)
}
