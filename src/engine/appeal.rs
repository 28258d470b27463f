//! Appeal Sub-protocol — dispute, admin decision, reversal, resume.
//!
//! Filing suspends the acknowledgment barrier. A rejected appeal leaves
//! the transaction standing and returns straight to the barrier; an
//! accepted one reverses the settlement and re-enters play through two
//! explicit stages — decision acknowledgment, then resume readiness — so
//! a reversal is never silently applied while participants are away.

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::{
    Appeal, AppealStatus, Auction, AuctionStatus, AuditEntry, AuditKind, BidBook, Session,
    SessionState,
};
use crate::error::{EngineError, Result};
use crate::ledger::{LedgerGateway, ReversalRequest, SettlementReceipt};

/// File a dispute instead of acknowledging. Any participant may file.
pub fn file(session: &mut Session, member_id: &str, reason: &str) -> Result<()> {
    if session.state != SessionState::PendingAck {
        return Err(EngineError::WrongState {
            expected: "PENDING_ACK",
            actual: session.state,
        });
    }
    if !session.is_member(member_id) {
        return Err(EngineError::UnknownMember {
            member_id: member_id.to_string(),
        });
    }
    if session
        .appeal
        .as_ref()
        .is_some_and(|a| a.status == AppealStatus::Pending)
    {
        return Err(EngineError::AppealAlreadyOpen);
    }
    let ack = session
        .pending_acknowledgment
        .as_ref()
        .ok_or(EngineError::Internal("pending-ack state without barrier".into()))?;

    session.appeal = Some(Appeal::new(ack.auction_id, member_id, reason));
    session.record_audit(AuditEntry::new(
        AuditKind::AppealFiled,
        member_id,
        reason.to_string(),
    ));
    session
        .transition_to(SessionState::AppealReview, "appeal filed")
        .map_err(EngineError::Internal)?;
    Ok(())
}

/// Admin rejects: the transaction stands, the barrier resumes unchanged,
/// the appeal stays attached for audit.
pub fn reject(session: &mut Session, admin: &str, notes: Option<String>) -> Result<()> {
    let appeal = pending_appeal_mut(session)?;
    appeal.decide(AppealStatus::Rejected, notes);
    session.record_audit(AuditEntry::new(
        AuditKind::AppealRejected,
        admin,
        "transaction stands",
    ));
    session
        .transition_to(SessionState::PendingAck, "appeal rejected")
        .map_err(EngineError::Internal)?;
    Ok(())
}

/// Admin accepts: reverse the settlement, cancel the winning bid, and
/// enter the two-stage re-entry barriers. Returns the price the auction
/// will re-open at (last valid bid, excluding the cancelled one).
pub async fn accept(
    session: &mut Session,
    auction: &mut Auction,
    book: &mut BidBook,
    gateway: &dyn LedgerGateway,
    receipt: Option<&SettlementReceipt>,
    admin: &str,
    notes: Option<String>,
) -> Result<Decimal> {
    {
        // Validate before touching the ledger.
        pending_appeal_mut(session)?;
    }

    if let Some(receipt) = receipt {
        let request = ReversalRequest {
            league_id: session.league_id.clone(),
            transaction_id: receipt.transaction_id,
        };
        if let Err(e) = gateway.reverse(request).await {
            warn!(
                auction_id = %auction.id,
                error = %e,
                "reversal failed; appeal stays pending for retry"
            );
            return Err(EngineError::Ledger(e));
        }
        session.record_audit(AuditEntry::new(
            AuditKind::SettlementReversed,
            admin,
            format!(
                "transaction {} reversed for player {}",
                receipt.transaction_id, receipt.player_id
            ),
        ));
    }

    let reopen_price = match book.cancel_winning() {
        Some(surviving) => surviving.amount,
        None => {
            // The cancelled bid was the only one; re-seed the nominator's
            // opening bid at the base price, mirroring auction open.
            let nominator = auction.nominator.clone();
            book.record_accepted(auction.id, &nominator, auction.base_price);
            auction.base_price
        }
    };
    auction.current_price = reopen_price;
    auction.status = AuctionStatus::AwaitingResume;
    session.pending_acknowledgment = None;

    let appeal = pending_appeal_mut(session)?;
    appeal.decide(AppealStatus::Accepted, notes);
    session.record_audit(AuditEntry::new(
        AuditKind::AppealAccepted,
        admin,
        format!("auction re-opens at {}", reopen_price),
    ));
    session
        .transition_to(SessionState::AwaitingAppealAck, "appeal accepted")
        .map_err(EngineError::Internal)?;

    info!(
        auction_id = %auction.id,
        price = %reopen_price,
        "settlement reversed; awaiting decision acknowledgments"
    );
    Ok(reopen_price)
}

/// Acknowledge the admin decision. Returns `true` when every active
/// member has done so and the resume-readiness stage begins.
pub fn ack_decision(session: &mut Session, member_id: &str) -> Result<bool> {
    if session.state != SessionState::AwaitingAppealAck {
        return Err(EngineError::WrongState {
            expected: "AWAITING_APPEAL_ACK",
            actual: session.state,
        });
    }
    if !session.is_member(member_id) {
        return Err(EngineError::UnknownMember {
            member_id: member_id.to_string(),
        });
    }
    let active = session.active_members();
    let appeal = decided_appeal_mut(session)?;
    if !appeal.decision_acked_members.insert(member_id.to_string()) {
        return Err(EngineError::AlreadyAcknowledged {
            member_id: member_id.to_string(),
        });
    }
    let all = active
        .iter()
        .all(|m| appeal.decision_acked_members.contains(m));
    if all {
        session
            .transition_to(SessionState::AwaitingResume, "decision acknowledged by all")
            .map_err(EngineError::Internal)?;
    }
    Ok(all)
}

/// Declare readiness to resume play. Returns `true` when every active
/// member is ready and the auction may re-open.
pub fn mark_resume_ready(session: &mut Session, member_id: &str) -> Result<bool> {
    if session.state != SessionState::AwaitingResume {
        return Err(EngineError::WrongState {
            expected: "AWAITING_RESUME",
            actual: session.state,
        });
    }
    if !session.is_member(member_id) {
        return Err(EngineError::UnknownMember {
            member_id: member_id.to_string(),
        });
    }
    let active = session.active_members();
    let appeal = decided_appeal_mut(session)?;
    if !appeal.resume_ready_members.insert(member_id.to_string()) {
        return Err(EngineError::AlreadyReady {
            member_id: member_id.to_string(),
        });
    }
    Ok(active.iter().all(|m| appeal.resume_ready_members.contains(m)))
}

/// Admin force for the decision-acknowledgment stage.
pub fn force_all_decision_acks(session: &mut Session, admin: &str) -> Result<()> {
    if session.state != SessionState::AwaitingAppealAck {
        return Err(EngineError::WrongState {
            expected: "AWAITING_APPEAL_ACK",
            actual: session.state,
        });
    }
    let active = session.active_members();
    let appeal = decided_appeal_mut(session)?;
    for member in &active {
        appeal.decision_acked_members.insert(member.clone());
    }
    session.record_audit(AuditEntry::new(
        AuditKind::ForcedAppealAck,
        admin,
        "forced decision acknowledgment for all members",
    ));
    session
        .transition_to(SessionState::AwaitingResume, "decision acks forced")
        .map_err(EngineError::Internal)?;
    Ok(())
}

/// Admin force for the resume-readiness stage.
pub fn force_all_resume_ready(session: &mut Session, admin: &str) -> Result<()> {
    if session.state != SessionState::AwaitingResume {
        return Err(EngineError::WrongState {
            expected: "AWAITING_RESUME",
            actual: session.state,
        });
    }
    let active = session.active_members();
    let appeal = decided_appeal_mut(session)?;
    for member in &active {
        appeal.resume_ready_members.insert(member.clone());
    }
    session.record_audit(AuditEntry::new(
        AuditKind::ForcedResumeReady,
        admin,
        "forced resume readiness for all members",
    ));
    Ok(())
}

/// Re-open the reversed auction for bidding. The caller resets the clock.
pub fn reopen(session: &mut Session, auction: &mut Auction) -> Result<()> {
    if session.state != SessionState::AwaitingResume {
        return Err(EngineError::WrongState {
            expected: "AWAITING_RESUME",
            actual: session.state,
        });
    }
    auction.status = AuctionStatus::Active;
    session
        .transition_to(SessionState::Auction, "bidding re-opened after appeal")
        .map_err(EngineError::Internal)?;
    if let Some(appeal) = session.appeal.take() {
        session.resolved_appeals.push(appeal);
    }
    Ok(())
}

fn pending_appeal_mut(session: &mut Session) -> Result<&mut Appeal> {
    if session.state != SessionState::AppealReview {
        return Err(EngineError::WrongState {
            expected: "APPEAL_REVIEW",
            actual: session.state,
        });
    }
    match session.appeal.as_mut() {
        Some(appeal) if appeal.status == AppealStatus::Pending => Ok(appeal),
        _ => Err(EngineError::NoPendingAppeal),
    }
}

fn decided_appeal_mut(session: &mut Session) -> Result<&mut Appeal> {
    match session.appeal.as_mut() {
        Some(appeal) if appeal.status == AppealStatus::Accepted => Ok(appeal),
        _ => Err(EngineError::NoPendingAppeal),
    }
}
