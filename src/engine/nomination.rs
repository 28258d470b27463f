//! Nomination Handshake — two-step commit before a bid war opens.
//!
//! Propose then confirm: an accidental nomination must be cheaply
//! reversible before any bidding or timers start. After confirmation the
//! ready-set collects every active member (seeded with the nominator);
//! the auction opens only once all of them — or an admin — say go.

use rust_decimal::Decimal;

use crate::domain::{min_entry_stake, PendingNomination, Player, Session, SessionState};
use crate::error::{EngineError, Result};

/// Propose a player for auction. Legal only for the current-turn member,
/// only for a league-wide unassigned player, and only with liquidity for
/// the minimum entry stake.
pub fn nominate(
    session: &mut Session,
    member_id: &str,
    player: Player,
    liquidity: Decimal,
    player_assigned: bool,
) -> Result<()> {
    if session.state != SessionState::ReadyCheck {
        return Err(EngineError::WrongState {
            expected: "READY_CHECK",
            actual: session.state,
        });
    }
    if let Some(pending) = &session.pending_nomination {
        return Err(EngineError::AlreadyNominated {
            player_id: pending.player.id.clone(),
        });
    }
    match session.current_member() {
        Some(current) if current == member_id => {}
        current => {
            return Err(EngineError::NotYourTurn {
                current: current.unwrap_or_default().to_string(),
            })
        }
    }
    if player_assigned {
        return Err(EngineError::PlayerAlreadyAssigned {
            player_id: player.id,
        });
    }
    if liquidity < min_entry_stake() {
        return Err(EngineError::InsufficientLiquidity {
            available: liquidity,
            required: min_entry_stake(),
        });
    }

    session.pending_nomination = Some(PendingNomination {
        player,
        nominator: member_id.to_string(),
        confirmed: false,
        proposed_at: chrono::Utc::now(),
    });
    session
        .transition_to(SessionState::Nomination, "player nominated")
        .map_err(EngineError::Internal)?;
    Ok(())
}

/// Confirm a pending nomination. Legal only for the stored nominator.
/// Seeds the ready-set with the nominator.
pub fn confirm(session: &mut Session, member_id: &str) -> Result<()> {
    if session.state != SessionState::Nomination {
        return Err(EngineError::WrongState {
            expected: "NOMINATION",
            actual: session.state,
        });
    }
    let pending = session
        .pending_nomination
        .as_mut()
        .ok_or(EngineError::Internal("nomination state without pending nomination".into()))?;
    if pending.nominator != member_id {
        return Err(EngineError::NotNominator {
            nominator: pending.nominator.clone(),
        });
    }
    if pending.confirmed {
        return Err(EngineError::NominationConfirmed);
    }
    pending.confirmed = true;
    session.ready_members.clear();
    session.ready_members.insert(member_id.to_string());
    Ok(())
}

/// Cancel a pending nomination and fall back to the ready check.
///
/// The nominator may cancel while unconfirmed; an admin may cancel
/// always (`is_admin`).
pub fn cancel(session: &mut Session, actor: &str, is_admin: bool) -> Result<()> {
    if session.state != SessionState::Nomination {
        return Err(EngineError::WrongState {
            expected: "NOMINATION",
            actual: session.state,
        });
    }
    let pending = session
        .pending_nomination
        .as_ref()
        .ok_or(EngineError::Internal("nomination state without pending nomination".into()))?;

    if !is_admin {
        if pending.nominator != actor {
            return Err(EngineError::NotNominator {
                nominator: pending.nominator.clone(),
            });
        }
        if pending.confirmed {
            // Past the cheap-reversal point; only an admin can unwind now.
            return Err(EngineError::NominationConfirmed);
        }
    }

    session.pending_nomination = None;
    session.ready_members.clear();
    session
        .transition_to(SessionState::ReadyCheck, "nomination cancelled")
        .map_err(EngineError::Internal)?;
    Ok(())
}

/// Declare readiness for the confirmed nomination. Returns `true` when
/// every active member is ready and the auction may open.
pub fn mark_ready(session: &mut Session, member_id: &str) -> Result<bool> {
    if session.state != SessionState::Nomination {
        return Err(EngineError::WrongState {
            expected: "NOMINATION",
            actual: session.state,
        });
    }
    match &session.pending_nomination {
        Some(pending) if pending.confirmed => {}
        Some(_) => return Err(EngineError::NominationUnconfirmed),
        None => {
            return Err(EngineError::Internal(
                "nomination state without pending nomination".into(),
            ))
        }
    }
    if !session.is_member(member_id) {
        return Err(EngineError::UnknownMember {
            member_id: member_id.to_string(),
        });
    }
    if !session.ready_members.insert(member_id.to_string()) {
        return Err(EngineError::AlreadyReady {
            member_id: member_id.to_string(),
        });
    }
    Ok(all_ready(session))
}

/// Whether every active member has declared ready.
pub fn all_ready(session: &Session) -> bool {
    session
        .active_members()
        .iter()
        .all(|m| session.ready_members.contains(m))
}
