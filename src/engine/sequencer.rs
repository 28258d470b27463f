//! Turn Sequencer — owns the turn pointer over the ordered participant list.
//!
//! Eligibility is a pure function of the passed/finished sets and each
//! member's liquidity, so `next_eligible` is deterministic: re-running it
//! with the same inputs always picks the same member, which keeps admin
//! force calls (serialized through the engine loop) stable.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::domain::{min_entry_stake, Session, SessionState};
use crate::error::{EngineError, Result};

/// Where the turn pointer should go next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Next eligible member found at this index.
    Turn { member_id: String, index: usize },
    /// No member can act any further; the session is over.
    Completed,
}

/// A member may take a turn if they have not passed, not declared
/// finished, and hold at least the minimum entry stake (one minimum bid
/// plus the minimum commitment winning it would create).
pub fn is_eligible(session: &Session, member_id: &str, liquidity: Decimal) -> bool {
    !session.passed_members.contains(member_id)
        && !session.finished_members.contains(member_id)
        && liquidity >= min_entry_stake()
}

/// Compute the next turn without mutating anything.
///
/// Scans `turn_order` starting after the current index, wrapping modulo
/// length, over at most one full cycle (the current member is considered
/// last, so a sole survivor keeps nominating).
pub fn next_eligible(
    session: &Session,
    liquidity: &HashMap<String, Decimal>,
) -> AdvanceOutcome {
    let len = session.turn_order.len();
    if len == 0 {
        return AdvanceOutcome::Completed;
    }

    for step in 1..=len {
        let index = (session.current_turn_index + step) % len;
        let member_id = &session.turn_order[index];
        let funds = liquidity.get(member_id).copied().unwrap_or(Decimal::ZERO);
        if is_eligible(session, member_id, funds) {
            return AdvanceOutcome::Turn {
                member_id: member_id.clone(),
                index,
            };
        }
    }

    AdvanceOutcome::Completed
}

/// Apply an advance outcome: move the pointer and reset per-turn state,
/// or complete the session.
pub fn apply_advance(session: &mut Session, outcome: &AdvanceOutcome) -> Result<()> {
    match outcome {
        AdvanceOutcome::Turn { index, .. } => {
            session.current_turn_index = *index;
            session.ready_members.clear();
            session.pending_nomination = None;
            Ok(())
        }
        AdvanceOutcome::Completed => {
            session
                .transition_to(SessionState::Completed, "no eligible member remains")
                .map_err(EngineError::Internal)?;
            Ok(())
        }
    }
}

/// Voluntary pass. Legal only during the ready check and only for the
/// member whose turn it is.
pub fn pass(session: &mut Session, member_id: &str) -> Result<()> {
    if session.state != SessionState::ReadyCheck {
        return Err(EngineError::WrongState {
            expected: "READY_CHECK",
            actual: session.state,
        });
    }
    if !session.is_member(member_id) {
        return Err(EngineError::UnknownMember {
            member_id: member_id.to_string(),
        });
    }
    let current = session.current_member().unwrap_or_default().to_string();
    if current != member_id {
        return Err(EngineError::NotYourTurn { current });
    }
    session.passed_members.insert(member_id.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn session(members: &[&str]) -> Session {
        let mut s = Session::new(
            "lg-1",
            members.iter().map(|m| m.to_string()).collect(),
            20,
        );
        s.transition_to(SessionState::ReadyCheck, "start").unwrap();
        s
    }

    fn liquidity(pairs: &[(&str, Decimal)]) -> HashMap<String, Decimal> {
        pairs.iter().map(|(m, d)| (m.to_string(), *d)).collect()
    }

    #[test]
    fn test_advance_to_next_member() {
        let session = session(&["a", "b", "c"]);
        let funds = liquidity(&[("a", dec!(10)), ("b", dec!(10)), ("c", dec!(10))]);
        assert_eq!(
            next_eligible(&session, &funds),
            AdvanceOutcome::Turn {
                member_id: "b".to_string(),
                index: 1
            }
        );
    }

    #[test]
    fn test_advance_skips_passed_and_finished() {
        let mut session = session(&["a", "b", "c", "d"]);
        session.passed_members.insert("b".to_string());
        session.finished_members.insert("c".to_string());
        let funds = liquidity(&[
            ("a", dec!(10)),
            ("b", dec!(10)),
            ("c", dec!(10)),
            ("d", dec!(10)),
        ]);
        assert_eq!(
            next_eligible(&session, &funds),
            AdvanceOutcome::Turn {
                member_id: "d".to_string(),
                index: 3
            }
        );
    }

    #[test]
    fn test_advance_skips_below_entry_stake() {
        let session = session(&["a", "b", "c"]);
        // b holds exactly 1: one minimum bid but no room for the
        // commitment it would create.
        let funds = liquidity(&[("a", dec!(10)), ("b", dec!(1)), ("c", dec!(2))]);
        assert_eq!(
            next_eligible(&session, &funds),
            AdvanceOutcome::Turn {
                member_id: "c".to_string(),
                index: 2
            }
        );
    }

    #[test]
    fn test_advance_wraps_around() {
        let mut session = session(&["a", "b", "c"]);
        session.current_turn_index = 2;
        session.passed_members.insert("b".to_string());
        let funds = liquidity(&[("a", dec!(10)), ("b", dec!(10)), ("c", dec!(10))]);
        assert_eq!(
            next_eligible(&session, &funds),
            AdvanceOutcome::Turn {
                member_id: "a".to_string(),
                index: 0
            }
        );
    }

    #[test]
    fn test_sole_survivor_keeps_the_turn() {
        let mut session = session(&["a", "b", "c"]);
        session.passed_members.insert("b".to_string());
        session.passed_members.insert("c".to_string());
        let funds = liquidity(&[("a", dec!(10)), ("b", dec!(10)), ("c", dec!(10))]);
        assert_eq!(
            next_eligible(&session, &funds),
            AdvanceOutcome::Turn {
                member_id: "a".to_string(),
                index: 0
            }
        );
    }

    #[test]
    fn test_advance_is_deterministic() {
        let mut session = session(&["a", "b", "c"]);
        session.finished_members.insert("b".to_string());
        let funds = liquidity(&[("a", dec!(10)), ("b", dec!(10)), ("c", dec!(2))]);
        let first = next_eligible(&session, &funds);
        let second = next_eligible(&session, &funds);
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_eligible_member_completes() {
        let mut session = session(&["a", "b"]);
        session.passed_members.insert("a".to_string());
        let funds = liquidity(&[("a", dec!(10)), ("b", dec!(1))]);
        assert_eq!(next_eligible(&session, &funds), AdvanceOutcome::Completed);

        apply_advance(&mut session, &AdvanceOutcome::Completed).unwrap();
        assert_eq!(session.state, SessionState::Completed);
    }

    #[test]
    fn test_apply_turn_resets_per_turn_state() {
        let mut session = session(&["a", "b"]);
        session.ready_members.insert("a".to_string());
        let outcome = AdvanceOutcome::Turn {
            member_id: "b".to_string(),
            index: 1,
        };
        apply_advance(&mut session, &outcome).unwrap();
        assert_eq!(session.current_turn_index, 1);
        assert!(session.ready_members.is_empty());
        assert!(session.pending_nomination.is_none());
    }

    #[test]
    fn test_pass_requires_ready_check_and_own_turn() {
        let mut session = session(&["a", "b"]);

        let err = pass(&mut session, "b").unwrap_err();
        assert!(matches!(err, EngineError::NotYourTurn { .. }));

        pass(&mut session, "a").unwrap();
        assert!(session.passed_members.contains("a"));

        session.transition_to(SessionState::Nomination, "nominate").unwrap();
        let err = pass(&mut session, "b").unwrap_err();
        assert!(matches!(err, EngineError::WrongState { .. }));
    }

    #[test]
    fn test_pass_unknown_member() {
        let mut session = session(&["a", "b"]);
        let err = pass(&mut session, "zz").unwrap_err();
        assert!(matches!(err, EngineError::UnknownMember { .. }));
    }
}
