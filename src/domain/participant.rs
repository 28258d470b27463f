use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::player::Role;

/// A league member's financial and roster standing, as seen by the engine.
///
/// The engine never mutates this directly — the Ledger Gateway owns the
/// authoritative record and the engine re-fetches it at bid time and again
/// at settlement time, since the pool can shift between the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub member_id: String,
    /// Remaining budget in league credits.
    pub budget: Decimal,
    /// Total committed salary across all contracts ("monte ingaggi").
    pub committed_salary: Decimal,
    /// Occupied roster slots per category.
    pub slot_usage: HashMap<Role, u32>,
    /// Slot capacity per category.
    pub slot_capacity: HashMap<Role, u32>,
}

impl Participant {
    /// Spendable amount: budget minus total committed salary.
    ///
    /// Must never go negative as a result of an engine action.
    pub fn liquidity(&self) -> Decimal {
        self.budget - self.committed_salary
    }

    /// Whether a free slot exists for the given role.
    pub fn has_free_slot(&self, role: Role) -> bool {
        let used = self.slot_usage.get(&role).copied().unwrap_or(0);
        let cap = self.slot_capacity.get(&role).copied().unwrap_or(0);
        used < cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn participant(budget: Decimal, committed: Decimal) -> Participant {
        Participant {
            member_id: "m1".to_string(),
            budget,
            committed_salary: committed,
            slot_usage: HashMap::from([(Role::Forward, 2)]),
            slot_capacity: HashMap::from([(Role::Forward, 3), (Role::Defender, 8)]),
        }
    }

    #[test]
    fn test_liquidity() {
        let p = participant(dec!(100), dec!(35));
        assert_eq!(p.liquidity(), dec!(65));
    }

    #[test]
    fn test_free_slot() {
        let p = participant(dec!(100), dec!(0));
        assert!(p.has_free_slot(Role::Forward));
        assert!(p.has_free_slot(Role::Defender));
        // No capacity configured at all means no slot.
        assert!(!p.has_free_slot(Role::Goalkeeper));
    }
}
