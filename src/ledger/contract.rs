//! Deterministic contract formulas.
//!
//! These are pure functions consumed by settlement, not part of the
//! engine: a league rulebook maps an acquisition price to a yearly salary
//! and a rescission clause, and the same inputs always produce the same
//! contract.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Contract created automatically when an auction settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    /// Yearly salary counted into the member's committed total.
    pub salary: Decimal,
    /// Price another member must pay to break the contract.
    pub rescission_clause: Decimal,
    /// Contract length in seasons.
    pub seasons: u8,
}

impl ContractTerms {
    /// Default terms from the final auction price: salary is 10% of the
    /// price rounded up, never below the minimum commitment of 1; the
    /// rescission clause is twice the salary; one season.
    pub fn from_price(price: Decimal) -> Self {
        let salary = default_salary(price);
        Self {
            salary,
            rescission_clause: salary * Decimal::TWO,
            seasons: 1,
        }
    }
}

/// Default salary: `max(1, ceil(price / 10))`.
pub fn default_salary(price: Decimal) -> Decimal {
    let tenth = (price * Decimal::new(1, 1)).ceil();
    tenth.max(Decimal::ONE)
}
