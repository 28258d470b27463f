//! External collaborators for budget/roster/contract state.
//!
//! The engine calls these, it never re-implements them: `LedgerGateway`
//! performs the atomic debit+assign+contract mutation (and its inverse),
//! `Directory` answers roster and liquidity questions. `InMemoryLedger`
//! backs both for tests and simulation.

pub mod contract;
pub mod gateway;
pub mod memory;

pub use contract::ContractTerms;
pub use gateway::{
    AcquisitionType, Directory, LedgerError, LedgerGateway, ReversalRequest, SettlementReceipt,
    SettlementRequest,
};
pub use memory::InMemoryLedger;
