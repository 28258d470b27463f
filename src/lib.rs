pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod liveness;

pub use config::EngineConfig;
pub use domain::{
    Appeal, AppealStatus, Auction, AuctionStatus, Bid, Participant, PendingAcknowledgment,
    Player, Role, Session, SessionState,
};
pub use engine::{
    AuctionEngine, EngineEvent, EngineHandle, EngineSnapshot,
};
pub use error::{EngineError, Result};
pub use ledger::{
    ContractTerms, Directory, InMemoryLedger, LedgerError, LedgerGateway, SettlementReceipt,
    SettlementRequest,
};
pub use liveness::{LivenessTracker, Presence};
