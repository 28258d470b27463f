//! The live auction engine: turn sequencing, nomination handshake,
//! bidding, settlement, acknowledgment barrier, and the appeal
//! sub-protocol, all serialized through one actor loop per session.

pub mod appeal;
pub mod barrier;
pub mod bidding;
pub mod clock;
pub mod command;
pub mod engine;
pub mod events;
pub mod nomination;
pub mod sequencer;
pub mod settlement;

pub use clock::AuctionClock;
pub use command::{AdminCommand, ClosedAuction, EngineCommand, EngineSnapshot, MemberPresence};
pub use engine::{AuctionEngine, EngineHandle};
pub use events::EngineEvent;
pub use sequencer::AdvanceOutcome;
pub use settlement::CloseOutcome;
