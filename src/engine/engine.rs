//! AuctionEngine — single logical state owner per session.
//!
//! The engine task owns the session, the open auction, the bid book, and
//! the clock. All mutations arrive as `EngineCommand`s over one mpsc
//! channel and are serialized through the `tokio::select!` loop alongside
//! clock expiry, so concurrent bids linearize by arrival and no two
//! settlement operations can ever overlap. Clients hold a clone-friendly
//! `EngineHandle`.

use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::domain::{
    min_bid, Auction, AuditEntry, AuditKind, BidBook, PausedSnapshot, Player, Session,
    SessionState,
};
use crate::error::{EngineError, Result};
use crate::ledger::{Directory, LedgerGateway, SettlementReceipt};
use crate::liveness::{LivenessTracker, Presence};

use super::command::{
    AdminCommand, ClosedAuction, EngineCommand, EngineSnapshot, MemberPresence, Reply,
};
use super::events::EngineEvent;
use super::sequencer::AdvanceOutcome;
use super::settlement::CloseOutcome;
use super::{appeal, barrier, bidding, clock::AuctionClock, nomination, sequencer, settlement};

/// Clonable handle given to clients for submitting protocol actions.
#[derive(Clone)]
pub struct EngineHandle {
    league_id: String,
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_tx: broadcast::Sender<EngineEvent>,
    liveness: Arc<LivenessTracker>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> EngineCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| EngineError::ChannelClosed("engine command channel closed".into()))?;
        rx.await
            .map_err(|_| EngineError::ChannelClosed("engine reply dropped".into()))?
    }

    /// Subscribe to the fire-and-forget event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Record a heartbeat. Lock-free and never routed through the engine
    /// loop: liveness must never block auction progress.
    pub fn heartbeat(&self, member_id: &str) {
        self.liveness.beat(&self.league_id, member_id);
    }

    /// Derived presence for one member.
    pub fn presence(&self, member_id: &str) -> Presence {
        self.liveness.status(&self.league_id, member_id)
    }

    /// Poll-safe snapshot of the full engine state.
    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(EngineCommand::Snapshot { reply: tx })
            .await
            .map_err(|_| EngineError::ChannelClosed("engine command channel closed".into()))?;
        rx.await
            .map_err(|_| EngineError::ChannelClosed("engine reply dropped".into()))
    }

    pub async fn pass(&self, member_id: &str) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| EngineCommand::Pass { member_id, reply })
            .await
    }

    pub async fn nominate(&self, member_id: &str, player: Player) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| EngineCommand::Nominate {
            member_id,
            player,
            reply,
        })
        .await
    }

    pub async fn confirm_nomination(&self, member_id: &str) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| EngineCommand::ConfirmNomination { member_id, reply })
            .await
    }

    pub async fn cancel_nomination(&self, member_id: &str) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| EngineCommand::CancelNomination { member_id, reply })
            .await
    }

    pub async fn mark_ready(&self, member_id: &str) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| EngineCommand::MarkReady { member_id, reply })
            .await
    }

    pub async fn place_bid(&self, member_id: &str, amount: Decimal) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| EngineCommand::PlaceBid {
            member_id,
            amount,
            reply,
        })
        .await
    }

    pub async fn acknowledge(&self, member_id: &str) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| EngineCommand::Acknowledge { member_id, reply })
            .await
    }

    pub async fn file_appeal(&self, member_id: &str, reason: &str) -> Result<()> {
        let member_id = member_id.to_string();
        let reason = reason.to_string();
        self.request(|reply| EngineCommand::FileAppeal {
            member_id,
            reason,
            reply,
        })
        .await
    }

    pub async fn ack_appeal_decision(&self, member_id: &str) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| EngineCommand::AckAppealDecision { member_id, reply })
            .await
    }

    pub async fn mark_resume_ready(&self, member_id: &str) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| EngineCommand::MarkResumeReady { member_id, reply })
            .await
    }

    pub async fn declare_finished(&self, member_id: &str) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| EngineCommand::DeclareFinished { member_id, reply })
            .await
    }

    // --- Admin surface ---

    pub async fn start(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Admin(AdminCommand::Start { reply }))
            .await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Admin(AdminCommand::Pause { reply }))
            .await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Admin(AdminCommand::Resume { reply }))
            .await
    }

    pub async fn set_timer_secs(&self, secs: u64) -> Result<()> {
        self.request(|reply| EngineCommand::Admin(AdminCommand::SetTimerSecs { secs, reply }))
            .await
    }

    pub async fn set_no_slot_limit_phase(&self, enabled: bool) -> Result<()> {
        self.request(|reply| {
            EngineCommand::Admin(AdminCommand::SetNoSlotLimitPhase { enabled, reply })
        })
        .await
    }

    pub async fn force_ready(&self, member_id: &str) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| EngineCommand::Admin(AdminCommand::ForceReady { member_id, reply }))
            .await
    }

    pub async fn force_all_ready(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Admin(AdminCommand::ForceAllReady { reply }))
            .await
    }

    pub async fn force_ack(&self, member_id: &str) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| EngineCommand::Admin(AdminCommand::ForceAck { member_id, reply }))
            .await
    }

    pub async fn force_all_acks(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Admin(AdminCommand::ForceAllAcks { reply }))
            .await
    }

    pub async fn force_finished(&self, member_id: &str) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| {
            EngineCommand::Admin(AdminCommand::ForceFinished { member_id, reply })
        })
        .await
    }

    pub async fn force_cancel_nomination(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Admin(AdminCommand::ForceCancelNomination { reply }))
            .await
    }

    pub async fn decide_appeal(&self, accept: bool, notes: Option<String>) -> Result<()> {
        self.request(|reply| {
            EngineCommand::Admin(AdminCommand::DecideAppeal {
                accept,
                notes,
                reply,
            })
        })
        .await
    }

    pub async fn force_all_appeal_acks(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Admin(AdminCommand::ForceAllAppealAcks { reply }))
            .await
    }

    pub async fn force_all_resume_ready(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Admin(AdminCommand::ForceAllResumeReady { reply }))
            .await
    }

    pub async fn simulate_bot_bid(&self, member_id: &str) -> Result<()> {
        let member_id = member_id.to_string();
        self.request(|reply| {
            EngineCommand::Admin(AdminCommand::SimulateBotBid { member_id, reply })
        })
        .await
    }
}

/// The engine — owns one session's state and runs the main event loop.
pub struct AuctionEngine {
    config: EngineConfig,
    session: Session,
    auction: Option<Auction>,
    book: BidBook,
    receipt: Option<SettlementReceipt>,
    history: Vec<ClosedAuction>,
    clock: AuctionClock,
    gateway: Arc<dyn LedgerGateway>,
    directory: Arc<dyn Directory>,
    liveness: Arc<LivenessTracker>,
    event_tx: broadcast::Sender<EngineEvent>,
    cmd_tx: mpsc::Sender<EngineCommand>,
    cmd_rx: mpsc::Receiver<EngineCommand>,
}

impl AuctionEngine {
    pub fn new(
        config: EngineConfig,
        league_id: impl Into<String>,
        turn_order: Vec<String>,
        gateway: Arc<dyn LedgerGateway>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(128);
        let (event_tx, _) = broadcast::channel(256);
        let liveness = Arc::new(LivenessTracker::new(&config.liveness));
        let session = Session::new(league_id, turn_order, config.timer.bid_window_secs);
        let clock = AuctionClock::new(config.timer.bid_window_secs);

        Self {
            config,
            session,
            auction: None,
            book: BidBook::new(),
            receipt: None,
            history: Vec::new(),
            clock,
            gateway,
            directory,
            liveness,
            event_tx,
            cmd_tx,
            cmd_rx,
        }
    }

    /// Create a clonable handle for clients.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            league_id: self.session.league_id.clone(),
            cmd_tx: self.cmd_tx.clone(),
            event_tx: self.event_tx.clone(),
            liveness: self.liveness.clone(),
        }
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Main engine loop — blocks until shutdown.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            league_id = %self.session.league_id,
            members = self.session.turn_order.len(),
            "auction engine starting main loop"
        );

        let prune_interval =
            Duration::from_secs(self.config.liveness.eviction_after_secs().max(60));
        let mut prune_tick = tokio::time::interval(prune_interval);
        prune_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let deadline = self.clock.deadline();
            tokio::select! {
                Some(cmd) = self.cmd_rx.recv() => {
                    self.handle_command(cmd).await;
                }

                // Clock expiry: the only trigger for closing & settlement.
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let generation = self.clock.generation();
                    self.handle_expiry(generation).await;
                }

                _ = prune_tick.tick() => {
                    self.liveness.prune();
                }

                _ = shutdown_rx.recv() => {
                    info!(league_id = %self.session.league_id, "engine: shutdown signal received");
                    break;
                }
            }
        }

        info!(league_id = %self.session.league_id, "engine: main loop exited");
    }

    fn emit(&self, event: EngineEvent) {
        // Fire-and-forget; correctness never depends on delivery.
        let _ = self.event_tx.send(event);
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            session: self.session.clone(),
            auction: self.auction.clone(),
            bids: self.book.bids().to_vec(),
            timer_remaining_secs: self.clock.remaining().map(|d| d.as_secs()),
            presence: self
                .liveness
                .league_snapshot(&self.session.league_id)
                .into_iter()
                .map(|(member_id, presence)| MemberPresence {
                    member_id,
                    presence,
                })
                .collect(),
            history: self.history.clone(),
        }
    }

    async fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Pass { member_id, reply } => {
                let result = self.handle_pass(&member_id).await;
                let _ = reply.send(result);
            }
            EngineCommand::Nominate {
                member_id,
                player,
                reply,
            } => {
                let result = self.handle_nominate(&member_id, player).await;
                let _ = reply.send(result);
            }
            EngineCommand::ConfirmNomination { member_id, reply } => {
                let result = self.handle_confirm(&member_id).await;
                let _ = reply.send(result);
            }
            EngineCommand::CancelNomination { member_id, reply } => {
                let result = self.handle_cancel_nomination(&member_id, false);
                let _ = reply.send(result);
            }
            EngineCommand::MarkReady { member_id, reply } => {
                let result = self.handle_mark_ready(&member_id).await;
                let _ = reply.send(result);
            }
            EngineCommand::PlaceBid {
                member_id,
                amount,
                reply,
            } => {
                let result = self.handle_place_bid(&member_id, amount).await;
                let _ = reply.send(result);
            }
            EngineCommand::Acknowledge { member_id, reply } => {
                let result = self.handle_acknowledge(&member_id).await;
                let _ = reply.send(result);
            }
            EngineCommand::FileAppeal {
                member_id,
                reason,
                reply,
            } => {
                let result = self.handle_file_appeal(&member_id, &reason);
                let _ = reply.send(result);
            }
            EngineCommand::AckAppealDecision { member_id, reply } => {
                let result = self.handle_ack_appeal_decision(&member_id);
                let _ = reply.send(result);
            }
            EngineCommand::MarkResumeReady { member_id, reply } => {
                let result = self.handle_mark_resume_ready(&member_id);
                let _ = reply.send(result);
            }
            EngineCommand::DeclareFinished { member_id, reply } => {
                let result = self.handle_declare_finished(&member_id, None).await;
                let _ = reply.send(result);
            }
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            EngineCommand::Admin(admin) => self.handle_admin(admin).await,
        }
    }

    async fn handle_admin(&mut self, cmd: AdminCommand) {
        match cmd {
            AdminCommand::Start { reply } => {
                let result = self.handle_start().await;
                let _ = reply.send(result);
            }
            AdminCommand::Pause { reply } => {
                let result = self.handle_pause();
                let _ = reply.send(result);
            }
            AdminCommand::Resume { reply } => {
                let result = self.handle_resume();
                let _ = reply.send(result);
            }
            AdminCommand::SetTimerSecs { secs, reply } => {
                let result = self.handle_set_timer(secs);
                let _ = reply.send(result);
            }
            AdminCommand::SetNoSlotLimitPhase { enabled, reply } => {
                self.session.no_slot_limit_phase = enabled;
                let _ = reply.send(Ok(()));
            }
            AdminCommand::ForceReady { member_id, reply } => {
                let result = self.handle_force_ready(&member_id).await;
                let _ = reply.send(result);
            }
            AdminCommand::ForceAllReady { reply } => {
                let result = self.handle_force_all_ready().await;
                let _ = reply.send(result);
            }
            AdminCommand::ForceAck { member_id, reply } => {
                let result = self.handle_force_ack(&member_id).await;
                let _ = reply.send(result);
            }
            AdminCommand::ForceAllAcks { reply } => {
                let result = self.handle_force_all_acks().await;
                let _ = reply.send(result);
            }
            AdminCommand::ForceFinished { member_id, reply } => {
                let result = self.handle_declare_finished(&member_id, Some("admin")).await;
                let _ = reply.send(result);
            }
            AdminCommand::ForceCancelNomination { reply } => {
                let result = self.handle_cancel_nomination("admin", true);
                let _ = reply.send(result);
            }
            AdminCommand::DecideAppeal {
                accept,
                notes,
                reply,
            } => {
                let result = self.handle_decide_appeal(accept, notes).await;
                let _ = reply.send(result);
            }
            AdminCommand::ForceAllAppealAcks { reply } => {
                let result = appeal::force_all_decision_acks(&mut self.session, "admin");
                let _ = reply.send(result);
            }
            AdminCommand::ForceAllResumeReady { reply } => {
                let result = self.handle_force_all_resume_ready();
                let _ = reply.send(result);
            }
            AdminCommand::SimulateBotBid { member_id, reply } => {
                let result = self.handle_bot_bid(&member_id).await;
                let _ = reply.send(result);
            }
        }
    }

    // --- Clock expiry ---

    async fn handle_expiry(&mut self, generation: u64) {
        if !self.clock.is_current(generation) {
            // A bid accepted strictly before expiry already reset the
            // clock; this firing is superseded and must no-op.
            debug!(generation, "stale clock expiry ignored");
            return;
        }
        if self.session.state != SessionState::Auction {
            self.clock.cancel();
            return;
        }
        let Some(auction) = self.auction.as_mut() else {
            self.clock.cancel();
            return;
        };

        let auction_id = auction.id;
        let gateway = self.gateway.clone();
        let outcome =
            settlement::close_auction(&mut self.session, auction, &self.book, gateway.as_ref())
                .await;
        let price = auction.current_price;

        match outcome {
            Ok(CloseOutcome::AlreadyTerminal) => {
                self.clock.cancel();
            }
            Ok(CloseOutcome::NoBids) => {
                self.clock.cancel();
                self.emit(EngineEvent::AuctionClosed {
                    auction_id,
                    winner: None,
                    price,
                    no_bids: true,
                });
            }
            Ok(CloseOutcome::Won { winner, receipt }) => {
                self.clock.cancel();
                self.receipt = Some(receipt);
                self.emit(EngineEvent::AuctionClosed {
                    auction_id,
                    winner: Some(winner),
                    price,
                    no_bids: false,
                });
            }
            Err(e) => {
                error!(
                    %auction_id,
                    error = %e,
                    retry_secs = self.config.settlement.retry_secs,
                    "settlement failed; re-arming clock for retry"
                );
                self.clock
                    .arm_for(Duration::from_secs(self.config.settlement.retry_secs));
            }
        }
    }

    // --- Member operations ---

    async fn handle_pass(&mut self, member_id: &str) -> Result<()> {
        sequencer::pass(&mut self.session, member_id)?;
        self.session.record_audit(AuditEntry::new(
            AuditKind::MemberPassed,
            member_id,
            "passed the turn",
        ));
        self.emit(EngineEvent::MemberPassed {
            member_id: member_id.to_string(),
        });
        self.advance_turn().await
    }

    async fn handle_nominate(&mut self, member_id: &str, player: Player) -> Result<()> {
        if !self.session.is_member(member_id) {
            return Err(EngineError::UnknownMember {
                member_id: member_id.to_string(),
            });
        }
        let league_id = self.session.league_id.clone();
        let assigned = self
            .directory
            .is_player_assigned(&league_id, &player.id)
            .await?;
        let participant = self.directory.participant(&league_id, member_id).await?;

        let player_id = player.id.clone();
        nomination::nominate(
            &mut self.session,
            member_id,
            player,
            participant.liquidity(),
            assigned,
        )?;
        info!(member_id, player_id = %player_id, "player nominated");
        self.emit(EngineEvent::NominationProposed {
            player_id,
            nominator: member_id.to_string(),
        });
        Ok(())
    }

    async fn handle_confirm(&mut self, member_id: &str) -> Result<()> {
        nomination::confirm(&mut self.session, member_id)?;
        let player_id = self
            .session
            .pending_nomination
            .as_ref()
            .map(|p| p.player.id.clone())
            .unwrap_or_default();
        self.emit(EngineEvent::NominationConfirmed { player_id });
        self.try_open_auction()
    }

    fn handle_cancel_nomination(&mut self, actor: &str, is_admin: bool) -> Result<()> {
        nomination::cancel(&mut self.session, actor, is_admin)?;
        self.session.record_audit(AuditEntry::new(
            AuditKind::NominationCancelled,
            actor,
            if is_admin {
                "cancelled by admin"
            } else {
                "cancelled by nominator"
            },
        ));
        self.emit(EngineEvent::NominationCancelled {
            by: actor.to_string(),
        });
        Ok(())
    }

    async fn handle_mark_ready(&mut self, member_id: &str) -> Result<()> {
        let all = nomination::mark_ready(&mut self.session, member_id)?;
        self.emit(EngineEvent::MemberReady {
            member_id: member_id.to_string(),
        });
        if all {
            self.try_open_auction()?;
        }
        Ok(())
    }

    /// Open the bid war once the nomination is confirmed and every active
    /// member is ready.
    fn try_open_auction(&mut self) -> Result<()> {
        if !nomination::all_ready(&self.session) {
            return Ok(());
        }
        self.session
            .transition_to(SessionState::Auction, "all members ready")
            .map_err(EngineError::Internal)?;
        let pending = self
            .session
            .pending_nomination
            .take()
            .ok_or(EngineError::Internal("auction open without nomination".into()))?;
        self.session.ready_members.clear();

        let (auction, book) = bidding::open_auction(pending.player, &pending.nominator, min_bid());
        let auction_id = auction.id;
        let player_id = auction.player.id.clone();
        let base_price = auction.base_price;

        info!(
            %auction_id,
            player_id = %player_id,
            nominator = %pending.nominator,
            "auction opened"
        );
        self.auction = Some(auction);
        self.book = book;
        self.receipt = None;
        self.clock.reset();
        self.emit(EngineEvent::AuctionOpened {
            auction_id,
            player_id,
            base_price,
        });
        Ok(())
    }

    async fn handle_place_bid(&mut self, member_id: &str, amount: Decimal) -> Result<()> {
        if !self.session.is_member(member_id) {
            return Err(EngineError::UnknownMember {
                member_id: member_id.to_string(),
            });
        }
        if self.session.state != SessionState::Auction {
            return Err(EngineError::WrongState {
                expected: "AUCTION",
                actual: self.session.state,
            });
        }
        let league_id = self.session.league_id.clone();
        let participant = self.directory.participant(&league_id, member_id).await?;

        let auction = self.auction.as_mut().ok_or(EngineError::NoActiveAuction)?;
        let bid = bidding::place_bid(
            &self.session,
            auction,
            &mut self.book,
            member_id,
            amount,
            &participant,
        )?;
        let auction_id = auction.id;

        // The core fairness rule: a fresh full window, not an extension.
        self.clock.reset();
        debug!(bidder = %bid.bidder, amount = %bid.amount, "bid accepted; clock reset");
        self.emit(EngineEvent::BidAccepted {
            auction_id,
            bidder: bid.bidder,
            amount: bid.amount,
        });
        Ok(())
    }

    async fn handle_acknowledge(&mut self, member_id: &str) -> Result<()> {
        let cleared = barrier::acknowledge(&mut self.session, member_id)?;
        self.emit(EngineEvent::MemberAcknowledged {
            member_id: member_id.to_string(),
        });
        if cleared {
            self.finish_barrier().await?;
        }
        Ok(())
    }

    fn handle_file_appeal(&mut self, member_id: &str, reason: &str) -> Result<()> {
        appeal::file(&mut self.session, member_id, reason)?;
        self.emit(EngineEvent::AppealFiled {
            by: member_id.to_string(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    fn handle_ack_appeal_decision(&mut self, member_id: &str) -> Result<()> {
        appeal::ack_decision(&mut self.session, member_id)?;
        self.emit(EngineEvent::AppealDecisionAcked {
            member_id: member_id.to_string(),
        });
        Ok(())
    }

    fn handle_mark_resume_ready(&mut self, member_id: &str) -> Result<()> {
        let all = appeal::mark_resume_ready(&mut self.session, member_id)?;
        self.emit(EngineEvent::ResumeReady {
            member_id: member_id.to_string(),
        });
        if all {
            self.reopen_auction()?;
        }
        Ok(())
    }

    async fn handle_declare_finished(
        &mut self,
        member_id: &str,
        forced_by: Option<&str>,
    ) -> Result<()> {
        if !self.session.is_member(member_id) {
            return Err(EngineError::UnknownMember {
                member_id: member_id.to_string(),
            });
        }
        if self.session.state.is_terminal() {
            return Err(EngineError::WrongState {
                expected: "an active session",
                actual: self.session.state,
            });
        }
        // Idempotent: declaring twice is a no-op.
        if !self.session.finished_members.insert(member_id.to_string()) {
            return Ok(());
        }
        let actor = forced_by.unwrap_or(member_id);
        self.session.record_audit(AuditEntry::new(
            AuditKind::MemberFinished,
            actor,
            format!("{} declared finished", member_id),
        ));
        self.emit(EngineEvent::MemberFinished {
            member_id: member_id.to_string(),
        });

        // A finished member holding the turn would stall the ready check.
        if self.session.state == SessionState::ReadyCheck
            && self.session.current_member() == Some(member_id)
        {
            self.advance_turn().await?;
        }
        Ok(())
    }

    // --- Admin operations ---

    async fn handle_start(&mut self) -> Result<()> {
        if self.session.state != SessionState::Setup {
            return Err(EngineError::WrongState {
                expected: "SETUP",
                actual: self.session.state,
            });
        }
        self.session
            .transition_to(SessionState::ReadyCheck, "session started")
            .map_err(EngineError::Internal)?;
        self.session.record_audit(AuditEntry::new(
            AuditKind::SessionStarted,
            "admin",
            "acquisition phase opened",
        ));
        self.emit(EngineEvent::SessionStarted {
            league_id: self.session.league_id.clone(),
        });

        // The seeded turn pointer may already sit on an ineligible member.
        let liquidity = self.gather_liquidity().await?;
        let current_ok = self
            .session
            .current_member()
            .map(|m| {
                let funds = liquidity.get(m).copied().unwrap_or(Decimal::ZERO);
                sequencer::is_eligible(&self.session, m, funds)
            })
            .unwrap_or(false);
        if !current_ok {
            self.advance_turn().await?;
        }
        Ok(())
    }

    fn handle_pause(&mut self) -> Result<()> {
        if !self.session.state.can_transition_to(SessionState::Paused) {
            return Err(EngineError::WrongState {
                expected: "a pausable state",
                actual: self.session.state,
            });
        }
        let resume_to = self.session.state;
        let timer_remaining_secs = self.clock.pause();
        self.session.paused = Some(PausedSnapshot {
            resume_to,
            timer_remaining_secs,
        });
        self.session
            .transition_to(SessionState::Paused, "admin pause")
            .map_err(EngineError::Internal)?;
        self.session.record_audit(AuditEntry::new(
            AuditKind::SessionPaused,
            "admin",
            format!("paused in {}", resume_to),
        ));
        self.emit(EngineEvent::SessionPaused {
            timer_remaining_secs,
        });
        Ok(())
    }

    fn handle_resume(&mut self) -> Result<()> {
        if self.session.state != SessionState::Paused {
            return Err(EngineError::WrongState {
                expected: "PAUSED",
                actual: self.session.state,
            });
        }
        let snapshot = self
            .session
            .paused
            .take()
            .ok_or(EngineError::Internal("paused state without snapshot".into()))?;
        self.session
            .transition_to(snapshot.resume_to, "admin resume")
            .map_err(EngineError::Internal)?;
        if let Some(secs) = snapshot.timer_remaining_secs {
            // Restore the countdown verbatim.
            self.clock.resume(secs);
        }
        self.session.record_audit(AuditEntry::new(
            AuditKind::SessionResumed,
            "admin",
            format!("resumed into {}", snapshot.resume_to),
        ));
        self.emit(EngineEvent::SessionResumed);
        Ok(())
    }

    fn handle_set_timer(&mut self, secs: u64) -> Result<()> {
        self.session.timer_secs = secs;
        self.clock.set_window_secs(secs);
        self.session.record_audit(AuditEntry::new(
            AuditKind::TimerChanged,
            "admin",
            format!("bid window set to {}s", secs),
        ));
        self.emit(EngineEvent::TimerChanged { secs });
        Ok(())
    }

    async fn handle_force_ready(&mut self, member_id: &str) -> Result<()> {
        match nomination::mark_ready(&mut self.session, member_id) {
            Ok(all) => {
                self.session.record_audit(AuditEntry::new(
                    AuditKind::ForcedReady,
                    "admin",
                    format!("forced ready for {}", member_id),
                ));
                self.emit(EngineEvent::MemberReady {
                    member_id: member_id.to_string(),
                });
                if all {
                    self.try_open_auction()?;
                }
                Ok(())
            }
            Err(EngineError::AlreadyReady { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn handle_force_all_ready(&mut self) -> Result<()> {
        if self.session.state != SessionState::Nomination {
            return Err(EngineError::WrongState {
                expected: "NOMINATION",
                actual: self.session.state,
            });
        }
        match &self.session.pending_nomination {
            Some(pending) if pending.confirmed => {}
            Some(_) => return Err(EngineError::NominationUnconfirmed),
            None => {
                return Err(EngineError::Internal(
                    "nomination state without pending nomination".into(),
                ))
            }
        }
        for member in self.session.active_members() {
            self.session.ready_members.insert(member);
        }
        self.session.record_audit(AuditEntry::new(
            AuditKind::ForcedReady,
            "admin",
            "forced ready for all members",
        ));
        self.try_open_auction()
    }

    async fn handle_force_ack(&mut self, member_id: &str) -> Result<()> {
        match barrier::acknowledge(&mut self.session, member_id) {
            Ok(cleared) => {
                self.session.record_audit(AuditEntry::new(
                    AuditKind::ForcedAck,
                    "admin",
                    format!("forced acknowledgment for {}", member_id),
                ));
                self.emit(EngineEvent::MemberAcknowledged {
                    member_id: member_id.to_string(),
                });
                if cleared {
                    self.finish_barrier().await?;
                }
                Ok(())
            }
            Err(EngineError::AlreadyAcknowledged { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn handle_force_all_acks(&mut self) -> Result<()> {
        barrier::force_all(&mut self.session, "admin")?;
        self.finish_barrier().await
    }

    async fn handle_decide_appeal(&mut self, accept: bool, notes: Option<String>) -> Result<()> {
        if !accept {
            appeal::reject(&mut self.session, "admin", notes)?;
            self.emit(EngineEvent::AppealRejected);
            return Ok(());
        }
        let gateway = self.gateway.clone();
        let receipt = self.receipt.clone();
        let auction = self.auction.as_mut().ok_or(EngineError::NoActiveAuction)?;
        let reopen_price = appeal::accept(
            &mut self.session,
            auction,
            &mut self.book,
            gateway.as_ref(),
            receipt.as_ref(),
            "admin",
            notes,
        )
        .await?;
        self.receipt = None;
        self.emit(EngineEvent::AppealAccepted { reopen_price });
        Ok(())
    }

    fn handle_force_all_resume_ready(&mut self) -> Result<()> {
        appeal::force_all_resume_ready(&mut self.session, "admin")?;
        self.reopen_auction()
    }

    async fn handle_bot_bid(&mut self, member_id: &str) -> Result<()> {
        let current_price = self
            .auction
            .as_ref()
            .ok_or(EngineError::NoActiveAuction)?
            .current_price;
        let raise = rand::thread_rng().gen_range(1..=self.config.bot.max_raise.max(1));
        let amount = current_price + Decimal::from(raise);
        self.handle_place_bid(member_id, amount).await
    }

    // --- Shared transitions ---

    /// Tear down a cleared barrier, retire the auction, and advance.
    async fn finish_barrier(&mut self) -> Result<()> {
        barrier::clear(&mut self.session)?;
        self.emit(EngineEvent::BarrierCleared);
        if let Some(auction) = self.auction.take() {
            let book = std::mem::take(&mut self.book);
            self.history.push(ClosedAuction {
                auction,
                bids: book.bids().to_vec(),
            });
        }
        self.receipt = None;
        self.advance_turn().await
    }

    /// Re-open a reversed auction once the resume barrier has cleared.
    fn reopen_auction(&mut self) -> Result<()> {
        let auction = self.auction.as_mut().ok_or(EngineError::NoActiveAuction)?;
        appeal::reopen(&mut self.session, auction)?;
        let auction_id = auction.id;
        let price = auction.current_price;
        self.clock.reset();
        info!(%auction_id, %price, "auction re-opened after appeal");
        self.emit(EngineEvent::AuctionReopened { auction_id, price });
        Ok(())
    }

    /// Move the turn pointer to the next eligible member, or complete the
    /// session when nobody can act.
    async fn advance_turn(&mut self) -> Result<()> {
        let liquidity = self.gather_liquidity().await?;
        let outcome = sequencer::next_eligible(&self.session, &liquidity);
        match &outcome {
            AdvanceOutcome::Turn { member_id, index } => {
                if self.session.state != SessionState::ReadyCheck {
                    self.session
                        .transition_to(SessionState::ReadyCheck, "turn advances")
                        .map_err(EngineError::Internal)?;
                }
                sequencer::apply_advance(&mut self.session, &outcome)?;
                info!(member_id = %member_id, index, "turn advanced");
                self.emit(EngineEvent::TurnAdvanced {
                    member_id: member_id.clone(),
                    index: *index,
                });
            }
            AdvanceOutcome::Completed => {
                sequencer::apply_advance(&mut self.session, &outcome)?;
                self.session.record_audit(AuditEntry::new(
                    AuditKind::SessionCompleted,
                    "engine",
                    "no participant can act",
                ));
                self.clock.cancel();
                info!(league_id = %self.session.league_id, "session completed");
                self.emit(EngineEvent::SessionCompleted);
            }
        }
        Ok(())
    }

    /// Fresh liquidity for every member still in play.
    async fn gather_liquidity(&self) -> Result<HashMap<String, Decimal>> {
        let mut map = HashMap::new();
        for member in &self.session.turn_order {
            if self.session.passed_members.contains(member)
                || self.session.finished_members.contains(member)
            {
                continue;
            }
            match self
                .directory
                .participant(&self.session.league_id, member)
                .await
            {
                Ok(p) => {
                    map.insert(member.clone(), p.liquidity());
                }
                Err(e) => {
                    warn!(member_id = %member, error = %e, "directory lookup failed");
                    return Err(EngineError::Ledger(e));
                }
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::ledger::InMemoryLedger;
    use rust_decimal_macros::dec;

    async fn engine_with_members(members: &[(&str, Decimal)]) -> AuctionEngine {
        let ledger = InMemoryLedger::new();
        for (member, budget) in members {
            ledger
                .add_member(
                    *member,
                    *budget,
                    HashMap::from([
                        (Role::Goalkeeper, 3),
                        (Role::Defender, 8),
                        (Role::Midfielder, 8),
                        (Role::Forward, 6),
                    ]),
                )
                .await;
        }
        let gateway: Arc<dyn LedgerGateway> = Arc::new(ledger.clone());
        let directory: Arc<dyn Directory> = Arc::new(ledger);
        AuctionEngine::new(
            EngineConfig::default(),
            "lg-1",
            members.iter().map(|(m, _)| m.to_string()).collect(),
            gateway,
            directory,
        )
    }

    fn player() -> Player {
        Player::new("pl-9", "Osimhen", Role::Forward)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_expiry_is_a_no_op() {
        let mut engine =
            engine_with_members(&[("a", dec!(100)), ("b", dec!(100))]).await;
        engine.handle_start().await.unwrap();
        engine.handle_nominate("a", player()).await.unwrap();
        engine.handle_confirm("a").await.unwrap();
        engine.handle_mark_ready("b").await.unwrap();
        assert_eq!(engine.session.state, SessionState::Auction);

        let stale_generation = engine.clock.generation();
        // A bid lands strictly before expiry and resets the clock.
        engine.handle_place_bid("b", dec!(5)).await.unwrap();

        engine.handle_expiry(stale_generation).await;
        assert_eq!(engine.session.state, SessionState::Auction);
        assert!(engine.auction.as_ref().unwrap().status == crate::domain::AuctionStatus::Active);

        // The current generation settles normally.
        let generation = engine.clock.generation();
        engine.handle_expiry(generation).await;
        assert_eq!(engine.session.state, SessionState::PendingAck);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_reconstructs_state() {
        let mut engine =
            engine_with_members(&[("a", dec!(100)), ("b", dec!(100))]).await;
        engine.handle_start().await.unwrap();
        engine.handle_nominate("a", player()).await.unwrap();
        engine.handle_confirm("a").await.unwrap();
        engine.handle_mark_ready("b").await.unwrap();
        engine.handle_place_bid("b", dec!(7)).await.unwrap();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.session.state, SessionState::Auction);
        let auction = snapshot.auction.unwrap();
        assert_eq!(auction.current_price, dec!(7));
        assert_eq!(snapshot.bids.len(), 2);
        assert!(snapshot.timer_remaining_secs.is_some());

        // Snapshots serialize for poll-based clients.
        serde_json::to_string(&snapshot.session).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_settlement_failure_rearms_clock() {
        use crate::ledger::gateway::MockLedgerGateway;

        let ledger = InMemoryLedger::new();
        ledger
            .add_member("a", dec!(100), HashMap::from([(Role::Forward, 6)]))
            .await;
        ledger
            .add_member("b", dec!(100), HashMap::from([(Role::Forward, 6)]))
            .await;

        let mut gateway = MockLedgerGateway::new();
        gateway
            .expect_settle()
            .returning(|_| Err(crate::ledger::LedgerError::Unavailable("db down".into())));

        let mut engine = AuctionEngine::new(
            EngineConfig::default(),
            "lg-1",
            vec!["a".to_string(), "b".to_string()],
            Arc::new(gateway),
            Arc::new(ledger),
        );
        engine.handle_start().await.unwrap();
        engine.handle_nominate("a", player()).await.unwrap();
        engine.handle_confirm("a").await.unwrap();
        engine.handle_mark_ready("b").await.unwrap();

        let generation = engine.clock.generation();
        engine.handle_expiry(generation).await;

        // Auction stayed active and the clock is armed for a retry.
        assert_eq!(engine.session.state, SessionState::Auction);
        assert!(engine.clock.is_armed());
        assert_eq!(
            engine.clock.remaining().unwrap().as_secs(),
            EngineConfig::default().settlement.retry_secs
        );
    }
}
