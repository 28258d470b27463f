//! Closing & Settlement — expiry-triggered, idempotent, all-or-nothing.
//!
//! Only the clock closes an auction, never a client message. The ledger
//! call happens exactly once per auction: a terminal auction no-ops, and
//! a ledger failure leaves the auction ACTIVE so closing can safely run
//! again. Either way a PendingAcknowledgment opens before any turn
//! advance.

use tracing::{info, warn};

use crate::domain::{
    Auction, AuctionStatus, BidBook, PendingAcknowledgment, Session, SessionState,
};
use crate::error::{EngineError, Result};
use crate::ledger::{
    AcquisitionType, ContractTerms, LedgerGateway, SettlementReceipt, SettlementRequest,
};

/// What closing an auction produced.
#[derive(Debug, Clone)]
pub enum CloseOutcome {
    /// The auction was already terminal; nothing happened.
    AlreadyTerminal,
    /// No winning bid survived; no ledger mutation.
    NoBids,
    /// Exactly one settlement transaction ran.
    Won {
        winner: String,
        receipt: SettlementReceipt,
    },
}

/// Close an auction and open the acknowledgment barrier.
///
/// The winner keeps the win even if they declared finished after their
/// bid was placed: finished blocks future bids, not settlement of an
/// existing winning one.
pub async fn close_auction(
    session: &mut Session,
    auction: &mut Auction,
    book: &BidBook,
    gateway: &dyn LedgerGateway,
) -> Result<CloseOutcome> {
    if auction.status.is_terminal() {
        return Ok(CloseOutcome::AlreadyTerminal);
    }

    let outcome = match book.winning_bid() {
        None => {
            auction.status = AuctionStatus::NoBids;
            info!(auction_id = %auction.id, player = %auction.player.name, "auction closed with no bids");
            CloseOutcome::NoBids
        }
        Some(winning) => {
            let contract = ContractTerms::from_price(winning.amount);
            let request = SettlementRequest {
                league_id: session.league_id.clone(),
                auction_id: auction.id,
                member_id: winning.bidder.clone(),
                player: auction.player.clone(),
                price: winning.amount,
                acquisition: AcquisitionType::Auction,
                contract,
            };
            // All-or-nothing: on error the auction stays ACTIVE and the
            // caller re-arms the clock for a retry.
            let receipt = match gateway.settle(request).await {
                Ok(receipt) => receipt,
                Err(e) => {
                    warn!(auction_id = %auction.id, error = %e, "settlement failed; auction stays active");
                    return Err(EngineError::Ledger(e));
                }
            };
            auction.status = AuctionStatus::Completed;
            info!(
                auction_id = %auction.id,
                winner = %winning.bidder,
                price = %winning.amount,
                "auction settled"
            );
            CloseOutcome::Won {
                winner: winning.bidder.clone(),
                receipt,
            }
        }
    };

    open_barrier(session, auction, book)?;
    Ok(outcome)
}

/// Open the acknowledgment barrier over every active member. The turn
/// never advances directly from a settled auction.
fn open_barrier(session: &mut Session, auction: &Auction, book: &BidBook) -> Result<()> {
    let (winner, price) = match book.winning_bid() {
        Some(b) if auction.status == AuctionStatus::Completed => {
            (Some(b.bidder.clone()), b.amount)
        }
        _ => (None, auction.base_price),
    };
    session.pending_acknowledgment = Some(PendingAcknowledgment::new(
        auction.id,
        auction.player.clone(),
        winner,
        price,
        session.active_members(),
    ));
    session
        .transition_to(SessionState::PendingAck, "auction settled")
        .map_err(EngineError::Internal)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Player, Role};
    use crate::engine::bidding::open_auction;
    use crate::ledger::gateway::MockLedgerGateway;
    use crate::ledger::LedgerError;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn session() -> Session {
        let mut s = Session::new(
            "lg-1",
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            20,
        );
        s.transition_to(SessionState::ReadyCheck, "start").unwrap();
        s.transition_to(SessionState::Nomination, "nominated").unwrap();
        s.transition_to(SessionState::Auction, "all ready").unwrap();
        s
    }

    fn forward() -> Player {
        Player::new("pl-9", "Osimhen", Role::Forward)
    }

    fn receipt_for(member: &str, price: rust_decimal::Decimal) -> SettlementReceipt {
        SettlementReceipt {
            transaction_id: Uuid::new_v4(),
            member_id: member.to_string(),
            player_id: "pl-9".to_string(),
            price,
            contract: ContractTerms::from_price(price),
        }
    }

    #[tokio::test]
    async fn test_winning_bid_settles_once() {
        let mut s = session();
        let (mut auction, book) = open_auction(forward(), "a", dec!(1));

        let mut gateway = MockLedgerGateway::new();
        gateway
            .expect_settle()
            .times(1)
            .returning(|req| Ok(receipt_for(&req.member_id, req.price)));

        let outcome = close_auction(&mut s, &mut auction, &book, &gateway)
            .await
            .unwrap();
        assert!(matches!(outcome, CloseOutcome::Won { ref winner, .. } if winner == "a"));
        assert_eq!(auction.status, AuctionStatus::Completed);
        assert_eq!(s.state, SessionState::PendingAck);

        let ack = s.pending_acknowledgment.as_ref().unwrap();
        assert_eq!(ack.winner.as_deref(), Some("a"));
        assert_eq!(ack.price, dec!(1));
        assert!(!ack.no_bids);
        assert_eq!(ack.pending_members.len(), 3);
    }

    #[tokio::test]
    async fn test_double_close_is_idempotent() {
        let mut s = session();
        let (mut auction, book) = open_auction(forward(), "a", dec!(1));

        let mut gateway = MockLedgerGateway::new();
        gateway
            .expect_settle()
            .times(1)
            .returning(|req| Ok(receipt_for(&req.member_id, req.price)));

        close_auction(&mut s, &mut auction, &book, &gateway)
            .await
            .unwrap();
        let second = close_auction(&mut s, &mut auction, &book, &gateway)
            .await
            .unwrap();
        assert!(matches!(second, CloseOutcome::AlreadyTerminal));
    }

    #[tokio::test]
    async fn test_ledger_failure_keeps_auction_active() {
        let mut s = session();
        let (mut auction, book) = open_auction(forward(), "a", dec!(1));

        let mut gateway = MockLedgerGateway::new();
        gateway
            .expect_settle()
            .times(1)
            .returning(|_| Err(LedgerError::Unavailable("db down".into())));

        let err = close_auction(&mut s, &mut auction, &book, &gateway)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Ledger(_)));
        assert_eq!(auction.status, AuctionStatus::Active);
        assert_eq!(s.state, SessionState::Auction);
        assert!(s.pending_acknowledgment.is_none());
    }

    #[tokio::test]
    async fn test_finished_opening_bidder_still_wins() {
        let mut s = session();
        let (mut auction, book) = open_auction(forward(), "a", dec!(1));
        // The nominator declared finished after opening the auction.
        s.finished_members.insert("a".to_string());

        let mut gateway = MockLedgerGateway::new();
        gateway
            .expect_settle()
            .times(1)
            .returning(|req| Ok(receipt_for(&req.member_id, req.price)));

        let outcome = close_auction(&mut s, &mut auction, &book, &gateway)
            .await
            .unwrap();
        assert!(matches!(outcome, CloseOutcome::Won { ref winner, .. } if winner == "a"));
        // The barrier covers active members only; a is finished.
        let ack = s.pending_acknowledgment.as_ref().unwrap();
        assert_eq!(ack.pending_members.len(), 2);
    }

    #[tokio::test]
    async fn test_no_valid_bid_closes_without_ledger_call() {
        let mut s = session();
        let (mut auction, mut book) = open_auction(forward(), "a", dec!(1));
        // The only bid was cancelled (reversal edge); nothing survives.
        book.cancel_winning();

        let gateway = MockLedgerGateway::new(); // settle never expected

        let outcome = close_auction(&mut s, &mut auction, &book, &gateway)
            .await
            .unwrap();
        assert!(matches!(outcome, CloseOutcome::NoBids));
        assert_eq!(auction.status, AuctionStatus::NoBids);
        let ack = s.pending_acknowledgment.as_ref().unwrap();
        assert!(ack.no_bids);
        assert!(ack.winner.is_none());
    }
}
