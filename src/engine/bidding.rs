//! Bidding State Machine — monotonically increasing bids against the clock.
//!
//! Bids are linearized by the engine loop; a bid computed against a price
//! that is no longer current is rejected with a stale-price error rather
//! than silently dropped. Every accepted bid restarts the clock for the
//! full window.

use rust_decimal::Decimal;

use crate::domain::{
    min_bid, min_commitment, Auction, AuctionStatus, Bid, BidBook, Participant, Player, Session,
    SessionState,
};
use crate::error::{EngineError, Result};

/// Open an auction for a confirmed nomination: create the auction at the
/// base price and place the nominator's implicit opening bid.
pub fn open_auction(player: Player, nominator: &str, base_price: Decimal) -> (Auction, BidBook) {
    let auction = Auction::open(player, nominator, base_price.max(min_bid()));
    let mut book = BidBook::new();
    book.record_accepted(auction.id, nominator, auction.base_price);
    (auction, book)
}

/// Validate and record a bid. On success the auction's current price moves
/// to `amount` and the caller must reset the clock.
pub fn place_bid(
    session: &Session,
    auction: &mut Auction,
    book: &mut BidBook,
    bidder: &str,
    amount: Decimal,
    participant: &Participant,
) -> Result<Bid> {
    if session.state != SessionState::Auction {
        return Err(EngineError::WrongState {
            expected: "AUCTION",
            actual: session.state,
        });
    }
    if auction.status != AuctionStatus::Active {
        return Err(EngineError::NoActiveAuction);
    }
    if !session.is_member(bidder) {
        return Err(EngineError::UnknownMember {
            member_id: bidder.to_string(),
        });
    }
    // Finished blocks future bids only; an existing winning bid still
    // settles (see settlement).
    if session.finished_members.contains(bidder) {
        return Err(EngineError::MemberFinished {
            member_id: bidder.to_string(),
        });
    }
    if amount <= auction.current_price {
        return Err(EngineError::StalePrice {
            offered: amount,
            current: auction.current_price,
        });
    }
    // The bid plus the minimum commitment winning would create must fit
    // inside current liquidity. Re-checked at settlement: the pool can
    // shift between the two.
    let required = amount + min_commitment();
    if participant.liquidity() < required {
        return Err(EngineError::InsufficientLiquidity {
            available: participant.liquidity(),
            required,
        });
    }
    if !session.no_slot_limit_phase && !participant.has_free_slot(auction.player.role) {
        return Err(EngineError::NoFreeSlot {
            member_id: bidder.to_string(),
            role: auction.player.role.to_string(),
        });
    }

    let bid = book.record_accepted(auction.id, bidder, amount).clone();
    auction.current_price = amount;
    Ok(bid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

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

    fn participant(member: &str, budget: Decimal) -> Participant {
        Participant {
            member_id: member.to_string(),
            budget,
            committed_salary: Decimal::ZERO,
            slot_usage: HashMap::new(),
            slot_capacity: HashMap::from([(Role::Forward, 3)]),
        }
    }

    fn forward() -> Player {
        Player::new("pl-9", "Osimhen", Role::Forward)
    }

    #[test]
    fn test_open_places_implicit_opening_bid() {
        let (auction, book) = open_auction(forward(), "a", dec!(1));
        assert_eq!(auction.current_price, dec!(1));
        let winning = book.winning_bid().unwrap();
        assert_eq!(winning.bidder, "a");
        assert_eq!(winning.amount, dec!(1));
    }

    #[test]
    fn test_bid_must_exceed_current_price() {
        let s = session();
        let (mut auction, mut book) = open_auction(forward(), "a", dec!(1));
        place_bid(&s, &mut auction, &mut book, "b", dec!(5), &participant("b", dec!(50))).unwrap();

        let err = place_bid(
            &s,
            &mut auction,
            &mut book,
            "c",
            dec!(5),
            &participant("c", dec!(50)),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::StalePrice {
                offered, current
            } if offered == dec!(5) && current == dec!(5)
        ));
    }

    #[test]
    fn test_concurrent_lower_bid_loses_race() {
        // Two members computed raises against price 9; the 11 lands first.
        let s = session();
        let (mut auction, mut book) = open_auction(forward(), "a", dec!(1));
        auction.current_price = dec!(9);

        place_bid(&s, &mut auction, &mut book, "b", dec!(11), &participant("b", dec!(50))).unwrap();
        let err = place_bid(
            &s,
            &mut auction,
            &mut book,
            "c",
            dec!(10),
            &participant("c", dec!(50)),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::StalePrice { .. }));
        assert_eq!(auction.current_price, dec!(11));
    }

    #[test]
    fn test_bid_requires_follow_on_commitment_headroom() {
        let s = session();
        let (mut auction, mut book) = open_auction(forward(), "a", dec!(1));

        // Liquidity 5 cannot carry a 5 bid plus the minimum commitment.
        let err = place_bid(
            &s,
            &mut auction,
            &mut book,
            "b",
            dec!(5),
            &participant("b", dec!(5)),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientLiquidity { .. }));

        // Liquidity 6 can.
        place_bid(&s, &mut auction, &mut book, "b", dec!(5), &participant("b", dec!(6))).unwrap();
    }

    #[test]
    fn test_finished_member_cannot_bid() {
        let mut s = session();
        s.finished_members.insert("b".to_string());
        let (mut auction, mut book) = open_auction(forward(), "a", dec!(1));
        let err = place_bid(
            &s,
            &mut auction,
            &mut book,
            "b",
            dec!(5),
            &participant("b", dec!(50)),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::MemberFinished { .. }));
    }

    #[test]
    fn test_slot_limit_enforced_unless_free_phase() {
        let mut s = session();
        let (mut auction, mut book) = open_auction(forward(), "a", dec!(1));

        let mut full = participant("b", dec!(50));
        full.slot_usage.insert(Role::Forward, 3);

        let err = place_bid(&s, &mut auction, &mut book, "b", dec!(5), &full).unwrap_err();
        assert!(matches!(err, EngineError::NoFreeSlot { .. }));

        s.no_slot_limit_phase = true;
        place_bid(&s, &mut auction, &mut book, "b", dec!(5), &full).unwrap();
    }

    #[test]
    fn test_accepted_bids_strictly_increase() {
        let s = session();
        let (mut auction, mut book) = open_auction(forward(), "a", dec!(1));
        for (bidder, amount) in [("b", dec!(2)), ("c", dec!(4)), ("b", dec!(9))] {
            place_bid(
                &s,
                &mut auction,
                &mut book,
                bidder,
                amount,
                &participant(bidder, dec!(50)),
            )
            .unwrap();
        }
        let amounts: Vec<_> = book.bids().iter().map(|b| b.amount).collect();
        assert!(amounts.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(book.winning_bid().unwrap().bidder, "b");
        assert_eq!(auction.current_price, dec!(9));
    }

    #[test]
    fn test_bid_outside_auction_state_rejected() {
        let mut s = session();
        let (mut auction, mut book) = open_auction(forward(), "a", dec!(1));
        s.transition_to(SessionState::PendingAck, "settled").unwrap();
        let err = place_bid(
            &s,
            &mut auction,
            &mut book,
            "b",
            dec!(5),
            &participant("b", dec!(50)),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::WrongState { .. }));
    }
}
