//! In-memory ledger backing both collaborator traits, for tests and the
//! demo binary. All mutation happens under a single write lock so a
//! settlement is atomic: a failed precondition leaves nothing applied.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::contract::ContractTerms;
use super::gateway::{
    Directory, LedgerError, LedgerGateway, ReversalRequest, SettlementReceipt, SettlementRequest,
};
use crate::domain::{Participant, Player, Role};

#[derive(Debug, Clone)]
struct Account {
    budget: Decimal,
    committed_salary: Decimal,
    slot_usage: HashMap<Role, u32>,
    slot_capacity: HashMap<Role, u32>,
}

#[derive(Debug, Clone)]
struct SettledTransaction {
    member_id: String,
    player: Player,
    price: Decimal,
    contract: ContractTerms,
}

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    /// player_id -> owning member
    assignments: HashMap<String, String>,
    transactions: HashMap<Uuid, SettledTransaction>,
}

/// In-memory implementation of `LedgerGateway` and `Directory`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedger {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member with a starting budget and per-role slot capacity.
    pub async fn add_member(
        &self,
        member_id: impl Into<String>,
        budget: Decimal,
        slot_capacity: HashMap<Role, u32>,
    ) {
        let mut inner = self.inner.write().await;
        inner.accounts.insert(
            member_id.into(),
            Account {
                budget,
                committed_salary: Decimal::ZERO,
                slot_usage: HashMap::new(),
                slot_capacity,
            },
        );
    }

    /// Mark a player as already assigned (pre-auction roster seeding).
    pub async fn assign_player(&self, player_id: impl Into<String>, member_id: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.assignments.insert(player_id.into(), member_id.into());
    }

    /// Adjust a member's budget out-of-band (the pool can shift between
    /// bid time and settlement time).
    pub async fn adjust_budget(&self, member_id: &str, delta: Decimal) -> Result<(), LedgerError> {
        let mut inner = self.inner.write().await;
        let account =
            inner
                .accounts
                .get_mut(member_id)
                .ok_or_else(|| LedgerError::UnknownMember {
                    member_id: member_id.to_string(),
                })?;
        account.budget += delta;
        Ok(())
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn settle(
        &self,
        request: SettlementRequest,
    ) -> Result<SettlementReceipt, LedgerError> {
        let mut inner = self.inner.write().await;

        if inner.assignments.contains_key(&request.player.id) {
            return Err(LedgerError::PlayerAlreadyAssigned {
                player_id: request.player.id.clone(),
            });
        }

        let account = inner
            .accounts
            .get(&request.member_id)
            .ok_or_else(|| LedgerError::UnknownMember {
                member_id: request.member_id.clone(),
            })?;

        let liquidity = account.budget - account.committed_salary;
        let required = request.price + request.contract.salary;
        if liquidity < required {
            return Err(LedgerError::InsufficientFunds {
                available: liquidity,
                required,
            });
        }

        // Preconditions hold; apply all three mutations together.
        let account = inner
            .accounts
            .get_mut(&request.member_id)
            .expect("account checked above");
        account.budget -= request.price;
        account.committed_salary += request.contract.salary;
        *account
            .slot_usage
            .entry(request.player.role)
            .or_insert(0) += 1;

        inner
            .assignments
            .insert(request.player.id.clone(), request.member_id.clone());

        let transaction_id = Uuid::new_v4();
        inner.transactions.insert(
            transaction_id,
            SettledTransaction {
                member_id: request.member_id.clone(),
                player: request.player.clone(),
                price: request.price,
                contract: request.contract.clone(),
            },
        );

        debug!(
            member_id = %request.member_id,
            player_id = %request.player.id,
            price = %request.price,
            %transaction_id,
            "settlement applied"
        );

        Ok(SettlementReceipt {
            transaction_id,
            member_id: request.member_id,
            player_id: request.player.id,
            price: request.price,
            contract: request.contract,
        })
    }

    async fn reverse(&self, request: ReversalRequest) -> Result<(), LedgerError> {
        let mut inner = self.inner.write().await;

        let settled = inner.transactions.remove(&request.transaction_id).ok_or(
            LedgerError::UnknownTransaction {
                transaction_id: request.transaction_id,
            },
        )?;

        let account = inner
            .accounts
            .get_mut(&settled.member_id)
            .ok_or_else(|| LedgerError::UnknownMember {
                member_id: settled.member_id.clone(),
            })?;
        account.budget += settled.price;
        account.committed_salary -= settled.contract.salary;
        if let Some(used) = account.slot_usage.get_mut(&settled.player.role) {
            *used = used.saturating_sub(1);
        }

        inner.assignments.remove(&settled.player.id);

        debug!(
            member_id = %settled.member_id,
            player_id = %settled.player.id,
            transaction_id = %request.transaction_id,
            "settlement reversed"
        );

        Ok(())
    }
}

#[async_trait]
impl Directory for InMemoryLedger {
    async fn participant(
        &self,
        _league_id: &str,
        member_id: &str,
    ) -> Result<Participant, LedgerError> {
        let inner = self.inner.read().await;
        let account = inner
            .accounts
            .get(member_id)
            .ok_or_else(|| LedgerError::UnknownMember {
                member_id: member_id.to_string(),
            })?;
        Ok(Participant {
            member_id: member_id.to_string(),
            budget: account.budget,
            committed_salary: account.committed_salary,
            slot_usage: account.slot_usage.clone(),
            slot_capacity: account.slot_capacity.clone(),
        })
    }

    async fn is_player_assigned(
        &self,
        _league_id: &str,
        player_id: &str,
    ) -> Result<bool, LedgerError> {
        let inner = self.inner.read().await;
        Ok(inner.assignments.contains_key(player_id))
    }
}
