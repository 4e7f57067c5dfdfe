use super::account::{Account, AccountId, Role};
use super::order::{Order, OrderId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn account(&self, id: &AccountId) -> Result<Option<Account>>;
    async fn accounts_with_role(&self, role: Role) -> Result<Vec<Account>>;
    async fn accounts(&self) -> Result<Vec<Account>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;
    async fn orders_for_coordinator(&self, coordinator: &AccountId) -> Result<Vec<Order>>;
    async fn orders_for_partner(&self, partner: &AccountId) -> Result<Vec<Order>>;
    async fn orders(&self) -> Result<Vec<Order>>;
    /// Reserves a fresh order id. Ids are never reused, even if the order
    /// that asked for one is never committed.
    async fn next_order_id(&self) -> Result<OrderId>;
}

/// Storage that can apply account and order writes as one atomic unit.
#[async_trait]
pub trait LedgerStore: AccountStore + OrderStore {
    /// Applies every record in `unit` or none of them.
    ///
    /// Each staged record carries the version it will have once stored. The
    /// stored copy must sit exactly one version below it (absent counts as 0),
    /// otherwise the unit fails with `OrderError::Conflict`.
    async fn commit(&self, unit: UnitOfWork) -> Result<()>;
}

pub type StoreHandle = Arc<dyn LedgerStore>;

/// Records staged for a single atomic commit.
#[derive(Debug, Default, Clone)]
pub struct UnitOfWork {
    pub accounts: Vec<Account>,
    pub orders: Vec<Order>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a copy of `account`. The caller's copy has its version bumped
    /// so it matches what the store will hold after the commit.
    pub fn put_account(&mut self, account: &mut Account) -> &mut Self {
        account.version += 1;
        self.accounts.push(account.clone());
        self
    }

    /// Stages a copy of `order`, bumping the caller's version the same way.
    pub fn put_order(&mut self, order: &mut Order) -> &mut Self {
        order.version += 1;
        self.orders.push(order.clone());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.orders.is_empty()
    }
}

/// Optimistic check shared by the store adapters.
pub(crate) fn check_version(
    kind: &str,
    id: impl std::fmt::Display,
    stored: u64,
    staged: u64,
) -> Result<()> {
    if stored + 1 == staged {
        Ok(())
    } else {
        Err(crate::error::OrderError::Conflict(format!(
            "{kind} {id} is at version {stored}, unit expected {}",
            staged.saturating_sub(1)
        )))
    }
}
