use crate::domain::account::{Account, AccountId, Role};
use crate::domain::order::{Order, OrderId};
use crate::domain::ports::{AccountStore, LedgerStore, OrderStore, UnitOfWork, check_version};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    orders: BTreeMap<OrderId, Order>,
}

/// A thread-safe in-memory ledger store.
///
/// Both tables sit behind one `RwLock`; a commit validates and applies its
/// whole unit under a single write guard, so readers never see half a unit.
/// Ideal for testing or when persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    last_order_id: Arc<AtomicU64>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn account(&self, id: &AccountId) -> Result<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.get(id).cloned())
    }

    async fn accounts_with_role(&self, role: Role) -> Result<Vec<Account>> {
        let tables = self.tables.read().await;
        let mut accounts: Vec<Account> = tables
            .accounts
            .values()
            .filter(|a| a.role == role)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        let tables = self.tables.read().await;
        let mut accounts: Vec<Account> = tables.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&id).cloned())
    }

    async fn orders_for_coordinator(&self, coordinator: &AccountId) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| o.is_owned_by(coordinator))
            .cloned()
            .collect())
    }

    async fn orders_for_partner(&self, partner: &AccountId) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| o.is_assigned_to(partner))
            .cloned()
            .collect())
    }

    async fn orders(&self) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values().cloned().collect())
    }

    async fn next_order_id(&self) -> Result<OrderId> {
        Ok(OrderId(self.last_order_id.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn commit(&self, unit: UnitOfWork) -> Result<()> {
        let mut tables = self.tables.write().await;

        for account in &unit.accounts {
            let stored = tables.accounts.get(&account.id).map_or(0, |a| a.version);
            check_version("account", &account.id, stored, account.version)?;
        }
        for order in &unit.orders {
            let stored = tables.orders.get(&order.id).map_or(0, |o| o.version);
            check_version("order", order.id, stored, order.version)?;
        }

        for account in unit.accounts {
            tables.accounts.insert(account.id.clone(), account);
        }
        for order in unit.orders {
            tables.orders.insert(order.id, order);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{Amount, Balance};
    use crate::error::OrderError;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn account(id: &str, role: Role) -> Account {
        Account::new(AccountId::new(id), role, id, Balance::new(dec!(100)))
    }

    fn order(id: u64) -> Order {
        Order::new(
            OrderId(id),
            AccountId::new("c1"),
            "parcel",
            Amount::new(dec!(10)).unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_commit_inserts_and_reads_back() {
        let store = InMemoryStore::new();
        let mut unit = UnitOfWork::new();
        unit.put_account(&mut account("c1", Role::Coordinator))
            .put_order(&mut order(1));
        store.commit(unit).await.unwrap();

        let stored = store.account(&AccountId::new("c1")).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        let stored = store.order(OrderId(1)).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);

        assert!(store.account(&AccountId::new("c2")).await.unwrap().is_none());
        assert_eq!(
            store
                .orders_for_coordinator(&AccountId::new("c1"))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_stale_version_rejects_whole_unit() {
        let store = InMemoryStore::new();
        let mut unit = UnitOfWork::new();
        unit.put_account(&mut account("c1", Role::Coordinator));
        store.commit(unit).await.unwrap();

        // Second writer still holds version 0 of c1 and a brand new order.
        let mut stale = UnitOfWork::new();
        stale
            .put_account(&mut account("c1", Role::Coordinator))
            .put_order(&mut order(7));
        let result = store.commit(stale).await;

        assert!(matches!(result, Err(OrderError::Conflict(_))));
        assert!(store.order(OrderId(7)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accounts_with_role_filters_and_sorts() {
        let store = InMemoryStore::new();
        let mut unit = UnitOfWork::new();
        unit.put_account(&mut account("p2", Role::Partner))
            .put_account(&mut account("c1", Role::Coordinator))
            .put_account(&mut account("p1", Role::Partner));
        store.commit(unit).await.unwrap();

        let partners = store.accounts_with_role(Role::Partner).await.unwrap();
        let ids: Vec<&str> = partners.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_order_ids_are_monotonic() {
        let store = InMemoryStore::new();
        let first = store.next_order_id().await.unwrap();
        let second = store.next_order_id().await.unwrap();
        assert_eq!(first, OrderId(1));
        assert_eq!(second, OrderId(2));
    }
}
