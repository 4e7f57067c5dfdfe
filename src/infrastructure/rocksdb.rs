use crate::domain::account::{Account, AccountId, Role};
use crate::domain::order::{Order, OrderId};
use crate::domain::ports::{AccountStore, LedgerStore, OrderStore, UnitOfWork, check_version};
use crate::error::{OrderError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for account records (balance plus postings).
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for order records.
pub const CF_ORDERS: &str = "orders";
/// Column Family for bookkeeping such as the order id sequence.
pub const CF_META: &str = "meta";

const LAST_ORDER_ID: &[u8] = b"last_order_id";

/// A persistent store implementation using RocksDB.
///
/// Accounts and orders live in separate Column Families. A commit validates
/// versions while holding `commit_lock` and then writes the whole unit as one
/// `WriteBatch`, which RocksDB applies atomically through its write-ahead log.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
    sequence_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_ACCOUNTS, CF_ORDERS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
            sequence_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| OrderError::Internal(format!("{name} column family not found")))
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_pinned_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}

fn account_key(id: &AccountId) -> &[u8] {
    id.as_str().as_bytes()
}

fn order_key(id: OrderId) -> [u8; 8] {
    id.0.to_be_bytes()
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn account(&self, id: &AccountId) -> Result<Option<Account>> {
        self.read(CF_ACCOUNTS, account_key(id))
    }

    async fn accounts_with_role(&self, role: Role) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.scan(CF_ACCOUNTS)?;
        accounts.retain(|a| a.role == role);
        Ok(accounts)
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        self.scan(CF_ACCOUNTS)
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        self.read(CF_ORDERS, &order_key(id))
    }

    async fn orders_for_coordinator(&self, coordinator: &AccountId) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.scan(CF_ORDERS)?;
        orders.retain(|o| o.is_owned_by(coordinator));
        Ok(orders)
    }

    async fn orders_for_partner(&self, partner: &AccountId) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.scan(CF_ORDERS)?;
        orders.retain(|o| o.is_assigned_to(partner));
        Ok(orders)
    }

    async fn orders(&self) -> Result<Vec<Order>> {
        self.scan(CF_ORDERS)
    }

    async fn next_order_id(&self) -> Result<OrderId> {
        let _guard = self.sequence_lock.lock().await;
        let cf = self.cf(CF_META)?;
        let last = match self.db.get_pinned_cf(cf, LAST_ORDER_ID)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    OrderError::Internal("corrupt order id sequence".to_string())
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = last + 1;
        self.db.put_cf(cf, LAST_ORDER_ID, next.to_be_bytes())?;
        Ok(OrderId(next))
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn commit(&self, unit: UnitOfWork) -> Result<()> {
        let _guard = self.commit_lock.lock().await;
        let accounts_cf = self.cf(CF_ACCOUNTS)?;
        let orders_cf = self.cf(CF_ORDERS)?;
        let mut batch = WriteBatch::default();

        for account in &unit.accounts {
            let stored = self
                .read::<Account>(CF_ACCOUNTS, account_key(&account.id))?
                .map_or(0, |a| a.version);
            check_version("account", &account.id, stored, account.version)?;
            batch.put_cf(
                accounts_cf,
                account_key(&account.id),
                serde_json::to_vec(account)?,
            );
        }
        for order in &unit.orders {
            let stored = self
                .read::<Order>(CF_ORDERS, &order_key(order.id))?
                .map_or(0, |o| o.version);
            check_version("order", order.id, stored, order.version)?;
            batch.put_cf(orders_cf, order_key(order.id), serde_json::to_vec(order)?);
        }

        self.db.write(batch)?;
        Ok(())
    }
}
