use crate::application::config::EngineConfig;
use crate::domain::account::{
    Account, AccountId, AccountSummary, Amount, Balance, Caller, PostingReason, Role, Wallet,
};
use crate::domain::order::{Order, OrderId, OrderStatus, OrderView, Settlement, validate_description};
use crate::domain::ports::{StoreHandle, UnitOfWork};
use crate::error::{OrderError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Result of a successful `create_order`: the new order and the debited wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    pub order: Order,
    pub wallet: Wallet,
}

/// Ledger-wide totals computed by [`OrderEngine::audit`].
#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub accounts: usize,
    pub orders: usize,
    /// Sum of every account balance.
    pub total_balance: Balance,
    /// Sum of the amounts of orders whose funds are still reserved.
    pub reserved: Balance,
    /// Sum of every opening grant.
    pub total_granted: Balance,
}

/// The order-wallet transaction engine.
///
/// `OrderEngine` is the only writer of orders and balances. Each mutating call
/// reads the records it needs, validates caller role, ownership and state,
/// stages the new records in a [`UnitOfWork`] and commits them atomically.
/// When the commit loses an optimistic version check the whole call is
/// re-validated against fresh state, so a retried or racing request either
/// applies exactly once or is rejected.
pub struct OrderEngine {
    store: StoreHandle,
    config: EngineConfig,
}

impl OrderEngine {
    /// Creates a new `OrderEngine` over an injected storage handle.
    pub fn new(store: StoreHandle, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Provisions the ledger side of a registered user with the opening grant
    /// for its role.
    pub async fn open_account(&self, id: AccountId, role: Role, name: &str) -> Result<Account> {
        if id.as_str().trim().is_empty() {
            return Err(OrderError::InvalidArgument(
                "account id must not be empty".to_string(),
            ));
        }

        for attempt in 1..=self.config.attempts() {
            if self.store.account(&id).await?.is_some() {
                return Err(OrderError::InvalidArgument(format!(
                    "account {id} already exists"
                )));
            }
            let mut account = Account::new(id.clone(), role, name.trim(), self.config.grant_for(role));
            let mut unit = UnitOfWork::new();
            unit.put_account(&mut account);

            if self.try_commit(unit, "open_account", attempt).await? {
                info!(account = %id, %role, grant = %account.initial_grant, "account opened");
                return Ok(account);
            }
        }
        Err(self.contended("open_account"))
    }

    /// Reserves `amount` from the coordinator's wallet and records a pending
    /// order, both in one commit.
    pub async fn create_order(
        &self,
        caller: &Caller,
        description: &str,
        amount: Decimal,
    ) -> Result<OrderReceipt> {
        caller.require(Role::Coordinator, "create orders")?;
        let amount = Amount::new(amount)?;
        let description = validate_description(description)?;

        let mut order_id: Option<OrderId> = None;
        for attempt in 1..=self.config.attempts() {
            let mut coordinator = self.load_account(&caller.id).await?;
            coordinator.ensure_funds(amount)?;

            let id = match order_id {
                Some(id) => id,
                None => {
                    let id = self.store.next_order_id().await?;
                    order_id = Some(id);
                    id
                }
            };
            let now = Utc::now();
            let mut order = Order::new(id, caller.id.clone(), description, amount, now)?;
            coordinator.debit(amount, PostingReason::OrderReserve, id, now)?;

            let mut unit = UnitOfWork::new();
            unit.put_account(&mut coordinator).put_order(&mut order);

            if self.try_commit(unit, "create_order", attempt).await? {
                info!(
                    order = %id,
                    coordinator = %caller.id,
                    %amount,
                    balance = %coordinator.balance,
                    "order created"
                );
                return Ok(OrderReceipt {
                    order,
                    wallet: coordinator.wallet(),
                });
            }
        }
        Err(self.contended("create_order"))
    }

    /// Hands a pending order owned by the caller to a partner.
    pub async fn assign_order(
        &self,
        caller: &Caller,
        order_id: OrderId,
        partner_id: &AccountId,
    ) -> Result<OrderView> {
        caller.require(Role::Coordinator, "assign orders")?;

        for attempt in 1..=self.config.attempts() {
            let mut order = self.load_order(order_id).await?;
            if !order.is_owned_by(&caller.id) {
                return Err(OrderError::Unauthorized(format!(
                    "order {order_id} is not owned by {}",
                    caller.id
                )));
            }
            order.assign(partner_id.clone(), Utc::now())?;

            let partner = self
                .store
                .account(partner_id)
                .await?
                .ok_or_else(|| OrderError::NotFound(format!("partner {partner_id}")))?;
            if partner.role != Role::Partner {
                return Err(OrderError::InvalidArgument(format!(
                    "account {partner_id} is not a partner"
                )));
            }

            let mut unit = UnitOfWork::new();
            unit.put_order(&mut order);

            if self.try_commit(unit, "assign_order", attempt).await? {
                info!(order = %order_id, partner = %partner_id, "order assigned");
                return Ok(OrderView {
                    order,
                    partner: Some(partner.summary()),
                });
            }
        }
        Err(self.contended("assign_order"))
    }

    /// Moves an order the caller is assigned to along the partner state
    /// machine, posting the refund or payout in the same commit.
    pub async fn update_order_status(
        &self,
        caller: &Caller,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<Order> {
        caller.require(Role::Partner, "update order status")?;
        if !OrderStatus::PARTNER_TARGETS.contains(&new_status) {
            return Err(OrderError::InvalidArgument(format!(
                "{new_status} is not a status a partner can set"
            )));
        }

        for attempt in 1..=self.config.attempts() {
            let mut order = self.load_order(order_id).await?;
            if !order.is_assigned_to(&caller.id) {
                return Err(OrderError::Unauthorized(format!(
                    "order {order_id} is not assigned to {}",
                    caller.id
                )));
            }

            let now = Utc::now();
            let previous = order.status;
            let settlement = order.transition(new_status, now)?;
            let mut unit = UnitOfWork::new();

            match settlement {
                Settlement::None => {}
                Settlement::RefundCoordinator => {
                    let mut coordinator = self.load_account(&order.coordinator_id).await?;
                    coordinator.credit(order.amount, PostingReason::OrderRefund, order.id, now);
                    unit.put_account(&mut coordinator);
                }
                Settlement::PayPartner => {
                    let mut partner = self.load_account(&caller.id).await?;
                    partner.credit(order.amount, PostingReason::OrderDelivery, order.id, now);
                    unit.put_account(&mut partner);
                }
            }
            unit.put_order(&mut order);

            if self.try_commit(unit, "update_order_status", attempt).await? {
                info!(
                    order = %order_id,
                    from = %previous,
                    to = %new_status,
                    settlement = ?settlement,
                    "order status updated"
                );
                return Ok(order);
            }
        }
        Err(self.contended("update_order_status"))
    }

    /// Coordinators see the orders they own, partners the orders assigned to
    /// them. Partner details are joined in at read time.
    pub async fn orders_for(&self, caller: &Caller) -> Result<Vec<OrderView>> {
        let orders = match caller.role {
            Role::Coordinator => self.store.orders_for_coordinator(&caller.id).await?,
            Role::Partner => self.store.orders_for_partner(&caller.id).await?,
        };
        self.join_partners(orders).await
    }

    /// The caller's orders still waiting for a partner.
    pub async fn pending_orders(&self, caller: &Caller) -> Result<Vec<Order>> {
        caller.require(Role::Coordinator, "view unassigned orders")?;
        let mut orders = self.store.orders_for_coordinator(&caller.id).await?;
        orders.retain(|o| o.status == OrderStatus::Pending);
        Ok(orders)
    }

    /// Every partner a coordinator could assign work to.
    pub async fn partners(&self, caller: &Caller) -> Result<Vec<AccountSummary>> {
        caller.require(Role::Coordinator, "list partners")?;
        let partners = self.store.accounts_with_role(Role::Partner).await?;
        Ok(partners.iter().map(Account::summary).collect())
    }

    pub async fn account(&self, caller: &Caller) -> Result<AccountSummary> {
        Ok(self.load_account(&caller.id).await?.summary())
    }

    pub async fn wallet(&self, caller: &Caller) -> Result<Wallet> {
        Ok(self.load_account(&caller.id).await?.wallet())
    }

    /// Checks every account's ledger and the global conservation identity:
    /// balances plus still-reserved order amounts equal the opening grants.
    ///
    /// Reads are not taken from a single snapshot, so run this while no
    /// writes are in flight.
    pub async fn audit(&self) -> Result<AuditReport> {
        let accounts = self.store.accounts().await?;
        let orders = self.store.orders().await?;

        let mut total_balance = Balance::ZERO;
        let mut total_granted = Balance::ZERO;
        for account in &accounts {
            account.verify()?;
            total_balance += account.balance;
            total_granted += account.initial_grant;
        }
        let reserved = orders
            .iter()
            .filter(|o| !o.settled)
            .fold(Balance::ZERO, |acc, o| acc + Balance::from(o.amount));

        if total_balance + reserved != total_granted {
            return Err(OrderError::Integrity(format!(
                "balances {total_balance} plus reserved {reserved} do not match grants {total_granted}"
            )));
        }

        Ok(AuditReport {
            accounts: accounts.len(),
            orders: orders.len(),
            total_balance,
            reserved,
            total_granted,
        })
    }

    async fn load_account(&self, id: &AccountId) -> Result<Account> {
        self.store
            .account(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("account {id}")))
    }

    async fn load_order(&self, id: OrderId) -> Result<Order> {
        self.store
            .order(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {id}")))
    }

    async fn join_partners(&self, orders: Vec<Order>) -> Result<Vec<OrderView>> {
        let mut partners: HashMap<AccountId, Option<AccountSummary>> = HashMap::new();
        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            let partner = match &order.partner_id {
                Some(id) => {
                    if !partners.contains_key(id) {
                        let summary = self.store.account(id).await?.map(|a| a.summary());
                        partners.insert(id.clone(), summary);
                    }
                    partners.get(id).cloned().flatten()
                }
                None => None,
            };
            views.push(OrderView { order, partner });
        }
        Ok(views)
    }

    /// Returns `Ok(false)` when the unit lost a version race and the caller
    /// should re-validate and try again.
    async fn try_commit(&self, unit: UnitOfWork, operation: &str, attempt: u32) -> Result<bool> {
        match self.store.commit(unit).await {
            Ok(()) => Ok(true),
            Err(OrderError::Conflict(reason)) => {
                debug!(operation, attempt, %reason, "commit conflict, re-validating");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn contended(&self, operation: &str) -> OrderError {
        let attempts = self.config.attempts();
        warn!(operation, attempts, "giving up after repeated commit conflicts");
        OrderError::Conflict(format!(
            "{operation} still contended after {attempts} attempts"
        ))
    }
}
