use crate::domain::account::{AccountId, AccountSummary, Amount};
use crate::error::{OrderError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Assigned,
    Accepted,
    Rejected,
    Completed,
}

impl OrderStatus {
    /// Statuses a partner is allowed to request.
    pub const PARTNER_TARGETS: [OrderStatus; 3] = [
        OrderStatus::Accepted,
        OrderStatus::Rejected,
        OrderStatus::Completed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Rejected | OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Assigned => "assigned",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Ledger effect a status change asks for.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Settlement {
    None,
    /// Return the reserved amount to the coordinator.
    RefundCoordinator,
    /// Release the reserved amount to the assigned partner.
    PayPartner,
}

/// A pickup/delivery order and its funding state.
///
/// The order stores only the partner's id; any partner details are joined in
/// at read time (see [`OrderView`]).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: OrderId,
    pub description: String,
    pub amount: Amount,
    pub coordinator_id: AccountId,
    pub partner_id: Option<AccountId>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    /// Set once the refund or payout has been posted.
    pub settled: bool,
    pub version: u64,
}

impl Order {
    pub fn new(
        id: OrderId,
        coordinator_id: AccountId,
        description: &str,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<Self> {
        let description = validate_description(description)?;
        Ok(Self {
            id,
            description: description.to_string(),
            amount,
            coordinator_id,
            partner_id: None,
            status: OrderStatus::Pending,
            created_at: at,
            assigned_at: None,
            completed_at: None,
            rejected_at: None,
            settled: false,
            version: 0,
        })
    }

    pub fn is_owned_by(&self, account: &AccountId) -> bool {
        &self.coordinator_id == account
    }

    pub fn is_assigned_to(&self, account: &AccountId) -> bool {
        self.partner_id.as_ref() == Some(account)
    }

    /// Binds the order to a partner. Only legal while pending.
    pub fn assign(&mut self, partner: AccountId, at: DateTime<Utc>) -> Result<()> {
        if self.status != OrderStatus::Pending || self.partner_id.is_some() {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Assigned,
            });
        }
        self.partner_id = Some(partner);
        self.status = OrderStatus::Assigned;
        self.assigned_at = Some(at);
        Ok(())
    }

    /// Applies a partner-driven status change and reports the ledger effect.
    ///
    /// Legal edges are `assigned -> accepted`, `assigned|accepted -> rejected`
    /// and `accepted -> completed`. The returned settlement is `None` if the
    /// order was already settled.
    pub fn transition(&mut self, to: OrderStatus, at: DateTime<Utc>) -> Result<Settlement> {
        match (self.status, to) {
            (OrderStatus::Assigned, OrderStatus::Accepted) => {
                self.status = OrderStatus::Accepted;
                Ok(Settlement::None)
            }
            (OrderStatus::Assigned | OrderStatus::Accepted, OrderStatus::Rejected) => {
                self.status = OrderStatus::Rejected;
                self.rejected_at = Some(at);
                Ok(self.settle(Settlement::RefundCoordinator))
            }
            (OrderStatus::Accepted, OrderStatus::Completed) => {
                self.status = OrderStatus::Completed;
                self.completed_at = Some(at);
                Ok(self.settle(Settlement::PayPartner))
            }
            (from, to) => Err(OrderError::InvalidTransition { from, to }),
        }
    }

    fn settle(&mut self, settlement: Settlement) -> Settlement {
        if self.settled {
            return Settlement::None;
        }
        self.settled = true;
        settlement
    }
}

/// Trims a description, rejecting one that is blank.
pub fn validate_description(description: &str) -> Result<&str> {
    let description = description.trim();
    if description.is_empty() {
        return Err(OrderError::InvalidArgument(
            "order description must not be empty".to_string(),
        ));
    }
    Ok(description)
}

/// An order with its partner resolved for display.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub partner: Option<AccountSummary>,
}
