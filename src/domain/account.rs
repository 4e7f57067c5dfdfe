use crate::domain::order::OrderId;
use crate::error::{OrderError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A signed wallet balance.
///
/// This is a wrapper around `rust_decimal::Decimal` so balances and order
/// amounts cannot be mixed up by accident.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// A strictly positive monetary amount, used for order values and postings.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(OrderError::InvalidArgument(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = OrderError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

/// Identifier handed to the engine by the identity subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "mcp")]
    Coordinator,
    Partner,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coordinator => f.write_str("coordinator"),
            Role::Partner => f.write_str("partner"),
        }
    }
}

/// A pre-verified identity. The engine trusts it as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: AccountId,
    pub role: Role,
}

impl Caller {
    pub fn new(id: impl Into<AccountId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn coordinator(id: impl Into<AccountId>) -> Self {
        Self::new(id, Role::Coordinator)
    }

    pub fn partner(id: impl Into<AccountId>) -> Self {
        Self::new(id, Role::Partner)
    }

    pub(crate) fn require(&self, role: Role, action: &str) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(OrderError::Unauthorized(format!(
                "only a {role} may {action}, caller {} is a {}",
                self.id, self.role
            )))
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PostingKind {
    Credit,
    Debit,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum PostingReason {
    #[serde(rename = "order reserve")]
    OrderReserve,
    #[serde(rename = "order refund")]
    OrderRefund,
    #[serde(rename = "order delivery")]
    OrderDelivery,
}

impl fmt::Display for PostingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostingReason::OrderReserve => f.write_str("order reserve"),
            PostingReason::OrderRefund => f.write_str("order refund"),
            PostingReason::OrderDelivery => f.write_str("order delivery"),
        }
    }
}

/// One append-only ledger line.
///
/// `amount` is signed: credits are positive and debits negative. Only the
/// `credit` and `debit` constructors build postings, so the sign always
/// agrees with `kind`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Posting {
    pub amount: Decimal,
    pub kind: PostingKind,
    pub reason: PostingReason,
    pub order_ref: OrderId,
    pub timestamp: DateTime<Utc>,
}

impl Posting {
    pub fn credit(
        amount: Amount,
        reason: PostingReason,
        order_ref: OrderId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            amount: amount.value(),
            kind: PostingKind::Credit,
            reason,
            order_ref,
            timestamp: at,
        }
    }

    pub fn debit(
        amount: Amount,
        reason: PostingReason,
        order_ref: OrderId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            amount: -amount.value(),
            kind: PostingKind::Debit,
            reason,
            order_ref,
            timestamp: at,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        match self.kind {
            PostingKind::Credit => self.amount > Decimal::ZERO,
            PostingKind::Debit => self.amount < Decimal::ZERO,
        }
    }
}

/// The ledger side of a user: balance plus the postings that explain it.
///
/// `balance` is a cached value that must always equal `initial_grant` plus the
/// sum of `postings`. The only mutators are `credit` and `debit`, which append
/// a posting and move the balance together.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub role: Role,
    pub name: String,
    pub initial_grant: Balance,
    pub balance: Balance,
    pub postings: Vec<Posting>,
    /// Optimistic concurrency token; 0 until first stored.
    pub version: u64,
}

impl Account {
    pub fn new(id: AccountId, role: Role, name: impl Into<String>, initial_grant: Balance) -> Self {
        Self {
            id,
            role,
            name: name.into(),
            initial_grant,
            balance: initial_grant,
            postings: Vec::new(),
            version: 0,
        }
    }

    /// Adds funds and records the credit.
    pub fn credit(
        &mut self,
        amount: Amount,
        reason: PostingReason,
        order_ref: OrderId,
        at: DateTime<Utc>,
    ) {
        self.balance += Balance::from(amount);
        self.postings
            .push(Posting::credit(amount, reason, order_ref, at));
    }

    /// Removes funds if the balance covers them, recording the debit.
    pub fn debit(
        &mut self,
        amount: Amount,
        reason: PostingReason,
        order_ref: OrderId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_funds(amount)?;
        self.balance -= Balance::from(amount);
        self.postings.push(Posting::debit(amount, reason, order_ref, at));
        Ok(())
    }

    pub fn ensure_funds(&self, amount: Amount) -> Result<()> {
        if self.balance < Balance::from(amount) {
            return Err(OrderError::InsufficientFunds {
                available: self.balance.0,
                requested: amount.value(),
            });
        }
        Ok(())
    }

    /// Recomputes the balance from the grant and the posting history.
    pub fn derived_balance(&self) -> Balance {
        self.postings
            .iter()
            .fold(self.initial_grant, |acc, p| acc + Balance(p.amount))
    }

    pub fn verify(&self) -> Result<()> {
        if let Some(bad) = self.postings.iter().position(|p| !p.is_well_formed()) {
            return Err(OrderError::Integrity(format!(
                "account {} posting #{bad} has a kind that disagrees with its sign",
                self.id
            )));
        }
        let derived = self.derived_balance();
        if derived != self.balance {
            return Err(OrderError::Integrity(format!(
                "account {} balance {} differs from ledger total {}",
                self.id, self.balance, derived
            )));
        }
        Ok(())
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }

    pub fn wallet(&self) -> Wallet {
        Wallet {
            account: self.id.clone(),
            role: self.role,
            balance: self.balance,
            postings: self.postings.clone(),
        }
    }
}

/// Public profile of an account, safe to embed in other records.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct AccountSummary {
    pub id: AccountId,
    pub name: String,
    pub role: Role,
}

/// Balance and postings in insertion order.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Wallet {
    pub account: AccountId,
    pub role: Role,
    pub balance: Balance,
    pub postings: Vec<Posting>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn coordinator(grant: Decimal) -> Account {
        Account::new(
            AccountId::new("c1"),
            Role::Coordinator,
            "Coordinator",
            Balance::new(grant),
        )
    }

    #[test]
    fn test_balance_arithmetic() {
        let b1 = Balance::new(dec!(10.0));
        let b2 = Balance::new(dec!(5.0));
        assert_eq!(b1 + b2, Balance::new(dec!(15.0)));
        assert_eq!(b1 - b2, Balance::new(dec!(5.0)));
        assert_eq!(Balance::new(dec!(15.50)).to_string(), "15.5");
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(OrderError::InvalidArgument(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(OrderError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_posting_sign_follows_kind() {
        let amount = Amount::new(dec!(40)).unwrap();
        let now = Utc::now();
        let credit = Posting::credit(amount, PostingReason::OrderRefund, OrderId(1), now);
        let debit = Posting::debit(amount, PostingReason::OrderReserve, OrderId(1), now);

        assert_eq!(credit.amount, dec!(40));
        assert_eq!(debit.amount, dec!(-40));
        assert!(credit.is_well_formed());
        assert!(debit.is_well_formed());
    }

    #[test]
    fn test_account_debit_and_credit() {
        let mut account = coordinator(dec!(100));
        let amount = Amount::new(dec!(40)).unwrap();

        account
            .debit(amount, PostingReason::OrderReserve, OrderId(1), Utc::now())
            .unwrap();
        assert_eq!(account.balance, Balance::new(dec!(60)));

        account.credit(amount, PostingReason::OrderRefund, OrderId(1), Utc::now());
        assert_eq!(account.balance, Balance::new(dec!(100)));
        assert_eq!(account.postings.len(), 2);
        assert_eq!(account.postings[0].kind, PostingKind::Debit);
        assert_eq!(account.postings[1].kind, PostingKind::Credit);
        account.verify().unwrap();
    }

    #[test]
    fn test_account_debit_insufficient_leaves_state() {
        let mut account = coordinator(dec!(100));
        let before = account.clone();

        let result = account.debit(
            Amount::new(dec!(101)).unwrap(),
            PostingReason::OrderReserve,
            OrderId(1),
            Utc::now(),
        );

        assert!(matches!(
            result,
            Err(OrderError::InsufficientFunds { .. })
        ));
        assert_eq!(account, before);
    }

    #[test]
    fn test_verify_detects_tampered_balance() {
        let mut account = coordinator(dec!(100));
        account.balance = Balance::new(dec!(150));
        assert!(matches!(account.verify(), Err(OrderError::Integrity(_))));
    }

    #[test]
    fn test_verify_detects_sign_mismatch() {
        let mut account = coordinator(dec!(100));
        let mut posting = Posting::credit(
            Amount::new(dec!(5)).unwrap(),
            PostingReason::OrderRefund,
            OrderId(1),
            Utc::now(),
        );
        posting.kind = PostingKind::Debit;
        account.balance += Balance::new(dec!(5));
        account.postings.push(posting);

        assert!(matches!(account.verify(), Err(OrderError::Integrity(_))));
    }

    #[test]
    fn test_role_accepts_mcp_alias() {
        let role: Role = serde_json::from_str("\"mcp\"").unwrap();
        assert_eq!(role, Role::Coordinator);
        let role: Role = serde_json::from_str("\"partner\"").unwrap();
        assert_eq!(role, Role::Partner);
    }

    #[test]
    fn test_caller_require() {
        let caller = Caller::partner("p1");
        assert!(caller.require(Role::Partner, "update status").is_ok());
        assert!(matches!(
            caller.require(Role::Coordinator, "assign orders"),
            Err(OrderError::Unauthorized(_))
        ));
    }
}
