use crate::domain::account::{Balance, Role};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Tunables injected into [`OrderEngine`](super::engine::OrderEngine).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Opening balance for newly provisioned coordinator accounts.
    pub coordinator_grant: Decimal,
    /// Opening balance for newly provisioned partner accounts.
    pub partner_grant: Decimal,
    /// How many times a unit of work is re-validated and re-committed after
    /// losing an optimistic version check.
    pub max_commit_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            coordinator_grant: dec!(100),
            partner_grant: Decimal::ZERO,
            max_commit_attempts: 5,
        }
    }
}

impl EngineConfig {
    pub fn grant_for(&self, role: Role) -> Balance {
        match role {
            Role::Coordinator => Balance::new(self.coordinator_grant),
            Role::Partner => Balance::new(self.partner_grant),
        }
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.max_commit_attempts.max(1)
    }
}
