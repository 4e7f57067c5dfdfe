#![allow(dead_code)]

use orderwallet::application::config::EngineConfig;
use orderwallet::application::engine::OrderEngine;
use orderwallet::domain::account::{AccountId, Caller, Role};
use orderwallet::domain::order::{OrderId, OrderStatus};
use orderwallet::infrastructure::in_memory::InMemoryStore;
use rust_decimal::Decimal;
use std::io::{Error, Write};
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const HEADER: &str = "op, user, role, order, partner, amount, status, description";

/// Engine over a fresh in-memory store with coordinator `c1` (grant 100) and
/// partner `p1` (grant 0).
pub async fn engine_with_parties() -> OrderEngine {
    let engine = OrderEngine::new(Arc::new(InMemoryStore::new()), EngineConfig::default());
    engine
        .open_account(AccountId::new("c1"), Role::Coordinator, "Coordinator")
        .await
        .unwrap();
    engine
        .open_account(AccountId::new("p1"), Role::Partner, "Partner")
        .await
        .unwrap();
    engine
}

pub async fn create_assigned(engine: &OrderEngine, amount: Decimal) -> OrderId {
    let c1 = Caller::coordinator("c1");
    let order = engine
        .create_order(&c1, "parcel", amount)
        .await
        .unwrap()
        .order;
    engine
        .assign_order(&c1, order.id, &AccountId::new("p1"))
        .await
        .unwrap();
    order.id
}

pub async fn create_accepted(engine: &OrderEngine, amount: Decimal) -> OrderId {
    let id = create_assigned(engine, amount).await;
    engine
        .update_order_status(&Caller::partner("p1"), id, OrderStatus::Accepted)
        .await
        .unwrap();
    id
}

/// Writes a command CSV (header included) to a temp file.
pub fn commands_file(rows: &[&str]) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "{HEADER}")?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    file.flush()?;
    Ok(file)
}
