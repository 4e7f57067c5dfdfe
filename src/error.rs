use crate::domain::order::OrderStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures surfaced by the order engine and its storage adapters.
///
/// The first group is user-visible and terminal: nothing is written when one
/// of them is returned. `Conflict` means the atomic commit lost a race and the
/// whole call may be retried.
#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Commit conflict: {0}")]
    Conflict(String),
    #[error("Ledger integrity violated: {0}")]
    Integrity(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, OrderError>;
