//! Domain layer: wallet ledger and order entities plus the storage ports the
//! engine depends on.

pub mod account;
pub mod order;
pub mod ports;
