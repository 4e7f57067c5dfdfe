//! Application layer containing the order/wallet orchestration.
//!
//! This module defines the `OrderEngine`, the only component that changes
//! order state or wallet balances. Every operation loads what it needs,
//! validates the caller and the state machine, and commits the paired order
//! and ledger writes as one unit through the injected store.

pub mod config;
pub mod engine;
