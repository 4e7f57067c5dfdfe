use crate::domain::account::{Account, Role};
use crate::domain::order::{Order, OrderStatus};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct WalletRow<'a> {
    account: &'a str,
    role: Role,
    balance: String,
    postings: usize,
}

#[derive(Serialize)]
struct OrderRow<'a> {
    order: u64,
    coordinator: &'a str,
    partner: &'a str,
    status: OrderStatus,
    amount: String,
    settled: bool,
}

/// Writes wallet and order reports as CSV.
///
/// Decimal values are normalized, so `15.00` is written as `15`.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes `account,role,balance,postings`, one row per account.
    pub fn write_wallets(&mut self, accounts: &[Account]) -> Result<()> {
        for account in accounts {
            self.writer.serialize(WalletRow {
                account: account.id.as_str(),
                role: account.role,
                balance: account.balance.to_string(),
                postings: account.postings.len(),
            })?;
        }
        self.finish(&["account", "role", "balance", "postings"], accounts.is_empty())
    }

    /// Writes `order,coordinator,partner,status,amount,settled`.
    pub fn write_orders(&mut self, orders: &[Order]) -> Result<()> {
        for order in orders {
            self.writer.serialize(OrderRow {
                order: order.id.0,
                coordinator: order.coordinator_id.as_str(),
                partner: order.partner_id.as_ref().map_or("", |p| p.as_str()),
                status: order.status,
                amount: order.amount.to_string(),
                settled: order.settled,
            })?;
        }
        self.finish(
            &["order", "coordinator", "partner", "status", "amount", "settled"],
            orders.is_empty(),
        )
    }

    // serde only emits the header alongside the first row.
    fn finish(&mut self, header: &[&str], empty: bool) -> Result<()> {
        if empty {
            self.writer.write_record(header)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
