use crate::domain::account::{AccountId, Caller, Role};
use crate::domain::order::{OrderId, OrderStatus};
use crate::error::{OrderError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Open,
    Create,
    Assign,
    Status,
}

/// One raw CSV row: `op, user, role, order, partner, amount, status, description`.
///
/// `user` and `role` are the identity already verified upstream. Empty cells
/// deserialize to `None`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    pub op: Op,
    pub user: String,
    pub role: Role,
    pub order: Option<u64>,
    pub partner: Option<String>,
    pub amount: Option<Decimal>,
    pub status: Option<OrderStatus>,
    pub description: Option<String>,
}

/// A validated request for the engine.
#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    OpenAccount {
        id: AccountId,
        role: Role,
        name: String,
    },
    CreateOrder {
        caller: Caller,
        description: String,
        amount: Decimal,
    },
    AssignOrder {
        caller: Caller,
        order: OrderId,
        partner: AccountId,
    },
    UpdateStatus {
        caller: Caller,
        order: OrderId,
        status: OrderStatus,
    },
}

fn required<T>(value: Option<T>, op: Op, field: &str) -> Result<T> {
    value.ok_or_else(|| OrderError::InvalidArgument(format!("{op:?} command is missing `{field}`")))
}

impl TryFrom<CommandRecord> for Command {
    type Error = OrderError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let op = record.op;
        let caller = Caller::new(record.user, record.role);
        match op {
            Op::Open => Ok(Command::OpenAccount {
                name: record.description.unwrap_or_else(|| caller.id.to_string()),
                id: caller.id,
                role: caller.role,
            }),
            Op::Create => Ok(Command::CreateOrder {
                description: required(record.description, op, "description")?,
                amount: required(record.amount, op, "amount")?,
                caller,
            }),
            Op::Assign => Ok(Command::AssignOrder {
                order: OrderId(required(record.order, op, "order")?),
                partner: AccountId::new(required(record.partner, op, "partner")?),
                caller,
            }),
            Op::Status => Ok(Command::UpdateStatus {
                order: OrderId(required(record.order, op, "order")?),
                status: required(record.status, op, "status")?,
                caller,
            }),
        }
    }
}

/// Streams engine commands out of a CSV source.
///
/// Cells are trimmed and short rows are allowed; missing trailing cells read
/// as absent values.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Wraps any `Read` source, such as a file or stdin.
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Yields one validated command, or the reason it was refused, per row.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader.into_deserialize().map(|result| {
            let record: CommandRecord = result.map_err(OrderError::from)?;
            Command::try_from(record)
        })
    }
}
