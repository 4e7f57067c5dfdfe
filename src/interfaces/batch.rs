use crate::application::engine::OrderEngine;
use crate::error::Result;
use crate::interfaces::csv::command_reader::{Command, CommandReader};
use std::io::Read;
use tracing::{info, warn};

/// Counts of what happened to each row of a batch.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct BatchSummary {
    pub applied: usize,
    pub rejected: usize,
    pub malformed: usize,
}

/// Sends one command to the engine, discarding the returned record.
pub async fn execute(engine: &OrderEngine, command: Command) -> Result<()> {
    match command {
        Command::OpenAccount { id, role, name } => {
            engine.open_account(id, role, &name).await?;
        }
        Command::CreateOrder {
            caller,
            description,
            amount,
        } => {
            engine.create_order(&caller, &description, amount).await?;
        }
        Command::AssignOrder {
            caller,
            order,
            partner,
        } => {
            engine.assign_order(&caller, order, &partner).await?;
        }
        Command::UpdateStatus {
            caller,
            order,
            status,
        } => {
            engine.update_order_status(&caller, order, status).await?;
        }
    }
    Ok(())
}

/// Runs every row in order. Bad rows and rejected commands are logged and
/// skipped; they never stop the batch.
pub async fn run_batch<R: Read>(engine: &OrderEngine, reader: CommandReader<R>) -> BatchSummary {
    let mut summary = BatchSummary::default();

    // Row 1 is the header.
    for (line, command) in (2..).zip(reader.commands()) {
        match command {
            Ok(command) => match execute(engine, command).await {
                Ok(()) => summary.applied += 1,
                Err(e) => {
                    warn!(line, error = %e, "command rejected");
                    summary.rejected += 1;
                }
            },
            Err(e) => {
                warn!(line, error = %e, "malformed command row");
                summary.malformed += 1;
            }
        }
    }

    info!(
        applied = summary.applied,
        rejected = summary.rejected,
        malformed = summary.malformed,
        "batch finished"
    );
    summary
}
