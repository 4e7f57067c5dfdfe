//! CSV adapters for the batch driver: commands in, reports out.

pub mod command_reader;
pub mod report_writer;
