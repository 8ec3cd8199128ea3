//! Integration tests for bulkgen

pub mod test_utils;

mod cli_commands;
mod driver_scenarios;
mod maintenance;
mod wire_contract;
