//! Water supply curves derived from reservoir capacity-yield relationships.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod basin;
pub mod cli;
pub mod evaporation;
pub mod finance;
pub mod input;
pub mod log;
pub mod model;
pub mod output;
pub mod profile;
pub mod settings;
pub mod simulation;
pub mod supply_curve;
pub mod units;
pub mod water_balance;

#[cfg(test)]
mod fixture;

/// Get config dir for program.
///
/// The program will (possibly) store its config files here.
pub fn get_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_default();
    path.push("reservoir-supply");
    path
}
