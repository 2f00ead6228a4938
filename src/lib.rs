//! Hourly supply and demand balancing, costing and capacity optimisation for electricity fleets.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod constraint;
pub mod dispatch;
pub mod facility;
pub mod finance;
pub mod id;
pub mod input;
pub mod log;
pub mod metrics;
pub mod model;
pub mod optimisation;
pub mod output;
pub mod series;
pub mod settings;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the path to the folder where powermatch's configuration is stored.
///
/// Falls back on the current folder if the platform has no configuration directory.
pub fn get_powermatch_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_default();
    path.push("powermatch");

    path
}
