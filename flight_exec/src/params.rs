//! # Flight Executable Parameters
//!
//! This module provides parameters for the flight executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FlightExecParams {
    /// Rate of the attitude tick.
    ///
    /// Units: Hertz
    pub cycle_frequency_hz: f64,

    /// Ticks between periodic re-selections, used when depth images do not drive selection
    pub reselect_every_n_ticks: u64,

    /// Minimum log level, one of "info", "debug" or "trace"
    pub log_level: String,

    /// Per-target level overrides, for example `"flight_lib::tf" = "info"`
    pub logging: BTreeMap<String, String>,

    /// Archive every attitude target to the session
    pub archive_output: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for FlightExecParams {
    fn default() -> Self {
        Self {
            cycle_frequency_hz: 100.0,
            reselect_every_n_ticks: 4,
            log_level: String::from("debug"),
            logging: BTreeMap::new(),
            archive_output: true,
        }
    }
}
