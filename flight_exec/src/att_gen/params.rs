//! Attitude generator parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the mapping from desired acceleration to roll, pitch and thrust
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Params {
    /// Altitude controller proportional gain
    pub z_k_p: f64,

    /// Altitude controller integral gain
    pub z_k_i: f64,

    /// Altitude controller derivative gain
    pub z_k_d: f64,

    /// Limit on the altitude controller's integral accumulation
    pub z_integral_limit: f64,

    /// Normalised thrust which holds the vehicle in a hover
    pub hover_thrust: f64,

    /// Units: meters/second^2
    pub gravity_mss: f64,

    /// Limit on the commanded roll and pitch.
    ///
    /// Units: radians
    pub max_tilt_rad: f64,

    /// Lower bound on the tilt compensation factor, stops the thrust blowing up when the
    /// measured attitude is far from level
    pub min_tilt_compensation: f64,

    /// Altitude held before any goal has been received.
    ///
    /// Units: meters
    pub default_altitude_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            z_k_p: 1.5,
            z_k_i: 0.6,
            z_k_d: 0.5,
            z_integral_limit: 0.5,
            hover_thrust: 0.69,
            gravity_mss: 9.81,
            max_tilt_rad: 0.6,
            min_tilt_compensation: 0.5,
            default_altitude_m: 1.0,
        }
    }
}
