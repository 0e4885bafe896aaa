//! Yaw control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the yaw controller and the heading slew
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Params {
    /// Time along the selected trajectory at which its velocity is sampled.
    ///
    /// Units: seconds
    pub prediction_time_s: f64,

    /// Below this speed, and within `near_goal_distance_m` of the goal, the heading is left
    /// alone.
    ///
    /// Units: meters/second
    pub near_goal_speed_ms: f64,

    /// Units: meters
    pub near_goal_distance_m: f64,

    /// Bearing errors smaller than this are committed directly.
    ///
    /// Units: degrees
    pub commit_error_deg: f64,

    /// Soft top speed applied while turning towards a large bearing error.
    ///
    /// Units: meters/second
    pub throttled_soft_top_speed_ms: f64,

    /// Below this speed a large bearing error re-aims the heading at the goal itself.
    ///
    /// Units: meters/second
    pub reaim_speed_ms: f64,

    /// Horizontal distances below this are too short to take a bearing from.
    ///
    /// Units: meters
    pub min_horizontal_delta_m: f64,

    /// Maximum change in the commanded heading per control tick.
    ///
    /// Units: degrees
    pub slew_step_deg: f64,

    /// Heading errors below this snap straight to the target.
    ///
    /// Units: degrees
    pub slew_snap_deg: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            prediction_time_s: 0.5,
            near_goal_speed_ms: 2.0,
            near_goal_distance_m: 2.0,
            commit_error_deg: 60.0,
            throttled_soft_top_speed_ms: 0.1,
            reaim_speed_ms: 0.5,
            min_horizontal_delta_m: 1e-6,
            slew_step_deg: 1.0,
            slew_snap_deg: 1.0,
        }
    }
}
