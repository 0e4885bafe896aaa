//! Flight control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Options of the flight control loop, read once at startup.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Params {
    /// Speed the selector may plan up to when no throttling is applied. Default 2.0.
    ///
    /// Units: meters/second
    pub soft_top_speed_ms: f64,

    /// Maximum horizontal acceleration of the trajectory library. Default 3.5.
    ///
    /// Units: meters/second^2
    pub a_max_horizontal_mss: f64,

    /// Enable the yaw controller. When disabled the commanded bearing stays where it is.
    /// Default false.
    pub yaw_on: bool,

    /// Re-select on every depth cloud. When disabled the main loop re-selects periodically
    /// instead. Default true.
    pub use_depth_image: bool,

    /// Speed at which the library reaches its total acceleration limit. Default 10.0.
    ///
    /// Units: meters/second
    pub min_speed_at_max_acceleration_total_ms: f64,

    /// Total acceleration limit of the library. Default 4.0.
    ///
    /// Units: meters/second^2
    pub max_acceleration_total_mss: f64,

    /// Height added to every incoming goal. Default 1.0.
    ///
    /// Units: meters
    pub goal_altitude_offset_m: f64,

    /// At or below this altitude the takeoff selection policy is used. Default 0.35.
    ///
    /// Units: meters
    pub takeoff_altitude_m: f64,

    /// Time horizon below the threshold speed. Default 1.0.
    ///
    /// Units: seconds
    pub nominal_time_horizon_s: f64,

    /// Speed above which the time horizon shrinks. Default 10.0.
    ///
    /// Units: meters/second
    pub horizon_speed_threshold_ms: f64,

    /// Floor of the time horizon. Default 1.0.
    ///
    /// Units: seconds
    pub min_time_horizon_s: f64,

    /// Restore the full soft top speed whenever the takeoff policy runs, so that a throttle
    /// applied by the yaw controller cannot pin the vehicle to the ground. Default true.
    pub restore_soft_top_speed_on_takeoff: bool,

    /// Radius around the depth sensor in which cloud points are counted. Default 1.0.
    ///
    /// Units: meters
    pub proximity_radius_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            soft_top_speed_ms: 2.0,
            a_max_horizontal_mss: 3.5,
            yaw_on: false,
            use_depth_image: true,
            min_speed_at_max_acceleration_total_ms: 10.0,
            max_acceleration_total_mss: 4.0,
            goal_altitude_offset_m: 1.0,
            takeoff_altitude_m: 0.35,
            nominal_time_horizon_s: 1.0,
            horizon_speed_threshold_ms: 10.0,
            min_time_horizon_s: 1.0,
            restore_soft_top_speed_on_takeoff: true,
            proximity_radius_m: 1.0,
        }
    }
}
