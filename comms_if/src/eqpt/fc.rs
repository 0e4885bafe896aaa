//! # Flight Controller Equipment Messages
//!
//! The attitude target sent to the flight controller each control cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// The flight controller shall ignore the body roll rate field
pub const IGNORE_ROLL_RATE: u8 = 1;

/// The flight controller shall ignore the body pitch rate field
pub const IGNORE_PITCH_RATE: u8 = 2;

/// The flight controller shall ignore the body yaw rate field
pub const IGNORE_YAW_RATE: u8 = 4;

/// The flight controller shall ignore the thrust field
pub const IGNORE_THRUST: u8 = 64;

/// The flight controller shall ignore the orientation field
pub const IGNORE_ATTITUDE: u8 = 128;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An attitude and thrust demand for the flight controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AttitudeTarget {
    /// UTC timestamp at which the target was generated
    pub timestamp: DateTime<Utc>,

    /// Bitmask of `IGNORE_*` flags
    pub type_mask: u8,

    /// Demanded orientation of the body in the world frame
    pub orientation_q: UnitQuaternion<f64>,

    /// Demanded collective thrust, normalised to [0, 1]
    pub thrust: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AttitudeTarget {
    /// Build an orientation + thrust target. Body rates are always marked as ignored, this loop
    /// never commands rates directly.
    pub fn orientation_thrust(orientation_q: UnitQuaternion<f64>, thrust: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            type_mask: IGNORE_ROLL_RATE | IGNORE_PITCH_RATE | IGNORE_YAW_RATE,
            orientation_q,
            thrust,
        }
    }

    /// Returns true if all body rate fields are flagged as ignored.
    pub fn ignores_rates(&self) -> bool {
        let rates = IGNORE_ROLL_RATE | IGNORE_PITCH_RATE | IGNORE_YAW_RATE;
        self.type_mask & rates == rates
    }
}
