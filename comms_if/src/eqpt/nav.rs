//! # Navigation Equipment Messages
//!
//! Pose, velocity and goal messages produced by the localisation system and the mission planner.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The pose of the vehicle body in the world frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoseStamped {
    /// UTC timestamp at which the pose was estimated
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Position of the body origin.
    ///
    /// Units: meters,
    /// Frame: World
    pub position_m: Vector3<f64>,

    /// Attitude of the body, rotating body frame vectors into the world frame.
    pub attitude_q: UnitQuaternion<f64>,
}

/// The linear velocity of the vehicle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TwistStamped {
    /// UTC timestamp at which the velocity was estimated
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Linear velocity of the body.
    ///
    /// Units: meters/second,
    /// Frame: World
    pub linear_ms: Vector3<f64>,
}

/// A navigation target point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GoalStamped {
    /// UTC timestamp at which the goal was issued
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Position of the goal on the ground.
    ///
    /// Units: meters,
    /// Frame: World
    pub position_m: Vector3<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PoseStamped {
    /// Create a new pose stamped with the current time.
    pub fn now(position_m: Vector3<f64>, attitude_q: UnitQuaternion<f64>) -> Self {
        Self {
            timestamp: Utc::now(),
            position_m,
            attitude_q,
        }
    }

    /// Return the (roll, pitch, yaw) of the attitude in radians.
    ///
    /// The quaternion is renormalised first since deserialised quaternions are not guaranteed
    /// to be of unit length.
    pub fn roll_pitch_yaw(&self) -> (f64, f64, f64) {
        UnitQuaternion::new_normalize(self.attitude_q.into_inner()).euler_angles()
    }
}

impl TwistStamped {
    /// Create a new twist stamped with the current time.
    pub fn now(linear_ms: Vector3<f64>) -> Self {
        Self {
            timestamp: Utc::now(),
            linear_ms,
        }
    }
}

impl GoalStamped {
    /// Create a new goal stamped with the current time.
    pub fn now(position_m: Vector3<f64>) -> Self {
        Self {
            timestamp: Utc::now(),
            position_m,
        }
    }
}
