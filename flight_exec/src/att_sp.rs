//! # Attitude setpoint synthesizer
//!
//! Composes the commanded heading with the generator's roll, pitch and thrust into the attitude
//! target sent to the flight controller. The heading actually sent (the "set bearing") slews
//! towards the commanded bearing by a bounded step every tick, so the vehicle never receives a
//! heading jump.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::UnitQuaternion;
use std::sync::Mutex;
use thiserror::Error;

use crate::att_gen::RollPitchThrust;
use comms_if::eqpt::fc::AttitudeTarget;
use util::maths::wrap_deg_180;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct AttSetpointSynth {
    /// Bearing last sent to the flight controller.
    ///
    /// Units: degrees
    set_bearing_deg: Mutex<f64>,

    /// Maximum change of the set bearing per tick.
    ///
    /// Units: degrees
    step_deg: f64,

    /// Errors smaller than this snap straight to the target.
    ///
    /// Units: degrees
    snap_deg: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AttSpError {
    #[error("The set bearing lock was poisoned")]
    PoisonError,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AttSetpointSynth {
    pub fn new(step_deg: f64, snap_deg: f64) -> Self {
        Self {
            set_bearing_deg: Mutex::new(0.0),
            step_deg,
            snap_deg,
        }
    }

    /// Current set bearing in degrees
    pub fn set_bearing(&self) -> Result<f64, AttSpError> {
        Ok(*self.set_bearing_deg.lock()?)
    }

    /// Advance the set bearing one tick towards `bearing_deg` and build the attitude target.
    pub fn synthesize(
        &self,
        bearing_deg: f64,
        rpt: &RollPitchThrust,
    ) -> Result<AttitudeTarget, AttSpError> {
        let set_deg = {
            let mut set = self.set_bearing_deg.lock()?;
            *set = slew_step(*set, bearing_deg, self.step_deg, self.snap_deg);
            *set
        };

        Ok(AttitudeTarget::orientation_thrust(
            orientation(set_deg, rpt.roll_rad, rpt.pitch_rad),
            rpt.thrust,
        ))
    }
}

impl<T> From<std::sync::PoisonError<T>> for AttSpError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        AttSpError::PoisonError
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// One slew step of `set_deg` towards `target_deg`, going the short way round.
///
/// A non-finite target leaves the set bearing where it is.
pub fn slew_step(set_deg: f64, target_deg: f64, step_deg: f64, snap_deg: f64) -> f64 {
    if !target_deg.is_finite() {
        return set_deg;
    }

    let err = wrap_deg_180(target_deg - set_deg);

    if err.abs() < snap_deg {
        wrap_deg_180(target_deg)
    } else {
        wrap_deg_180(set_deg + step_deg.copysign(err))
    }
}

/// Orientation for a bearing (degrees) and a roll/pitch demand (radians).
///
/// Yaw is the negated bearing, and the roll demand is negated so that a positive lateral
/// acceleration rolls the vehicle towards +y.
pub fn orientation(set_bearing_deg: f64, roll_rad: f64, pitch_rad: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(-roll_rad, pitch_rad, -set_bearing_deg.to_radians())
}
