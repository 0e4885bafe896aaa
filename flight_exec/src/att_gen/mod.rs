//! # Attitude generator module
//!
//! Converts the desired acceleration of the selected trajectory into a roll, pitch and
//! normalised thrust demand.
//!
//! Horizontal acceleration is achieved by tilting: pitching forward by `atan2(a_x, g)`
//! accelerates along ortho-body x, and rolling by `atan2(a_y, g)` along y. Thrust is the hover
//! thrust plus an altitude hold PID and a feed-forward of the vertical acceleration, divided by
//! the cosine of the measured tilt so the vertical component is preserved.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod controllers;
pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::Serialize;

use util::maths::clamp;

pub use controllers::PidController;
pub use params::Params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Output of the attitude generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RollPitchThrust {
    /// Units: radians
    pub roll_rad: f64,

    /// Units: radians
    pub pitch_rad: f64,

    /// Normalised to [0, 1]
    pub thrust: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttitudeGenerator {
    params: Params,

    z_ctrl: PidController,

    /// Measured altitude, meters
    z_m: f64,

    /// Measured vertical velocity, meters/second
    vz_ms: f64,

    /// Measured roll, radians
    roll_rad: f64,

    /// Measured pitch, radians
    pitch_rad: f64,

    /// Altitude to hold, meters
    z_setpoint_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AttitudeGenerator {
    pub fn new(params: Params) -> Self {
        Self {
            z_ctrl: PidController::new(
                params.z_k_p,
                params.z_k_i,
                params.z_k_d,
                params.z_integral_limit,
            ),
            z_m: 0.0,
            vz_ms: 0.0,
            roll_rad: 0.0,
            pitch_rad: 0.0,
            z_setpoint_m: params.default_altitude_m,
            params,
        }
    }

    pub fn set_z(&mut self, z_m: f64) {
        self.z_m = z_m;
    }

    pub fn set_z_velocity(&mut self, vz_ms: f64) {
        self.vz_ms = vz_ms;
    }

    /// Set the measured roll and pitch
    pub fn set_roll_pitch(&mut self, roll_rad: f64, pitch_rad: f64) {
        self.roll_rad = roll_rad;
        self.pitch_rad = pitch_rad;
    }

    pub fn set_z_setpoint(&mut self, z_m: f64) {
        self.z_setpoint_m = z_m;
    }

    /// Generate the demand for `accel_mss` (ortho-body frame).
    pub fn generate(&mut self, accel_mss: &Vector3<f64>) -> RollPitchThrust {
        let z_err = self.z_setpoint_m - self.z_m;
        let z_out = self.z_ctrl.get(z_err, Some(-self.vz_ms));
        self.combine(accel_mss, z_out)
    }

    fn combine(&self, accel_mss: &Vector3<f64>, z_out: f64) -> RollPitchThrust {
        let g = self.params.gravity_mss;
        let max_tilt = self.params.max_tilt_rad;

        let mut accel = *accel_mss;
        if !accel.iter().all(|a| a.is_finite()) {
            accel = Vector3::zeros();
        }

        let pitch_rad = clamp(&accel[0].atan2(g), &-max_tilt, &max_tilt);
        let roll_rad = clamp(&accel[1].atan2(g), &-max_tilt, &max_tilt);

        let feed_forward = self.params.hover_thrust * accel[2] / g;

        let tilt = (self.roll_rad.cos() * self.pitch_rad.cos())
            .max(self.params.min_tilt_compensation);

        let thrust = (self.params.hover_thrust + z_out + feed_forward) / tilt;

        RollPitchThrust {
            roll_rad,
            pitch_rad,
            thrust: clamp(&thrust, &0.0, &1.0),
        }
    }
}
