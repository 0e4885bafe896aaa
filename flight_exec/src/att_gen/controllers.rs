//! # Attitude generator controllers
//!
//! The PID controller used for altitude hold.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;
use std::time::Instant;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Previous instant that the error was passed in
    #[serde(skip)]
    prev_time: Option<Instant>,

    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Limit on the magnitude of the integral accumulation
    integral_limit: f64,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64, integral_limit: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            integral_limit: integral_limit.abs(),
            integral: 0f64,
            prev_time: None,
            prev_error: None,
        }
    }

    /// Get the value of the controller for the given error.
    ///
    /// This function is time-aware so there is no need to pass in a delta-time value. If the
    /// rate of change of the error is measured directly pass it as `error_rate`, otherwise the
    /// derivative is estimated from successive errors.
    pub fn get(&mut self, error: f64, error_rate: Option<f64>) -> f64 {
        let curr_time = Instant::now();
        let dt = self.prev_time.map(|t0| (curr_time - t0).as_secs_f64());
        self.prev_time = Some(curr_time);

        self.get_with_dt(error, error_rate, dt)
    }

    /// Get the value of the controller with an explicit time step since the last call.
    pub fn get_with_dt(&mut self, error: f64, error_rate: Option<f64>, dt: Option<f64>) -> f64 {
        // No usable time difference means no integral or estimated derivative, adding the raw
        // error would produce a large spike compared to normal operation.
        let dt = dt.filter(|t| *t > 0.0 && t.is_finite());

        if let Some(t) = dt {
            self.integral = (self.integral + error * t).clamp(-self.integral_limit, self.integral_limit);
        }

        let deriv = match error_rate {
            Some(r) => r,
            None => match (self.prev_error, dt) {
                (Some(e), Some(t)) => (error - e) / t,
                _ => 0f64,
            },
        };

        self.prev_error = Some(error);

        self.k_p * error + self.k_i * self.integral + self.k_d * deriv
    }

    /// Clear the integral and derivative history.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_error = None;
        self.prev_time = None;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }
}
