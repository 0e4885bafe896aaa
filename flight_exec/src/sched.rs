//! # Control parameter scheduler
//!
//! Derives the trajectory time horizon from the vehicle's speed. At low speed the horizon is
//! fixed, above the threshold speed it shrinks so that the distance covered over the horizon
//! stays roughly constant, but never below the configured floor.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Scheduler {
    /// Horizon used below the threshold speed.
    ///
    /// Units: seconds
    nominal_horizon_s: f64,

    /// Speed above which the horizon starts shrinking.
    ///
    /// Units: meters/second
    threshold_speed_ms: f64,

    /// Lower bound on the horizon.
    ///
    /// Units: seconds
    min_horizon_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Scheduler {
    pub fn new(nominal_horizon_s: f64, threshold_speed_ms: f64, min_horizon_s: f64) -> Self {
        Self {
            nominal_horizon_s,
            threshold_speed_ms,
            min_horizon_s,
        }
    }

    /// Time horizon for the given speed.
    pub fn time_horizon(&self, speed_ms: f64) -> f64 {
        let horizon_s = if speed_ms.is_nan()
            || speed_ms < self.threshold_speed_ms
            || speed_ms <= 0.0
        {
            self.nominal_horizon_s
        } else {
            self.threshold_speed_ms * self.nominal_horizon_s / speed_ms
        };

        horizon_s.max(self.min_horizon_s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let s = Scheduler::new(1.0, 10.0, 1.0);

        assert_eq!(s.time_horizon(0.0), 1.0);
        assert_eq!(s.time_horizon(9.99), 1.0);
        assert_eq!(s.time_horizon(10.0), 1.0);

        // 10 / 20 would be 0.5 s, the floor holds it at 1.0 s
        assert_eq!(s.time_horizon(20.0), 1.0);
        assert_eq!(s.time_horizon(std::f64::NAN), 1.0);
    }

    #[test]
    fn test_lowered_floor() {
        let s = Scheduler::new(1.0, 10.0, 0.5);

        assert_eq!(s.time_horizon(0.0), 1.0);
        assert_eq!(s.time_horizon(20.0), 0.5);
        assert_eq!(s.time_horizon(40.0), 0.5);

        let s = Scheduler::new(1.0, 10.0, 0.0);
        assert_eq!(s.time_horizon(40.0), 0.25);
    }

    #[test]
    fn test_monotonic() {
        for floor in [0.0, 0.5, 1.0].iter() {
            let s = Scheduler::new(1.0, 10.0, *floor);

            let mut prev = s.time_horizon(10.0);
            let mut speed = 10.0;
            while speed < 100.0 {
                let h = s.time_horizon(speed);
                assert!(h <= prev);
                assert!(h >= *floor);
                prev = h;
                speed += 0.37;
            }

            let mut speed = 0.0;
            while speed < 10.0 {
                assert_eq!(s.time_horizon(speed), 1.0_f64.max(*floor));
                speed += 0.37;
            }
        }
    }
}
