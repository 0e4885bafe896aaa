//! # Yaw control module
//!
//! Points the vehicle along the selected trajectory. The trajectory's position and its velocity
//! a short time ahead give a predicted position, and the bearing to that position becomes the
//! commanded heading when it is close enough to the current heading. Large errors throttle the
//! soft top speed instead, so the vehicle turns before it accelerates, and a nearly stationary
//! vehicle aims straight at the goal.
//!
//! Bearings are in degrees, measured as `atan2(-dy, dx)`, which is the negated yaw.
//!
//! The update runs in three phases so that the shared lock is not held during the transform
//! lookup:
//!
//! 1. `begin` (locked): read the selected trajectory, or exit early near the goal.
//! 2. `decide` (unlocked): given the predicted position in the world frame, choose the action.
//! 3. `apply` (locked): commit the action, unless a newer selection has arrived meanwhile.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use nalgebra::{Point3, Vector3};

use crate::state::{LoopState, Pose};
use util::maths::wrap_deg_180;

pub use params::Params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct YawCtrl {
    params: Params,

    /// Soft top speed restored when no throttling is needed.
    ///
    /// Units: meters/second
    max_soft_top_speed_ms: f64,
}

/// Everything `decide` needs, gathered under the lock.
#[derive(Debug, Clone, Copy)]
pub struct YawPrediction {
    /// Predicted position in the ortho-body frame
    pub predicted_ob: Point3<f64>,

    /// Units: meters/second
    pub initial_speed_ms: f64,

    pub pose: Pose,

    pub goal_world_m: Option<Point3<f64>>,

    /// Selection epoch the prediction was made for
    pub epoch: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum YawDecision {
    /// Command this bearing and restore the full soft top speed
    Commit { bearing_deg: f64 },

    /// Throttle the soft top speed, optionally re-aiming at the goal
    Throttle { reaim_bearing_deg: Option<f64> },

    /// The predicted position is on top of the vehicle, no bearing can be taken
    Degenerate,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl YawCtrl {
    pub fn new(params: Params, max_soft_top_speed_ms: f64) -> Self {
        Self {
            params,
            max_soft_top_speed_ms,
        }
    }

    /// First phase, called with the shared lock held.
    ///
    /// Returns `None` when there is nothing more to do: no library, or the vehicle is slow and
    /// close to the goal (in which case the full soft top speed is restored).
    pub fn begin(&self, state: &mut LoopState) -> Option<YawPrediction> {
        let sampled = match state.selector.as_ref().and_then(|s| s.library()) {
            Some(lib) => lib.trajectory(state.selection.index).map(|t| {
                (
                    t.position(0.0),
                    t.velocity(self.params.prediction_time_s),
                )
            }),
            None => {
                state.counters.absent_collaborator += 1;
                return None;
            }
        };

        let (position_ob, velocity_ob) = match sampled {
            Some(s) => s,
            None => {
                trace!("Selected index {} not in the library", state.selection.index);
                return None;
            }
        };

        let initial_speed_ms = velocity_ob.norm();
        let near_goal = state
            .goal
            .body()
            .map(|g| g.coords.norm() < self.params.near_goal_distance_m)
            .unwrap_or(false);

        if initial_speed_ms < self.params.near_goal_speed_ms && near_goal {
            state.set_soft_top_speed(self.max_soft_top_speed_ms);
            return None;
        }

        Some(YawPrediction {
            predicted_ob: Point3::from(position_ob + velocity_ob),
            initial_speed_ms,
            pose: state.pose,
            goal_world_m: state.goal.world(),
            epoch: state.selection.epoch,
        })
    }

    /// Second phase, pure.
    pub fn decide(&self, pred: &YawPrediction, predicted_world: &Point3<f64>) -> YawDecision {
        let min_delta = self.params.min_horizontal_delta_m;

        let target_deg = match bearing_deg(&pred.pose.position_m, predicted_world, min_delta) {
            Some(b) => b,
            None => return YawDecision::Degenerate,
        };
        let actual_deg = -pred.pose.yaw_rad.to_degrees();

        if bearing_error_deg(target_deg, actual_deg).abs() < self.params.commit_error_deg {
            return YawDecision::Commit {
                bearing_deg: target_deg,
            };
        }

        let reaim_bearing_deg = if pred.initial_speed_ms < self.params.reaim_speed_ms {
            pred.goal_world_m
                .and_then(|g| bearing_deg(&pred.pose.position_m, &g, min_delta))
        } else {
            None
        };

        YawDecision::Throttle { reaim_bearing_deg }
    }

    /// Third phase, called with the shared lock held.
    ///
    /// Returns false if the decision was discarded because the selection changed.
    pub fn apply(&self, state: &mut LoopState, epoch: u64, decision: YawDecision) -> bool {
        if state.selection.epoch != epoch {
            state.counters.stale_yaw_updates += 1;
            return false;
        }

        match decision {
            YawDecision::Commit { bearing_deg } => {
                state.set_soft_top_speed(self.max_soft_top_speed_ms);
                state.bearing_deg = bearing_deg;
            }
            YawDecision::Throttle { reaim_bearing_deg } => {
                state.set_soft_top_speed(self.params.throttled_soft_top_speed_ms);
                if let Some(b) = reaim_bearing_deg {
                    state.bearing_deg = b;
                }
            }
            YawDecision::Degenerate => (),
        }

        true
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Bearing from `from` to `to` in the world XY plane, in degrees.
///
/// Returns `None` if the points are closer than `min_delta_m` horizontally.
pub fn bearing_deg(from_m: &Vector3<f64>, to_m: &Point3<f64>, min_delta_m: f64) -> Option<f64> {
    let dx = to_m[0] - from_m[0];
    let dy = to_m[1] - from_m[1];

    let dist_m = dx.hypot(dy);
    if dist_m.is_nan() || dist_m < min_delta_m {
        return None;
    }

    Some((-dy).atan2(dx).to_degrees())
}

/// Signed error from `actual_deg` to `target_deg`, in (-180, 180].
pub fn bearing_error_deg(target_deg: f64, actual_deg: f64) -> f64 {
    wrap_deg_180(target_deg - actual_deg)
}
