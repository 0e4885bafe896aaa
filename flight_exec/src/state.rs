//! # Shared loop state
//!
//! Everything the sensor callbacks and the control tick share lives in a single `LoopState`
//! behind one coarse mutex. This includes the external selector, so that every mutation of the
//! selector, its library and its evaluators is serialised with the pose, goal and selection.
//!
//! The lock is never held across a transform lookup.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Point3, Vector3};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

// Internal
use crate::goal::GoalTracker;
use crate::traj_sel::{
    CollisionEvaluator, SelectionPolicy, TrajectoryLibrary, TrajectorySelector,
    ValueGridEvaluator, NUM_TRAJECTORIES,
};
use util::maths::wrap_rad_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Fused vehicle pose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pose {
    /// Units: meters,
    /// Frame: World
    pub position_m: Vector3<f64>,

    /// Heading, wrapped into (-pi, pi].
    ///
    /// Units: radians
    pub yaw_rad: f64,
}

/// The currently selected trajectory.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SelectionState {
    pub index: usize,

    /// Desired acceleration of the selected trajectory (ortho-body frame).
    ///
    /// Units: meters/second^2
    pub accel_mss: Vector3<f64>,

    /// Policy used for the last selection attempt
    pub policy: Option<SelectionPolicy>,

    /// Incremented on every successful selection
    pub epoch: u64,
}

/// Diagnostic counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Counters {
    pub selections: u64,

    /// Selections where the selector produced nothing and the previous one was kept
    pub held_selections: u64,

    pub transform_failures: u64,

    /// Operations skipped because a collaborator was absent
    pub absent_collaborator: u64,

    /// Yaw updates discarded because a newer selection arrived while computing them
    pub stale_yaw_updates: u64,
}

/// State shared between the sensor callbacks and the control tick.
pub struct LoopState {
    pub pose: Pose,

    /// Planar velocity in the ortho-body frame, z is always zero.
    ///
    /// Units: meters/second
    pub velocity_ms: Vector3<f64>,

    pub goal: GoalTracker,

    pub selection: SelectionState,

    /// Commanded heading, in bearing convention (the negated yaw).
    ///
    /// Units: degrees
    pub bearing_deg: f64,

    /// Units: seconds
    pub time_horizon_s: f64,

    /// Soft top speed currently applied to the selector.
    ///
    /// Units: meters/second
    pub soft_top_speed_ms: f64,

    /// Distance to the closest point of the last depth cloud.
    ///
    /// Units: meters
    pub nearest_obstacle_m: Option<f64>,

    /// Number of points of the last depth cloud inside the proximity radius
    pub proximity_points: usize,

    pub collision_probabilities: [f64; NUM_TRAJECTORIES],

    /// Last thrust sent to the flight controller
    pub thrust: f64,

    pub counters: Counters,

    pub selector: Option<Box<dyn TrajectorySelector + Send>>,
}

/// A consistent copy of the tracked state, taken under one lock.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StateSnapshot {
    pub pose: Pose,
    pub velocity_ms: Vector3<f64>,
    pub goal_world_m: Option<Point3<f64>>,
    pub goal_body_m: Option<Point3<f64>>,
    pub selection: SelectionState,
    pub bearing_deg: f64,
    pub time_horizon_s: f64,
    pub soft_top_speed_ms: f64,
}

/// Handle to the shared loop state.
pub struct SharedState {
    inner: Mutex<LoopState>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StateError {
    #[error("The shared state lock was poisoned")]
    PoisonError,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LoopState {
    pub fn new(time_horizon_s: f64, soft_top_speed_ms: f64) -> Self {
        Self {
            pose: Pose::default(),
            velocity_ms: Vector3::zeros(),
            goal: GoalTracker::default(),
            selection: SelectionState::default(),
            bearing_deg: 0.0,
            time_horizon_s,
            soft_top_speed_ms,
            nearest_obstacle_m: None,
            proximity_points: 0,
            collision_probabilities: [0.0; NUM_TRAJECTORIES],
            thrust: 0.0,
            counters: Counters::default(),
            selector: None,
        }
    }

    /// Write the pose. Yaw is wrapped into (-pi, pi].
    pub fn update_pose(&mut self, x_m: f64, y_m: f64, z_m: f64, yaw_rad: f64) {
        self.pose = Pose {
            position_m: Vector3::new(x_m, y_m, z_m),
            yaw_rad: wrap_rad_pi(yaw_rad),
        };
    }

    /// Write the velocity, dropping the vertical component.
    pub fn update_velocity(&mut self, vx_ms: f64, vy_ms: f64, _vz_ms: f64) {
        self.velocity_ms = Vector3::new(vx_ms, vy_ms, 0.0);
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            pose: self.pose,
            velocity_ms: self.velocity_ms,
            goal_world_m: self.goal.world(),
            goal_body_m: self.goal.body(),
            selection: self.selection,
            bearing_deg: self.bearing_deg,
            time_horizon_s: self.time_horizon_s,
            soft_top_speed_ms: self.soft_top_speed_ms,
        }
    }

    /// Apply a soft top speed, forwarding it to the selector only when it changes.
    pub fn set_soft_top_speed(&mut self, speed_ms: f64) {
        if (self.soft_top_speed_ms - speed_ms).abs() > std::f64::EPSILON {
            self.soft_top_speed_ms = speed_ms;
            if let Some(sel) = self.selector.as_mut() {
                sel.set_soft_top_speed(speed_ms);
            }
        }
    }

    /// Apply a time horizon to the loop and the selector.
    pub fn set_time_horizon(&mut self, horizon_s: f64) {
        self.time_horizon_s = horizon_s;
        if let Some(sel) = self.selector.as_mut() {
            sel.set_time_horizon(horizon_s);
        }
    }

    /// The selector's library, counting the miss if either is absent.
    pub fn library_mut(&mut self) -> Option<&mut dyn TrajectoryLibrary> {
        let lib = match self.selector.as_mut() {
            Some(sel) => sel.library_mut(),
            None => None,
        };
        if lib.is_none() {
            self.counters.absent_collaborator += 1;
        }
        lib
    }

    pub fn collision_evaluator_mut(&mut self) -> Option<&mut dyn CollisionEvaluator> {
        let eval = match self.selector.as_mut() {
            Some(sel) => sel.collision_evaluator_mut(),
            None => None,
        };
        if eval.is_none() {
            self.counters.absent_collaborator += 1;
        }
        eval
    }

    pub fn value_grid_evaluator_mut(&mut self) -> Option<&mut dyn ValueGridEvaluator> {
        let eval = match self.selector.as_mut() {
            Some(sel) => sel.value_grid_evaluator_mut(),
            None => None,
        };
        if eval.is_none() {
            self.counters.absent_collaborator += 1;
        }
        eval
    }
}

impl SharedState {
    pub fn new(state: LoopState) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    /// Acquire the shared lock.
    pub fn lock(&self) -> Result<MutexGuard<'_, LoopState>, StateError> {
        Ok(self.inner.lock()?)
    }

    /// Write the pose under the lock.
    pub fn update_pose(&self, x_m: f64, y_m: f64, z_m: f64, yaw_rad: f64) -> Result<(), StateError> {
        self.lock()?.update_pose(x_m, y_m, z_m, yaw_rad);
        Ok(())
    }

    /// Write the velocity under the lock.
    pub fn update_velocity(&self, vx_ms: f64, vy_ms: f64, vz_ms: f64) -> Result<(), StateError> {
        self.lock()?.update_velocity(vx_ms, vy_ms, vz_ms);
        Ok(())
    }

    /// Read a snapshot of the state from a single lock acquisition.
    pub fn read_state(&self) -> Result<StateSnapshot, StateError> {
        Ok(self.lock()?.snapshot())
    }
}

impl<T> From<std::sync::PoisonError<T>> for StateError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StateError::PoisonError
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_snapshot_consistency() {
        let shared = Arc::new(SharedState::new(LoopState::new(1.0, 2.0)));

        // Writers always write x == y, a torn read would see them differ
        let writer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    let v = i as f64;
                    shared.update_pose(v, v, 1.0, 0.0).unwrap();
                }
            })
        };

        for _ in 0..1000 {
            let s = shared.read_state().unwrap();
            assert_eq!(s.pose.position_m[0], s.pose.position_m[1]);
        }

        writer.join().unwrap();
    }

    #[test]
    fn test_updates() {
        let shared = SharedState::new(LoopState::new(1.0, 2.0));

        shared
            .update_pose(1.0, 2.0, 3.0, 3.0 * std::f64::consts::PI)
            .unwrap();
        shared.update_velocity(1.0, -1.0, 5.0).unwrap();

        let s = shared.read_state().unwrap();
        assert!((s.pose.yaw_rad - std::f64::consts::PI).abs() < 1e-9 || (s.pose.yaw_rad + std::f64::consts::PI).abs() < 1e-9);
        assert_eq!(s.velocity_ms, Vector3::new(1.0, -1.0, 0.0));
        assert!(s.goal_world_m.is_none());
    }

    #[test]
    fn test_absent_collaborators() {
        let mut s = LoopState::new(1.0, 2.0);
        assert!(s.library_mut().is_none());
        assert!(s.collision_evaluator_mut().is_none());
        s.set_soft_top_speed(0.1);
        s.set_time_horizon(0.5);
        assert_eq!(s.soft_top_speed_ms, 0.1);
        assert_eq!(s.counters.absent_collaborator, 2);
    }
}
