//! # Trajectory selection module
//!
//! The control loop does not generate or score trajectories itself. It drives an external
//! selector through the traits in this module, and the selection gate decides which selection
//! policy applies on each invocation.
//!
//! Any collaborator may be absent: the selector is optional, and a selector may not expose a
//! library or evaluators. Every call site checks for presence and does nothing otherwise.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod gate;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Point3, Vector3};
use serde::Serialize;

use crate::tf::Frame;
use comms_if::eqpt::per::ValueGrid;

pub use gate::{GateOutcome, SelectionGate};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of candidate trajectories the selector reports collision probabilities for
pub const NUM_TRAJECTORIES: usize = 25;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The output of a successful selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Selection {
    /// Index of the chosen trajectory in the library
    pub index: usize,

    /// Acceleration demanded by the chosen trajectory.
    ///
    /// Units: meters/second^2,
    /// Frame: ortho-body
    pub accel_mss: Vector3<f64>,
}

/// Configuration handed to the selector when it is attached to the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LibraryConfig {
    /// Units: seconds
    pub time_horizon_s: f64,

    /// Units: meters/second
    pub soft_top_speed_ms: f64,

    /// Units: meters/second^2
    pub a_max_horizontal_mss: f64,

    /// Units: meters/second
    pub min_speed_at_max_acceleration_total_ms: f64,

    /// Units: meters/second^2
    pub max_acceleration_total_mss: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Which selection routine is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectionPolicy {
    /// On or near the ground
    Takeoff,

    /// Airborne
    Cruise,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A candidate trajectory.
pub trait Trajectory {
    /// Position at time `t_s` after the start of the trajectory (ortho-body frame)
    fn position(&self, t_s: f64) -> Vector3<f64>;

    /// Velocity at time `t_s` (ortho-body frame)
    fn velocity(&self, t_s: f64) -> Vector3<f64>;

    /// Acceleration at time `t_s` (ortho-body frame)
    fn acceleration(&self, t_s: f64) -> Vector3<f64>;

    /// Store the trajectory's acceleration expressed in the laser frame
    fn set_acceleration_laser(&mut self, accel_mss: Vector3<f64>);

    /// Store the trajectory's acceleration expressed in the depth optical frame
    fn set_acceleration_depth_optical(&mut self, accel_mss: Vector3<f64>);
}

/// The set of candidate trajectories.
pub trait TrajectoryLibrary {
    /// Number of trajectories in the library
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn trajectory(&self, index: usize) -> Option<&dyn Trajectory>;

    fn trajectory_mut(&mut self, index: usize) -> Option<&mut dyn Trajectory>;

    fn set_roll_pitch(&mut self, roll_rad: f64, pitch_rad: f64);

    /// Thrust currently commanded, normalised to [0, 1]
    fn set_thrust(&mut self, thrust: f64);

    /// Set the initial velocity expressed in `frame` (ortho-body, laser or depth optical)
    fn set_initial_velocity(&mut self, frame: Frame, velocity_ms: Vector3<f64>);

    /// Initial acceleration in the ortho-body frame
    fn initial_acceleration(&self) -> Vector3<f64>;

    /// Set the initial acceleration expressed in `frame` (laser or depth optical)
    fn set_initial_acceleration(&mut self, frame: Frame, accel_mss: Vector3<f64>);

    /// Rescale acceleration limits for the current speed
    fn update_max_acceleration(&mut self, speed_ms: f64);
}

/// Evaluates collision probability against sensed geometry.
pub trait CollisionEvaluator {
    /// Points from the depth camera, in the depth optical frame
    fn update_point_cloud(&mut self, points: &[Point3<f64>]);

    /// Points from the laser scanner, in the laser frame
    fn update_laser_point_cloud(&mut self, points: &[Point3<f64>]);
}

/// Scores positions against a world frame value grid.
pub trait ValueGridEvaluator {
    fn update_value_grid(&mut self, grid: &ValueGrid);

    /// Value of the grid cell containing `position_m`, `None` if outside the grid
    fn value_of_position(&self, position_m: &Point3<f64>) -> Option<f64>;
}

/// Chooses the best trajectory for the current goal.
pub trait TrajectorySelector {
    /// Build the library from the loop's startup configuration
    fn initialize_library(&mut self, config: &LibraryConfig);

    /// Best trajectory towards `goal_ob` (ortho-body frame) while airborne, `None` if no
    /// trajectory could be chosen
    fn select_best(&mut self, goal_ob: &Vector3<f64>) -> Option<Selection>;

    /// Best trajectory towards `goal_ob` while taking off
    fn select_takeoff(&mut self, goal_ob: &Vector3<f64>) -> Option<Selection>;

    fn set_time_horizon(&mut self, horizon_s: f64);

    fn set_soft_top_speed(&mut self, speed_ms: f64);

    fn collision_probabilities(&self) -> [f64; NUM_TRAJECTORIES];

    fn library(&self) -> Option<&dyn TrajectoryLibrary>;

    fn library_mut(&mut self) -> Option<&mut dyn TrajectoryLibrary>;

    fn collision_evaluator_mut(&mut self) -> Option<&mut dyn CollisionEvaluator>;

    fn value_grid_evaluator_mut(&mut self) -> Option<&mut dyn ValueGridEvaluator>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SelectionPolicy {
    /// Takeoff at or below `takeoff_altitude_m`, cruise above it.
    pub fn for_altitude(z_m: f64, takeoff_altitude_m: f64) -> Self {
        if z_m > takeoff_altitude_m {
            SelectionPolicy::Cruise
        } else {
            SelectionPolicy::Takeoff
        }
    }
}
