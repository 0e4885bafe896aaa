//! # Flight library.
//!
//! The reactive flight control loop of the vehicle, exposed as a library so the executable and
//! other crates in the workspace can drive it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Transform buffer - named frames and the rigid transforms between them
pub mod tf;

/// Coordinate pipeline - converts points and vectors between frames
pub mod coord;

/// Shared loop state - pose, velocity, goal and selection behind one lock
pub mod state;

/// Goal tracker - the navigation target and its body frame projection
pub mod goal;

/// Control parameter scheduler - time horizon from speed
pub mod sched;

/// Trajectory selection - collaborator traits and the selection gate
pub mod traj_sel;

/// Yaw control - heading command from the selected trajectory
pub mod yaw_ctrl;

/// Attitude generator - roll, pitch and thrust from the desired acceleration
pub mod att_gen;

/// Attitude setpoint synthesizer - slewed heading and orientation target
pub mod att_sp;

/// Flight controller output - sinks for attitude targets
pub mod fc_out;

/// Flight control - the loop itself
pub mod flight_ctrl;

#[cfg(test)]
mod test_utils;
