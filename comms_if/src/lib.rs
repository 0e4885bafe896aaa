//! # Communications interface crate.
//!
//! Provides the message shapes exchanged between the flight control loop, the vehicle's sensors
//! and the flight controller. Transport of these messages is not handled here, only their
//! structure and (de)serialisation.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Message definitions for equipment (navigation sensors, perception, flight controller)
pub mod eqpt;

/// Replayable sensor messages
pub mod sens;
