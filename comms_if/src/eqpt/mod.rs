//! # Equipment Interface
//!
//! This module defines the interface structures exchanged with equipment: navigation sources,
//! perception sensors and the flight controller.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod fc;
pub mod nav;
pub mod per;
