//! # Transform module
//!
//! Named coordinate frames and an in-process buffer of the rigid transforms between them.
//!
//! The frame tree is rooted at `world`:
//!
//! ```text
//! world
//! └── body
//!     ├── ortho_body
//!     ├── laser
//!     └── depth_optical
//! ```
//!
//! `world -> body` comes from the pose estimate, `body -> ortho_body` undoes the body's roll and
//! pitch, and the sensor frames are static mounts.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod buffer;
pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use buffer::TfBuffer;
pub use params::{Mount, TfParams};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A named coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frame {
    /// Fixed, gravity aligned frame in which poses and goals are expressed
    World,

    /// The vehicle body, x forward, y left, z up
    Body,

    /// Shares the body origin and yaw, but with roll and pitch removed
    OrthoBody,

    /// Laser scanner frame
    Laser,

    /// Depth camera optical frame, z along the optical axis, x right, y down
    DepthOptical,
}

#[derive(Debug, Error)]
pub enum TfError {
    #[error("Unknown frame name \"{0}\"")]
    UnknownFrame(String),

    #[error("No transform chain connects {0} to the world frame")]
    Disconnected(Frame),

    #[error("The transform to {frame} is stale ({age_s:.3} s old)")]
    Stale { frame: Frame, age_s: f64 },

    #[error("A transform buffer lock was poisoned")]
    PoisonError,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Frame {
    /// The name of the frame as used in parameter files and logs
    pub fn name(&self) -> &'static str {
        match self {
            Frame::World => "world",
            Frame::Body => "body",
            Frame::OrthoBody => "ortho_body",
            Frame::Laser => "laser",
            Frame::DepthOptical => "depth_optical",
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Frame {
    type Err = TfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "world" => Ok(Frame::World),
            "body" => Ok(Frame::Body),
            "ortho_body" => Ok(Frame::OrthoBody),
            "laser" => Ok(Frame::Laser),
            "depth_optical" => Ok(Frame::DepthOptical),
            _ => Err(TfError::UnknownFrame(s.to_string())),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for TfError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        TfError::PoisonError
    }
}
