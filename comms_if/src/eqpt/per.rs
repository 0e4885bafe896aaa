//! # Perception Equipment Messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use nalgebra::{Point3, Vector2};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A batch of 3D points from a depth camera or a laser scanner, expressed in the sensor's own
/// frame.
///
/// Points may contain NaN coordinates where the sensor had no return, consumers are expected to
/// filter these.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PointCloud {
    /// UTC timestamp at which the points were acquired
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// The points.
    ///
    /// Units: meters
    pub points: Vec<Point3<f64>>,
}

/// A 2D value grid (occupancy-like) covering the world XY plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueGrid {
    /// UTC timestamp at which the grid was computed
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Side length of one cell.
    ///
    /// Units: meters
    pub resolution_m: f64,

    /// Number of cells along the world X axis
    pub width: usize,

    /// Number of cells along the world Y axis
    pub height: usize,

    /// Position of cell (0, 0) in the world frame.
    ///
    /// Units: meters
    pub origin_m: Vector2<f64>,

    /// Row-major cell values, `width * height` long
    pub data: Vec<i8>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PointCloud {
    /// Create a new cloud stamped with the current time.
    pub fn now(points: Vec<Point3<f64>>) -> Self {
        Self {
            timestamp: Utc::now(),
            points,
        }
    }

    /// Number of points in the cloud, including invalid ones
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl ValueGrid {
    /// Returns true if the number of cells in `data` matches the grid's dimensions.
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.width * self.height
    }
}
