//! # Goal tracker
//!
//! Holds the navigation target ("carrot"). The world frame goal is the source of truth; the
//! ortho-body projection is derived from it after every pose or goal update and is never set on
//! its own.
//!
//! Projection needs a transform lookup, which must not happen under the shared state lock, so it
//! is split in two halves: `pending_projection` hands out the world goal with an epoch, and
//! `apply_projection` only accepts the result if no newer goal arrived in the meantime.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Point3, Vector3};
use serde::Serialize;

use crate::coord::{CoordError, CoordPipeline};
use crate::tf::Frame;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct GoalTracker {
    /// Goal in the world frame, `None` until the first goal arrives
    world_m: Option<Point3<f64>>,

    /// Last successful projection of the goal into the ortho-body frame
    body_m: Option<Point3<f64>>,

    /// Incremented on every new world goal
    epoch: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GoalTracker {
    /// Store a new world goal. The body projection is kept until it is recomputed.
    ///
    /// Returns the epoch of the new goal.
    pub fn set_world_goal(&mut self, point_m: Point3<f64>) -> u64 {
        self.world_m = Some(point_m);
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }

    /// The world goal and its epoch, if there is a goal to project.
    pub fn pending_projection(&self) -> Option<(Point3<f64>, u64)> {
        self.world_m.map(|w| (w, self.epoch))
    }

    /// Store a projection computed for the goal of `epoch`.
    ///
    /// Returns false, leaving the tracker untouched, if the goal has changed since.
    pub fn apply_projection(&mut self, epoch: u64, body_m: Point3<f64>) -> bool {
        if epoch != self.epoch || self.world_m.is_none() {
            return false;
        }
        self.body_m = Some(body_m);
        true
    }

    pub fn world(&self) -> Option<Point3<f64>> {
        self.world_m
    }

    pub fn body(&self) -> Option<Point3<f64>> {
        self.body_m
    }

    /// The body frame goal as a vector, zero (hold position) if no goal has been projected yet
    pub fn body_or_zero(&self) -> Vector3<f64> {
        self.body_m.map(|p| p.coords).unwrap_or_else(Vector3::zeros)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Project a world frame goal into the ortho-body frame.
pub fn project_to_body(
    coord: &CoordPipeline,
    world_m: &Point3<f64>,
) -> Result<Point3<f64>, CoordError> {
    coord.transform_point(world_m, Frame::World, Frame::OrthoBody)
}
