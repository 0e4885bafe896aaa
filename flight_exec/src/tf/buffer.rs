//! # Transform buffer
//!
//! Stores the latest transform of each frame relative to its parent and answers lookups between
//! any two frames by composing through the `world` root. Lookups wait, up to a timeout, for a
//! missing or stale edge to be published by another thread.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::Isometry3;
use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

// Internal
use super::{Frame, TfError, TfParams};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Upper bound on the depth of the frame tree, anything deeper must contain a loop
const MAX_CHAIN_LEN: usize = 8;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An in-process transform buffer.
///
/// Each edge maps points expressed in the child frame into the parent frame, i.e. it is the pose
/// of the child in the parent.
pub struct TfBuffer {
    edges: Mutex<HashMap<Frame, Edge>>,

    /// Notified whenever an edge is published
    published: Condvar,

    /// Non-static edges older than this are unavailable
    max_age: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    parent: Frame,
    transform: Isometry3<f64>,
    stamp: Instant,
    is_static: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TfBuffer {
    /// Create an empty buffer.
    pub fn new(max_age: Duration) -> Self {
        Self {
            edges: Mutex::new(HashMap::new()),
            published: Condvar::new(),
            max_age,
        }
    }

    /// Create a buffer holding the static sensor mounts from the parameters.
    pub fn from_params(params: &TfParams) -> Result<Self, TfError> {
        let buf = Self::new(Duration::from_secs_f64(params.max_transform_age_s.max(0.0)));

        buf.set_static_transform(
            params.laser_mount.parent,
            Frame::Laser,
            params.laser_mount.isometry(),
        )?;
        buf.set_static_transform(
            params.depth_optical_mount.parent,
            Frame::DepthOptical,
            params.depth_optical_mount.isometry(),
        )?;

        Ok(buf)
    }

    /// Publish a time varying transform from `parent` to `child`.
    pub fn set_transform(
        &self,
        parent: Frame,
        child: Frame,
        transform: Isometry3<f64>,
    ) -> Result<(), TfError> {
        self.insert(parent, child, transform, Instant::now(), false)
    }

    /// Publish a transform which never goes stale.
    pub fn set_static_transform(
        &self,
        parent: Frame,
        child: Frame,
        transform: Isometry3<f64>,
    ) -> Result<(), TfError> {
        self.insert(parent, child, transform, Instant::now(), true)
    }

    /// Publish a time varying transform with an explicit stamp.
    pub fn set_transform_stamped(
        &self,
        parent: Frame,
        child: Frame,
        transform: Isometry3<f64>,
        stamp: Instant,
    ) -> Result<(), TfError> {
        self.insert(parent, child, transform, stamp, false)
    }

    /// Find the transform which maps points in `source` into `target`.
    ///
    /// If the chain is incomplete or stale the call waits for new transforms to be published,
    /// returning the last error once `timeout` has elapsed.
    pub fn lookup(
        &self,
        target: Frame,
        source: Frame,
        timeout: Duration,
    ) -> Result<Isometry3<f64>, TfError> {
        let deadline = Instant::now() + timeout;
        let mut edges = self.edges.lock()?;

        loop {
            let result = self.compose(&edges, target, source, Instant::now());

            let err = match result {
                Ok(t) => return Ok(t),
                Err(e) => e,
            };

            let now = Instant::now();
            if now >= deadline {
                trace!("Lookup {} <- {} failed: {}", target, source, err);
                return Err(err);
            }

            let (guard, _) = self.published.wait_timeout(edges, deadline - now)?;
            edges = guard;
        }
    }

    fn insert(
        &self,
        parent: Frame,
        child: Frame,
        transform: Isometry3<f64>,
        stamp: Instant,
        is_static: bool,
    ) -> Result<(), TfError> {
        self.edges.lock()?.insert(
            child,
            Edge {
                parent,
                transform,
                stamp,
                is_static,
            },
        );
        self.published.notify_all();
        Ok(())
    }

    fn compose(
        &self,
        edges: &HashMap<Frame, Edge>,
        target: Frame,
        source: Frame,
        now: Instant,
    ) -> Result<Isometry3<f64>, TfError> {
        if target == source {
            return Ok(Isometry3::identity());
        }

        let world_from_source = self.to_world(edges, source, now)?;
        let world_from_target = self.to_world(edges, target, now)?;

        Ok(world_from_target.inverse() * world_from_source)
    }

    /// Walk up the tree from `frame`, returning the pose of `frame` in the world
    fn to_world(
        &self,
        edges: &HashMap<Frame, Edge>,
        frame: Frame,
        now: Instant,
    ) -> Result<Isometry3<f64>, TfError> {
        let mut iso = Isometry3::identity();
        let mut current = frame;

        for _ in 0..MAX_CHAIN_LEN {
            if current == Frame::World {
                return Ok(iso);
            }

            let edge = edges.get(&current).ok_or(TfError::Disconnected(frame))?;

            if !edge.is_static {
                let age = now.saturating_duration_since(edge.stamp);
                if age > self.max_age {
                    return Err(TfError::Stale {
                        frame: current,
                        age_s: age.as_secs_f64(),
                    });
                }
            }

            iso = edge.transform * iso;
            current = edge.parent;
        }

        Err(TfError::Disconnected(frame))
    }
}
