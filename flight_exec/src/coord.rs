//! # Coordinate pipeline
//!
//! Converts points and vectors between named frames using the transform buffer, and publishes
//! the frames derived from the vehicle pose.
//!
//! Points are transformed with the full rigid transform. Vectors (velocities, accelerations) are
//! free vectors and are only rotated.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// Internal
use crate::tf::{Frame, TfBuffer, TfError};
use comms_if::eqpt::nav::PoseStamped;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Frame conversion front end for the control loop.
#[derive(Clone)]
pub struct CoordPipeline {
    tf: Arc<TfBuffer>,

    /// Default bound on how long a conversion may block
    max_age: Duration,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CoordError {
    #[error("Transform from {from} to {to} is unavailable: {cause}")]
    TransformUnavailable {
        from: Frame,
        to: Frame,
        cause: TfError,
    },

    #[error("Could not publish the {0} frame: {1}")]
    BroadcastFailed(Frame, TfError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CoordPipeline {
    pub fn new(tf: Arc<TfBuffer>, max_age: Duration) -> Self {
        Self { tf, max_age }
    }

    /// Transform a point from `source` into `target`.
    pub fn transform_point(
        &self,
        point: &Point3<f64>,
        source: Frame,
        target: Frame,
    ) -> Result<Point3<f64>, CoordError> {
        self.transform_point_within(point, source, target, self.max_age)
    }

    /// Transform a point, blocking for at most `max_age`.
    fn transform_point_within(
        &self,
        point: &Point3<f64>,
        source: Frame,
        target: Frame,
        max_age: Duration,
    ) -> Result<Point3<f64>, CoordError> {
        Ok(self.lookup(source, target, max_age)? * point)
    }

    /// Rotate a vector from `source` into `target`.
    pub fn transform_vector(
        &self,
        vector: &Vector3<f64>,
        source: Frame,
        target: Frame,
    ) -> Result<Vector3<f64>, CoordError> {
        self.transform_vector_within(vector, source, target, self.max_age)
    }

    /// Rotate a vector, blocking for at most `max_age`.
    fn transform_vector_within(
        &self,
        vector: &Vector3<f64>,
        source: Frame,
        target: Frame,
        max_age: Duration,
    ) -> Result<Vector3<f64>, CoordError> {
        Ok(self.rotation_within(source, target, max_age)? * vector)
    }

    /// The rotation taking vectors in `source` into `target`.
    ///
    /// Useful when many vectors are rotated between the same pair of frames.
    pub fn rotation(&self, source: Frame, target: Frame) -> Result<UnitQuaternion<f64>, CoordError> {
        self.rotation_within(source, target, self.max_age)
    }

    fn rotation_within(
        &self,
        source: Frame,
        target: Frame,
        max_age: Duration,
    ) -> Result<UnitQuaternion<f64>, CoordError> {
        Ok(self.lookup(source, target, max_age)?.rotation)
    }

    /// Publish `world -> body` from a pose estimate.
    pub fn broadcast_body_pose(&self, pose: &PoseStamped) -> Result<(), CoordError> {
        let iso = Isometry3::from_parts(
            Translation3::from(pose.position_m),
            UnitQuaternion::new_normalize(pose.attitude_q.into_inner()),
        );

        self.tf
            .set_transform(Frame::World, Frame::Body, iso)
            .map_err(|e| CoordError::BroadcastFailed(Frame::Body, e))
    }

    /// Publish `body -> ortho_body`, undoing the body's roll and pitch.
    ///
    /// The body attitude is `Rz(yaw) * Ry(pitch) * Rx(roll)`, so the ortho-body frame seen from
    /// the body is the inverse of `Ry(pitch) * Rx(roll)`, which leaves `ortho_body` rotated only
    /// by yaw relative to `world`.
    pub fn broadcast_ortho_body(&self, roll_rad: f64, pitch_rad: f64) -> Result<(), CoordError> {
        let rot = UnitQuaternion::from_euler_angles(roll_rad, pitch_rad, 0.0).inverse();

        self.tf
            .set_transform(
                Frame::Body,
                Frame::OrthoBody,
                Isometry3::from_parts(Translation3::identity(), rot),
            )
            .map_err(|e| CoordError::BroadcastFailed(Frame::OrthoBody, e))
    }

    fn lookup(
        &self,
        source: Frame,
        target: Frame,
        max_age: Duration,
    ) -> Result<Isometry3<f64>, CoordError> {
        self.tf
            .lookup(target, source, max_age)
            .map_err(|cause| CoordError::TransformUnavailable {
                from: source,
                to: target,
                cause,
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pipeline() -> CoordPipeline {
        CoordPipeline::new(
            Arc::new(TfBuffer::new(Duration::from_secs(1))),
            Duration::from_millis(5),
        )
    }

    #[test]
    fn test_ortho_body_is_yaw_only() {
        let coord = pipeline();

        let (roll, pitch, yaw) = (0.2, -0.3, 1.1);
        let pose = PoseStamped::now(
            Vector3::new(1.0, 2.0, 3.0),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        );
        coord.broadcast_body_pose(&pose).unwrap();
        coord.broadcast_ortho_body(roll, pitch).unwrap();

        let rot = coord.rotation(Frame::OrthoBody, Frame::World).unwrap();
        let (r, p, y) = rot.euler_angles();
        assert!(r.abs() < 1e-9);
        assert!(p.abs() < 1e-9);
        assert!((y - yaw).abs() < 1e-9);

        // Same origin as the body
        let origin = coord
            .transform_point(&Point3::origin(), Frame::OrthoBody, Frame::World)
            .unwrap();
        assert!((origin - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-9);
    }

    #[test]
    fn test_vectors_ignore_translation() {
        let coord = pipeline();
        coord
            .broadcast_body_pose(&PoseStamped::now(
                Vector3::new(10.0, 0.0, 0.0),
                UnitQuaternion::identity(),
            ))
            .unwrap();

        let v = coord
            .transform_vector(&Vector3::new(1.0, 0.0, 0.0), Frame::World, Frame::Body)
            .unwrap();
        assert_eq!(v, Vector3::new(1.0, 0.0, 0.0));

        let p = coord
            .transform_point(&Point3::new(1.0, 0.0, 0.0), Frame::World, Frame::Body)
            .unwrap();
        assert_eq!(p, Point3::new(-9.0, 0.0, 0.0));
    }

    #[test]
    fn test_unavailable() {
        let coord = pipeline();

        assert!(matches!(
            coord.transform_vector(&Vector3::x(), Frame::World, Frame::Laser),
            Err(CoordError::TransformUnavailable {
                from: Frame::World,
                to: Frame::Laser,
                ..
            })
        ));
    }
}
