//! Transform parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

// Internal
use super::Frame;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the transform buffer and the coordinate pipeline
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TfParams {
    /// Maximum time a lookup may wait for a transform.
    ///
    /// Units: seconds
    pub lookup_timeout_s: f64,

    /// Time varying transforms older than this are treated as unavailable.
    ///
    /// Units: seconds
    pub max_transform_age_s: f64,

    /// Mounting of the laser scanner
    pub laser_mount: Mount,

    /// Mounting of the depth camera's optical frame
    pub depth_optical_mount: Mount,
}

/// A fixed sensor mounting relative to a parent frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct Mount {
    pub parent: Frame,

    /// Position of the sensor in the parent frame.
    ///
    /// Units: meters
    pub translation_m: [f64; 3],

    /// Roll, pitch and yaw of the sensor in the parent frame.
    ///
    /// Units: radians
    pub rpy_rad: [f64; 3],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TfParams {
    fn default() -> Self {
        Self {
            lookup_timeout_s: 1.0 / 30.0,
            max_transform_age_s: 0.5,
            laser_mount: Mount {
                parent: Frame::Body,
                translation_m: [0.0, 0.0, 0.05],
                rpy_rad: [0.0, 0.0, 0.0],
            },
            // Optical convention: z forward, x right, y down
            depth_optical_mount: Mount {
                parent: Frame::Body,
                translation_m: [0.1, 0.0, 0.0],
                rpy_rad: [
                    -std::f64::consts::FRAC_PI_2,
                    0.0,
                    -std::f64::consts::FRAC_PI_2,
                ],
            },
        }
    }
}

impl Mount {
    /// The pose of the sensor in its parent frame
    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(
                self.translation_m[0],
                self.translation_m[1],
                self.translation_m[2],
            ),
            UnitQuaternion::from_euler_angles(self.rpy_rad[0], self.rpy_rad[1], self.rpy_rad[2]),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_default_optical_mount() {
        let iso = TfParams::default().depth_optical_mount.isometry();

        // The optical axis points along body x
        let z_optical = iso.rotation * Vector3::z();
        assert!((z_optical - Vector3::x()).norm() < 1e-9);

        // Image x points to the body's right
        let x_optical = iso.rotation * Vector3::x();
        assert!((x_optical + Vector3::y()).norm() < 1e-9);
    }

    #[test]
    fn test_parse() {
        let p: TfParams = util::params::from_str(
            r#"
            lookup_timeout_s = 0.05

            [laser_mount]
            parent = "body"
            translation_m = [0.0, 0.0, 0.2]
            rpy_rad = [0.0, 0.0, 3.14]
            "#,
        )
        .unwrap();

        assert_eq!(p.lookup_timeout_s, 0.05);
        assert_eq!(p.max_transform_age_s, 0.5);
        assert_eq!(p.laser_mount.translation_m[2], 0.2);
        assert_eq!(p.depth_optical_mount.parent, Frame::Body);
    }
}
