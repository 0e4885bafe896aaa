//! # Flight controller output
//!
//! Where attitude targets go once synthesized. On the vehicle the sink is the flight controller
//! link, for standalone runs every target is archived to CSV in the session.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use comms_if::eqpt::fc::AttitudeTarget;
use util::{
    archive::{ArchiveError, Archiver},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A consumer of attitude targets.
pub trait AttitudeSink {
    fn publish(&mut self, target: &AttitudeTarget) -> Result<(), FcOutError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Archives every published target.
pub struct ArchiveSink {
    arch: Archiver,

    num_published: u64,
}

/// Flat CSV row for one attitude target.
#[derive(Debug, Serialize)]
struct TargetRecord {
    /// Session elapsed time, seconds
    time_s: f64,
    type_mask: u8,
    qw: f64,
    qx: f64,
    qy: f64,
    qz: f64,
    thrust: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FcOutError {
    #[error("Could not archive the attitude target: {0}")]
    ArchiveError(ArchiveError),

    #[error("Attitude target contains non-finite values")]
    NonFiniteTarget,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArchiveSink {
    /// Archive to `path` relative to the session's archive root
    pub fn from_path<P: AsRef<Path>>(session: &Session, path: P) -> Result<Self, FcOutError> {
        Ok(Self {
            arch: Archiver::from_path(session, path).map_err(FcOutError::ArchiveError)?,
            num_published: 0,
        })
    }

    pub fn from_file_path<P: AsRef<Path>>(path: P) -> Result<Self, FcOutError> {
        Ok(Self {
            arch: Archiver::from_file_path(path).map_err(FcOutError::ArchiveError)?,
            num_published: 0,
        })
    }

    pub fn num_published(&self) -> u64 {
        self.num_published
    }
}

impl AttitudeSink for ArchiveSink {
    fn publish(&mut self, target: &AttitudeTarget) -> Result<(), FcOutError> {
        let q = target.orientation_q.quaternion();

        if !(q.coords.iter().all(|c| c.is_finite()) && target.thrust.is_finite()) {
            return Err(FcOutError::NonFiniteTarget);
        }

        let mut time_s = session::get_elapsed_seconds();
        if time_s.is_nan() {
            time_s = 0.0;
        }

        self.arch
            .serialise(TargetRecord {
                time_s,
                type_mask: target.type_mask,
                qw: q.w,
                qx: q.i,
                qy: q.j,
                qz: q.k,
                thrust: target.thrust,
            })
            .map_err(FcOutError::ArchiveError)?;

        self.num_published += 1;

        Ok(())
    }
}
