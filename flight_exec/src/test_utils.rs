//! Test doubles for the external trajectory collaborators.
//!
//! The selector is boxed into the loop state when attached, so everything a test wants to
//! observe or script is kept in a `MockShared` behind an `Arc<Mutex<_>>` that the test keeps a
//! handle to.

use nalgebra::{Point3, Vector3};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::tf::Frame;
use crate::traj_sel::{
    CollisionEvaluator, LibraryConfig, Selection, Trajectory, TrajectoryLibrary,
    TrajectorySelector, ValueGridEvaluator, NUM_TRAJECTORIES,
};
use comms_if::eqpt::per::ValueGrid;

/// Observations and scripted responses shared between a test and its mocks.
#[derive(Debug, Default)]
pub struct MockShared {
    /// Returned by both selection routines
    pub next_selection: Option<Selection>,

    pub takeoff_calls: usize,
    pub best_calls: usize,
    pub last_goal: Option<Vector3<f64>>,

    pub config: Option<LibraryConfig>,
    pub horizons: Vec<f64>,
    pub soft_top_speeds: Vec<f64>,

    pub roll_pitch: Option<(f64, f64)>,
    pub thrusts: Vec<f64>,
    pub initial_velocity: HashMap<Frame, Vector3<f64>>,
    pub initial_accel: Vector3<f64>,
    pub initial_accel_frames: HashMap<Frame, Vector3<f64>>,
    pub max_accel_speeds: Vec<f64>,

    /// Per-trajectory accelerations written back by the loop, keyed by (index, frame)
    pub traj_accels: HashMap<(usize, Frame), Vector3<f64>>,

    pub depth_clouds: Vec<usize>,
    pub laser_clouds: Vec<usize>,
    pub grids: usize,
}

/// A constant acceleration trajectory starting at the origin.
pub struct MockTrajectory {
    index: usize,
    v0: Vector3<f64>,
    a: Vector3<f64>,
    shared: Arc<Mutex<MockShared>>,
}

pub struct MockLibrary {
    trajectories: Vec<MockTrajectory>,
    shared: Arc<Mutex<MockShared>>,
}

pub struct MockSelector {
    library: MockLibrary,
    has_library: bool,
    has_evaluators: bool,
    shared: Arc<Mutex<MockShared>>,
}

impl MockSelector {
    /// A selector with `n` trajectories. Trajectory `i` starts with velocity `(i, 0, 0)` and
    /// accelerates at `(0, 0.1 * i, 0)`.
    pub fn new(n: usize) -> (Self, Arc<Mutex<MockShared>>) {
        let shared = Arc::new(Mutex::new(MockShared::default()));

        let trajectories = (0..n)
            .map(|i| MockTrajectory {
                index: i,
                v0: Vector3::new(i as f64, 0.0, 0.0),
                a: Vector3::new(0.0, 0.1 * i as f64, 0.0),
                shared: shared.clone(),
            })
            .collect();

        (
            Self {
                library: MockLibrary {
                    trajectories,
                    shared: shared.clone(),
                },
                has_library: true,
                has_evaluators: true,
                shared: shared.clone(),
            },
            shared,
        )
    }

    /// A selector that exposes neither a library nor evaluators
    pub fn bare() -> (Self, Arc<Mutex<MockShared>>) {
        let (mut s, shared) = Self::new(0);
        s.has_library = false;
        s.has_evaluators = false;
        (s, shared)
    }

    /// Replace trajectory `index` with one of the given initial velocity and no acceleration
    pub fn with_velocity(mut self, index: usize, v0: Vector3<f64>) -> Self {
        if let Some(t) = self.library.trajectories.get_mut(index) {
            t.v0 = v0;
            t.a = Vector3::zeros();
        }
        self
    }
}

impl Trajectory for MockTrajectory {
    fn position(&self, t_s: f64) -> Vector3<f64> {
        self.v0 * t_s + self.a * (0.5 * t_s * t_s)
    }

    fn velocity(&self, t_s: f64) -> Vector3<f64> {
        self.v0 + self.a * t_s
    }

    fn acceleration(&self, _t_s: f64) -> Vector3<f64> {
        self.a
    }

    fn set_acceleration_laser(&mut self, accel_mss: Vector3<f64>) {
        self.shared
            .lock()
            .unwrap()
            .traj_accels
            .insert((self.index, Frame::Laser), accel_mss);
    }

    fn set_acceleration_depth_optical(&mut self, accel_mss: Vector3<f64>) {
        self.shared
            .lock()
            .unwrap()
            .traj_accels
            .insert((self.index, Frame::DepthOptical), accel_mss);
    }
}

impl TrajectoryLibrary for MockLibrary {
    fn len(&self) -> usize {
        self.trajectories.len()
    }

    fn trajectory(&self, index: usize) -> Option<&dyn Trajectory> {
        self.trajectories.get(index).map(|t| t as &dyn Trajectory)
    }

    fn trajectory_mut(&mut self, index: usize) -> Option<&mut dyn Trajectory> {
        self.trajectories
            .get_mut(index)
            .map(|t| t as &mut dyn Trajectory)
    }

    fn set_roll_pitch(&mut self, roll_rad: f64, pitch_rad: f64) {
        self.shared.lock().unwrap().roll_pitch = Some((roll_rad, pitch_rad));
    }

    fn set_thrust(&mut self, thrust: f64) {
        self.shared.lock().unwrap().thrusts.push(thrust);
    }

    fn set_initial_velocity(&mut self, frame: Frame, velocity_ms: Vector3<f64>) {
        self.shared
            .lock()
            .unwrap()
            .initial_velocity
            .insert(frame, velocity_ms);
    }

    fn initial_acceleration(&self) -> Vector3<f64> {
        self.shared.lock().unwrap().initial_accel
    }

    fn set_initial_acceleration(&mut self, frame: Frame, accel_mss: Vector3<f64>) {
        self.shared
            .lock()
            .unwrap()
            .initial_accel_frames
            .insert(frame, accel_mss);
    }

    fn update_max_acceleration(&mut self, speed_ms: f64) {
        self.shared.lock().unwrap().max_accel_speeds.push(speed_ms);
    }
}

impl CollisionEvaluator for MockLibrary {
    fn update_point_cloud(&mut self, points: &[Point3<f64>]) {
        self.shared.lock().unwrap().depth_clouds.push(points.len());
    }

    fn update_laser_point_cloud(&mut self, points: &[Point3<f64>]) {
        self.shared.lock().unwrap().laser_clouds.push(points.len());
    }
}

impl ValueGridEvaluator for MockLibrary {
    fn update_value_grid(&mut self, _grid: &ValueGrid) {
        self.shared.lock().unwrap().grids += 1;
    }

    fn value_of_position(&self, position_m: &Point3<f64>) -> Option<f64> {
        Some(position_m[0])
    }
}

impl TrajectorySelector for MockSelector {
    fn initialize_library(&mut self, config: &LibraryConfig) {
        self.shared.lock().unwrap().config = Some(*config);
    }

    fn select_best(&mut self, goal_ob: &Vector3<f64>) -> Option<Selection> {
        let mut s = self.shared.lock().unwrap();
        s.best_calls += 1;
        s.last_goal = Some(*goal_ob);
        s.next_selection
    }

    fn select_takeoff(&mut self, goal_ob: &Vector3<f64>) -> Option<Selection> {
        let mut s = self.shared.lock().unwrap();
        s.takeoff_calls += 1;
        s.last_goal = Some(*goal_ob);
        s.next_selection
    }

    fn set_time_horizon(&mut self, horizon_s: f64) {
        self.shared.lock().unwrap().horizons.push(horizon_s);
    }

    fn set_soft_top_speed(&mut self, speed_ms: f64) {
        self.shared.lock().unwrap().soft_top_speeds.push(speed_ms);
    }

    fn collision_probabilities(&self) -> [f64; NUM_TRAJECTORIES] {
        let mut p = [0.0; NUM_TRAJECTORIES];
        p[0] = 0.5;
        p
    }

    fn library(&self) -> Option<&dyn TrajectoryLibrary> {
        if self.has_library {
            Some(&self.library)
        } else {
            None
        }
    }

    fn library_mut(&mut self) -> Option<&mut dyn TrajectoryLibrary> {
        if self.has_library {
            Some(&mut self.library)
        } else {
            None
        }
    }

    fn collision_evaluator_mut(&mut self) -> Option<&mut dyn CollisionEvaluator> {
        if self.has_evaluators {
            Some(&mut self.library)
        } else {
            None
        }
    }

    fn value_grid_evaluator_mut(&mut self) -> Option<&mut dyn ValueGridEvaluator> {
        if self.has_evaluators {
            Some(&mut self.library)
        } else {
            None
        }
    }
}
