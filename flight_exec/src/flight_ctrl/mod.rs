//! # Flight control module
//!
//! The reactive control loop. `FlightCtrl` owns the shared state and every stage of the loop,
//! and is driven from two sides:
//!
//! - Sensor callbacks (`on_pose`, `on_velocity`, `on_depth_points`, ...), called from the sensor
//!   thread as messages arrive. Depth clouds additionally trigger a reaction (selection + yaw).
//! - `tick`, called by the main loop at a fixed rate, which always produces an attitude target
//!   from the last selection, however stale the sensor data is.
//!
//! All methods take `&self` so the controller can be shared between threads behind an `Arc`.
//! Transform lookups are always made with the shared lock released.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;

// Internal
use crate::att_gen::{self, AttitudeGenerator, RollPitchThrust};
use crate::att_sp::{AttSetpointSynth, AttSpError};
use crate::coord::{CoordError, CoordPipeline};
use crate::goal::project_to_body;
use crate::sched::Scheduler;
use crate::state::{Counters, LoopState, SharedState, StateError, StateSnapshot};
use crate::tf::Frame;
use crate::traj_sel::{
    GateOutcome, LibraryConfig, SelectionGate, TrajectorySelector, NUM_TRAJECTORIES,
};
use crate::yaw_ctrl::{self, YawCtrl};
use comms_if::{
    eqpt::{
        fc::AttitudeTarget,
        nav::{GoalStamped, PoseStamped, TwistStamped},
        per::{PointCloud, ValueGrid},
    },
    sens::SensorMsg,
};
use util::kd_tree::KdTree;

pub use params::Params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct FlightCtrl {
    params: Params,

    state: SharedState,

    coord: CoordPipeline,

    sched: Scheduler,

    gate: SelectionGate,

    yaw_ctrl: YawCtrl,

    att_gen: Mutex<AttitudeGenerator>,

    att_sp: AttSetpointSynth,
}

/// Diagnostic report of the control loop.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub state: StateSnapshot,

    /// Planar speed in the ortho-body frame.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Heading currently sent to the flight controller.
    ///
    /// Units: degrees
    pub set_bearing_deg: f64,

    /// Units: meters
    pub nearest_obstacle_m: Option<f64>,

    pub proximity_points: usize,

    pub collision_probabilities: [f64; NUM_TRAJECTORIES],

    pub thrust: f64,

    pub selector_attached: bool,

    pub counters: Counters,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FlightCtrlError {
    #[error("Shared state error: {0}")]
    StateError(StateError),

    #[error("The attitude generator lock was poisoned")]
    AttGenPoisoned,

    #[error("Could not synthesize the attitude setpoint: {0}")]
    AttSpError(AttSpError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FlightCtrl {
    pub fn new(
        params: Params,
        att_gen_params: att_gen::Params,
        yaw_params: yaw_ctrl::Params,
        coord: CoordPipeline,
    ) -> Self {
        let takeoff_soft_top_speed_ms = if params.restore_soft_top_speed_on_takeoff {
            Some(params.soft_top_speed_ms)
        } else {
            None
        };

        Self {
            state: SharedState::new(LoopState::new(
                params.nominal_time_horizon_s,
                params.soft_top_speed_ms,
            )),
            coord,
            sched: Scheduler::new(
                params.nominal_time_horizon_s,
                params.horizon_speed_threshold_ms,
                params.min_time_horizon_s,
            ),
            gate: SelectionGate::new(params.takeoff_altitude_m, takeoff_soft_top_speed_ms),
            att_sp: AttSetpointSynth::new(yaw_params.slew_step_deg, yaw_params.slew_snap_deg),
            yaw_ctrl: YawCtrl::new(yaw_params, params.soft_top_speed_ms),
            att_gen: Mutex::new(AttitudeGenerator::new(att_gen_params)),
            params,
        }
    }

    /// True if depth clouds drive re-selection, false if the caller must call `react`
    /// periodically.
    pub fn uses_depth_image(&self) -> bool {
        self.params.use_depth_image
    }

    /// Initialise the selector's library and make it visible to the loop.
    ///
    /// Replaces any previously attached selector.
    pub fn attach_selector(
        &self,
        mut selector: Box<dyn TrajectorySelector + Send>,
    ) -> Result<(), FlightCtrlError> {
        let (time_horizon_s, soft_top_speed_ms) = {
            let state = self.state.lock()?;
            (state.time_horizon_s, state.soft_top_speed_ms)
        };

        selector.initialize_library(&LibraryConfig {
            time_horizon_s,
            soft_top_speed_ms,
            a_max_horizontal_mss: self.params.a_max_horizontal_mss,
            min_speed_at_max_acceleration_total_ms: self
                .params
                .min_speed_at_max_acceleration_total_ms,
            max_acceleration_total_mss: self.params.max_acceleration_total_mss,
        });

        let mut state = self.state.lock()?;
        selector.set_time_horizon(state.time_horizon_s);
        selector.set_soft_top_speed(state.soft_top_speed_ms);
        if state.selector.replace(selector).is_some() {
            info!("Replaced the attached trajectory selector");
        }

        Ok(())
    }

    /// Dispatch a sensor message to its callback.
    pub fn handle(&self, msg: &SensorMsg) -> Result<(), FlightCtrlError> {
        trace!("Handling {} message", msg.type_name());

        match msg {
            SensorMsg::Pose(p) => self.on_pose(p),
            SensorMsg::Twist(t) => self.on_velocity(t),
            SensorMsg::GlobalGoal(g) => self.on_global_goal(g),
            SensorMsg::LocalGoal(g) => self.on_local_goal(g),
            SensorMsg::DepthPoints(c) => self.on_depth_points(c).map(|_| ()),
            SensorMsg::Scan(c) => self.on_scan(c),
            SensorMsg::ValueGrid(g) => self.on_value_grid(g),
        }
    }

    /// Pose estimate callback.
    pub fn on_pose(&self, pose: &PoseStamped) -> Result<(), FlightCtrlError> {
        let (roll_rad, pitch_rad, yaw_rad) = pose.roll_pitch_yaw();

        {
            let mut gen = self.att_gen.lock()?;
            gen.set_z(pose.position_m[2]);
            gen.set_roll_pitch(roll_rad, pitch_rad);
        }

        if let Some(lib) = self.state.lock()?.library_mut() {
            lib.set_roll_pitch(roll_rad, pitch_rad);
        }

        let mut failures = 0;

        if let Err(e) = self.coord.broadcast_body_pose(pose) {
            warn!("{}", e);
            failures += 1;
        }
        if let Err(e) = self.coord.broadcast_ortho_body(roll_rad, pitch_rad) {
            warn!("{}", e);
            failures += 1;
        }

        self.reproject_goal()?;
        self.reproject_accelerations()?;

        let mut state = self.state.lock()?;
        state.counters.transform_failures += failures;
        state.update_pose(
            pose.position_m[0],
            pose.position_m[1],
            pose.position_m[2],
            yaw_rad,
        );

        Ok(())
    }

    /// Velocity estimate callback, the twist is expressed in the world frame.
    pub fn on_velocity(&self, twist: &TwistStamped) -> Result<(), FlightCtrlError> {
        self.att_gen.lock()?.set_z_velocity(twist.linear_ms[2]);

        let mut failures = 0;

        let mut velocity_ob =
            self.rotate_or_zero(&twist.linear_ms, Frame::World, Frame::OrthoBody, &mut failures);
        velocity_ob[2] = 0.0;

        let velocity_laser =
            self.rotate_or_zero(&velocity_ob, Frame::OrthoBody, Frame::Laser, &mut failures);
        let velocity_depth = self.rotate_or_zero(
            &velocity_ob,
            Frame::OrthoBody,
            Frame::DepthOptical,
            &mut failures,
        );

        let speed_ms = velocity_ob.norm();
        let horizon_s = self.sched.time_horizon(speed_ms);

        let mut state = self.state.lock()?;
        state.counters.transform_failures += failures;

        if let Some(lib) = state.library_mut() {
            lib.set_initial_velocity(Frame::OrthoBody, velocity_ob);
            lib.set_initial_velocity(Frame::Laser, velocity_laser);
            lib.set_initial_velocity(Frame::DepthOptical, velocity_depth);
            lib.update_max_acceleration(speed_ms);
        }

        state.update_velocity(velocity_ob[0], velocity_ob[1], velocity_ob[2]);
        state.set_time_horizon(horizon_s);

        Ok(())
    }

    /// Depth camera callback, points are in the depth optical frame.
    ///
    /// Returns the outcome of the reaction, if one ran.
    pub fn on_depth_points(
        &self,
        cloud: &PointCloud,
    ) -> Result<Option<GateOutcome>, FlightCtrlError> {
        // The sensor sits at the origin of its own frame
        let index = KdTree::build(&cloud.points);
        let nearest_m = index.nearest(&Point3::origin()).map(|n| n.dist_m);
        let proximity_points = index
            .within_radius(&Point3::origin(), self.params.proximity_radius_m)
            .len();

        if proximity_points > 0 {
            debug!(
                "{} depth points within {} m",
                proximity_points, self.params.proximity_radius_m
            );
        }

        {
            let mut state = self.state.lock()?;
            state.nearest_obstacle_m = nearest_m;
            state.proximity_points = proximity_points;
            if let Some(eval) = state.collision_evaluator_mut() {
                eval.update_point_cloud(&cloud.points);
            }
        }

        if self.params.use_depth_image {
            self.react()
        } else {
            Ok(None)
        }
    }

    /// Laser scanner callback, points are in the laser frame.
    pub fn on_scan(&self, cloud: &PointCloud) -> Result<(), FlightCtrlError> {
        if let Some(eval) = self.state.lock()?.collision_evaluator_mut() {
            eval.update_laser_point_cloud(&cloud.points);
        }
        Ok(())
    }

    pub fn on_global_goal(&self, goal: &GoalStamped) -> Result<(), FlightCtrlError> {
        debug!("New global goal: {:?}", goal.position_m);
        self.set_goal(&goal.position_m)
    }

    pub fn on_local_goal(&self, goal: &GoalStamped) -> Result<(), FlightCtrlError> {
        trace!("New local goal: {:?}", goal.position_m);
        self.set_goal(&goal.position_m)
    }

    pub fn on_value_grid(&self, grid: &ValueGrid) -> Result<(), FlightCtrlError> {
        if !grid.is_consistent() {
            warn!(
                "Value grid has {} cells but is {}x{}, ignoring",
                grid.data.len(),
                grid.width,
                grid.height
            );
            return Ok(());
        }

        let mut state = self.state.lock()?;
        let goal_m = state.goal.world();

        if let Some(eval) = state.value_grid_evaluator_mut() {
            let start = Instant::now();
            eval.update_value_grid(grid);
            debug!("Value grid update took {} us", start.elapsed().as_micros());

            if let Some(g) = goal_m {
                debug!("Value at the goal: {:?}", eval.value_of_position(&g));
            }
        }

        Ok(())
    }

    /// Select a trajectory and, if enabled, update the commanded heading.
    ///
    /// Returns the outcome of the selection, `None` if no selector is attached.
    pub fn react(&self) -> Result<Option<GateOutcome>, FlightCtrlError> {
        let (outcome, prediction) = {
            let mut state = self.state.lock()?;

            let outcome = self.gate.run(&mut state);
            if let Some(o) = outcome {
                debug!(
                    "{:?} selection took {} us, index {:?}",
                    o.policy,
                    o.duration.as_micros(),
                    o.selection.map(|s| s.index)
                );
            }

            let prediction = if self.params.yaw_on {
                self.yaw_ctrl.begin(&mut state)
            } else {
                None
            };

            (outcome, prediction)
        };

        let pred = match prediction {
            Some(p) => p,
            None => return Ok(outcome),
        };

        match self
            .coord
            .transform_point(&pred.predicted_ob, Frame::OrthoBody, Frame::World)
        {
            Ok(predicted_world) => {
                let decision = self.yaw_ctrl.decide(&pred, &predicted_world);
                trace!("Yaw decision: {:?}", decision);

                let mut state = self.state.lock()?;
                if !self.yaw_ctrl.apply(&mut state, pred.epoch, decision) {
                    trace!("Selection changed during the yaw update, discarding");
                }
            }
            Err(e) => {
                warn!("{}, skipping the yaw update", e);
                self.state.lock()?.counters.transform_failures += 1;
            }
        }

        Ok(outcome)
    }

    /// Produce the attitude target for this control cycle.
    pub fn tick(&self) -> Result<AttitudeTarget, FlightCtrlError> {
        let (accel_mss, bearing_deg) = {
            let state = self.state.lock()?;
            (state.selection.accel_mss, state.bearing_deg)
        };

        let rpt = self.att_gen.lock()?.generate(&accel_mss);
        self.finish_tick(bearing_deg, &rpt)
    }

    /// Current status of the loop.
    pub fn status(&self) -> Result<StatusReport, FlightCtrlError> {
        let set_bearing_deg = self.att_sp.set_bearing()?;
        let state = self.state.lock()?;

        Ok(StatusReport {
            state: state.snapshot(),
            speed_ms: state.velocity_ms.norm(),
            set_bearing_deg,
            nearest_obstacle_m: state.nearest_obstacle_m,
            proximity_points: state.proximity_points,
            collision_probabilities: state.collision_probabilities,
            thrust: state.thrust,
            selector_attached: state.selector.is_some(),
            counters: state.counters,
        })
    }

    /// Consistent copy of the tracked state
    pub fn read_state(&self) -> Result<StateSnapshot, FlightCtrlError> {
        Ok(self.state.read_state()?)
    }

    fn finish_tick(
        &self,
        bearing_deg: f64,
        rpt: &RollPitchThrust,
    ) -> Result<AttitudeTarget, FlightCtrlError> {
        {
            let mut state = self.state.lock()?;
            state.thrust = rpt.thrust;
            if let Some(lib) = state.library_mut() {
                lib.set_thrust(rpt.thrust);
            }
        }

        Ok(self.att_sp.synthesize(bearing_deg, rpt)?)
    }

    fn set_goal(&self, position_m: &Vector3<f64>) -> Result<(), FlightCtrlError> {
        let goal_m = Point3::new(
            position_m[0],
            position_m[1],
            position_m[2] + self.params.goal_altitude_offset_m,
        );

        self.state.lock()?.goal.set_world_goal(goal_m);
        self.att_gen.lock()?.set_z_setpoint(goal_m[2]);

        self.reproject_goal()
    }

    /// Recompute the body frame goal. On failure the previous projection is kept.
    fn reproject_goal(&self) -> Result<(), FlightCtrlError> {
        let pending = self.state.lock()?.goal.pending_projection();

        let (world_m, epoch) = match pending {
            Some(p) => p,
            None => return Ok(()),
        };

        match project_to_body(&self.coord, &world_m) {
            Ok(body_m) => {
                if !self.state.lock()?.goal.apply_projection(epoch, body_m) {
                    trace!("Goal changed during projection, discarding");
                }
            }
            Err(e) => {
                warn!("{}, keeping the previous goal projection", e);
                self.state.lock()?.counters.transform_failures += 1;
            }
        }

        Ok(())
    }

    /// Express every trajectory's acceleration and the library's initial acceleration in the
    /// laser and depth optical frames.
    fn reproject_accelerations(&self) -> Result<(), FlightCtrlError> {
        let (accels_ob, initial_ob) = {
            let mut state = self.state.lock()?;
            match state.library_mut() {
                Some(lib) => (
                    (0..lib.len())
                        .map(|i| {
                            lib.trajectory(i)
                                .map(|t| t.acceleration(0.0))
                                .unwrap_or_else(Vector3::zeros)
                        })
                        .collect::<Vec<_>>(),
                    lib.initial_acceleration(),
                ),
                None => return Ok(()),
            }
        };

        let mut failures = 0;
        let to_laser = self.coord.rotation(Frame::OrthoBody, Frame::Laser);
        let to_depth = self.coord.rotation(Frame::OrthoBody, Frame::DepthOptical);

        for r in [&to_laser, &to_depth].iter() {
            if let Err(e) = r {
                warn!("{}, using zero accelerations", e);
                failures += 1;
            }
        }

        let rotate = |rot: &Result<UnitQuaternion<f64>, CoordError>, v: &Vector3<f64>| match rot {
            Ok(q) => q * v,
            Err(_) => Vector3::zeros(),
        };

        let mut state = self.state.lock()?;
        state.counters.transform_failures += failures;

        if let Some(lib) = state.library_mut() {
            lib.set_initial_acceleration(Frame::Laser, rotate(&to_laser, &initial_ob));
            lib.set_initial_acceleration(Frame::DepthOptical, rotate(&to_depth, &initial_ob));

            for (i, a) in accels_ob.iter().enumerate() {
                if let Some(t) = lib.trajectory_mut(i) {
                    t.set_acceleration_laser(rotate(&to_laser, a));
                    t.set_acceleration_depth_optical(rotate(&to_depth, a));
                }
            }
        }

        Ok(())
    }

    fn rotate_or_zero(
        &self,
        vector: &Vector3<f64>,
        source: Frame,
        target: Frame,
        failures: &mut u64,
    ) -> Vector3<f64> {
        match self.coord.transform_vector(vector, source, target) {
            Ok(v) => v,
            Err(e) => {
                warn!("{}, using a zero vector", e);
                *failures += 1;
                Vector3::zeros()
            }
        }
    }
}

impl From<StateError> for FlightCtrlError {
    fn from(e: StateError) -> Self {
        FlightCtrlError::StateError(e)
    }
}

impl From<AttSpError> for FlightCtrlError {
    fn from(e: AttSpError) -> Self {
        FlightCtrlError::AttSpError(e)
    }
}

impl<'a> From<PoisonError<MutexGuard<'a, AttitudeGenerator>>> for FlightCtrlError {
    fn from(_: PoisonError<MutexGuard<'a, AttitudeGenerator>>) -> Self {
        FlightCtrlError::AttGenPoisoned
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{MockSelector, MockShared};
    use crate::tf::{TfBuffer, TfParams};
    use crate::traj_sel::{Selection, SelectionPolicy};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn ctrl_with(params: Params) -> FlightCtrl {
        ctrl_with_timeout(params, Duration::from_millis(5))
    }

    fn ctrl_with_timeout(params: Params, lookup_timeout: Duration) -> FlightCtrl {
        let tf = Arc::new(TfBuffer::from_params(&TfParams::default()).unwrap());
        FlightCtrl::new(
            params,
            att_gen::Params::default(),
            yaw_ctrl::Params::default(),
            CoordPipeline::new(tf, lookup_timeout),
        )
    }

    fn ctrl() -> FlightCtrl {
        ctrl_with(Params::default())
    }

    fn attach(ctrl: &FlightCtrl) -> Arc<Mutex<MockShared>> {
        let (selector, shared) = MockSelector::new(NUM_TRAJECTORIES);
        ctrl.attach_selector(Box::new(selector)).unwrap();
        shared
    }

    fn level_pose(x: f64, y: f64, z: f64, yaw: f64) -> PoseStamped {
        PoseStamped::now(
            Vector3::new(x, y, z),
            UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
        )
    }

    #[test]
    fn test_attach_initialises_library() {
        let ctrl = ctrl();
        let shared = attach(&ctrl);

        let s = shared.lock().unwrap();
        let config = s.config.unwrap();
        assert_eq!(config.time_horizon_s, 1.0);
        assert_eq!(config.soft_top_speed_ms, 2.0);
        assert_eq!(config.a_max_horizontal_mss, 3.5);
        assert_eq!(config.min_speed_at_max_acceleration_total_ms, 10.0);
        assert_eq!(config.max_acceleration_total_mss, 4.0);
        assert_eq!(s.horizons, vec![1.0]);
    }

    #[test]
    fn test_goal_projection_follows_pose() {
        let ctrl = ctrl();

        ctrl.on_pose(&PoseStamped::now(
            Vector3::new(1.0, 2.0, 0.5),
            UnitQuaternion::from_euler_angles(0.1, -0.05, 0.7),
        ))
        .unwrap();
        ctrl.on_global_goal(&GoalStamped::now(Vector3::new(5.0, 0.0, 0.0)))
            .unwrap();

        ctrl.on_pose(&PoseStamped::now(
            Vector3::new(-3.0, 1.0, 2.0),
            UnitQuaternion::from_euler_angles(-0.2, 0.1, -2.5),
        ))
        .unwrap();

        let s = ctrl.read_state().unwrap();
        let goal_world = s.goal_world_m.unwrap();
        assert_eq!(goal_world, Point3::new(5.0, 0.0, 1.0));

        let direct = ctrl
            .coord
            .transform_point(&goal_world, Frame::World, Frame::OrthoBody)
            .unwrap();
        assert!((s.goal_body_m.unwrap() - direct).norm() < 1e-9);
        assert!((s.pose.yaw_rad + 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_goal_without_pose_keeps_previous_projection() {
        let ctrl = ctrl();
        ctrl.on_global_goal(&GoalStamped::now(Vector3::new(5.0, 0.0, 0.0)))
            .unwrap();

        let s = ctrl.status().unwrap();
        assert!(s.state.goal_world_m.is_some());
        assert!(s.state.goal_body_m.is_none());
        assert_eq!(s.counters.transform_failures, 1);
    }

    #[test]
    fn test_velocity_and_horizon() {
        let ctrl = ctrl();
        let shared = attach(&ctrl);

        ctrl.on_pose(&level_pose(0.0, 0.0, 1.0, std::f64::consts::FRAC_PI_2))
            .unwrap();

        // Vertical velocity is dropped, and world +y is ortho-body +x when facing +y
        ctrl.on_velocity(&TwistStamped::now(Vector3::new(0.0, 3.0, 1.0)))
            .unwrap();

        let s = ctrl.read_state().unwrap();
        assert!((s.velocity_ms - Vector3::new(3.0, 0.0, 0.0)).norm() < 1e-9);
        assert_eq!(s.time_horizon_s, 1.0);

        ctrl.on_velocity(&TwistStamped::now(Vector3::new(20.0, 0.0, 0.0)))
            .unwrap();
        assert_eq!(ctrl.read_state().unwrap().time_horizon_s, 1.0);

        let m = shared.lock().unwrap();
        assert!((m.initial_velocity[&Frame::OrthoBody][1] + 20.0).abs() < 1e-9);
        assert!(m.initial_velocity.contains_key(&Frame::Laser));
        assert!(m.initial_velocity.contains_key(&Frame::DepthOptical));
        assert_eq!(m.max_accel_speeds.len(), 2);
        assert!((m.max_accel_speeds[1] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_lower_horizon_floor() {
        let ctrl = ctrl_with(Params {
            min_time_horizon_s: 0.5,
            ..Params::default()
        });

        ctrl.on_pose(&level_pose(0.0, 0.0, 1.0, 0.0)).unwrap();
        ctrl.on_velocity(&TwistStamped::now(Vector3::new(20.0, 0.0, 0.0)))
            .unwrap();
        assert!((ctrl.read_state().unwrap().time_horizon_s - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_velocity_without_transforms() {
        let ctrl = ctrl();
        ctrl.on_velocity(&TwistStamped::now(Vector3::new(5.0, 5.0, 0.0)))
            .unwrap();

        let s = ctrl.status().unwrap();
        assert_eq!(s.state.velocity_ms, Vector3::zeros());
        assert_eq!(s.counters.transform_failures, 3);
    }

    #[test]
    fn test_pose_reprojects_accelerations() {
        let ctrl = ctrl();
        let shared = attach(&ctrl);
        shared.lock().unwrap().initial_accel = Vector3::new(1.0, 0.0, 0.0);

        ctrl.on_pose(&level_pose(0.0, 0.0, 1.0, 0.3)).unwrap();

        let m = shared.lock().unwrap();
        assert_eq!(m.roll_pitch, Some((0.0, 0.0)));

        // The default optical frame has z along ortho-body x
        let a = m.initial_accel_frames[&Frame::DepthOptical];
        assert!((a - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-9);

        // Trajectory 10 accelerates at (0, 1, 0): left, which is optical -x
        let a = m.traj_accels[&(10, Frame::DepthOptical)];
        assert!((a - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-9);
        assert_eq!(m.traj_accels.len(), 2 * NUM_TRAJECTORIES);
    }

    #[test]
    fn test_depth_points_trigger_selection() {
        let ctrl = ctrl();
        let shared = attach(&ctrl);
        shared.lock().unwrap().next_selection = Some(Selection {
            index: 12,
            accel_mss: Vector3::new(1.0, 0.0, 0.0),
        });

        ctrl.on_pose(&level_pose(0.0, 0.0, 0.2, 0.0)).unwrap();

        let cloud = PointCloud::now(vec![
            Point3::new(0.0, 0.0, 4.0),
            Point3::new(std::f64::NAN, 0.0, 1.0),
            Point3::new(0.0, 3.0, 0.0),
        ]);
        let outcome = ctrl.on_depth_points(&cloud).unwrap().unwrap();
        assert_eq!(outcome.policy, SelectionPolicy::Takeoff);

        let s = ctrl.status().unwrap();
        assert_eq!(s.state.selection.index, 12);
        assert_eq!(s.nearest_obstacle_m, Some(3.0));
        assert_eq!(s.collision_probabilities[0], 0.5);

        let m = shared.lock().unwrap();
        assert_eq!(m.depth_clouds, vec![3]);
        assert_eq!(m.takeoff_calls, 1);

        // No goal yet: hold position
        assert_eq!(m.last_goal, Some(Vector3::zeros()));
    }

    #[test]
    fn test_depth_points_proximity() {
        let ctrl = ctrl_with(Params {
            proximity_radius_m: 2.5,
            ..Params::default()
        });

        let cloud = PointCloud::now(vec![
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(0.0, 1.0, 1.0),
            Point3::new(0.0, 0.0, 2.6),
            Point3::new(std::f64::NAN, 0.0, 0.1),
        ]);
        assert!(ctrl.on_depth_points(&cloud).unwrap().is_none());

        let s = ctrl.status().unwrap();
        assert_eq!(s.proximity_points, 2);
        assert!((s.nearest_obstacle_m.unwrap() - 2.0f64.sqrt()).abs() < 1e-12);

        // An empty cloud clears both
        ctrl.on_depth_points(&PointCloud::now(vec![])).unwrap();
        let s = ctrl.status().unwrap();
        assert_eq!(s.proximity_points, 0);
        assert!(s.nearest_obstacle_m.is_none());
    }

    #[test]
    fn test_depth_points_without_depth_image() {
        let ctrl = ctrl_with(Params {
            use_depth_image: false,
            ..Params::default()
        });
        let shared = attach(&ctrl);

        assert!(ctrl
            .on_depth_points(&PointCloud::now(vec![Point3::new(1.0, 0.0, 0.0)]))
            .unwrap()
            .is_none());

        let m = shared.lock().unwrap();
        assert_eq!(m.depth_clouds, vec![1]);
        assert_eq!(m.takeoff_calls + m.best_calls, 0);
    }

    #[test]
    fn test_scan_and_value_grid() {
        let ctrl = ctrl();
        let shared = attach(&ctrl);

        ctrl.handle(&SensorMsg::Scan(PointCloud::now(vec![Point3::origin(); 4])))
            .unwrap();

        let mut grid = ValueGrid {
            timestamp: chrono::Utc::now(),
            resolution_m: 0.5,
            width: 2,
            height: 2,
            origin_m: nalgebra::Vector2::zeros(),
            data: vec![0, 1, 2, 3],
        };
        ctrl.on_value_grid(&grid).unwrap();

        grid.data.pop();
        ctrl.on_value_grid(&grid).unwrap();

        let m = shared.lock().unwrap();
        assert_eq!(m.laser_clouds, vec![4]);
        assert_eq!(m.grids, 1);
    }

    #[test]
    fn test_yaw_control() {
        let ctrl = ctrl_with(Params {
            yaw_on: true,
            ..Params::default()
        });
        let shared = attach(&ctrl);

        // Trajectory 4 goes straight ahead, the vehicle faces world +x
        shared.lock().unwrap().next_selection = Some(Selection {
            index: 4,
            accel_mss: Vector3::zeros(),
        });
        ctrl.on_pose(&level_pose(0.0, 0.0, 2.0, 0.0)).unwrap();
        ctrl.on_global_goal(&GoalStamped::now(Vector3::new(20.0, 0.0, 1.0)))
            .unwrap();

        let outcome = ctrl.react().unwrap().unwrap();
        assert_eq!(outcome.policy, SelectionPolicy::Cruise);

        // Trajectory 4 drifts slightly left (world +y), a small negative bearing
        let s = ctrl.read_state().unwrap();
        assert!(s.bearing_deg < 0.0 && s.bearing_deg > -5.0);
        assert_eq!(s.soft_top_speed_ms, 2.0);
    }

    #[test]
    fn test_yaw_off_leaves_bearing() {
        let ctrl = ctrl();
        let shared = attach(&ctrl);
        shared.lock().unwrap().next_selection = Some(Selection {
            index: 4,
            accel_mss: Vector3::zeros(),
        });
        ctrl.on_pose(&level_pose(0.0, 0.0, 2.0, 1.0)).unwrap();
        ctrl.react().unwrap();

        assert_eq!(ctrl.read_state().unwrap().bearing_deg, 0.0);
    }

    #[test]
    fn test_tick() {
        let ctrl = ctrl();

        // Ticks run before any selector or sensor data
        let target = ctrl.tick().unwrap();
        assert!(target.ignores_rates());
        assert!(target.thrust > 0.0 && target.thrust <= 1.0);

        let shared = attach(&ctrl);
        ctrl.tick().unwrap();
        assert_eq!(shared.lock().unwrap().thrusts.len(), 1);

        let s = ctrl.status().unwrap();
        assert_eq!(s.thrust, shared.lock().unwrap().thrusts[0]);
        assert!(s.selector_attached);
    }

    #[test]
    fn test_tick_slews_heading() {
        let ctrl = ctrl();
        ctrl.state.lock().unwrap().bearing_deg = 10.0;

        for i in 1..=5 {
            ctrl.tick().unwrap();
            assert_eq!(ctrl.status().unwrap().set_bearing_deg, i as f64);
        }
    }

    #[test]
    fn test_tick_not_blocked_by_lookup() {
        let lookup_timeout = Duration::from_millis(500);
        let ctrl = Arc::new(ctrl_with_timeout(Params::default(), lookup_timeout));
        let velocity_done = Arc::new(AtomicBool::new(false));

        // No transforms are published, every lookup of on_velocity waits for the full timeout
        let jh = {
            let ctrl = ctrl.clone();
            let velocity_done = velocity_done.clone();
            thread::spawn(move || {
                ctrl.on_velocity(&TwistStamped::now(Vector3::new(1.0, 0.0, 0.0)))
                    .unwrap();
                velocity_done.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        ctrl.tick().unwrap();
        ctrl.status().unwrap();
        let latency = start.elapsed();

        assert!(!velocity_done.load(Ordering::SeqCst), "lookup should still be waiting");
        assert!(
            latency < Duration::from_millis(50),
            "tick took {:?} while a lookup was waiting",
            latency
        );

        jh.join().unwrap();
        assert_eq!(ctrl.status().unwrap().counters.transform_failures, 3);
    }

    #[test]
    fn test_poisoned_locks() {
        let ctrl = Arc::new(ctrl());

        let c = ctrl.clone();
        let poisoner = thread::spawn(move || {
            let _gen = c.att_gen.lock().unwrap();
            panic!("poison the attitude generator");
        });
        assert!(poisoner.join().is_err());

        assert!(matches!(ctrl.tick(), Err(FlightCtrlError::AttGenPoisoned)));
        assert!(ctrl.read_state().is_ok());

        let c = ctrl.clone();
        let poisoner = thread::spawn(move || {
            let _state = c.state.lock().unwrap();
            panic!("poison the shared state");
        });
        assert!(poisoner.join().is_err());

        assert!(matches!(
            ctrl.read_state(),
            Err(FlightCtrlError::StateError(StateError::PoisonError))
        ));
    }

    #[test]
    fn test_absent_selector() {
        let ctrl = ctrl();
        ctrl.on_pose(&level_pose(0.0, 0.0, 1.0, 0.0)).unwrap();
        assert!(ctrl.react().unwrap().is_none());
        ctrl.on_scan(&PointCloud::now(vec![])).unwrap();

        let s = ctrl.status().unwrap();
        assert!(!s.selector_attached);
        assert!(s.counters.absent_collaborator > 0);
    }

    #[test]
    fn test_status_serialises() {
        let ctrl = ctrl();
        let json = serde_json::to_string(&ctrl.status().unwrap()).unwrap();
        assert!(json.contains("\"time_horizon_s\":1.0"));
        assert!(json.contains("\"held_selections\":0"));
    }
}
