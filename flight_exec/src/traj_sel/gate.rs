//! Trajectory selection gate

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use std::time::{Duration, Instant};

use super::{Selection, SelectionPolicy};
use crate::state::LoopState;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Runs exactly one selection per invocation, with the policy chosen from the altitude.
///
/// The gate operates on a `LoopState` that the caller has already locked, which makes the
/// selection single-flight.
#[derive(Debug, Clone, Copy)]
pub struct SelectionGate {
    /// Units: meters
    takeoff_altitude_m: f64,

    /// Soft top speed to restore while taking off, if any
    takeoff_soft_top_speed_ms: Option<f64>,
}

/// Result of one pass through the gate.
#[derive(Debug, Clone, Copy)]
pub struct GateOutcome {
    pub policy: SelectionPolicy,

    /// `None` if the selector could not choose and the previous selection was held
    pub selection: Option<Selection>,

    /// Time spent inside the selector
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SelectionGate {
    pub fn new(takeoff_altitude_m: f64, takeoff_soft_top_speed_ms: Option<f64>) -> Self {
        Self {
            takeoff_altitude_m,
            takeoff_soft_top_speed_ms,
        }
    }

    pub fn policy_for(&self, z_m: f64) -> SelectionPolicy {
        SelectionPolicy::for_altitude(z_m, self.takeoff_altitude_m)
    }

    /// Select a trajectory towards the current body frame goal.
    ///
    /// Returns `None` without touching the selection if there is no selector.
    pub fn run(&self, state: &mut LoopState) -> Option<GateOutcome> {
        if state.selector.is_none() {
            state.counters.absent_collaborator += 1;
            return None;
        }

        let policy = self.policy_for(state.pose.position_m[2]);
        let goal_ob = state.goal.body_or_zero();

        if policy == SelectionPolicy::Takeoff {
            if let Some(speed) = self.takeoff_soft_top_speed_ms {
                state.set_soft_top_speed(speed);
            }
        }

        let selector = state.selector.as_mut()?;

        let start = Instant::now();
        let selection = match policy {
            SelectionPolicy::Takeoff => selector.select_takeoff(&goal_ob),
            SelectionPolicy::Cruise => selector.select_best(&goal_ob),
        };
        let duration = start.elapsed();

        state.collision_probabilities = selector.collision_probabilities();
        state.selection.policy = Some(policy);

        match selection {
            Some(s) => {
                state.selection.index = s.index;
                state.selection.accel_mss = s.accel_mss;
                state.selection.epoch = state.selection.epoch.wrapping_add(1);
                state.counters.selections += 1;
            }
            None => {
                trace!("Selector returned no trajectory, holding index {}", state.selection.index);
                state.counters.held_selections += 1;
            }
        }

        Some(GateOutcome {
            policy,
            selection,
            duration,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{MockSelector, MockShared};
    use nalgebra::{Point3, Vector3};

    fn state_with_selector() -> (LoopState, std::sync::Arc<std::sync::Mutex<MockShared>>) {
        let (selector, shared) = MockSelector::new(25);
        let mut state = LoopState::new(1.0, 2.0);
        state.selector = Some(Box::new(selector));
        (state, shared)
    }

    #[test]
    fn test_policy_by_altitude() {
        let gate = SelectionGate::new(0.35, None);
        let (mut state, shared) = state_with_selector();

        state.update_pose(0.0, 0.0, 0.35, 0.0);
        assert_eq!(gate.run(&mut state).unwrap().policy, SelectionPolicy::Takeoff);

        state.update_pose(0.0, 0.0, 0.36, 0.0);
        assert_eq!(gate.run(&mut state).unwrap().policy, SelectionPolicy::Cruise);

        let s = shared.lock().unwrap();
        assert_eq!(s.takeoff_calls, 1);
        assert_eq!(s.best_calls, 1);
    }

    #[test]
    fn test_selection_and_hold() {
        let gate = SelectionGate::new(0.35, None);
        let (mut state, shared) = state_with_selector();
        state.update_pose(0.0, 0.0, 2.0, 0.0);

        let epoch = state.goal.set_world_goal(Point3::new(5.0, 0.0, 2.0));
        state.goal.apply_projection(epoch, Point3::new(5.0, 0.0, 0.0));

        shared.lock().unwrap().next_selection = Some(Selection {
            index: 7,
            accel_mss: Vector3::new(1.0, 0.0, 0.0),
        });
        gate.run(&mut state).unwrap();
        assert_eq!(state.selection.index, 7);
        assert_eq!(state.selection.epoch, 1);
        assert_eq!(
            shared.lock().unwrap().last_goal,
            Some(Vector3::new(5.0, 0.0, 0.0))
        );

        // Selector fails, previous index and acceleration are kept
        shared.lock().unwrap().next_selection = None;
        let out = gate.run(&mut state).unwrap();
        assert!(out.selection.is_none());
        assert_eq!(state.selection.index, 7);
        assert_eq!(state.selection.accel_mss, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(state.selection.epoch, 1);
        assert_eq!(state.counters.held_selections, 1);
    }

    #[test]
    fn test_takeoff_restores_soft_top_speed() {
        let gate = SelectionGate::new(0.35, Some(2.0));
        let (mut state, shared) = state_with_selector();

        state.set_soft_top_speed(0.1);
        state.update_pose(0.0, 0.0, 0.1, 0.0);
        gate.run(&mut state);
        assert_eq!(state.soft_top_speed_ms, 2.0);
        assert_eq!(shared.lock().unwrap().soft_top_speeds, vec![0.1, 2.0]);
    }

    #[test]
    fn test_no_selector() {
        let gate = SelectionGate::new(0.35, None);
        let mut state = LoopState::new(1.0, 2.0);
        assert!(gate.run(&mut state).is_none());
        assert_eq!(state.counters.absent_collaborator, 1);
    }
}
