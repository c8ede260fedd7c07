//! Simulator adapter boundary
//!
//! Environments talk to the traffic simulator only through [`Simulator`].
//! The crate ships [`kinematic::KinematicSimulator`], a single-loop point-mass
//! backend for dry runs and tests; an external micro-simulator plugs in by
//! implementing the same trait and handing a [`SimulatorFactory`] to the
//! registry.

pub mod kinematic;

use std::sync::Arc;

pub use kinematic::KinematicSimulator;

use crate::error::SimulatorError;
use crate::params::SimParams;
use crate::scenario::{Placement, Scenario, VEHICLE_LENGTH};

/// Observable state of one vehicle
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleState {
    /// Instance id
    pub id: String,
    /// Index of the vehicle class in the population
    pub class_index: usize,
    /// Front-bumper position along the loop (m)
    pub position: f64,
    /// Speed (m/s)
    pub speed: f64,
}

/// Simulator backend
///
/// One backend instance serves exactly one environment instance.
pub trait Simulator: Send {
    /// Build the network and vehicle types for a scenario
    fn load(&mut self, scenario: &Scenario, params: &SimParams) -> Result<(), SimulatorError>;

    /// Remove all vehicles and insert them at the given placements
    fn reset(&mut self, placements: &[Placement]) -> Result<(), SimulatorError>;

    /// Command an acceleration for the next step
    fn apply_acceleration(&mut self, id: &str, accel: f64) -> Result<(), SimulatorError>;

    /// Advance by one simulation step
    fn step(&mut self) -> Result<(), SimulatorError>;

    /// Vehicles in insertion order
    fn vehicles(&self) -> &[VehicleState];

    /// Whether any collision happened since the last reset
    fn collided(&self) -> bool;

    /// Length of the loop vehicles circulate on (m)
    fn length(&self) -> f64;

    /// Release backend resources
    fn close(&mut self) {}
}

/// Builds one fresh backend per environment instance
pub type SimulatorFactory = Arc<dyn Fn() -> Box<dyn Simulator> + Send + Sync>;

/// Factory for the built-in kinematic backend
pub fn kinematic_factory() -> SimulatorFactory {
    Arc::new(|| Box::new(KinematicSimulator::new()) as Box<dyn Simulator>)
}

/// Vehicle indices sorted by position along the loop
pub fn ring_order(vehicles: &[VehicleState]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..vehicles.len()).collect();
    order.sort_by(|&a, &b| vehicles[a].position.total_cmp(&vehicles[b].position));
    order
}

/// For every vehicle, the index of the vehicle directly ahead
///
/// A lone vehicle has no leader.
pub fn leaders(vehicles: &[VehicleState]) -> Vec<Option<usize>> {
    let order = ring_order(vehicles);
    let mut result = vec![None; vehicles.len()];
    if order.len() < 2 {
        return result;
    }
    for (rank, &idx) in order.iter().enumerate() {
        result[idx] = Some(order[(rank + 1) % order.len()]);
    }
    result
}

/// Bumper-to-bumper gap from `follower` to `leader` (m)
pub fn headway(vehicles: &[VehicleState], follower: usize, leader: usize, length: f64) -> f64 {
    (vehicles[leader].position - vehicles[follower].position).rem_euclid(length) - VEHICLE_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: &str, position: f64) -> VehicleState {
        VehicleState { id: id.to_string(), class_index: 0, position, speed: 0.0 }
    }

    #[test]
    fn test_leaders_wrap_around() {
        let vehicles = vec![state("a", 90.0), state("b", 10.0), state("c", 50.0)];
        let leaders = leaders(&vehicles);
        assert_eq!(leaders, vec![Some(1), Some(2), Some(0)]);

        // a at 90 follows b at 10 across the seam
        assert!((headway(&vehicles, 0, 1, 100.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_lone_vehicle_has_no_leader() {
        assert_eq!(leaders(&[state("a", 0.0)]), vec![None]);
    }
}
