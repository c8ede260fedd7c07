//! Kinematic single-loop backend
//!
//! Point-mass vehicles on one closed lane with forward-Euler updates. It
//! honors per-class acceleration and speed limits and the speed-safety tag:
//! every mode except `aggressive` caps speed so a vehicle can never reach the
//! rear bumper of its leader within one step. Vehicles whose class delegates
//! car following to the simulator use an IDM built from their car-following
//! parameters; all others keep their speed unless commanded.

use std::collections::HashMap;

use super::{headway, leaders, Simulator, VehicleState};
use crate::error::SimulatorError;
use crate::params::SimParams;
use crate::scenario::{Placement, Scenario};
use crate::vehicles::{AccelerationController, IdmOptions, VehicleClass};

/// Speed mode that disables the collision-avoiding speed cap
pub const AGGRESSIVE_SPEED_MODE: &str = "aggressive";

const COLLISION_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
struct ClassLimits {
    accel: f64,
    decel: f64,
    max_speed: f64,
    safe: bool,
    /// Car-following model used when the class delegates to the simulator
    default_model: Option<IdmOptions>,
}

impl ClassLimits {
    fn new(class: &VehicleClass, speed_limit: f64) -> Self {
        let cf = &class.car_following_params;
        let max_speed = cf.max_speed.min(speed_limit * cf.speed_factor);
        let default_model = match class.acceleration_controller {
            AccelerationController::SimulatorDefault => Some(IdmOptions {
                v0: max_speed,
                t: cf.tau,
                a: cf.accel,
                s0: cf.min_gap,
                ..IdmOptions::default()
            }),
            _ => None,
        };
        Self {
            accel: cf.accel,
            decel: cf.decel,
            max_speed,
            safe: class.speed_mode.as_str() != AGGRESSIVE_SPEED_MODE,
            default_model,
        }
    }
}

/// In-process kinematic simulator
#[derive(Debug, Default)]
pub struct KinematicSimulator {
    dt: f64,
    length: f64,
    limits: Vec<ClassLimits>,
    vehicles: Vec<VehicleState>,
    index: HashMap<String, usize>,
    commands: Vec<Option<f64>>,
    collided: bool,
    loaded: bool,
    steps: u64,
}

impl KinematicSimulator {
    /// Create an unloaded backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps taken since the scenario was loaded
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl Simulator for KinematicSimulator {
    fn load(&mut self, scenario: &Scenario, params: &SimParams) -> Result<(), SimulatorError> {
        self.dt = params.sim_step;
        self.length = scenario.length();
        self.limits = scenario
            .vehicles()
            .iter()
            .map(|class| ClassLimits::new(class, scenario.speed_limit()))
            .collect();
        self.vehicles.clear();
        self.index.clear();
        self.commands.clear();
        self.collided = false;
        self.loaded = true;
        self.steps = 0;
        tracing::debug!(
            scenario = scenario.name(),
            length = self.length,
            dt = self.dt,
            "kinematic backend loaded"
        );
        Ok(())
    }

    fn reset(&mut self, placements: &[Placement]) -> Result<(), SimulatorError> {
        if !self.loaded {
            return Err(SimulatorError::NotLoaded);
        }
        self.vehicles = placements
            .iter()
            .map(|p| VehicleState {
                id: p.id.clone(),
                class_index: p.class_index,
                position: p.position,
                speed: p.speed,
            })
            .collect();
        if let Some(bad) = self.vehicles.iter().find(|v| v.class_index >= self.limits.len()) {
            return Err(SimulatorError::UnknownVehicle(bad.id.clone()));
        }
        self.index = self.vehicles.iter().enumerate().map(|(i, v)| (v.id.clone(), i)).collect();
        self.commands = vec![None; self.vehicles.len()];
        self.collided = false;
        Ok(())
    }

    fn apply_acceleration(&mut self, id: &str, accel: f64) -> Result<(), SimulatorError> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| SimulatorError::UnknownVehicle(id.to_string()))?;
        self.commands[idx] = Some(accel);
        Ok(())
    }

    fn step(&mut self) -> Result<(), SimulatorError> {
        if !self.loaded {
            return Err(SimulatorError::NotLoaded);
        }
        let dt = self.dt;
        let ahead = leaders(&self.vehicles);

        let mut new_speeds: Vec<f64> = self
            .vehicles
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let limits = &self.limits[v.class_index];
                let commanded = self.commands[i].or_else(|| {
                    limits.default_model.as_ref().map(|model| {
                        let leader = ahead[i].map(|lead| {
                            (headway(&self.vehicles, i, lead, self.length), self.vehicles[lead].speed)
                        });
                        model.acceleration(v.speed, leader)
                    })
                });
                let accel = commanded.unwrap_or(0.0).clamp(-limits.decel, limits.accel);
                (v.speed + accel * dt).clamp(0.0, limits.max_speed)
            })
            .collect();

        // Cap safe vehicles against their leader's new speed. Caps only lower
        // speeds, so this reaches a fixed point.
        for _ in 0..self.vehicles.len() {
            let mut changed = false;
            for (i, lead) in ahead.iter().enumerate() {
                let Some(lead) = *lead else { continue };
                if !self.limits[self.vehicles[i].class_index].safe {
                    continue;
                }
                let gap = headway(&self.vehicles, i, lead, self.length);
                let cap = ((gap + new_speeds[lead] * dt) / dt).max(0.0);
                if new_speeds[i] > cap {
                    new_speeds[i] = cap;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        for (vehicle, speed) in self.vehicles.iter_mut().zip(new_speeds) {
            vehicle.speed = speed;
            vehicle.position = (vehicle.position + speed * dt).rem_euclid(self.length);
        }
        self.commands.iter_mut().for_each(|c| *c = None);
        self.steps += 1;

        let ahead = leaders(&self.vehicles);
        for (i, lead) in ahead.iter().enumerate() {
            if let Some(lead) = *lead {
                if headway(&self.vehicles, i, lead, self.length) < -COLLISION_TOLERANCE {
                    if !self.collided {
                        tracing::warn!(
                            follower = %self.vehicles[i].id,
                            leader = %self.vehicles[lead].id,
                            "collision in kinematic backend"
                        );
                    }
                    self.collided = true;
                }
            }
        }
        Ok(())
    }

    fn vehicles(&self) -> &[VehicleState] {
        &self.vehicles
    }

    fn collided(&self) -> bool {
        self.collided
    }

    fn length(&self) -> f64 {
        self.length
    }

    fn close(&mut self) {
        self.loaded = false;
        self.vehicles.clear();
        self.index.clear();
        self.commands.clear();
    }
}
