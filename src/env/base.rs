//! Shared machinery of the traffic environments
//!
//! [`TrafficCore`] owns one scenario and one simulator backend. It places
//! vehicles on reset, runs the human-driver controllers, forwards the agent's
//! accelerations, and counts steps against the horizon.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::flow_params::FlowParams;
use crate::params::{EnvParams, SimParams};
use crate::scenario::Scenario;
use crate::sim::{headway, leaders, Simulator, VehicleState};
use crate::vehicles::AccelerationController;

/// Scenario, simulator backend and step bookkeeping for one environment
pub struct TrafficCore {
    scenario: Scenario,
    simulator: Box<dyn Simulator>,
    sim_params: SimParams,
    env_params: EnvParams,
    rng: StdRng,
    rl_ids: Vec<String>,
    step_count: usize,
}

impl TrafficCore {
    /// Build the scenario from `params` and load it into `simulator`
    pub fn new(params: &FlowParams, mut simulator: Box<dyn Simulator>) -> Result<Self> {
        let scenario = Scenario::from_params(params)?;
        simulator.load(&scenario, &params.sim)?;

        let rng = match params.sim.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let rl_ids = scenario
            .vehicles()
            .iter()
            .filter(|class| class.is_rl())
            .flat_map(|class| class.instance_ids())
            .collect();

        Ok(Self {
            scenario,
            simulator,
            sim_params: params.sim.clone(),
            env_params: params.env.clone(),
            rng,
            rl_ids,
            step_count: 0,
        })
    }

    /// Place all vehicles and run the warmup steps
    pub fn reset(&mut self) -> Result<()> {
        let placements = self.scenario.initial_placements(&mut self.rng);
        self.simulator.reset(&placements)?;
        self.step_count = 0;
        for _ in 0..self.env_params.warmup_steps {
            self.apply_human_controllers()?;
            self.simulator.step()?;
        }
        Ok(())
    }

    /// Apply the agent's accelerations and advance one environment step
    ///
    /// `rl_accels` is matched to the RL vehicles in placement order; missing
    /// entries leave a vehicle uncommanded.
    pub fn advance(&mut self, rl_accels: &[f64]) -> Result<()> {
        for _ in 0..self.env_params.sims_per_step {
            self.apply_human_controllers()?;
            for (id, &accel) in self.rl_ids.iter().zip(rl_accels) {
                self.simulator.apply_acceleration(id, accel)?;
            }
            self.simulator.step()?;
            if self.simulator.collided() {
                break;
            }
        }
        self.step_count += 1;
        Ok(())
    }

    fn apply_human_controllers(&mut self) -> Result<()> {
        let vehicles = self.simulator.vehicles();
        let length = self.simulator.length();
        let ahead = leaders(vehicles);

        let mut commands = Vec::new();
        for (i, state) in vehicles.iter().enumerate() {
            let Some(class) = self.scenario.vehicles().class(state.class_index) else {
                continue;
            };
            if let AccelerationController::Idm(options) = &class.acceleration_controller {
                let leader = ahead[i].map(|lead| (headway(vehicles, i, lead, length), vehicles[lead].speed));
                let mut accel = options.acceleration(state.speed, leader);
                if options.noise > 0.0 {
                    accel += self.rng.gen_range(-options.noise..options.noise);
                }
                commands.push((state.id.clone(), accel));
            }
        }

        for (id, accel) in commands {
            self.simulator.apply_acceleration(&id, accel)?;
        }
        Ok(())
    }

    /// Vehicles in insertion order
    pub fn vehicles(&self) -> &[VehicleState] {
        self.simulator.vehicles()
    }

    /// Indices (into [`TrafficCore::vehicles`]) of the RL vehicles
    pub fn rl_indices(&self) -> Vec<usize> {
        self.vehicles()
            .iter()
            .enumerate()
            .filter(|(_, v)| self.rl_ids.contains(&v.id))
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of RL vehicles
    pub fn num_rl(&self) -> usize {
        self.rl_ids.len()
    }

    /// Scenario this core was built from
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Environment parameters
    pub fn env_params(&self) -> &EnvParams {
        &self.env_params
    }

    /// Simulator parameters
    pub fn sim_params(&self) -> &SimParams {
        &self.sim_params
    }

    /// Loop length (m)
    pub fn length(&self) -> f64 {
        self.simulator.length()
    }

    /// Speed used to normalize observations (m/s)
    pub fn max_speed(&self) -> f64 {
        self.scenario.speed_limit()
    }

    /// Whether a collision happened this episode
    pub fn collided(&self) -> bool {
        self.simulator.collided()
    }

    /// Environment steps since the last reset
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Whether the horizon has been reached
    pub fn horizon_reached(&self) -> bool {
        self.step_count >= self.env_params.horizon
    }

    /// Mean speed of all vehicles (m/s)
    pub fn mean_speed(&self) -> f64 {
        let vehicles = self.vehicles();
        if vehicles.is_empty() {
            return 0.0;
        }
        vehicles.iter().map(|v| v.speed).sum::<f64>() / vehicles.len() as f64
    }

    /// Reward for driving every vehicle close to `target_velocity`
    ///
    /// The reward is the distance from the worst case (all stopped) to the
    /// current speed profile, normalized to [0, 1]; a collision scores zero.
    pub fn desired_velocity_reward(&self, target_velocity: f64) -> f64 {
        let vehicles = self.vehicles();
        if self.collided() || vehicles.is_empty() || target_velocity <= 0.0 {
            return 0.0;
        }
        let max_cost = (vehicles.len() as f64 * target_velocity.powi(2)).sqrt();
        let cost = vehicles
            .iter()
            .map(|v| (v.speed - target_velocity).powi(2))
            .sum::<f64>()
            .sqrt();
        ((max_cost - cost).max(0.0)) / max_cost
    }
}

impl Drop for TrafficCore {
    fn drop(&mut self) {
        self.simulator.close();
    }
}
