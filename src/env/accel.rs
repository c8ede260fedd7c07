//! Fully observed acceleration environment
//!
//! The agent commands one acceleration per RL vehicle and observes the
//! normalized speed and position of every vehicle. The reward pushes all
//! vehicles toward `target_velocity`; a collision ends the episode.

use super::base::TrafficCore;
use super::{Environment, SpaceInfo, SpaceType, StepInfo, StepResult};
use crate::error::Result;
use crate::flow_params::FlowParams;
use crate::sim::Simulator;

/// Tunables `AccelEnv` reads from `EnvParams::additional_params`
pub const REQUIRED_PARAMS: &[&str] = &["max_accel", "max_decel", "target_velocity"];

/// Acceleration control on a loop
pub struct AccelEnv {
    core: TrafficCore,
    max_accel: f64,
    max_decel: f64,
    target_velocity: f64,
}

impl AccelEnv {
    /// Create the environment and load its scenario into `simulator`
    pub fn new(params: &FlowParams, simulator: Box<dyn Simulator>) -> Result<Self> {
        let extra = &params.env.additional_params;
        let max_accel = extra.require_non_negative("env", "max_accel")?;
        let max_decel = extra.require_non_negative("env", "max_decel")?;
        let target_velocity = extra.require("env", "target_velocity")?;

        Ok(Self { core: TrafficCore::new(params, simulator)?, max_accel, max_decel, target_velocity })
    }

    fn observation(&self) -> Vec<f32> {
        let max_speed = self.core.max_speed();
        let length = self.core.length();
        let vehicles = self.core.vehicles();
        vehicles
            .iter()
            .map(|v| (v.speed / max_speed) as f32)
            .chain(vehicles.iter().map(|v| (v.position / length) as f32))
            .collect()
    }
}

impl Environment for AccelEnv {
    type Observation = Vec<f32>;
    type Action = Vec<f32>;

    fn reset(&mut self) -> Result<Self::Observation> {
        self.core.reset()?;
        Ok(self.observation())
    }

    fn step(&mut self, action: Self::Action) -> Result<StepResult<Self::Observation>> {
        let accels: Vec<f64> = action
            .iter()
            .map(|&a| (a as f64).clamp(-self.max_decel, self.max_accel))
            .collect();
        self.core.advance(&accels)?;

        let collided = self.core.collided();
        Ok(StepResult {
            observation: self.observation(),
            reward: self.core.desired_velocity_reward(self.target_velocity) as f32,
            terminated: collided,
            truncated: self.core.horizon_reached(),
            info: StepInfo { collided, mean_speed: self.core.mean_speed() },
        })
    }

    fn observation_space(&self) -> SpaceInfo {
        let n = self.core.scenario().vehicles().num_vehicles();
        SpaceInfo { shape: vec![2 * n], dtype: SpaceType::Continuous { low: 0.0, high: 1.0 } }
    }

    fn action_space(&self) -> SpaceInfo {
        SpaceInfo {
            shape: vec![self.core.num_rl()],
            dtype: SpaceType::Continuous {
                low: -self.max_decel as f32,
                high: self.max_accel as f32,
            },
        }
    }

    fn step_count(&self) -> usize {
        self.core.step_count()
    }
}
