//! Partially observed merge environment
//!
//! Each RL vehicle sees its own speed, the gap to and speed of the
//! `n_preceding` vehicles ahead and the `n_following` vehicles behind, and the
//! distance to and speed of the `n_merging_in` nearest merging vehicles ahead.
//! The merging stream is every vehicle class added after the last RL class;
//! the generator places classes in insertion order, so those start on the
//! merge loop. Empty slots are padded with zeros.

use super::base::TrafficCore;
use super::{Environment, SpaceInfo, SpaceType, StepInfo, StepResult};
use crate::error::{ConfigError, Result};
use crate::flow_params::FlowParams;
use crate::sim::{headway, leaders, Simulator};

/// Tunables `MergePoEnv` reads from `EnvParams::additional_params`
pub const REQUIRED_PARAMS: &[&str] = &[
    "max_accel",
    "max_decel",
    "target_velocity",
    "n_preceding",
    "n_following",
    "n_merging_in",
];

/// Checks beyond required keys: counts must be integers and there must be
/// an agent to observe from
pub(crate) fn validate(params: &FlowParams) -> std::result::Result<(), ConfigError> {
    let extra = &params.env.additional_params;
    for key in ["n_preceding", "n_following", "n_merging_in"] {
        extra.require_count("env", key)?;
    }
    if params.veh.num_rl_vehicles() == 0 {
        return Err(ConfigError::invalid("veh", "TwoLoopsMergePOEnv needs at least one RL vehicle"));
    }
    Ok(())
}

/// Merge control with local observations
pub struct MergePoEnv {
    core: TrafficCore,
    max_accel: f64,
    max_decel: f64,
    target_velocity: f64,
    n_preceding: usize,
    n_following: usize,
    n_merging_in: usize,
    first_merge_class: usize,
}

impl MergePoEnv {
    /// Create the environment and load its scenario into `simulator`
    pub fn new(params: &FlowParams, simulator: Box<dyn Simulator>) -> Result<Self> {
        validate(params)?;
        let extra = &params.env.additional_params;

        let first_merge_class = params
            .veh
            .iter()
            .enumerate()
            .filter(|(_, class)| class.is_rl())
            .map(|(idx, _)| idx + 1)
            .last()
            .unwrap_or(0);

        Ok(Self {
            core: TrafficCore::new(params, simulator)?,
            max_accel: extra.require_non_negative("env", "max_accel")?,
            max_decel: extra.require_non_negative("env", "max_decel")?,
            target_velocity: extra.require("env", "target_velocity")?,
            n_preceding: extra.require_count("env", "n_preceding")?,
            n_following: extra.require_count("env", "n_following")?,
            n_merging_in: extra.require_count("env", "n_merging_in")?,
            first_merge_class,
        })
    }

    fn per_vehicle_dim(&self) -> usize {
        1 + 2 * (self.n_preceding + self.n_following + self.n_merging_in)
    }

    fn observation(&self) -> Vec<f32> {
        let vehicles = self.core.vehicles();
        let length = self.core.length();
        let max_speed = self.core.max_speed();
        let ahead = leaders(vehicles);
        let mut behind = vec![None; vehicles.len()];
        for (i, lead) in ahead.iter().enumerate() {
            if let Some(lead) = *lead {
                behind[lead] = Some(i);
            }
        }

        let mut obs = Vec::with_capacity(self.core.num_rl() * self.per_vehicle_dim());
        for rl in self.core.rl_indices() {
            obs.push((vehicles[rl].speed / max_speed) as f32);

            let mut push_chain = |links: &[Option<usize>], count: usize, forward: bool| {
                let mut current = rl;
                for _ in 0..count {
                    match links[current].filter(|&next| next != rl) {
                        Some(next) => {
                            let gap = if forward {
                                headway(vehicles, rl, next, length)
                            } else {
                                headway(vehicles, next, rl, length)
                            };
                            obs.push((gap / length) as f32);
                            obs.push((vehicles[next].speed / max_speed) as f32);
                            current = next;
                        }
                        None => {
                            obs.push(0.0);
                            obs.push(0.0);
                        }
                    }
                }
            };
            push_chain(&ahead, self.n_preceding, true);
            push_chain(&behind, self.n_following, false);

            let mut merging: Vec<(f64, f64)> = vehicles
                .iter()
                .filter(|v| v.class_index >= self.first_merge_class)
                .map(|v| ((v.position - vehicles[rl].position).rem_euclid(length), v.speed))
                .collect();
            merging.sort_by(|a, b| a.0.total_cmp(&b.0));
            for slot in 0..self.n_merging_in {
                match merging.get(slot) {
                    Some(&(distance, speed)) => {
                        obs.push((distance / length) as f32);
                        obs.push((speed / max_speed) as f32);
                    }
                    None => {
                        obs.push(0.0);
                        obs.push(0.0);
                    }
                }
            }
        }
        obs
    }
}

impl Environment for MergePoEnv {
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
        SpaceInfo {
            shape: vec![self.core.num_rl() * self.per_vehicle_dim()],
            dtype: SpaceType::Continuous { low: 0.0, high: 1.0 },
        }
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
