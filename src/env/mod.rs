//! Environment traits and implementations
//!
//! This module defines the environment interface consumed by trainers and
//! rollouts, and the catalog of traffic-control environments that can be
//! built from a [`FlowParams`] bundle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::flow_params::FlowParams;
use crate::sim::Simulator;

pub mod accel;
pub mod base;
pub mod merge;
pub mod pool;

pub use accel::AccelEnv;
pub use merge::MergePoEnv;

/// Core trait for RL environments
pub trait Environment {
    /// Observation type
    type Observation;

    /// Action type
    type Action;

    /// Reset the environment and return initial observation
    fn reset(&mut self) -> Result<Self::Observation>;

    /// Step the environment with an action
    fn step(&mut self, action: Self::Action) -> Result<StepResult<Self::Observation>>;

    /// Get the observation space dimensions
    fn observation_space(&self) -> SpaceInfo;

    /// Get the action space dimensions
    fn action_space(&self) -> SpaceInfo;

    /// Environment steps taken since the last reset
    fn step_count(&self) -> usize;
}

/// Environment instance as produced by a registered factory
pub type BoxedEnv = Box<dyn Environment<Observation = Vec<f32>, Action = Vec<f32>> + Send>;

/// Result of an environment step
#[derive(Debug, Clone)]
pub struct StepResult<O> {
    /// Next observation
    pub observation: O,

    /// Reward received
    pub reward: f32,

    /// Whether the episode terminated
    pub terminated: bool,

    /// Whether the episode was truncated
    pub truncated: bool,

    /// Additional info
    pub info: StepInfo,
}

impl<O> StepResult<O> {
    /// Whether the episode is over
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Space information for observations and actions
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceInfo {
    /// Shape of the space
    pub shape: Vec<usize>,

    /// Data type
    pub dtype: SpaceType,
}

/// Space data types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpaceType {
    /// Continuous space (Box) with elementwise bounds
    Continuous {
        /// Lower bound
        low: f32,
        /// Upper bound
        high: f32,
    },
}

/// Additional step information
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    /// Whether a collision ended the episode
    pub collided: bool,

    /// Mean speed over all vehicles after the step (m/s)
    pub mean_speed: f64,
}

/// Environment implementations available to a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvKind {
    /// Fully observed acceleration control on a loop
    #[serde(rename = "AccelEnv")]
    Accel,
    /// Partially observed control of merging on the two-loop network
    #[serde(rename = "TwoLoopsMergePOEnv")]
    MergePo,
}

impl EnvKind {
    /// Environment class name
    pub fn name(self) -> &'static str {
        match self {
            EnvKind::Accel => "AccelEnv",
            EnvKind::MergePo => "TwoLoopsMergePOEnv",
        }
    }

    /// Keys that must be present in `EnvParams::additional_params`
    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            EnvKind::Accel => accel::REQUIRED_PARAMS,
            EnvKind::MergePo => merge::REQUIRED_PARAMS,
        }
    }

    /// Check the parts of a bundle this environment depends on
    pub fn validate(self, params: &FlowParams) -> std::result::Result<(), ConfigError> {
        params
            .env
            .additional_params
            .check_required("env", self.required_params())?;
        for key in ["max_accel", "max_decel"] {
            params.env.additional_params.require_non_negative("env", key)?;
        }
        match self {
            EnvKind::Accel => Ok(()),
            EnvKind::MergePo => merge::validate(params),
        }
    }

    /// Build an environment on top of a loaded simulator backend
    pub fn build(self, params: &FlowParams, simulator: Box<dyn Simulator>) -> Result<BoxedEnv> {
        let env: BoxedEnv = match self {
            EnvKind::Accel => Box::new(AccelEnv::new(params, simulator)?),
            EnvKind::MergePo => Box::new(MergePoEnv::new(params, simulator)?),
        };
        Ok(env)
    }
}

impl fmt::Display for EnvKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EnvKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "AccelEnv" => Ok(EnvKind::Accel),
            "TwoLoopsMergePOEnv" => Ok(EnvKind::MergePo),
            other => Err(ConfigError::UnknownEnvKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_kind_names() {
        for kind in [EnvKind::Accel, EnvKind::MergePo] {
            assert_eq!(kind.name().parse::<EnvKind>().unwrap(), kind);
            assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{}\"", kind));
        }
        assert!(matches!("WaveAttenuationEnv".parse::<EnvKind>(), Err(ConfigError::UnknownEnvKind(_))));
    }

    #[test]
    fn test_merge_requires_more_than_accel() {
        for key in EnvKind::Accel.required_params() {
            assert!(EnvKind::MergePo.required_params().contains(key));
        }
        assert!(EnvKind::MergePo.required_params().contains(&"n_merging_in"));
    }
}
