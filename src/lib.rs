//! # flow-rl
//!
//! Typed experiment configuration for traffic-control reinforcement learning
//!
//! flow-rl assembles vehicle populations and scenario parameters into a
//! single replayable bundle, turns that bundle into independent environment
//! instances through a name-keyed factory registry, and either hands a
//! training job to a trainer or rolls the environment out directly.
//!
//! ## Quick Start
//!
//! ```rust
//! use flow_rl::prelude::*;
//!
//! let params = flow_rl::presets::merge().unwrap();
//!
//! // Direct rollout on the built-in kinematic backend
//! let runner = ExperimentRunner::new();
//! let summary = runner.run_rollout(&params, 1, 20, None).unwrap();
//! assert_eq!(summary.steps, vec![20]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error types
pub mod error;

/// Vehicle population builder
pub mod vehicles;

/// Simulator, environment, network and placement parameters
pub mod params;

/// Road networks and initial vehicle placement
pub mod scenario;

/// Scenario parameter bundle
pub mod flow_params;

/// Simulator adapter boundary and the kinematic backend
pub mod sim;

/// Environment traits and implementations
pub mod env;

/// Environment factory registry
pub mod registry;

/// Direct rollouts
pub mod experiment;

/// Trainer boundary and the in-process trainer
pub mod train;

/// Experiment runner
pub mod runner;

/// Reference experiments
pub mod presets;

pub use error::{ConfigError, Error, Result, SimulatorError, TrainerError};

/// Prelude module for convenient imports
///
/// This module re-exports commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::env::{BoxedEnv, EnvKind, Environment, StepResult};
    pub use crate::error::{ConfigError, Error, Result};
    pub use crate::experiment::{Experiment, RolloutSummary};
    pub use crate::flow_params::FlowParams;
    pub use crate::params::{
        AdditionalParams, EnvParams, InitialConfig, NetParams, RenderMode, SimParams, Spacing,
    };
    pub use crate::registry::{make_create_env, EnvFactory, EnvRegistry};
    pub use crate::runner::ExperimentRunner;
    pub use crate::scenario::NetworkKind;
    pub use crate::train::{JobDescriptor, LocalTrainer, Trainer, TrainerConfig};
    pub use crate::vehicles::{AccelerationController, VehicleClass, Vehicles};
}

/// Current version of flow-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
