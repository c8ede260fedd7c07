//! Experiment runner
//!
//! The runner is the entry point for both operating modes:
//!
//! - [`ExperimentRunner::run_training`] embeds the bundle in the trainer
//!   configuration, registers an environment factory and hands one job to a
//!   [`Trainer`]. Iteration, retries and checkpoints belong to the trainer.
//! - [`ExperimentRunner::run_rollout`] builds a single environment directly
//!   and steps it for a fixed budget.
//!
//! The runner owns the registry, so registered names live exactly as long as
//! the runner does.

use crate::error::Result;
use crate::experiment::{Experiment, Policy, RolloutSummary};
use crate::flow_params::FlowParams;
use crate::registry::{make_create_env_with, EnvRegistry};
use crate::sim::{kinematic_factory, SimulatorFactory};
use crate::train::{Experiments, JobDescriptor, Trainer, TrialRecord};

/// Drives experiments against one registry and one simulator backend
pub struct ExperimentRunner {
    registry: EnvRegistry,
    simulator: SimulatorFactory,
}

impl Default for ExperimentRunner {
    fn default() -> Self {
        Self::with_simulator(kinematic_factory())
    }
}

impl ExperimentRunner {
    /// Runner over the kinematic backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner over a caller-supplied backend
    pub fn with_simulator(simulator: SimulatorFactory) -> Self {
        Self { registry: EnvRegistry::new(), simulator }
    }

    /// Environments registered so far
    pub fn registry(&self) -> &EnvRegistry {
        &self.registry
    }

    /// Register version `version` of the bundle's environment
    ///
    /// Returns the registered name.
    pub fn register(&mut self, params: &FlowParams, version: u32) -> Result<String> {
        let (factory, name) = make_create_env_with(params, version, self.simulator.clone())?;
        self.registry.register(name.clone(), factory)?;
        Ok(name)
    }

    /// Distributed-training mode
    ///
    /// The job's `env` is replaced by the registered name and its
    /// configuration receives the canonical bundle text. The job is
    /// submitted under the bundle's experiment tag.
    pub fn run_training(
        &mut self,
        params: &FlowParams,
        version: u32,
        mut job: JobDescriptor,
        trainer: &mut dyn Trainer,
    ) -> Result<Vec<TrialRecord>> {
        params.validate()?;
        job.config.set_flow_params(params)?;
        job.env = self.register(params, version)?;
        job.validate()?;

        tracing::info!(
            "Submitting {} ({} on {}, {} iterations x {} trials)",
            params.exp_tag,
            job.run,
            job.env,
            job.stop.training_iteration,
            job.repeat
        );

        let mut experiments = Experiments::new();
        experiments.insert(params.exp_tag.clone(), job);
        Ok(trainer.run_experiments(&experiments, &self.registry)?)
    }

    /// Direct-rollout mode
    ///
    /// Bypasses the registry. Simulator errors end the rollout.
    pub fn run_rollout(
        &self,
        params: &FlowParams,
        num_runs: usize,
        num_steps: usize,
        policy: Option<Policy<'_>>,
    ) -> Result<RolloutSummary> {
        tracing::info!("Rolling out {} for {} runs of {} steps", params.exp_tag, num_runs, num_steps);
        let mut experiment = Experiment::with_simulator(params, (self.simulator)())?;
        experiment.run(num_runs, num_steps, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, Error};
    use crate::presets;

    #[test]
    fn test_same_version_twice_is_rejected() {
        let params = presets::merge().unwrap();
        let mut runner = ExperimentRunner::new();
        assert_eq!(runner.register(&params, 0).unwrap(), "merge-v0");
        assert_eq!(runner.register(&params, 1).unwrap(), "merge-v1");

        let err = runner.register(&params, 0).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::DuplicateEnvironment(_))));
        assert_eq!(runner.registry().len(), 2);
    }

    #[test]
    fn test_rollout_bypasses_registry() {
        let params = presets::merge().unwrap();
        let runner = ExperimentRunner::new();
        let summary = runner.run_rollout(&params, 1, 5, None).unwrap();
        assert_eq!(summary.steps, vec![5]);
        assert!(runner.registry().is_empty());
    }
}
