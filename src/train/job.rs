//! Job descriptors and trial records

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::{Algorithm, TrainerConfig};
use crate::error::{ConfigError, TrainerError};
use crate::registry::EnvRegistry;

/// When a trial stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopCondition {
    /// Number of training iterations
    pub training_iteration: usize,
}

impl StopCondition {
    /// Stop after `n` training iterations
    pub fn iterations(n: usize) -> Self {
        Self { training_iteration: n }
    }
}

/// One experiment as submitted to a trainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Algorithm to run
    pub run: Algorithm,

    /// Registered environment name
    pub env: String,

    /// Hyperparameters
    pub config: TrainerConfig,

    /// Iterations between checkpoints (0 disables checkpointing)
    pub checkpoint_freq: usize,

    /// Worker failures tolerated per trial before the trial fails
    pub max_failures: usize,

    /// Stop condition
    pub stop: StopCondition,

    /// Independent trials to run
    pub repeat: usize,
}

impl JobDescriptor {
    /// Job running `run` with `config` for one iteration, one trial
    pub fn new(run: Algorithm, config: TrainerConfig) -> Self {
        Self {
            run,
            env: String::new(),
            config,
            checkpoint_freq: 0,
            max_failures: 0,
            stop: StopCondition::iterations(1),
            repeat: 1,
        }
    }

    /// Set environment name
    pub fn env(mut self, name: impl Into<String>) -> Self {
        self.env = name.into();
        self
    }

    /// Set checkpoint cadence
    pub fn checkpoint_freq(mut self, freq: usize) -> Self {
        self.checkpoint_freq = freq;
        self
    }

    /// Set retry budget
    pub fn max_failures(mut self, n: usize) -> Self {
        self.max_failures = n;
        self
    }

    /// Set stop condition
    pub fn stop(mut self, stop: StopCondition) -> Self {
        self.stop = stop;
        self
    }

    /// Set trial count
    pub fn repeat(mut self, n: usize) -> Self {
        self.repeat = n;
        self
    }

    /// Validate the schedule and the hyperparameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.env.is_empty() {
            return Err(ConfigError::invalid("env", "job has no environment name"));
        }
        if self.stop.training_iteration == 0 {
            return Err(ConfigError::invalid("stop.training_iteration", "must be positive"));
        }
        if self.repeat == 0 {
            return Err(ConfigError::invalid("repeat", "must be positive"));
        }
        self.config.validate()
    }
}

/// Jobs keyed by experiment tag
pub type Experiments = BTreeMap<String, JobDescriptor>;

/// Outcome of one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Experiment tag
    pub experiment: String,
    /// Repeat index
    pub trial: usize,
    /// Completed training iterations
    pub iterations: usize,
    /// Environment steps collected
    pub timesteps_total: usize,
    /// Episodes finished
    pub episodes_total: usize,
    /// Mean return of the episodes finished in the last iteration
    pub episode_reward_mean: Option<f64>,
    /// Worker failures that were retried
    pub failures: usize,
    /// Checkpoint files written
    pub checkpoints: Vec<PathBuf>,
    /// Wall-clock duration in seconds
    pub duration_secs: f64,
}

/// External training driver
///
/// A trainer resolves every job's environment name through the registry,
/// owns iteration, retries and checkpointing, and reports one record per
/// trial. Exhausting the retry budget of any trial is fatal.
pub trait Trainer {
    /// Run every job to its stop condition
    fn run_experiments(
        &mut self,
        experiments: &Experiments,
        registry: &EnvRegistry,
    ) -> Result<Vec<TrialRecord>, TrainerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_validation() {
        let job = JobDescriptor::new(Algorithm::Ppo, TrainerConfig::new(Algorithm::Ppo));
        assert!(job.validate().is_err(), "Job without environment must fail");

        let job = job.env("ring-v0");
        assert!(job.validate().is_ok());
        assert!(job.clone().repeat(0).validate().is_err());
        assert!(job.stop(StopCondition::iterations(0)).validate().is_err());
    }

    #[test]
    fn test_descriptor_shape() {
        let job = JobDescriptor::new(Algorithm::A3c, TrainerConfig::new(Algorithm::A3c))
            .env("merge-v0")
            .checkpoint_freq(50)
            .stop(StopCondition::iterations(1000));
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["run"], "A3C");
        assert_eq!(value["env"], "merge-v0");
        assert_eq!(value["stop"]["training_iteration"], 1000);
        assert_eq!(value["config"]["num_workers"], 2);
    }
}
