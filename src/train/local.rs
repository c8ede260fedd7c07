//! In-process rollout trainer
//!
//! [`LocalTrainer`] runs jobs on this machine: each trial builds
//! `num_workers` environments from the registered factory, steps them in
//! parallel with a fixed zero-acceleration policy until `train_batch_size`
//! timesteps are collected per iteration, and repeats for the configured
//! number of iterations. It performs no policy optimization; it exercises the
//! registry, retry and checkpoint plumbing end to end and produces baseline
//! returns for the uncontrolled system.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use super::config::TrainerConfig;
use super::job::{Experiments, JobDescriptor, Trainer, TrialRecord};
use crate::env::pool::EnvPool;
use crate::error::{ConfigError, Result, TrainerError};
use crate::registry::{EnvFactory, EnvRegistry};

/// Trainer running every worker in this process
#[derive(Debug, Clone, Default)]
pub struct LocalTrainer {
    checkpoint_dir: Option<PathBuf>,
}

/// Timesteps and finished-episode returns from one iteration
struct Batch {
    timesteps: usize,
    returns: Vec<f64>,
}

/// Environment pool plus the return of each worker's running episode
struct Workers {
    pool: EnvPool,
    action_dim: usize,
    running: Vec<f64>,
}

impl Workers {
    fn start(factory: &EnvFactory, num_envs: usize) -> Result<Self> {
        let mut pool = EnvPool::new(factory, num_envs)?;
        pool.reset()?;
        let action_dim = pool.action_space().map_or(0, |space| space.shape.iter().product());
        Ok(Self { pool, action_dim, running: vec![0.0; num_envs] })
    }

    fn sample(&mut self, batch_size: usize) -> Result<Batch> {
        let mut batch = Batch { timesteps: 0, returns: Vec::new() };
        while batch.timesteps < batch_size {
            let actions = vec![vec![0.0; self.action_dim]; self.pool.num_envs()];
            let results = self.pool.step(actions)?;
            for (i, result) in results.iter().enumerate() {
                self.running[i] += result.reward as f64;
                if result.is_done() {
                    batch.returns.push(self.running[i]);
                    self.running[i] = 0.0;
                    self.pool.reset_env(i)?;
                }
            }
            batch.timesteps += results.len();
        }
        Ok(batch)
    }
}

/// Checkpoint file contents
#[derive(Serialize)]
struct Checkpoint<'a> {
    experiment: &'a str,
    trial: usize,
    training_iteration: usize,
    timesteps_total: usize,
    episodes_total: usize,
    episode_reward_mean: Option<f64>,
    config: &'a TrainerConfig,
}

impl LocalTrainer {
    /// Trainer that writes no checkpoints
    pub fn new() -> Self {
        Self::default()
    }

    /// Write checkpoints under `dir`
    pub fn checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    fn run_trial(
        &self,
        experiment: &str,
        trial: usize,
        job: &JobDescriptor,
        factory: &EnvFactory,
    ) -> std::result::Result<TrialRecord, TrainerError> {
        let start = Instant::now();
        let num_envs = job.config.get_usize("num_workers").unwrap_or(1).max(1);
        let batch_size = job.config.get_usize("train_batch_size").unwrap_or(num_envs).max(1);

        tracing::info!(
            "Starting {} trial {} ({} workers, batch {}, {} iterations)",
            experiment,
            trial,
            num_envs,
            batch_size,
            job.stop.training_iteration
        );

        let mut record = TrialRecord {
            experiment: experiment.to_string(),
            trial,
            iterations: 0,
            timesteps_total: 0,
            episodes_total: 0,
            episode_reward_mean: None,
            failures: 0,
            checkpoints: Vec::new(),
            duration_secs: 0.0,
        };

        let mut workers: Option<Workers> = None;
        while record.iterations < job.stop.training_iteration {
            let outcome = match workers.take() {
                Some(w) => Ok(w),
                None => Workers::start(factory, num_envs),
            }
            .and_then(|mut w| {
                let batch = w.sample(batch_size)?;
                Ok((w, batch))
            });

            let batch = match outcome {
                Ok((w, batch)) => {
                    workers = Some(w);
                    batch
                }
                Err(e) => {
                    record.failures += 1;
                    tracing::warn!(
                        "{} trial {} worker failure {}/{}: {}",
                        experiment,
                        trial,
                        record.failures,
                        job.max_failures,
                        e
                    );
                    if record.failures > job.max_failures {
                        return Err(TrainerError::MaxFailuresExceeded {
                            experiment: experiment.to_string(),
                            trial,
                            failures: record.failures,
                        });
                    }
                    continue;
                }
            };

            record.iterations += 1;
            record.timesteps_total += batch.timesteps;
            record.episodes_total += batch.returns.len();
            if !batch.returns.is_empty() {
                record.episode_reward_mean =
                    Some(batch.returns.iter().sum::<f64>() / batch.returns.len() as f64);
            }

            tracing::debug!(
                "{} trial {} iteration {}: timesteps={} episodes={} reward_mean={:?}",
                experiment,
                trial,
                record.iterations,
                record.timesteps_total,
                record.episodes_total,
                record.episode_reward_mean
            );

            if job.checkpoint_freq > 0 && record.iterations % job.checkpoint_freq == 0 {
                if let Some(dir) = &self.checkpoint_dir {
                    let path = write_checkpoint(dir, &record, &job.config)?;
                    tracing::info!("Saved checkpoint {}", path.display());
                    record.checkpoints.push(path);
                }
            }
        }

        record.duration_secs = start.elapsed().as_secs_f64();
        tracing::info!(
            "Finished {} trial {}: {} timesteps, {} episodes, reward_mean={:?}, {} failures",
            experiment,
            trial,
            record.timesteps_total,
            record.episodes_total,
            record.episode_reward_mean,
            record.failures
        );
        Ok(record)
    }
}

fn write_checkpoint(
    dir: &Path,
    record: &TrialRecord,
    config: &TrainerConfig,
) -> std::result::Result<PathBuf, TrainerError> {
    let trial_dir = dir.join(&record.experiment).join(format!("trial_{}", record.trial));
    fs::create_dir_all(&trial_dir)?;

    let checkpoint = Checkpoint {
        experiment: &record.experiment,
        trial: record.trial,
        training_iteration: record.iterations,
        timesteps_total: record.timesteps_total,
        episodes_total: record.episodes_total,
        episode_reward_mean: record.episode_reward_mean,
        config,
    };
    let text = serde_json::to_string_pretty(&checkpoint).map_err(ConfigError::from)?;

    let path = trial_dir.join(format!("checkpoint_{:06}.json", record.iterations));
    fs::write(&path, text)?;
    Ok(path)
}

impl Trainer for LocalTrainer {
    fn run_experiments(
        &mut self,
        experiments: &Experiments,
        registry: &EnvRegistry,
    ) -> std::result::Result<Vec<TrialRecord>, TrainerError> {
        let mut records = Vec::new();
        for (experiment, job) in experiments {
            job.validate()?;
            let factory = registry.get(&job.env).ok_or_else(|| TrainerError::UnknownEnvironment {
                experiment: experiment.clone(),
                env: job.env.clone(),
            })?;

            for trial in 0..job.repeat {
                records.push(self.run_trial(experiment, trial, job, factory)?);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;
    use crate::registry::make_create_env;
    use crate::train::{Algorithm, StopCondition};

    fn setup(iterations: usize) -> (Experiments, EnvRegistry) {
        let params = presets::merge().unwrap();
        let (factory, name) = make_create_env(&params, 0).unwrap();
        let mut registry = EnvRegistry::new();
        registry.register(name.clone(), factory).unwrap();

        let config = TrainerConfig::new(Algorithm::A3c).num_workers(2).train_batch_size(100);
        let job = JobDescriptor::new(Algorithm::A3c, config)
            .env(name)
            .stop(StopCondition::iterations(iterations))
            .repeat(2);

        let mut experiments = Experiments::new();
        experiments.insert(params.exp_tag.clone(), job);
        (experiments, registry)
    }

    #[test]
    fn test_runs_every_trial() {
        let (experiments, registry) = setup(4);
        let records = LocalTrainer::new().run_experiments(&experiments, &registry).unwrap();

        assert_eq!(records.len(), 2);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.trial, i);
            assert_eq!(record.iterations, 4);
            assert_eq!(record.timesteps_total, 400);
            // 200 steps per worker at horizon 100: two episodes each
            assert_eq!(record.episodes_total, 4);
            assert!(record.episode_reward_mean.is_some());
            assert_eq!(record.failures, 0);
        }
    }

    #[test]
    fn test_unregistered_environment() {
        let (mut experiments, registry) = setup(1);
        for job in experiments.values_mut() {
            job.env = "nowhere-v0".to_string();
        }
        let err = LocalTrainer::new().run_experiments(&experiments, &registry).unwrap_err();
        assert!(matches!(err, TrainerError::UnknownEnvironment { .. }));
    }
}
