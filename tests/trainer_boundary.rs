//! Training-mode hand-off: what a trainer receives, retries and checkpoints

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use flow_rl::error::{Error, SimulatorError, TrainerError};
use flow_rl::params::SimParams;
use flow_rl::prelude::*;
use flow_rl::presets;
use flow_rl::scenario::{Placement, Scenario};
use flow_rl::sim::{KinematicSimulator, Simulator, SimulatorFactory, VehicleState};
use flow_rl::train::{Algorithm, Experiments, StopCondition, TrialRecord, FLOW_PARAMS_KEY};
use flow_rl::vehicles::CarFollowingParams;

/// Trainer that records what it was given and builds one environment per job
#[derive(Default)]
struct RecordingTrainer {
    submitted: Vec<(String, JobDescriptor)>,
}

impl Trainer for RecordingTrainer {
    fn run_experiments(
        &mut self,
        experiments: &Experiments,
        registry: &EnvRegistry,
    ) -> Result<Vec<TrialRecord>, TrainerError> {
        for (tag, job) in experiments {
            let mut env = registry.create_env(&job.env).map_err(|_| TrainerError::UnknownEnvironment {
                experiment: tag.clone(),
                env: job.env.clone(),
            })?;
            env.reset().map_err(|e| TrainerError::Io(std::io::Error::other(e.to_string())))?;
            self.submitted.push((tag.clone(), job.clone()));
        }
        Ok(Vec::new())
    }
}

/// Kinematic backend whose `step` fails when `failing` is set
struct FlakySimulator {
    inner: KinematicSimulator,
    failing: bool,
}

impl Simulator for FlakySimulator {
    fn load(&mut self, scenario: &Scenario, params: &SimParams) -> Result<(), SimulatorError> {
        self.inner.load(scenario, params)
    }

    fn reset(&mut self, placements: &[Placement]) -> Result<(), SimulatorError> {
        self.inner.reset(placements)
    }

    fn apply_acceleration(&mut self, id: &str, accel: f64) -> Result<(), SimulatorError> {
        self.inner.apply_acceleration(id, accel)
    }

    fn step(&mut self) -> Result<(), SimulatorError> {
        if self.failing {
            return Err(SimulatorError::Backend("connection to simulator lost".to_string()));
        }
        self.inner.step()
    }

    fn vehicles(&self) -> &[VehicleState] {
        self.inner.vehicles()
    }

    fn collided(&self) -> bool {
        self.inner.collided()
    }

    fn length(&self) -> f64 {
        self.inner.length()
    }
}

/// Backends numbered from zero; the first `failures` of them fail
fn flaky_factory(failures: usize) -> SimulatorFactory {
    let created = Arc::new(AtomicUsize::new(0));
    Arc::new(move || {
        let index = created.fetch_add(1, Ordering::SeqCst);
        Box::new(FlakySimulator { inner: KinematicSimulator::new(), failing: index < failures }) as Box<dyn Simulator>
    })
}

fn small_job(max_failures: usize) -> JobDescriptor {
    let config = TrainerConfig::new(Algorithm::A3c).num_workers(1).train_batch_size(20);
    JobDescriptor::new(Algorithm::A3c, config)
        .max_failures(max_failures)
        .stop(StopCondition::iterations(2))
}

#[test]
fn test_trainer_receives_registered_job() -> Result<()> {
    let params = presets::merge()?;
    let mut runner = ExperimentRunner::new();
    let mut trainer = RecordingTrainer::default();

    runner.run_training(&params, 0, presets::merge_job(), &mut trainer)?;

    assert_eq!(trainer.submitted.len(), 1);
    let (tag, job) = &trainer.submitted[0];
    assert_eq!(tag, "merge");
    assert_eq!(job.env, "merge-v0");
    assert_eq!(job.run, Algorithm::A3c);
    assert_eq!(job.checkpoint_freq, 50);
    assert_eq!(job.max_failures, 999);
    assert_eq!(job.stop.training_iteration, 1000);
    assert_eq!(job.repeat, 3);

    // The embedded bundle is the canonical text and replays to the same bundle
    let text = job.config.flow_params_json().expect("bundle embedded");
    assert_eq!(text, params.to_canonical_json()?);
    assert_eq!(FlowParams::from_json(text)?, params);
    assert!(job.config.get("env_config").and_then(|c| c.get(FLOW_PARAMS_KEY)).is_some());
    Ok(())
}

#[test]
fn test_second_submission_of_same_version_fails() -> Result<()> {
    let params = presets::merge()?;
    let mut runner = ExperimentRunner::new();
    let mut trainer = RecordingTrainer::default();

    runner.run_training(&params, 0, presets::merge_job(), &mut trainer)?;
    let err = runner.run_training(&params, 0, presets::merge_job(), &mut trainer).unwrap_err();

    assert!(matches!(err, Error::Config(ConfigError::DuplicateEnvironment(_))));
    assert_eq!(trainer.submitted.len(), 1);
    Ok(())
}

#[test]
fn test_bundle_with_negative_car_following_limit_is_never_submitted() -> Result<()> {
    let mut params = presets::merge()?;
    params.veh = Vehicles::new();
    params.veh.add(
        VehicleClass::new("human", AccelerationController::idm(), 6)
            .car_following_params(CarFollowingParams::new().decel(-7.5)),
    )?;
    params.veh.add(VehicleClass::new("rl", AccelerationController::Rl, 1))?;

    let mut runner = ExperimentRunner::new();
    let mut trainer = RecordingTrainer::default();
    let err = runner.run_training(&params, 0, presets::merge_job(), &mut trainer).unwrap_err();

    assert!(matches!(err, Error::Config(ConfigError::InvalidValue { .. })));
    assert!(trainer.submitted.is_empty());
    assert!(runner.registry().create_env("merge-v0").is_err());
    Ok(())
}

#[test]
fn test_local_trainer_retries_worker_failures() -> Result<()> {
    let params = presets::merge()?;
    let mut runner = ExperimentRunner::with_simulator(flaky_factory(2));
    let records = runner.run_training(&params, 0, small_job(5), &mut LocalTrainer::new())?;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].failures, 2);
    assert_eq!(records[0].iterations, 2);
    assert_eq!(records[0].timesteps_total, 40);
    Ok(())
}

#[test]
fn test_local_trainer_gives_up_past_retry_budget() -> Result<()> {
    let params = presets::merge()?;
    let mut runner = ExperimentRunner::with_simulator(flaky_factory(usize::MAX));
    let err = runner.run_training(&params, 0, small_job(2), &mut LocalTrainer::new()).unwrap_err();

    match err {
        Error::Trainer(TrainerError::MaxFailuresExceeded { experiment, trial, failures }) => {
            assert_eq!(experiment, "merge");
            assert_eq!(trial, 0);
            assert_eq!(failures, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn test_local_trainer_writes_checkpoints() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let params = presets::merge()?;
    let job = small_job(0).checkpoint_freq(1).repeat(2);

    let mut trainer = LocalTrainer::new().checkpoint_dir(dir.path());
    let records = ExperimentRunner::new().run_training(&params, 0, job, &mut trainer)?;

    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.checkpoints.len(), 2);
        for path in &record.checkpoints {
            assert!(path.starts_with(dir.path().join("merge")));
            let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            assert_eq!(saved["trial"], record.trial);
            assert!(saved["config"]["env_config"][FLOW_PARAMS_KEY].is_string());
        }
    }
    assert!(dir.path().join("merge/trial_1/checkpoint_000002.json").exists());
    Ok(())
}
