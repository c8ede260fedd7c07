//! End-to-end checks of the population builder, the parameter bundle, the
//! registry and direct rollouts

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use flow_rl::error::{ConfigError, SimulatorError};
use flow_rl::params::{AdditionalParams, EnvParams, SimParams};
use flow_rl::prelude::*;
use flow_rl::registry::make_create_env_with;
use flow_rl::scenario::{Placement, Scenario};
use flow_rl::sim::{KinematicSimulator, Simulator, SimulatorFactory, VehicleState};

/// Kinematic backend that counts `step` calls
struct CountingSimulator {
    inner: KinematicSimulator,
    steps: Arc<AtomicUsize>,
}

impl Simulator for CountingSimulator {
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
        self.steps.fetch_add(1, Ordering::SeqCst);
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

fn counting_factory(steps: Arc<AtomicUsize>) -> SimulatorFactory {
    Arc::new(move || {
        Box::new(CountingSimulator { inner: KinematicSimulator::new(), steps: steps.clone() }) as Box<dyn Simulator>
    })
}

fn ring_bundle(exp_tag: &str, horizon: usize) -> Result<FlowParams> {
    let mut vehicles = Vehicles::new();
    vehicles.add(VehicleClass::new("idm", AccelerationController::idm(), 20))?;
    vehicles.add(VehicleClass::new("rl", AccelerationController::Rl, 1))?;

    Ok(FlowParams::new(exp_tag, EnvKind::Accel, NetworkKind::Loop, vehicles)
        .sim(SimParams::new().seed(7))
        .env(
            EnvParams::new().horizon(horizon).additional_params(
                AdditionalParams::new()
                    .with("max_accel", 1.0)
                    .with("max_decel", 1.0)
                    .with("target_velocity", 10.0),
            ),
        ))
}

#[test]
fn test_population_of_one_class() -> Result<()> {
    let mut vehicles = Vehicles::new();
    vehicles.add(VehicleClass::new("idm", AccelerationController::idm(), 20))?;

    assert_eq!(vehicles.len(), 1);
    assert_eq!(vehicles.get("idm").map(|c| c.num_vehicles), Some(20));
    Ok(())
}

#[test]
fn test_duplicate_vehicle_id() -> Result<()> {
    let mut vehicles = Vehicles::new();
    vehicles.add(VehicleClass::new("idm", AccelerationController::idm(), 20))?;
    let err = vehicles.add(VehicleClass::new("idm", AccelerationController::Rl, 1)).unwrap_err();

    assert!(matches!(err, ConfigError::DuplicateVehicle(id) if id == "idm"));
    assert_eq!(vehicles.num_vehicles(), 20);
    Ok(())
}

#[test]
fn test_rollout_performs_one_simulator_step_per_env_step() -> Result<()> {
    let params = ring_bundle("ring", 100)?;
    assert_eq!(params.env.horizon, 100);

    let steps = Arc::new(AtomicUsize::new(0));
    let runner = ExperimentRunner::with_simulator(counting_factory(steps.clone()));
    let summary = runner.run_rollout(&params, 1, 100, None)?;

    assert_eq!(summary.steps, vec![100]);
    assert_eq!(steps.load(Ordering::SeqCst), 100);
    Ok(())
}

#[test]
fn test_minicity_runs_full_step_budget() -> Result<()> {
    let params = flow_rl::presets::minicity(Some(RenderMode::Off), None)?;
    assert!(params.env.horizon < flow_rl::presets::MINICITY_STEPS);

    let summary = ExperimentRunner::new().run_rollout(
        &params,
        flow_rl::presets::MINICITY_RUNS,
        flow_rl::presets::MINICITY_STEPS,
        None,
    )?;
    assert_eq!(summary.steps, vec![1500]);
    Ok(())
}

#[test]
fn test_out_of_range_bounds_fail_before_stepping() -> Result<()> {
    let mut negative_decel = flow_rl::presets::merge()?;
    negative_decel.env.additional_params.insert("max_decel", -5.0);

    let mut negative_speed_limit = flow_rl::presets::merge()?;
    negative_speed_limit.net.additional_params.insert("speed_limit", -1.0);

    for params in [negative_decel, negative_speed_limit] {
        assert!(matches!(params.validate(), Err(ConfigError::InvalidValue { .. })));
        let err = ExperimentRunner::new().run_rollout(&params, 1, 10, None).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidValue { .. })));
    }
    Ok(())
}

#[test]
fn test_two_versions_resolve_independently() -> Result<()> {
    let v0 = ring_bundle("ring", 50)?;
    let v1 = ring_bundle("ring", 80)?;

    let mut runner = ExperimentRunner::new();
    let name0 = runner.register(&v0, 0)?;
    let name1 = runner.register(&v1, 1)?;
    assert_ne!(name0, name1);

    let mut env0 = runner.registry().create_env(&name0)?;
    let mut env1 = runner.registry().create_env(&name1)?;
    env0.reset()?;
    env1.reset()?;

    let mut done0 = 0;
    while !env0.step(vec![0.0])?.is_done() {
        done0 += 1;
    }
    let mut done1 = 0;
    while !env1.step(vec![0.0])?.is_done() {
        done1 += 1;
    }
    assert_eq!(done0 + 1, 50);
    assert_eq!(done1 + 1, 80);
    Ok(())
}

#[test]
fn test_factory_builds_fresh_backends() -> Result<()> {
    let params = ring_bundle("ring", 100)?;
    let steps = Arc::new(AtomicUsize::new(0));
    let (factory, _) = make_create_env_with(&params, 0, counting_factory(steps.clone()))?;

    let mut a = factory()?;
    let mut b = factory()?;
    a.reset()?;
    b.reset()?;
    for _ in 0..3 {
        a.step(vec![0.0])?;
    }

    assert_eq!(a.step_count(), 3);
    assert_eq!(b.step_count(), 0);
    assert_eq!(steps.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn test_equal_bundles_serialize_identically() -> Result<()> {
    let a = ring_bundle("ring", 100)?.to_canonical_json()?;
    let b = ring_bundle("ring", 100)?.to_canonical_json()?;
    assert_eq!(a, b);

    let restored = FlowParams::from_json(&a)?;
    assert_eq!(restored.to_canonical_json()?, a);
    Ok(())
}

#[test]
fn test_saved_bundle_replays() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("merge.json");

    let params = flow_rl::presets::merge()?;
    params.save_json(&path)?;
    assert_eq!(FlowParams::load_json(&path)?, params);
    Ok(())
}
