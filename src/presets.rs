//! Ready-made experiments
//!
//! Two reference setups: human-driven and RL vehicles circulating the
//! minicity network (run directly), and the two-loop cooperative merge
//! (trained through a [`Trainer`](crate::train::Trainer)).

use crate::env::EnvKind;
use crate::error::ConfigError;
use crate::flow_params::FlowParams;
use crate::params::{AdditionalParams, EnvParams, InitialConfig, NetParams, RenderMode, SimParams, Spacing};
use crate::scenario::NetworkKind;
use crate::train::{Algorithm, JobDescriptor, ModelConfig, StopCondition, TrainerConfig};
use crate::vehicles::{
    AccelerationController, CarFollowingParams, IdmOptions, LaneChangeController, RoutingController,
    VehicleClass, Vehicles,
};

/// Episodes run by the minicity demo
pub const MINICITY_RUNS: usize = 1;

/// Steps per episode of the minicity demo
pub const MINICITY_STEPS: usize = 1500;

/// Time horizon of a single merge rollout
pub const MERGE_HORIZON: usize = 100;

/// Merge rollouts per training iteration
pub const MERGE_ROLLOUTS: usize = 18;

/// Parallel merge workers
pub const MERGE_WORKERS: usize = 6;

/// Radius of the inner merge ring (m)
pub const RING_RADIUS: f64 = 50.0;

/// Human vehicles starting on the outer (merging) ring
pub const NUM_MERGE_HUMANS: usize = 10;

/// Learning agents in the inner ring
pub const NUM_MERGE_RL: usize = 1;

/// Tunables the acceleration environment reads
pub fn accel_env_params() -> AdditionalParams {
    AdditionalParams::new()
        .with("max_accel", 3.0)
        .with("max_decel", 3.0)
        .with("target_velocity", 10.0)
}

/// Human-driven and RL vehicles on the minicity network
///
/// Rendering defaults to the simulator GUI; `render` and `save_render`
/// override it when given.
pub fn minicity(render: Option<RenderMode>, save_render: Option<bool>) -> Result<FlowParams, ConfigError> {
    let mut sim = SimParams::new().render(RenderMode::Gui);
    if let Some(render) = render {
        sim = sim.render(render);
    }
    if let Some(save_render) = save_render {
        sim = sim.save_render(save_render);
    }

    let mut vehicles = Vehicles::new();
    for (veh_id, controller, count) in [
        ("idm", AccelerationController::idm(), 20),
        ("rl", AccelerationController::Rl, 5),
    ] {
        vehicles.add(
            VehicleClass::new(veh_id, controller, count)
                .lane_change_controller(LaneChangeController::Static)
                .routing_controller(RoutingController::Minicity)
                .speed_mode("no_collide")
                .initial_speed(10.0),
        )?;
    }

    Ok(FlowParams::new("minicity", EnvKind::Accel, NetworkKind::MiniCity, vehicles)
        .sim(sim)
        .env(EnvParams::new().additional_params(accel_env_params()))
        .net(
            NetParams::new()
                .no_internal_links(false)
                .additional_params(NetworkKind::MiniCity.default_params()),
        )
        .initial(InitialConfig::new().spacing(Spacing::Random)))
}

/// Cooperative merge on two loops joined by a merge lane
///
/// Six humans and one agent share the inner ring; ten humans start on the
/// outer ring and merge in. The merging class is added last so it is placed
/// after the ring vehicles.
pub fn merge() -> Result<FlowParams, ConfigError> {
    let human = || AccelerationController::Idm(IdmOptions::default().noise(0.2));
    let human_cf = || CarFollowingParams::new().min_gap(0.0).tau(0.5);

    let mut vehicles = Vehicles::new();
    vehicles
        .add(
            VehicleClass::new("human", human(), 6)
                .routing_controller(RoutingController::Continuous)
                .car_following_params(human_cf()),
        )?
        .add(
            VehicleClass::new("rl", AccelerationController::Rl, NUM_MERGE_RL)
                .routing_controller(RoutingController::Continuous)
                .speed_mode("no_collide")
                .car_following_params(CarFollowingParams::new().min_gap(0.01).tau(0.5)),
        )?
        .add(
            VehicleClass::new("merge-human", human(), NUM_MERGE_HUMANS)
                .routing_controller(RoutingController::Continuous)
                .car_following_params(human_cf()),
        )?;

    let env_params = AdditionalParams::new()
        .with("max_accel", 3.0)
        .with("max_decel", 3.0)
        .with("target_velocity", 10.0)
        .with("n_preceding", 2.0)
        .with("n_following", 2.0)
        .with("n_merging_in", 2.0);

    let net_params = AdditionalParams::new()
        .with("ring_radius", RING_RADIUS)
        .with("lane_length", 75.0)
        .with("inner_lanes", 1.0)
        .with("outer_lanes", 1.0)
        .with("speed_limit", 30.0)
        .with("resolution", 40.0);

    Ok(FlowParams::new("merge", EnvKind::MergePo, NetworkKind::TwoLoopsOneMerging, vehicles)
        .sim(SimParams::new().sim_step(0.1).render(RenderMode::Off))
        .env(EnvParams::new().horizon(MERGE_HORIZON).additional_params(env_params))
        .net(NetParams::new().no_internal_links(false).additional_params(net_params))
        .initial(
            InitialConfig::new()
                .x0(50.0)
                .spacing(Spacing::Uniform)
                .additional_params(AdditionalParams::new().with("merge_bunching", 0.0)),
        ))
}

/// A3C settings for the merge experiment
pub fn merge_trainer_config() -> TrainerConfig {
    TrainerConfig::new(Algorithm::A3c)
        .num_workers(MERGE_WORKERS)
        .train_batch_size(MERGE_HORIZON * MERGE_ROLLOUTS)
        .gamma(0.999)
        .horizon(MERGE_HORIZON)
        .model(ModelConfig::fully_connected(vec![32, 32]))
}

/// Job schedule for the merge experiment
///
/// `env` is left empty; the runner fills in the registered name.
pub fn merge_job() -> JobDescriptor {
    JobDescriptor::new(Algorithm::A3c, merge_trainer_config())
        .checkpoint_freq(50)
        .max_failures(999)
        .stop(StopCondition::iterations(1000))
        .repeat(3)
}
