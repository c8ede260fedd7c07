//! Scenario: a network plus the vehicles placed on it
//!
//! A scenario is rebuilt from the parameter bundle for every environment
//! instance, so no two environments share placement state.

pub mod network;

use rand::seq::SliceRandom;
use rand::Rng;

pub use network::NetworkKind;

use crate::error::ConfigError;
use crate::flow_params::FlowParams;
use crate::params::{InitialConfig, NetParams, Spacing};
use crate::vehicles::Vehicles;

/// Length of every vehicle (m)
pub const VEHICLE_LENGTH: f64 = 5.0;

/// Where one vehicle starts an episode
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Instance id
    pub id: String,
    /// Index of the vehicle class in the population
    pub class_index: usize,
    /// Position along the loop (m)
    pub position: f64,
    /// Initial speed (m/s)
    pub speed: f64,
}

/// Network, population and initial-placement policy
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    kind: NetworkKind,
    vehicles: Vehicles,
    net: NetParams,
    initial: InitialConfig,
    length: f64,
    speed_limit: f64,
}

impl Scenario {
    /// Build a scenario, checking the tunables the network requires
    pub fn new(
        name: impl Into<String>,
        kind: NetworkKind,
        vehicles: Vehicles,
        net: NetParams,
        initial: InitialConfig,
    ) -> Result<Self, ConfigError> {
        net.additional_params.check_required("net", kind.required_net_params())?;
        initial
            .additional_params
            .check_required("initial", kind.required_initial_params())?;
        initial.validate()?;
        for class in vehicles.iter() {
            class.car_following_params.validate()?;
        }

        let length = kind.loop_length(&net)?;
        let speed_limit = kind.speed_limit(&net)?;

        let scenario = Self {
            name: name.into(),
            kind,
            vehicles,
            net,
            initial,
            length,
            speed_limit,
        };

        let needed = scenario.vehicles.num_vehicles() as f64
            * (VEHICLE_LENGTH + scenario.initial.min_gap);
        if needed > scenario.available_length() {
            return Err(ConfigError::invalid(
                "veh",
                format!(
                    "{} vehicles need {:.1} m but only {:.1} m of road is available",
                    scenario.vehicles.num_vehicles(),
                    needed,
                    scenario.available_length()
                ),
            ));
        }

        Ok(scenario)
    }

    /// Build the scenario described by a parameter bundle
    pub fn from_params(params: &FlowParams) -> Result<Self, ConfigError> {
        Self::new(
            params.exp_tag.clone(),
            params.scenario,
            params.veh.clone(),
            params.net.clone(),
            params.initial.clone(),
        )
    }

    /// Scenario name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Network kind
    pub fn kind(&self) -> NetworkKind {
        self.kind
    }

    /// Vehicle population
    pub fn vehicles(&self) -> &Vehicles {
        &self.vehicles
    }

    /// Network parameters
    pub fn net_params(&self) -> &NetParams {
        &self.net
    }

    /// Initial placement parameters
    pub fn initial_config(&self) -> &InitialConfig {
        &self.initial
    }

    /// Loop length (m)
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Speed limit (m/s)
    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    fn total_bunching(&self) -> f64 {
        self.initial.bunching + self.initial.additional_params.get("merge_bunching").unwrap_or(0.0)
    }

    fn available_length(&self) -> f64 {
        (self.length - self.total_bunching()).max(0.0)
    }

    /// Starting positions for every vehicle, in insertion order
    ///
    /// Vehicle `i + 1` starts ahead of vehicle `i`. Positions wrap around the
    /// loop.
    pub fn initial_placements<R: Rng>(&self, rng: &mut R) -> Vec<Placement> {
        let mut instances = self.vehicles.instances();
        let n = instances.len();
        if n == 0 {
            return Vec::new();
        }
        if self.initial.shuffle {
            instances.shuffle(rng);
        }

        let available = self.available_length();
        let min_headway = VEHICLE_LENGTH + self.initial.min_gap;

        let offsets: Vec<f64> = match self.initial.spacing {
            Spacing::Uniform => {
                let spacing = available / n as f64;
                let max_perturb = ((spacing - min_headway) / 2.0).max(0.0);
                let perturb = self.initial.perturbation.min(max_perturb);
                (0..n)
                    .map(|i| {
                        let jitter = if perturb > 0.0 { rng.gen_range(-perturb..perturb) } else { 0.0 };
                        i as f64 * spacing + jitter
                    })
                    .collect()
            }
            Spacing::Random => {
                let slack = (available - n as f64 * min_headway).max(0.0);
                let weights: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();
                let total: f64 = weights.iter().sum::<f64>().max(f64::EPSILON);
                let mut position = 0.0;
                weights
                    .iter()
                    .map(|w| {
                        let here = position;
                        position += min_headway + slack * w / total;
                        here
                    })
                    .collect()
            }
        };

        instances
            .into_iter()
            .zip(offsets)
            .map(|((id, class_index), offset)| {
                let speed = self
                    .vehicles
                    .class(class_index)
                    .and_then(|c| c.initial_speed)
                    .unwrap_or(0.0);
                Placement {
                    id,
                    class_index,
                    position: (self.initial.x0 + offset).rem_euclid(self.length),
                    speed,
                }
            })
            .collect()
    }
}
