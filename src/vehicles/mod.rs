//! Vehicle population builder
//!
//! A population is an ordered list of vehicle classes. Order matters: the
//! scenario places vehicles in insertion order, so classes that must start
//! behind others (for example a merging stream) are added last.
//!
//! # Example
//!
//! ```rust
//! use flow_rl::vehicles::{AccelerationController, VehicleClass, Vehicles};
//!
//! let mut vehicles = Vehicles::new();
//! vehicles
//!     .add(VehicleClass::new("idm", AccelerationController::idm(), 20))
//!     .unwrap();
//! assert_eq!(vehicles.len(), 1);
//! assert_eq!(vehicles.num_vehicles(), 20);
//! ```

pub mod controllers;
pub mod params;

use serde::{Deserialize, Serialize};

pub use controllers::{AccelerationController, IdmOptions, LaneChangeController, RoutingController};
pub use params::{CarFollowingParams, LaneChangeMode, LaneChangeParams, SpeedMode};

use crate::error::ConfigError;

/// One named class of identically configured vehicles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleClass {
    /// Class identifier, unique within a population
    pub veh_id: String,

    /// Longitudinal controller
    pub acceleration_controller: AccelerationController,

    /// Lane-change controller
    pub lane_change_controller: LaneChangeController,

    /// Routing controller (none keeps the simulator's default route)
    pub routing_controller: Option<RoutingController>,

    /// Number of instances
    pub num_vehicles: usize,

    /// Car-following parameters
    pub car_following_params: CarFollowingParams,

    /// Lane-change parameters
    pub lane_change_params: LaneChangeParams,

    /// Speed-safety mode tag
    pub speed_mode: SpeedMode,

    /// Lane-change safety mode tag
    pub lane_change_mode: LaneChangeMode,

    /// Speed at insertion (m/s); the simulator default when absent
    pub initial_speed: Option<f64>,
}

impl VehicleClass {
    /// Create a class with default lane-change, routing and physical parameters
    pub fn new(
        veh_id: impl Into<String>,
        acceleration_controller: AccelerationController,
        num_vehicles: usize,
    ) -> Self {
        Self {
            veh_id: veh_id.into(),
            acceleration_controller,
            lane_change_controller: LaneChangeController::default(),
            routing_controller: None,
            num_vehicles,
            car_following_params: CarFollowingParams::default(),
            lane_change_params: LaneChangeParams::default(),
            speed_mode: SpeedMode::default(),
            lane_change_mode: LaneChangeMode::default(),
            initial_speed: None,
        }
    }

    /// Set lane-change controller
    pub fn lane_change_controller(mut self, controller: LaneChangeController) -> Self {
        self.lane_change_controller = controller;
        self
    }

    /// Set routing controller
    pub fn routing_controller(mut self, controller: RoutingController) -> Self {
        self.routing_controller = Some(controller);
        self
    }

    /// Set car-following parameters
    pub fn car_following_params(mut self, params: CarFollowingParams) -> Self {
        self.car_following_params = params;
        self
    }

    /// Set lane-change parameters
    pub fn lane_change_params(mut self, params: LaneChangeParams) -> Self {
        self.lane_change_params = params;
        self
    }

    /// Set speed mode
    pub fn speed_mode(mut self, mode: impl Into<SpeedMode>) -> Self {
        self.speed_mode = mode.into();
        self
    }

    /// Set lane-change mode
    pub fn lane_change_mode(mut self, mode: impl Into<LaneChangeMode>) -> Self {
        self.lane_change_mode = mode.into();
        self
    }

    /// Set initial speed
    pub fn initial_speed(mut self, speed: f64) -> Self {
        self.initial_speed = Some(speed);
        self
    }

    /// Whether this class is driven by the learning agent
    pub fn is_rl(&self) -> bool {
        self.acceleration_controller.is_rl()
    }

    /// Instance identifiers, `"{veh_id}_{i}"`
    pub fn instance_ids(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.num_vehicles).map(move |i| format!("{}_{}", self.veh_id, i))
    }
}

/// Ordered vehicle population
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<VehicleClass>", into = "Vec<VehicleClass>")]
pub struct Vehicles {
    classes: Vec<VehicleClass>,
}

impl Vehicles {
    /// Create an empty population
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a class
    ///
    /// Fails if a class with the same identifier is already present; the
    /// population is left unchanged in that case.
    pub fn add(&mut self, class: VehicleClass) -> Result<&mut Self, ConfigError> {
        if self.get(&class.veh_id).is_some() {
            return Err(ConfigError::DuplicateVehicle(class.veh_id));
        }
        tracing::debug!(veh_id = %class.veh_id, count = class.num_vehicles, "added vehicle class");
        self.classes.push(class);
        Ok(self)
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class has been added
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Total number of vehicle instances
    pub fn num_vehicles(&self) -> usize {
        self.classes.iter().map(|c| c.num_vehicles).sum()
    }

    /// Number of instances driven by the learning agent
    pub fn num_rl_vehicles(&self) -> usize {
        self.classes.iter().filter(|c| c.is_rl()).map(|c| c.num_vehicles).sum()
    }

    /// Look up a class by identifier
    pub fn get(&self, veh_id: &str) -> Option<&VehicleClass> {
        self.classes.iter().find(|c| c.veh_id == veh_id)
    }

    /// Classes in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, VehicleClass> {
        self.classes.iter()
    }

    /// Instance ids in placement order, paired with their class index
    pub fn instances(&self) -> Vec<(String, usize)> {
        self.classes
            .iter()
            .enumerate()
            .flat_map(|(idx, class)| class.instance_ids().map(move |id| (id, idx)))
            .collect()
    }

    /// Class by position in insertion order
    pub fn class(&self, index: usize) -> Option<&VehicleClass> {
        self.classes.get(index)
    }
}

impl TryFrom<Vec<VehicleClass>> for Vehicles {
    type Error = ConfigError;

    fn try_from(classes: Vec<VehicleClass>) -> Result<Self, Self::Error> {
        let mut vehicles = Vehicles::new();
        for class in classes {
            vehicles.add(class)?;
        }
        Ok(vehicles)
    }
}

impl From<Vehicles> for Vec<VehicleClass> {
    fn from(vehicles: Vehicles) -> Self {
        vehicles.classes
    }
}

impl<'a> IntoIterator for &'a Vehicles {
    type Item = &'a VehicleClass;
    type IntoIter = std::slice::Iter<'a, VehicleClass>;

    fn into_iter(self) -> Self::IntoIter {
        self.classes.iter()
    }
}
