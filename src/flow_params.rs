//! Scenario parameter bundle
//!
//! `FlowParams` groups everything needed to rebuild an experiment: the
//! environment and network kinds, simulator settings, the vehicle population
//! and the initial placement policy. It is built once and only read
//! afterwards; the registry wraps it in an `Arc` and every environment
//! instance rebuilds its own scenario from it.
//!
//! The canonical text form sorts keys at every level and indents by four
//! spaces, so equal bundles always serialize to identical bytes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::env::EnvKind;
use crate::error::ConfigError;
use crate::params::{EnvParams, InitialConfig, NetParams, SimParams};
use crate::scenario::{NetworkKind, Scenario};
use crate::vehicles::Vehicles;

/// Parameter bundle for one experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowParams {
    /// Experiment tag; names the registered environment and the trainer job
    pub exp_tag: String,

    /// Environment implementation
    pub env_name: EnvKind,

    /// Network implementation
    pub scenario: NetworkKind,

    /// Generator used to write the network description
    pub generator: String,

    /// Simulator runtime parameters
    pub sim: SimParams,

    /// Environment parameters
    pub env: EnvParams,

    /// Network parameters
    pub net: NetParams,

    /// Vehicle population
    pub veh: Vehicles,

    /// Initial placement parameters
    pub initial: InitialConfig,
}

impl FlowParams {
    /// Bundle with default simulator, environment, network and placement
    /// parameters
    ///
    /// Network tunables start from the network's defaults; environment
    /// tunables start empty and must be filled in.
    pub fn new(
        exp_tag: impl Into<String>,
        env_name: EnvKind,
        scenario: NetworkKind,
        veh: Vehicles,
    ) -> Self {
        Self {
            exp_tag: exp_tag.into(),
            env_name,
            scenario,
            generator: scenario.generator().to_string(),
            sim: SimParams::default(),
            env: EnvParams::default(),
            net: NetParams::default().additional_params(scenario.default_params()),
            veh,
            initial: InitialConfig::default(),
        }
    }

    /// Set simulator parameters
    pub fn sim(mut self, sim: SimParams) -> Self {
        self.sim = sim;
        self
    }

    /// Set environment parameters
    pub fn env(mut self, env: EnvParams) -> Self {
        self.env = env;
        self
    }

    /// Set network parameters
    pub fn net(mut self, net: NetParams) -> Self {
        self.net = net;
        self
    }

    /// Set initial placement parameters
    pub fn initial(mut self, initial: InitialConfig) -> Self {
        self.initial = initial;
        self
    }

    /// Check every field and every tunable the environment and network need
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exp_tag.is_empty() {
            return Err(ConfigError::invalid("exp_tag", "must not be empty"));
        }
        self.sim.validate()?;
        self.env.validate()?;
        self.initial.validate()?;
        self.env_name.validate(self)?;
        Scenario::from_params(self)?;
        Ok(())
    }

    /// Canonical text form: sorted keys, four-space indentation
    pub fn to_canonical_json(&self) -> Result<String, ConfigError> {
        let value = sort_keys(serde_json::to_value(self)?);
        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        value.serialize(&mut serializer)?;
        String::from_utf8(buf).map_err(|e| ConfigError::invalid("flow_params", e.to_string()))
    }

    /// Rebuild a bundle from its text form and validate it
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let params: FlowParams = serde_json::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    /// Write the canonical text form to a file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_canonical_json()?)?;
        Ok(())
    }

    /// Load and validate a bundle saved with [`FlowParams::save_json`]
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AdditionalParams;
    use crate::vehicles::{AccelerationController, VehicleClass};

    fn ring_params(tag: &str) -> FlowParams {
        let mut vehicles = Vehicles::new();
        vehicles.add(VehicleClass::new("idm", AccelerationController::idm(), 10)).unwrap();
        vehicles.add(VehicleClass::new("rl", AccelerationController::Rl, 1)).unwrap();

        FlowParams::new(tag, EnvKind::Accel, NetworkKind::Loop, vehicles).env(
            EnvParams::new().horizon(100).additional_params(
                AdditionalParams::new()
                    .with("max_accel", 3.0)
                    .with("max_decel", 3.0)
                    .with("target_velocity", 10.0),
            ),
        )
    }

    #[test]
    fn test_valid_bundle() {
        let params = ring_params("ring");
        assert!(params.validate().is_ok());
        assert_eq!(params.env.horizon, 100);
        assert_eq!(params.generator, "CircleGenerator");
    }

    #[test]
    fn test_missing_env_param() {
        let mut params = ring_params("ring");
        params.env.additional_params = AdditionalParams::new().with("max_accel", 3.0);

        let err = params.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingParam { scope: "env", .. }));
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let mut params = ring_params("ring");
        params.env.horizon = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_canonical_json_is_stable() {
        let a = ring_params("ring").to_canonical_json().unwrap();
        let b = ring_params("ring").to_canonical_json().unwrap();
        assert_eq!(a, b);

        // Keys are sorted and indented by four spaces
        let env_pos = a.find("\"env\"").unwrap();
        let exp_pos = a.find("\"exp_tag\"").unwrap();
        let veh_pos = a.find("\"veh\"").unwrap();
        assert!(env_pos < exp_pos && exp_pos < veh_pos);
        assert!(a.contains("\n    \"env\": {"));
    }

    #[test]
    fn test_json_replay() {
        let params = ring_params("ring");
        let text = params.to_canonical_json().unwrap();
        let restored = FlowParams::from_json(&text).unwrap();
        assert_eq!(restored, params);
        assert_eq!(restored.to_canonical_json().unwrap(), text);
    }
}
