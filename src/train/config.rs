//! Trainer configuration and hyperparameters
//!
//! A [`TrainerConfig`] is the algorithm's default mapping with the
//! experiment's overrides written on top. Well-known keys get typed setters;
//! anything else goes through [`TrainerConfig::set`]. The parameter bundle
//! is embedded in canonical text form under `env_config.flow_params` so a
//! trainer run can be replayed from its configuration alone.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ConfigError;
use crate::flow_params::FlowParams;

/// Key of the environment configuration mapping
pub const ENV_CONFIG_KEY: &str = "env_config";

/// Key of the canonical bundle text inside the environment configuration
pub const FLOW_PARAMS_KEY: &str = "flow_params";

/// Training algorithm a job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// Asynchronous advantage actor-critic
    #[serde(rename = "A3C")]
    A3c,
    /// Proximal policy optimization
    #[serde(rename = "PPO")]
    Ppo,
}

impl Algorithm {
    /// Name the trainer knows the algorithm by
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::A3c => "A3C",
            Algorithm::Ppo => "PPO",
        }
    }

    /// Default hyperparameters of the algorithm
    pub fn default_config(self) -> BTreeMap<String, Value> {
        let common = json!({
            "num_workers": 2,
            "gamma": 0.99,
            "horizon": null,
            "model": { "fcnet_hiddens": [256, 256] },
            "env_config": {},
        });
        let specific = match self {
            Algorithm::A3c => json!({
                "train_batch_size": 200,
                "sample_batch_size": 10,
                "lr": 0.0001,
                "use_gae": true,
                "lambda": 1.0,
                "grad_clip": 40.0,
                "vf_loss_coeff": 0.5,
                "entropy_coeff": 0.01,
            }),
            Algorithm::Ppo => json!({
                "train_batch_size": 4000,
                "sgd_minibatch_size": 128,
                "num_sgd_iter": 30,
                "lr": 0.00005,
                "use_gae": true,
                "lambda": 1.0,
                "clip_param": 0.3,
                "kl_coeff": 0.2,
                "vf_loss_coeff": 1.0,
                "entropy_coeff": 0.0,
            }),
        };

        let mut config = BTreeMap::new();
        for value in [common, specific] {
            if let Value::Object(map) = value {
                config.extend(map);
            }
        }
        config
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Policy network selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Hidden layer sizes of the built-in fully connected network
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fcnet_hiddens: Vec<usize>,

    /// Name of a model registered with the trainer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_model: Option<String>,

    /// Options forwarded to the custom model
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_options: BTreeMap<String, Value>,
}

impl ModelConfig {
    /// Built-in fully connected network
    pub fn fully_connected(hiddens: Vec<usize>) -> Self {
        Self { fcnet_hiddens: hiddens, custom_model: None, custom_options: BTreeMap::new() }
    }

    /// Model registered with the trainer under `name`
    pub fn custom(name: impl Into<String>) -> Self {
        Self { fcnet_hiddens: Vec::new(), custom_model: Some(name.into()), custom_options: BTreeMap::new() }
    }
}

impl From<ModelConfig> for Value {
    fn from(model: ModelConfig) -> Self {
        let mut map = Map::new();
        if !model.fcnet_hiddens.is_empty() {
            map.insert("fcnet_hiddens".to_string(), Value::from(model.fcnet_hiddens));
        }
        if let Some(name) = model.custom_model {
            map.insert("custom_model".to_string(), Value::String(name));
        }
        if !model.custom_options.is_empty() {
            map.insert("custom_options".to_string(), Value::Object(model.custom_options.into_iter().collect()));
        }
        Value::Object(map)
    }
}

/// Hyperparameter mapping handed to the trainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainerConfig {
    values: BTreeMap<String, Value>,
}

impl TrainerConfig {
    /// Defaults of `algorithm`
    pub fn new(algorithm: Algorithm) -> Self {
        Self { values: algorithm.default_config() }
    }

    /// Set number of parallel workers
    pub fn num_workers(self, n: usize) -> Self {
        self.set("num_workers", n)
    }

    /// Set timesteps collected per training iteration
    pub fn train_batch_size(self, size: usize) -> Self {
        self.set("train_batch_size", size)
    }

    /// Set discount factor
    pub fn gamma(self, gamma: f64) -> Self {
        self.set("gamma", gamma)
    }

    /// Set rollout horizon
    pub fn horizon(self, horizon: usize) -> Self {
        self.set("horizon", horizon)
    }

    /// Set policy model
    pub fn model(self, model: ModelConfig) -> Self {
        self.set("model", model)
    }

    /// Override any key
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Embed the canonical text form of `params` under
    /// `env_config.flow_params`
    pub fn set_flow_params(&mut self, params: &FlowParams) -> Result<(), ConfigError> {
        let text = params.to_canonical_json()?;
        let env_config = self
            .values
            .entry(ENV_CONFIG_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match env_config {
            Value::Object(map) => {
                map.insert(FLOW_PARAMS_KEY.to_string(), Value::String(text));
                Ok(())
            }
            _ => Err(ConfigError::invalid("env_config", "must be a mapping")),
        }
    }

    /// Canonical bundle text, if one was embedded
    pub fn flow_params_json(&self) -> Option<&str> {
        self.values.get(ENV_CONFIG_KEY)?.get(FLOW_PARAMS_KEY)?.as_str()
    }

    /// Raw value of `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Value of `key` as a non-negative integer
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.values.get(key)?.as_u64().map(|v| v as usize)
    }

    /// Value of `key` as a float
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key)?.as_f64()
    }

    /// All keys and values
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Validate the well-known keys
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(value) = self.values.get("num_workers") {
            if value.as_u64().is_none() {
                return Err(ConfigError::invalid("num_workers", "must be a non-negative integer"));
            }
        }
        match self.values.get("train_batch_size") {
            Some(value) if value.as_u64().map_or(true, |v| v == 0) => {
                return Err(ConfigError::invalid("train_batch_size", "must be a positive integer"));
            }
            _ => {}
        }
        if let Some(gamma) = self.values.get("gamma") {
            match gamma.as_f64() {
                Some(g) if (0.0..=1.0).contains(&g) => {}
                _ => return Err(ConfigError::invalid("gamma", "must be in [0, 1]")),
            }
        }
        match self.values.get("horizon") {
            None | Some(Value::Null) => {}
            Some(value) if value.as_u64().map_or(false, |v| v > 0) => {}
            Some(_) => return Err(ConfigError::invalid("horizon", "must be a positive integer or null")),
        }
        if let Some(env_config) = self.values.get(ENV_CONFIG_KEY) {
            if !env_config.is_object() {
                return Err(ConfigError::invalid("env_config", "must be a mapping"));
            }
        }
        Ok(())
    }
}
