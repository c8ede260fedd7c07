//! Environment factory registry
//!
//! [`make_create_env`] turns a parameter bundle into a zero-argument
//! environment constructor plus a deterministic name. An [`EnvRegistry`]
//! maps those names to constructors for the lifetime of one training job;
//! trainers resolve jobs against it by name.
//!
//! # Example
//!
//! ```rust
//! use flow_rl::presets;
//! use flow_rl::registry::{make_create_env, EnvRegistry};
//!
//! let params = presets::merge().unwrap();
//! let (factory, name) = make_create_env(&params, 0).unwrap();
//! assert_eq!(name, "merge-v0");
//!
//! let mut registry = EnvRegistry::new();
//! registry.register(name.clone(), factory).unwrap();
//! let mut env = registry.create_env(&name).unwrap();
//! env.reset().unwrap();
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::env::BoxedEnv;
use crate::error::{ConfigError, Result};
use crate::flow_params::FlowParams;
use crate::sim::{kinematic_factory, SimulatorFactory};

/// Zero-argument environment constructor
///
/// Every call builds a fresh scenario, simulator backend and environment;
/// no mutable state is shared between the instances it returns.
pub type EnvFactory = Arc<dyn Fn() -> Result<BoxedEnv> + Send + Sync>;

/// Registered name for version `version` of an experiment
pub fn env_name(exp_tag: &str, version: u32) -> String {
    format!("{exp_tag}-v{version}")
}

/// Build a factory over the built-in kinematic backend
///
/// The bundle is validated before anything is returned, so a missing tunable
/// surfaces here rather than inside a worker.
pub fn make_create_env(params: &FlowParams, version: u32) -> Result<(EnvFactory, String)> {
    make_create_env_with(params, version, kinematic_factory())
}

/// Build a factory over a caller-supplied simulator backend
pub fn make_create_env_with(
    params: &FlowParams,
    version: u32,
    simulator: SimulatorFactory,
) -> Result<(EnvFactory, String)> {
    params.validate()?;

    let name = env_name(&params.exp_tag, version);
    let params = Arc::new(params.clone());
    tracing::debug!("Built environment factory {} ({})", name, params.env_name);

    let factory: EnvFactory = Arc::new(move || {
        let backend = simulator();
        params.env_name.build(&params, backend)
    });
    Ok((factory, name))
}

/// Name-to-factory mapping scoped to one training job
///
/// Names are write-once: registering a name a second time is an error so a
/// factory that workers may already be using is never shadowed.
#[derive(Default, Clone)]
pub struct EnvRegistry {
    factories: BTreeMap<String, EnvFactory>,
}

impl EnvRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`
    pub fn register(&mut self, name: impl Into<String>, factory: EnvFactory) -> std::result::Result<(), ConfigError> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(ConfigError::DuplicateEnvironment(name));
        }
        tracing::info!("Registered environment {}", name);
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Construct a fresh environment registered under `name`
    pub fn create_env(&self, name: &str) -> Result<BoxedEnv> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownEnvironment(name.to_string()))?;
        factory()
    }

    /// Factory registered under `name`
    pub fn get(&self, name: &str) -> Option<&EnvFactory> {
        self.factories.get(name)
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Number of registered environments
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for EnvRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvRegistry").field("names", &self.factories.keys().collect::<Vec<_>>()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::presets;

    #[test]
    fn test_name_is_deterministic() {
        let params = presets::merge().unwrap();
        let (_, a) = make_create_env(&params, 0).unwrap();
        let (_, b) = make_create_env(&params, 0).unwrap();
        assert_eq!(a, b);

        let mut other = params.clone();
        other.exp_tag = "merge_other".to_string();
        let (_, c) = make_create_env(&other, 0).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_bundle_fails_before_factory() {
        let mut params = presets::merge().unwrap();
        params.env.additional_params = Default::default();
        let err = make_create_env(&params, 0).err().unwrap();
        assert!(matches!(err, Error::Config(ConfigError::MissingParam { scope: "env", .. })));
    }

    #[test]
    fn test_duplicate_registration() {
        let params = presets::merge().unwrap();
        let (factory, name) = make_create_env(&params, 0).unwrap();

        let mut registry = EnvRegistry::new();
        registry.register(name.clone(), factory.clone()).unwrap();
        let err = registry.register(name.clone(), factory).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateEnvironment(n) if n == name));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_name() {
        let registry = EnvRegistry::new();
        let err = registry.create_env("missing-v0").err().unwrap();
        assert!(matches!(err, Error::Config(ConfigError::UnknownEnvironment(_))));
    }

    #[test]
    fn test_factory_instances_are_independent() {
        let params = presets::merge().unwrap();
        let (factory, _) = make_create_env(&params, 0).unwrap();

        let mut first = factory().unwrap();
        let mut second = factory().unwrap();
        first.reset().unwrap();
        second.reset().unwrap();

        let action = vec![0.0; first.action_space().shape[0]];
        for _ in 0..5 {
            first.step(action.clone()).unwrap();
        }
        assert_eq!(first.step_count(), 5);
        assert_eq!(second.step_count(), 0);
    }
}
