//! Error taxonomy
//!
//! Configuration problems are reported as soon as a parameter object, scenario
//! or registry entry is built. Simulator and trainer failures come from the
//! external collaborators and are passed through untouched.

use thiserror::Error;

/// Problems detected while assembling an experiment
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A vehicle class with this identifier was already added
    #[error("duplicate vehicle identifier: {0}")]
    DuplicateVehicle(String),

    /// An environment was already registered under this name
    #[error("environment already registered: {0}")]
    DuplicateEnvironment(String),

    /// A tunable required by the environment or network is absent
    #[error("missing required {scope} parameter '{key}'")]
    MissingParam {
        /// Which parameter mapping was inspected (env, net, initial)
        scope: &'static str,
        /// The key that was expected
        key: String,
    },

    /// No factory is registered under this name
    #[error("no environment registered under '{0}'")]
    UnknownEnvironment(String),

    /// The bundle names an environment kind this crate does not provide
    #[error("unknown environment kind: {0}")]
    UnknownEnvKind(String),

    /// The bundle names a network kind this crate does not provide
    #[error("unknown network kind: {0}")]
    UnknownNetwork(String),

    /// A field holds a value outside its allowed range
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// The bundle could not be written to or read from its canonical text
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A saved configuration could not be read or written
    #[error("configuration i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue { field, reason: reason.into() }
    }
}

/// Failures raised by a simulator backend
#[derive(Debug, Error)]
pub enum SimulatorError {
    /// `step` or `reset` was called before a scenario was loaded
    #[error("simulator has no scenario loaded")]
    NotLoaded,

    /// A command addressed a vehicle the backend does not know
    #[error("unknown vehicle: {0}")]
    UnknownVehicle(String),

    /// Two vehicles overlapped
    #[error("collision between {follower} and {leader}")]
    Collision {
        /// Rear vehicle
        follower: String,
        /// Front vehicle
        leader: String,
    },

    /// Any other backend failure
    #[error("simulator backend failure: {0}")]
    Backend(String),
}

/// Failures reported by the trainer boundary
#[derive(Debug, Error)]
pub enum TrainerError {
    /// Worker failures in one trial went past `max_failures`
    #[error("trial {trial} of '{experiment}' failed {failures} times, over the retry budget")]
    MaxFailuresExceeded {
        /// Experiment tag
        experiment: String,
        /// Repeat index of the failing trial
        trial: usize,
        /// Failures observed
        failures: usize,
    },

    /// A job references an environment name the registry cannot resolve
    #[error("job '{experiment}' references unregistered environment '{env}'")]
    UnknownEnvironment {
        /// Experiment tag
        experiment: String,
        /// Environment name from the job descriptor
        env: String,
    },

    /// The job descriptor is unusable
    #[error("invalid job: {0}")]
    Config(#[from] ConfigError),

    /// Checkpoint output failed
    #[error("checkpoint i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide error
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Simulator error
    #[error(transparent)]
    Simulator(#[from] SimulatorError),

    /// Trainer error
    #[error(transparent)]
    Trainer(#[from] TrainerError),
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;
