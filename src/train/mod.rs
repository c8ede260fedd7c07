//! Distributed training boundary
//!
//! A trainer receives [`Experiments`] (job descriptors keyed by experiment
//! tag) together with the [`EnvRegistry`](crate::registry::EnvRegistry) the
//! job names resolve against. [`LocalTrainer`] is the in-process
//! implementation; an external trainer plugs in through [`Trainer`].

pub mod config;
pub mod job;
pub mod local;

pub use config::{Algorithm, ModelConfig, TrainerConfig, ENV_CONFIG_KEY, FLOW_PARAMS_KEY};
pub use job::{Experiments, JobDescriptor, StopCondition, Trainer, TrialRecord};
pub use local::LocalTrainer;
