//! Simulation, environment, network and initial-placement parameters
//!
//! Every struct here follows the same shape: a `Default` that matches the
//! usual experiment setup, consuming builder setters, and a `validate` that
//! reports the first invalid field.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Rendering mode of the simulator adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// No rendering
    #[default]
    Off,
    /// Interactive simulator GUI
    Gui,
    /// Static grayscale frames
    Gray,
    /// Dynamic grayscale frames
    #[value(name = "dgray")]
    DGray,
    /// Static RGB frames
    Rgb,
    /// Dynamic RGB frames
    #[value(name = "drgb")]
    DRgb,
}

impl RenderMode {
    /// Whether the mode produces pixel frames rather than a GUI
    pub fn is_pixel(self) -> bool {
        matches!(self, RenderMode::Gray | RenderMode::DGray | RenderMode::Rgb | RenderMode::DRgb)
    }

    /// Whether anything is rendered at all
    pub fn is_enabled(self) -> bool {
        self != RenderMode::Off
    }

    /// Tag used on the command line and in saved configurations
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Off => "off",
            RenderMode::Gui => "gui",
            RenderMode::Gray => "gray",
            RenderMode::DGray => "dgray",
            RenderMode::Rgb => "rgb",
            RenderMode::DRgb => "drgb",
        }
    }
}

/// Named numeric tunables consumed by an environment or network
///
/// Lookups never fall back to a default; a missing key is a configuration
/// error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdditionalParams(BTreeMap<String, f64>);

impl AdditionalParams {
    /// Empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Insert or replace a value in place
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    /// Raw lookup
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    /// Lookup that fails with [`ConfigError::MissingParam`]
    pub fn require(&self, scope: &'static str, key: &str) -> Result<f64, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingParam { scope, key: key.to_string() })
    }

    /// Lookup of a count-valued tunable (non-negative integer)
    pub fn require_count(&self, scope: &'static str, key: &str) -> Result<usize, ConfigError> {
        let value = self.require(scope, key)?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(ConfigError::invalid(scope, format!("'{key}' must be a non-negative integer, got {value}")));
        }
        Ok(value as usize)
    }

    /// Lookup of a finite, non-negative tunable such as an acceleration bound
    pub fn require_non_negative(&self, scope: &'static str, key: &str) -> Result<f64, ConfigError> {
        let value = self.require(scope, key)?;
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::invalid(scope, format!("'{key}' must be finite and non-negative, got {value}")));
        }
        Ok(value)
    }

    /// Check that every key in `required` is present
    pub fn check_required(&self, scope: &'static str, required: &[&str]) -> Result<(), ConfigError> {
        for key in required {
            self.require(scope, key)?;
        }
        Ok(())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the mapping is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for AdditionalParams {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        AdditionalParams(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Simulator runtime parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Duration of one simulation step (s)
    pub sim_step: f64,

    /// Rendering mode
    pub render: RenderMode,

    /// Whether rendered frames are written to disk
    pub save_render: bool,

    /// Seed for placement and controller noise; entropy when absent
    pub seed: Option<u64>,

    /// Where the simulator writes emission output, if anywhere
    pub emission_path: Option<PathBuf>,

    /// Radius (m) around observed vehicles used by pixel observations
    pub sight_radius: f64,

    /// Pixels per meter of pixel observations
    pub pxpm: u32,

    /// Restart the simulator process on every reset
    pub restart_instance: bool,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            sim_step: 0.1,
            render: RenderMode::Off,
            save_render: false,
            seed: None,
            emission_path: None,
            sight_radius: 25.0,
            pxpm: 2,
            restart_instance: false,
        }
    }
}

impl SimParams {
    /// Create default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set step duration
    pub fn sim_step(mut self, sim_step: f64) -> Self {
        self.sim_step = sim_step;
        self
    }

    /// Set rendering mode
    pub fn render(mut self, render: RenderMode) -> Self {
        self.render = render;
        self
    }

    /// Set frame saving
    pub fn save_render(mut self, save: bool) -> Self {
        self.save_render = save;
        self
    }

    /// Set seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sim_step > 0.0) {
            return Err(ConfigError::invalid("sim.sim_step", "must be positive"));
        }
        if self.save_render && !self.render.is_pixel() {
            return Err(ConfigError::invalid("sim.save_render", "requires a pixel render mode"));
        }
        if self.sight_radius < 0.0 {
            return Err(ConfigError::invalid("sim.sight_radius", "must be non-negative"));
        }
        Ok(())
    }
}

/// Environment parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvParams {
    /// Steps per rollout
    pub horizon: usize,

    /// Environment-specific tunables
    pub additional_params: AdditionalParams,

    /// Simulation steps per environment step
    pub sims_per_step: usize,

    /// Simulation steps run after every reset before the agent acts
    pub warmup_steps: usize,

    /// Report the evaluation reward instead of the training reward
    pub evaluate: bool,
}

impl Default for EnvParams {
    fn default() -> Self {
        Self {
            horizon: 500,
            additional_params: AdditionalParams::new(),
            sims_per_step: 1,
            warmup_steps: 0,
            evaluate: false,
        }
    }
}

impl EnvParams {
    /// Create default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set horizon
    pub fn horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    /// Set tunables
    pub fn additional_params(mut self, params: AdditionalParams) -> Self {
        self.additional_params = params;
        self
    }

    /// Set warmup steps
    pub fn warmup_steps(mut self, steps: usize) -> Self {
        self.warmup_steps = steps;
        self
    }

    /// Set simulation steps per environment step
    pub fn sims_per_step(mut self, n: usize) -> Self {
        self.sims_per_step = n;
        self
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon == 0 {
            return Err(ConfigError::invalid("env.horizon", "must be positive"));
        }
        if self.sims_per_step == 0 {
            return Err(ConfigError::invalid("env.sims_per_step", "must be positive"));
        }
        Ok(())
    }
}

/// Network parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetParams {
    /// Skip generation of internal junction links
    pub no_internal_links: bool,

    /// Network-specific tunables
    pub additional_params: AdditionalParams,
}

impl Default for NetParams {
    fn default() -> Self {
        Self { no_internal_links: true, additional_params: AdditionalParams::new() }
    }
}

impl NetParams {
    /// Create default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set internal-link generation flag
    pub fn no_internal_links(mut self, flag: bool) -> Self {
        self.no_internal_links = flag;
        self
    }

    /// Set tunables
    pub fn additional_params(mut self, params: AdditionalParams) -> Self {
        self.additional_params = params;
        self
    }
}

/// Initial spacing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spacing {
    /// Equal gaps
    #[default]
    Uniform,
    /// Random gaps, never closer than the minimum headway
    Random,
}

/// Initial placement parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialConfig {
    /// Shuffle vehicle order on every reset
    pub shuffle: bool,

    /// Spacing policy
    pub spacing: Spacing,

    /// Extra gap between vehicles at placement (m)
    pub min_gap: f64,

    /// Maximum uniform perturbation of uniform positions (m)
    pub perturbation: f64,

    /// Position of the first vehicle (m)
    pub x0: f64,

    /// Length of road left empty behind the platoon (m)
    pub bunching: f64,

    /// Scenario-specific tunables
    pub additional_params: AdditionalParams,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            shuffle: false,
            spacing: Spacing::Uniform,
            min_gap: 0.0,
            perturbation: 0.0,
            x0: 0.0,
            bunching: 0.0,
            additional_params: AdditionalParams::new(),
        }
    }
}

impl InitialConfig {
    /// Create default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set spacing policy
    pub fn spacing(mut self, spacing: Spacing) -> Self {
        self.spacing = spacing;
        self
    }

    /// Set origin offset
    pub fn x0(mut self, x0: f64) -> Self {
        self.x0 = x0;
        self
    }

    /// Set bunching
    pub fn bunching(mut self, bunching: f64) -> Self {
        self.bunching = bunching;
        self
    }

    /// Set perturbation
    pub fn perturbation(mut self, perturbation: f64) -> Self {
        self.perturbation = perturbation;
        self
    }

    /// Set shuffling
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set tunables
    pub fn additional_params(mut self, params: AdditionalParams) -> Self {
        self.additional_params = params;
        self
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_gap < 0.0 {
            return Err(ConfigError::invalid("initial.min_gap", "must be non-negative"));
        }
        if self.perturbation < 0.0 {
            return Err(ConfigError::invalid("initial.perturbation", "must be non-negative"));
        }
        if self.bunching < 0.0 {
            return Err(ConfigError::invalid("initial.bunching", "must be non-negative"));
        }
        Ok(())
    }
}
