//! Physical and behavioral parameters handed to the simulator adapter
//!
//! Values are passed through as-is, except the car-following limits a backend
//! clamps against, which must be finite and non-negative.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Car-following parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarFollowingParams {
    /// Maximum acceleration (m/s²)
    pub accel: f64,

    /// Maximum deceleration (m/s²)
    pub decel: f64,

    /// Driver imperfection in [0, 1]
    pub sigma: f64,

    /// Reaction time (s)
    pub tau: f64,

    /// Minimum gap to the leader (m)
    pub min_gap: f64,

    /// Maximum speed (m/s)
    pub max_speed: f64,

    /// Multiplier on the lane speed limit
    pub speed_factor: f64,

    /// Deviation of `speed_factor`
    pub speed_dev: f64,

    /// Willingness to impede vehicles with higher priority
    pub impatience: f64,

    /// Car-following model name understood by the simulator
    pub car_follow_model: String,
}

impl Default for CarFollowingParams {
    fn default() -> Self {
        Self {
            accel: 2.6,
            decel: 7.5,
            sigma: 0.5,
            tau: 1.0,
            min_gap: 2.5,
            max_speed: 30.0,
            speed_factor: 1.0,
            speed_dev: 0.1,
            impatience: 0.5,
            car_follow_model: "IDM".to_string(),
        }
    }
}

impl CarFollowingParams {
    /// Create default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set minimum gap
    pub fn min_gap(mut self, min_gap: f64) -> Self {
        self.min_gap = min_gap;
        self
    }

    /// Set reaction time
    pub fn tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    /// Set maximum acceleration
    pub fn accel(mut self, accel: f64) -> Self {
        self.accel = accel;
        self
    }

    /// Set maximum deceleration
    pub fn decel(mut self, decel: f64) -> Self {
        self.decel = decel;
        self
    }

    /// Set maximum speed
    pub fn max_speed(mut self, max_speed: f64) -> Self {
        self.max_speed = max_speed;
        self
    }

    /// Check the acceleration and speed limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("car_following_params.accel", self.accel),
            ("car_following_params.decel", self.decel),
            ("car_following_params.max_speed", self.max_speed),
            ("car_following_params.speed_factor", self.speed_factor),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field, format!("must be finite and non-negative, got {value}")));
            }
        }
        Ok(())
    }
}

/// Lane-change parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneChangeParams {
    /// Lane-change model name understood by the simulator
    pub model: String,

    /// Eagerness for strategic lane changes
    pub lc_strategic: f64,

    /// Willingness to cooperate with other drivers
    pub lc_cooperative: f64,

    /// Eagerness for lane changes that gain speed
    pub lc_speed_gain: f64,

    /// Eagerness to keep right
    pub lc_keep_right: f64,
}

impl Default for LaneChangeParams {
    fn default() -> Self {
        Self {
            model: "LC2013".to_string(),
            lc_strategic: 1.0,
            lc_cooperative: 1.0,
            lc_speed_gain: 1.0,
            lc_keep_right: 1.0,
        }
    }
}

/// Speed-safety mode tag
///
/// The set of valid tags belongs to the simulator adapter; the value is kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeedMode(String);

impl SpeedMode {
    /// Wrap a tag
    pub fn new(tag: impl Into<String>) -> Self {
        SpeedMode(tag.into())
    }

    /// The raw tag
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SpeedMode {
    fn default() -> Self {
        SpeedMode::new("right_of_way")
    }
}

impl From<&str> for SpeedMode {
    fn from(tag: &str) -> Self {
        SpeedMode::new(tag)
    }
}

/// Lane-change safety mode tag, passed through like [`SpeedMode`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaneChangeMode(String);

impl LaneChangeMode {
    /// Wrap a tag
    pub fn new(tag: impl Into<String>) -> Self {
        LaneChangeMode(tag.into())
    }

    /// The raw tag
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LaneChangeMode {
    fn default() -> Self {
        LaneChangeMode::new("no_lat_collide")
    }
}

impl From<&str> for LaneChangeMode {
    fn from(tag: &str) -> Self {
        LaneChangeMode::new(tag)
    }
}
