//! Behavioral controller specifications
//!
//! Each vehicle class names one controller per concern. Options are carried
//! as typed structs so a misspelled tunable fails when the experiment is
//! written rather than when the simulator first asks for it.

use serde::{Deserialize, Serialize};

/// Longitudinal (acceleration) controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "options")]
pub enum AccelerationController {
    /// Intelligent Driver Model
    #[serde(rename = "IDMController")]
    Idm(IdmOptions),

    /// Delegate to the simulator's own car-following model
    #[serde(rename = "SumoCarFollowingController")]
    SimulatorDefault,

    /// Acceleration is supplied by the learning agent
    #[serde(rename = "RLController")]
    Rl,
}

impl AccelerationController {
    /// IDM with default options
    pub fn idm() -> Self {
        AccelerationController::Idm(IdmOptions::default())
    }

    /// Whether the acceleration comes from the agent's action
    pub fn is_rl(&self) -> bool {
        matches!(self, AccelerationController::Rl)
    }
}

/// Lane-change controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LaneChangeController {
    /// Never change lanes
    #[serde(rename = "StaticLaneChanger")]
    Static,

    /// Delegate to the simulator's lane-change model
    #[serde(rename = "SumoLaneChangeController")]
    SimulatorDefault,
}

impl Default for LaneChangeController {
    fn default() -> Self {
        LaneChangeController::SimulatorDefault
    }
}

/// Routing controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RoutingController {
    /// Re-route onto the current loop when the route ends
    #[serde(rename = "ContinuousRouter")]
    Continuous,

    /// Route choice on the minicity network
    #[serde(rename = "MinicityRouter")]
    Minicity,
}

/// Intelligent Driver Model tunables
///
/// Defaults match the commonly used passenger-car calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdmOptions {
    /// Desired speed (m/s)
    pub v0: f64,

    /// Desired time headway (s)
    pub t: f64,

    /// Maximum acceleration (m/s²)
    pub a: f64,

    /// Comfortable deceleration (m/s²)
    pub b: f64,

    /// Acceleration exponent
    pub delta: f64,

    /// Linear jam distance (m)
    pub s0: f64,

    /// Magnitude of the uniform noise added to every command (m/s²)
    pub noise: f64,
}

impl Default for IdmOptions {
    fn default() -> Self {
        Self { v0: 30.0, t: 1.0, a: 1.0, b: 1.5, delta: 4.0, s0: 2.0, noise: 0.0 }
    }
}

impl IdmOptions {
    /// Set desired speed
    pub fn v0(mut self, v0: f64) -> Self {
        self.v0 = v0;
        self
    }

    /// Set desired time headway
    pub fn time_headway(mut self, t: f64) -> Self {
        self.t = t;
        self
    }

    /// Set acceleration noise
    pub fn noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Noise-free IDM acceleration
    ///
    /// `headway` is the bumper-to-bumper gap to the leader; `None` means free
    /// road.
    pub fn acceleration(&self, speed: f64, leader: Option<(f64, f64)>) -> f64 {
        let free_road = 1.0 - (speed / self.v0).powf(self.delta);
        match leader {
            None => self.a * free_road,
            Some((headway, lead_speed)) => {
                let dynamic = speed * self.t
                    + speed * (speed - lead_speed) / (2.0 * (self.a * self.b).sqrt());
                let s_star = self.s0 + dynamic.max(0.0);
                let h = headway.max(1e-3);
                self.a * (free_road - (s_star / h).powi(2))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idm_free_road_accelerates() {
        let idm = IdmOptions::default();
        let accel = idm.acceleration(0.0, None);
        assert!((accel - idm.a).abs() < 1e-9);

        // At desired speed there is no free-road push
        assert!(idm.acceleration(idm.v0, None).abs() < 1e-9);
    }

    #[test]
    fn test_idm_brakes_when_close() {
        let idm = IdmOptions::default();
        let accel = idm.acceleration(10.0, Some((3.0, 0.0)));
        assert!(accel < -idm.b, "Expected hard braking, got {}", accel);
    }

    #[test]
    fn test_controller_serialization_shape() {
        let json = serde_json::to_value(AccelerationController::idm()).unwrap();
        assert_eq!(json["kind"], "IDMController");
        assert_eq!(json["options"]["v0"], 30.0);

        let json = serde_json::to_value(AccelerationController::Rl).unwrap();
        assert_eq!(json["kind"], "RLController");

        let json = serde_json::to_value(RoutingController::Minicity).unwrap();
        assert_eq!(json["kind"], "MinicityRouter");
    }

    #[test]
    fn test_partial_options_use_defaults() {
        let ctrl: AccelerationController =
            serde_json::from_str(r#"{"kind":"IDMController","options":{"noise":0.2}}"#).unwrap();
        assert_eq!(ctrl, AccelerationController::Idm(IdmOptions::default().noise(0.2)));
    }
}
