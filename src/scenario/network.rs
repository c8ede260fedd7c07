//! Network catalog
//!
//! Each network kind declares the tunables it needs, the defaults it ships
//! with, and how long a single closed lane through it is.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::params::{AdditionalParams, NetParams};

/// Supported network topologies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkKind {
    /// Single ring road
    #[serde(rename = "LoopScenario")]
    Loop,
    /// Inner ring with an outer loop merging into it
    #[serde(rename = "TwoLoopsOneMergingScenario")]
    TwoLoopsOneMerging,
    /// Scaled-down city network
    #[serde(rename = "MiniCityScenario")]
    MiniCity,
}

impl NetworkKind {
    /// Scenario class name
    pub fn name(self) -> &'static str {
        match self {
            NetworkKind::Loop => "LoopScenario",
            NetworkKind::TwoLoopsOneMerging => "TwoLoopsOneMergingScenario",
            NetworkKind::MiniCity => "MiniCityScenario",
        }
    }

    /// Generator that writes the network description
    pub fn generator(self) -> &'static str {
        match self {
            NetworkKind::Loop => "CircleGenerator",
            NetworkKind::TwoLoopsOneMerging => "TwoLoopOneMergingGenerator",
            NetworkKind::MiniCity => "MiniCityGenerator",
        }
    }

    /// Keys that must be present in `NetParams::additional_params`
    pub fn required_net_params(self) -> &'static [&'static str] {
        match self {
            NetworkKind::Loop => &["length", "lanes", "speed_limit", "resolution"],
            NetworkKind::TwoLoopsOneMerging => &[
                "ring_radius",
                "lane_length",
                "inner_lanes",
                "outer_lanes",
                "speed_limit",
                "resolution",
            ],
            NetworkKind::MiniCity => &["length", "speed_limit"],
        }
    }

    /// Keys that must be present in `InitialConfig::additional_params`
    pub fn required_initial_params(self) -> &'static [&'static str] {
        match self {
            NetworkKind::TwoLoopsOneMerging => &["merge_bunching"],
            _ => &[],
        }
    }

    /// Default network tunables, meant to be copied and edited
    pub fn default_params(self) -> AdditionalParams {
        match self {
            NetworkKind::Loop => AdditionalParams::new()
                .with("length", 230.0)
                .with("lanes", 1.0)
                .with("speed_limit", 30.0)
                .with("resolution", 40.0),
            NetworkKind::TwoLoopsOneMerging => AdditionalParams::new()
                .with("ring_radius", 50.0)
                .with("lane_length", 75.0)
                .with("inner_lanes", 3.0)
                .with("outer_lanes", 2.0)
                .with("speed_limit", 30.0)
                .with("resolution", 40.0),
            NetworkKind::MiniCity => {
                AdditionalParams::new().with("length", 1200.0).with("speed_limit", 30.0)
            }
        }
    }

    /// Length of the closed lane vehicles circulate on (m)
    ///
    /// For the two-loop network this is the inner ring, which is where every
    /// vehicle ends up once the merge completes.
    pub fn loop_length(self, net: &NetParams) -> Result<f64, ConfigError> {
        let params = &net.additional_params;
        let length = match self {
            NetworkKind::Loop | NetworkKind::MiniCity => params.require("net", "length")?,
            NetworkKind::TwoLoopsOneMerging => 2.0 * PI * params.require("net", "ring_radius")?,
        };
        if !(length.is_finite() && length > 0.0) {
            return Err(ConfigError::invalid("net.length", format!("loop length must be positive, got {length}")));
        }
        Ok(length)
    }

    /// Speed limit (m/s)
    pub fn speed_limit(self, net: &NetParams) -> Result<f64, ConfigError> {
        let limit = net.additional_params.require("net", "speed_limit")?;
        if !(limit.is_finite() && limit > 0.0) {
            return Err(ConfigError::invalid("net.speed_limit", format!("must be positive, got {limit}")));
        }
        Ok(limit)
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LoopScenario" => Ok(NetworkKind::Loop),
            "TwoLoopsOneMergingScenario" => Ok(NetworkKind::TwoLoopsOneMerging),
            "MiniCityScenario" => Ok(NetworkKind::MiniCity),
            other => Err(ConfigError::UnknownNetwork(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_satisfy_requirements() {
        for kind in [NetworkKind::Loop, NetworkKind::TwoLoopsOneMerging, NetworkKind::MiniCity] {
            let net = NetParams::new().additional_params(kind.default_params());
            assert!(net.additional_params.check_required("net", kind.required_net_params()).is_ok());
            assert!(kind.loop_length(&net).unwrap() > 0.0);
            assert_eq!(kind.name().parse::<NetworkKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_two_loops_length_is_inner_ring() {
        let kind = NetworkKind::TwoLoopsOneMerging;
        let net = NetParams::new().additional_params(kind.default_params());
        let length = kind.loop_length(&net).unwrap();
        assert!((length - 2.0 * PI * 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_speed_limit_must_be_positive() {
        let kind = NetworkKind::TwoLoopsOneMerging;
        let net = NetParams::new().additional_params(kind.default_params());
        assert_eq!(kind.speed_limit(&net).unwrap(), 30.0);

        for bad in [-1.0, 0.0, f64::NAN] {
            let mut net = net.clone();
            net.additional_params.insert("speed_limit", bad);
            assert!(matches!(
                kind.speed_limit(&net),
                Err(ConfigError::InvalidValue { field: "net.speed_limit", .. })
            ));
        }
    }

    #[test]
    fn test_unknown_network() {
        assert!(matches!(
            "FigureEightScenario".parse::<NetworkKind>(),
            Err(ConfigError::UnknownNetwork(_))
        ));
    }
}
