//! Direct rollouts
//!
//! An [`Experiment`] owns one environment built straight from a parameter
//! bundle, without going through a registry, and steps it for a fixed number
//! of episodes. Simulator errors propagate immediately; nothing is retried.

use serde::Serialize;

use crate::env::BoxedEnv;
use crate::error::Result;
use crate::flow_params::FlowParams;
use crate::sim::{KinematicSimulator, Simulator};

/// Maps an observation to an action
pub type Policy<'a> = &'a dyn Fn(&[f32]) -> Vec<f32>;

/// Per-episode results of [`Experiment::run`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RolloutSummary {
    /// Sum of rewards of each episode
    pub returns: Vec<f64>,
    /// Mean vehicle speed of each episode (m/s)
    pub mean_speeds: Vec<f64>,
    /// Steps taken in each episode
    pub steps: Vec<usize>,
}

impl RolloutSummary {
    /// Average return over all episodes
    pub fn mean_return(&self) -> f64 {
        if self.returns.is_empty() {
            return 0.0;
        }
        self.returns.iter().sum::<f64>() / self.returns.len() as f64
    }

    /// Total environment steps
    pub fn total_steps(&self) -> usize {
        self.steps.iter().sum()
    }
}

/// One environment driven for a fixed budget
pub struct Experiment {
    env: BoxedEnv,
}

impl Experiment {
    /// Wrap an already built environment
    pub fn new(env: BoxedEnv) -> Self {
        Self { env }
    }

    /// Build the bundle's environment on the kinematic backend
    pub fn from_params(params: &FlowParams) -> Result<Self> {
        Self::with_simulator(params, Box::new(KinematicSimulator::new()))
    }

    /// Build the bundle's environment on `simulator`
    pub fn with_simulator(params: &FlowParams, simulator: Box<dyn Simulator>) -> Result<Self> {
        params.validate()?;
        Ok(Self::new(params.env_name.build(params, simulator)?))
    }

    /// Environment being driven
    pub fn env(&self) -> &BoxedEnv {
        &self.env
    }

    /// Run `num_runs` episodes of `num_steps` steps
    ///
    /// The step budget overrides the environment horizon: an episode ends
    /// early only when the environment terminates (a collision). Without a
    /// policy every RL vehicle is commanded zero acceleration.
    pub fn run(&mut self, num_runs: usize, num_steps: usize, policy: Option<Policy<'_>>) -> Result<RolloutSummary> {
        let action_dim: usize = self.env.action_space().shape.iter().product();
        let mut summary = RolloutSummary::default();

        for run in 0..num_runs {
            let mut observation = self.env.reset()?;
            let mut episode_return = 0.0;
            let mut speed_sum = 0.0;
            let mut steps = 0;

            while steps < num_steps {
                let action = match policy {
                    Some(policy) => policy(&observation),
                    None => vec![0.0; action_dim],
                };
                let result = self.env.step(action)?;
                steps += 1;
                episode_return += result.reward as f64;
                speed_sum += result.info.mean_speed;
                observation = result.observation;
                if result.terminated {
                    break;
                }
            }

            let mean_speed = if steps > 0 { speed_sum / steps as f64 } else { 0.0 };
            tracing::info!(
                "Round {}: return {:.3}, mean speed {:.2} m/s, {} steps",
                run,
                episode_return,
                mean_speed,
                steps
            );
            summary.returns.push(episode_return);
            summary.mean_speeds.push(mean_speed);
            summary.steps.push(steps);
        }

        tracing::info!("Average return over {} runs: {:.3}", num_runs, summary.mean_return());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;

    #[test]
    fn test_step_budget_runs_past_horizon() {
        let params = presets::merge().unwrap();
        let num_steps = params.env.horizon + 50;
        let mut exp = Experiment::from_params(&params).unwrap();
        let summary = exp.run(2, num_steps, None).unwrap();

        assert_eq!(summary.steps, vec![num_steps, num_steps]);
        assert_eq!(summary.returns.len(), 2);
    }

    #[test]
    fn test_step_budget_shorter_than_horizon() {
        let params = presets::minicity(None, None).unwrap();
        let mut exp = Experiment::from_params(&params).unwrap();
        let summary = exp.run(1, 25, None).unwrap();
        assert_eq!(summary.total_steps(), 25);
        assert!(summary.mean_speeds[0] > 0.0);
    }

    #[test]
    fn test_policy_sees_observations() {
        let params = presets::merge().unwrap();
        let mut exp = Experiment::from_params(&params).unwrap();
        let obs_dim = exp.env().observation_space().shape[0];

        let policy = move |obs: &[f32]| {
            assert_eq!(obs.len(), obs_dim);
            vec![1.0f32]
        };
        let summary = exp.run(1, 10, Some(&policy as Policy)).unwrap();
        assert_eq!(summary.total_steps(), 10);
    }
}
