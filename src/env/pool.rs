//! Environment pool for parallel workers
//!
//! This module runs several independent environment instances side by side
//! using Rayon. Every instance comes from its own factory call, so workers
//! never share simulator state.
//!
//! # Example
//!
//! ```rust
//! use flow_rl::env::pool::EnvPool;
//! use flow_rl::presets;
//! use flow_rl::registry::make_create_env;
//!
//! let params = presets::merge().unwrap();
//! let (factory, _name) = make_create_env(&params, 0).unwrap();
//!
//! // Create pool with 2 parallel environments
//! let mut pool = EnvPool::new(&factory, 2).unwrap();
//!
//! // Reset all environments in parallel
//! let observations = pool.reset().unwrap();
//! assert_eq!(observations.len(), 2);
//! ```

use rayon::prelude::*;

use crate::env::{BoxedEnv, SpaceInfo, StepResult};
use crate::error::Result;
use crate::registry::EnvFactory;

/// A pool of environments for parallel execution
///
/// Each worker owns one environment. Steps run across the pool in parallel
/// on Rayon's thread pool; a failure in any worker fails the whole call.
pub struct EnvPool {
    /// Vector of environment instances
    envs: Vec<BoxedEnv>,

    /// Number of environments
    num_envs: usize,
}

impl EnvPool {
    /// Create a new environment pool
    ///
    /// # Arguments
    ///
    /// * `factory` - Factory function to create environment instances
    /// * `num_envs` - Number of parallel environments
    pub fn new(factory: &EnvFactory, num_envs: usize) -> Result<Self> {
        let envs = (0..num_envs).map(|_| factory()).collect::<Result<Vec<_>>>()?;
        Ok(Self { envs, num_envs })
    }

    /// Reset all environments in parallel
    ///
    /// Returns a vector of initial observations, one per environment.
    pub fn reset(&mut self) -> Result<Vec<Vec<f32>>> {
        self.envs.par_iter_mut().map(|env| env.reset()).collect()
    }

    /// Step all environments in parallel with given actions
    ///
    /// # Panics
    ///
    /// Panics if the number of actions doesn't match the number of
    /// environments.
    pub fn step(&mut self, actions: Vec<Vec<f32>>) -> Result<Vec<StepResult<Vec<f32>>>> {
        assert_eq!(
            actions.len(),
            self.num_envs,
            "Number of actions must match number of environments"
        );

        self.envs
            .par_iter_mut()
            .zip(actions.into_par_iter())
            .map(|(env, action)| env.step(action))
            .collect()
    }

    /// Reset a specific environment by index
    pub fn reset_env(&mut self, env_id: usize) -> Result<Vec<f32>> {
        self.envs[env_id].reset()
    }

    /// Get the number of environments in the pool
    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    /// Get observation space information from first environment
    pub fn observation_space(&self) -> Option<SpaceInfo> {
        self.envs.first().map(|env| env.observation_space())
    }

    /// Get action space information from first environment
    pub fn action_space(&self) -> Option<SpaceInfo> {
        self.envs.first().map(|env| env.action_space())
    }

    /// Step counters of all environments
    pub fn step_counts(&self) -> Vec<usize> {
        self.envs.iter().map(|env| env.step_count()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;
    use crate::registry::make_create_env;

    fn factory() -> EnvFactory {
        let params = presets::merge().unwrap();
        make_create_env(&params, 0).unwrap().0
    }

    fn zero_actions(pool: &EnvPool) -> Vec<Vec<f32>> {
        let dim = pool.action_space().unwrap().shape[0];
        vec![vec![0.0; dim]; pool.num_envs()]
    }

    #[test]
    fn test_pool_creation() {
        let pool = EnvPool::new(&factory(), 4).unwrap();
        assert_eq!(pool.num_envs(), 4);
    }

    #[test]
    fn test_pool_step() {
        let mut pool = EnvPool::new(&factory(), 3).unwrap();
        let obs_dim = pool.observation_space().unwrap().shape[0];
        pool.reset().unwrap();

        let results = pool.step(zero_actions(&pool)).unwrap();
        assert_eq!(results.len(), 3);
        for result in &results {
            assert_eq!(result.observation.len(), obs_dim);
            assert!(!result.is_done());
        }
    }

    #[test]
    fn test_workers_are_independent() {
        let mut pool = EnvPool::new(&factory(), 2).unwrap();
        pool.reset().unwrap();
        for _ in 0..3 {
            pool.step(zero_actions(&pool)).unwrap();
        }
        pool.reset_env(1).unwrap();
        assert_eq!(pool.step_counts(), vec![3, 0]);
    }

    #[test]
    #[should_panic(expected = "Number of actions must match number of environments")]
    fn test_pool_step_wrong_action_count() {
        let mut pool = EnvPool::new(&factory(), 4).unwrap();
        pool.reset().unwrap();
        let _ = pool.step(vec![vec![0.0]]);
    }
}
