//! The environment a trainer interacts with.
//!
//! Observations and actions are flat `f32` slices holding one row per agent,
//! so a vectorised environment with `n` agents exchanges `n * observation_size`
//! observation values and `n * action_size` action values per step.

use rand::Rng;

use crate::error::Result;

/// What the environment reports after applying one action per agent.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observation: Vec<f32>,
    pub reward: Vec<f32>,
    pub done: Vec<bool>,
}

pub trait Environment {
    fn observation_size(&self) -> usize;

    fn action_size(&self) -> usize;

    /// Number of agents stepped together.
    fn agent_count(&self) -> usize {
        1
    }

    /// Inclusive bounds shared by every action component.
    fn action_bounds(&self) -> (f32, f32);

    fn reset(&mut self, seed: Option<u64>) -> Vec<f32>;

    fn step(&mut self, action: &[f32]) -> Result<StepResult>;

    /// A uniformly random action for every agent.
    fn sample_action<R: Rng>(&self, rng: &mut R) -> Vec<f32> {
        let (min, max) = self.action_bounds();
        (0..self.agent_count() * self.action_size())
            .map(|_| rng.gen_range(min..=max))
            .collect()
    }
}
