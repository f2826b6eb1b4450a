//! A task solved by echoing the observation back as the action.
//!
//! Every agent observes a value drawn from `[0, 1)` and is rewarded with
//! `1 - |clip(action, 0, 1) - observation|`. Episodes never end.

use burn_sac::{
    environment::{Environment, StepResult},
    error::{Error, Result},
};
use rand::{rngs::StdRng, Rng, SeedableRng};

pub struct RepeatObservation {
    agent_count: usize,
    observation: Vec<f32>,
    rng: StdRng,
}

impl RepeatObservation {
    pub fn new(agent_count: usize, seed: u64) -> Self {
        let mut env = Self {
            agent_count,
            observation: vec![0.0; agent_count],
            rng: StdRng::seed_from_u64(seed),
        };
        env.fill();
        env
    }

    pub fn observation(&self) -> &[f32] {
        &self.observation
    }

    fn fill(&mut self) {
        for value in self.observation.iter_mut() {
            *value = self.rng.gen();
        }
    }
}

impl Environment for RepeatObservation {
    fn observation_size(&self) -> usize {
        1
    }

    fn action_size(&self) -> usize {
        1
    }

    fn agent_count(&self) -> usize {
        self.agent_count
    }

    fn action_bounds(&self) -> (f32, f32) {
        (-1.0, 1.0)
    }

    fn reset(&mut self, seed: Option<u64>) -> Vec<f32> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.fill();
        self.observation.clone()
    }

    fn step(&mut self, action: &[f32]) -> Result<StepResult> {
        if action.len() != self.agent_count {
            return Err(Error::input_shape("action length", self.agent_count, action.len()));
        }
        let reward = action
            .iter()
            .zip(&self.observation)
            .map(|(action, observation)| 1.0 - (action.clamp(0.0, 1.0) - observation).abs())
            .collect();
        self.fill();
        Ok(StepResult {
            observation: self.observation.clone(),
            reward,
            done: vec![false; self.agent_count],
        })
    }

    /// Samples from `[0, 1)`, the range observations come from.
    fn sample_action<R: Rng>(&self, rng: &mut R) -> Vec<f32> {
        (0..self.agent_count).map(|_| rng.gen()).collect()
    }
}
