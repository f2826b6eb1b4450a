use burn::prelude::*;

use super::transition::TransitionBatch;
use crate::environment::Environment;
use crate::error::{Error, Result};

/// One environment step for every agent, kept on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub observation: Vec<f32>,
    pub action: Vec<f32>,
    pub next_observation: Vec<f32>,
    pub reward: Vec<f32>,
    pub done: Vec<bool>,
}

impl Transition {
    /// Number of agents recorded.
    pub fn rows(&self) -> usize {
        self.reward.len()
    }

    pub fn to_batch<B: Backend>(&self, device: &B::Device) -> Result<TransitionBatch<B>> {
        let done: Vec<f32> = self
            .done
            .iter()
            .map(|done| if *done { 1.0 } else { 0.0 })
            .collect();
        TransitionBatch::from_floats(
            &self.observation,
            &self.next_observation,
            &self.action,
            &self.reward,
            &done,
            device,
        )
    }
}

/// Applies `action` from `observation` and records the step.
///
/// Also returns the observation to act on next, which comes from a reset
/// when every agent reports done.
pub fn collect_step<E: Environment>(
    env: &mut E,
    observation: Vec<f32>,
    action: Vec<f32>,
) -> Result<(Transition, Vec<f32>)> {
    let expected = env.agent_count() * env.action_size();
    if action.len() != expected {
        return Err(Error::input_shape("action length", expected, action.len()));
    }
    let step = env.step(&action)?;
    let all_done = !step.done.is_empty() && step.done.iter().all(|done| *done);
    let next = if all_done {
        env.reset(None)
    } else {
        step.observation.clone()
    };
    let transition = Transition {
        observation,
        action,
        next_observation: step.observation,
        reward: step.reward,
        done: step.done,
    };
    Ok((transition, next))
}

/// Steps `env` `n_steps` times with actions chosen by `policy`.
///
/// Starts from `observation`, or from a fresh reset when `None`.
pub fn collect_multiple<E, P>(
    env: &mut E,
    observation: Option<Vec<f32>>,
    policy: &mut P,
    n_steps: usize,
) -> Result<Vec<Transition>>
where
    E: Environment,
    P: FnMut(&[f32]) -> Result<Vec<f32>>,
{
    let mut before = match observation {
        Some(observation) => observation,
        None => env.reset(None),
    };
    let mut result = Vec::with_capacity(n_steps);
    for _ in 0..n_steps {
        let action = policy(&before)?;
        let (transition, next) = collect_step(env, before, action)?;
        result.push(transition);
        before = next;
    }
    Ok(result)
}
