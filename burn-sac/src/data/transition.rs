use burn::prelude::*;

use crate::error::{Error, Result};

/// Co-indexed transitions, one row per recorded step.
///
/// `done` holds `0.0` or `1.0` so it can enter the Bellman backup directly.
#[derive(Debug, Clone)]
pub struct TransitionBatch<B: Backend> {
    pub observation: Tensor<B, 2>,
    pub next_observation: Tensor<B, 2>,
    pub action: Tensor<B, 2>,
    pub reward: Tensor<B, 1>,
    pub done: Tensor<B, 1>,
}

impl<B: Backend> TransitionBatch<B> {
    pub fn new(
        observation: Tensor<B, 2>,
        next_observation: Tensor<B, 2>,
        action: Tensor<B, 2>,
        reward: Tensor<B, 1>,
        done: Tensor<B, 1>,
    ) -> Result<Self> {
        let rows = observation.dims()[0];
        let leading = [
            next_observation.dims()[0],
            action.dims()[0],
            reward.dims()[0],
            done.dims()[0],
        ];
        if leading.iter().any(|n| *n != rows) {
            return Err(Error::ShapeMismatch {
                what: "transition batch leading dimensions",
                left: vec![rows],
                right: leading.to_vec(),
            });
        }
        if observation.dims() != next_observation.dims() {
            return Err(Error::ShapeMismatch {
                what: "observation and next_observation",
                left: observation.dims().to_vec(),
                right: next_observation.dims().to_vec(),
            });
        }
        Ok(Self {
            observation,
            next_observation,
            action,
            reward,
            done,
        })
    }

    /// Builds a batch from flat row-major host data.
    pub fn from_floats(
        observation: &[f32],
        next_observation: &[f32],
        action: &[f32],
        reward: &[f32],
        done: &[f32],
        device: &B::Device,
    ) -> Result<Self> {
        let rows = reward.len();
        if rows == 0 {
            return Err(Error::ZeroSize("transition batch"));
        }
        let width = |what: &'static str, values: &[f32]| {
            if values.is_empty() || values.len() % rows != 0 {
                Err(Error::input_shape(what, rows, values.len()))
            } else {
                Ok(values.len() / rows)
            }
        };
        let observation_size = width("observation length (multiple of rows)", observation)?;
        let action_size = width("action length (multiple of rows)", action)?;
        if done.len() != rows {
            return Err(Error::input_shape("done length", rows, done.len()));
        }
        let matrix = |values: &[f32], columns: usize| {
            Tensor::<B, 1>::from_floats(values, device).reshape([rows, columns])
        };
        if next_observation.len() != observation.len() {
            return Err(Error::input_shape(
                "next_observation length",
                observation.len(),
                next_observation.len(),
            ));
        }
        Self::new(
            matrix(observation, observation_size),
            matrix(next_observation, observation_size),
            matrix(action, action_size),
            Tensor::from_floats(reward, device),
            Tensor::from_floats(done, device),
        )
    }

    pub fn len(&self) -> usize {
        self.reward.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn observation_size(&self) -> usize {
        self.observation.dims()[1]
    }

    pub fn action_size(&self) -> usize {
        self.action.dims()[1]
    }

    /// Fails unless observations and actions have the given widths.
    pub fn check_sizes(&self, observation_size: usize, action_size: usize) -> Result<()> {
        if self.observation_size() != observation_size {
            return Err(Error::input_shape(
                "observation width",
                observation_size,
                self.observation_size(),
            ));
        }
        if self.action_size() != action_size {
            return Err(Error::input_shape("action width", action_size, self.action_size()));
        }
        Ok(())
    }

    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            observation: self.observation.to_device(device),
            next_observation: self.next_observation.to_device(device),
            action: self.action.to_device(device),
            reward: self.reward.to_device(device),
            done: self.done.to_device(device),
        }
    }
}
