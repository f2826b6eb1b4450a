//! Fixed-capacity transition store with uniform sampling.
//!
//! Rows are written in blocks of `write_batch_size` (usually the number of agents
//! stepping together). Until the buffer is full blocks are appended in order.
//! Once full, every write goes to a uniformly random block-aligned slot, so any
//! stored block may be replaced, not only the oldest one.

use burn::prelude::*;
use log::trace;
use rand::Rng;

use super::transition::TransitionBatch;
use super::util::Transition;
use crate::error::{Error, Result};

pub struct ReplayBuffer<R: Rng> {
    observation: Vec<f32>,
    next_observation: Vec<f32>,
    action: Vec<f32>,
    reward: Vec<f32>,
    done: Vec<f32>,
    observation_size: usize,
    action_size: usize,
    capacity: usize,
    write_batch_size: usize,
    size: usize,
    write_pointer: usize,
    rng: R,
}

impl<R: Rng> ReplayBuffer<R> {
    /// Allocates storage for `capacity` rows, written `write_batch_size` rows at a time.
    pub fn new(
        observation_size: usize,
        action_size: usize,
        capacity: usize,
        write_batch_size: usize,
        rng: R,
    ) -> Result<Self> {
        if observation_size == 0 {
            return Err(Error::ZeroSize("observation_size"));
        }
        if action_size == 0 {
            return Err(Error::ZeroSize("action_size"));
        }
        if write_batch_size == 0 {
            return Err(Error::ZeroSize("write_batch_size"));
        }
        if capacity == 0 || capacity % write_batch_size != 0 {
            return Err(Error::CapacityNotDivisible {
                capacity,
                batch_size: write_batch_size,
            });
        }
        Ok(Self {
            observation: vec![0.0; capacity * observation_size],
            next_observation: vec![0.0; capacity * observation_size],
            action: vec![0.0; capacity * action_size],
            reward: vec![0.0; capacity],
            done: vec![0.0; capacity],
            observation_size,
            action_size,
            capacity,
            write_batch_size,
            size: 0,
            write_pointer: 0,
            rng,
        })
    }

    /// Number of rows filled so far.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn write_batch_size(&self) -> usize {
        self.write_batch_size
    }

    /// Row the next write starts at, unless the buffer is full.
    pub fn write_pointer(&self) -> usize {
        self.write_pointer
    }

    pub fn observation_size(&self) -> usize {
        self.observation_size
    }

    pub fn action_size(&self) -> usize {
        self.action_size
    }

    /// Stored rewards, one per row in `[0, capacity)`.
    pub fn rewards(&self) -> &[f32] {
        &self.reward
    }

    /// Stores one step of `write_batch_size` agents.
    pub fn store_transition(&mut self, transition: &Transition) -> Result<()> {
        let done: Vec<f32> = transition
            .done
            .iter()
            .map(|done| if *done { 1.0 } else { 0.0 })
            .collect();
        self.write_rows(
            &transition.observation,
            &transition.next_observation,
            &transition.action,
            &transition.reward,
            &done,
        )
    }

    /// Stores a batch whose leading dimension equals `write_batch_size`.
    pub fn store<B: Backend>(&mut self, batch: &TransitionBatch<B>) -> Result<()> {
        if batch.len() != self.write_batch_size {
            return Err(Error::input_shape(
                "stored batch rows",
                self.write_batch_size,
                batch.len(),
            ));
        }
        batch.check_sizes(self.observation_size, self.action_size)?;
        self.write_rows(
            &host(batch.observation.clone())?,
            &host(batch.next_observation.clone())?,
            &host(batch.action.clone())?,
            &host(batch.reward.clone())?,
            &host(batch.done.clone())?,
        )
    }

    fn write_rows(
        &mut self,
        observation: &[f32],
        next_observation: &[f32],
        action: &[f32],
        reward: &[f32],
        done: &[f32],
    ) -> Result<()> {
        let rows = self.write_batch_size;
        let expected = [
            ("reward length", reward.len(), rows),
            ("done length", done.len(), rows),
            ("observation length", observation.len(), rows * self.observation_size),
            ("next_observation length", next_observation.len(), rows * self.observation_size),
            ("action length", action.len(), rows * self.action_size),
        ];
        for (what, actual, expected) in expected {
            if actual != expected {
                return Err(Error::input_shape(what, expected, actual));
            }
        }

        if self.size == self.capacity {
            let slots = self.capacity / rows;
            self.write_pointer = self.rng.gen_range(0..slots) * rows;
        }

        let start = self.write_pointer;
        let o = self.observation_size;
        let a = self.action_size;
        self.observation[start * o..(start + rows) * o].copy_from_slice(observation);
        self.next_observation[start * o..(start + rows) * o].copy_from_slice(next_observation);
        self.action[start * a..(start + rows) * a].copy_from_slice(action);
        self.reward[start..start + rows].copy_from_slice(reward);
        self.done[start..start + rows].copy_from_slice(done);

        self.write_pointer = (start + rows) % self.capacity;
        self.size = (self.size + rows).min(self.capacity);
        trace!(
            "stored {} rows at {}, size {}/{}",
            rows,
            start,
            self.size,
            self.capacity
        );
        Ok(())
    }

    /// Draws `n` row indices uniformly from `[0, len)`, with replacement.
    pub fn sample_indices(&mut self, n: usize) -> Result<Vec<usize>> {
        if self.size == 0 {
            return Err(Error::EmptyReplayBuffer);
        }
        let size = self.size;
        Ok((0..n).map(|_| self.rng.gen_range(0..size)).collect())
    }

    /// Samples `n` stored rows into a new batch on `device`.
    pub fn sample_batch<B: Backend>(
        &mut self,
        n: usize,
        device: &B::Device,
    ) -> Result<TransitionBatch<B>> {
        let indices = self.sample_indices(n)?;
        self.gather(&indices, device)
    }

    /// Copies the rows at `indices` into a new batch on `device`.
    pub fn gather<B: Backend>(
        &self,
        indices: &[usize],
        device: &B::Device,
    ) -> Result<TransitionBatch<B>> {
        if let Some(index) = indices.iter().find(|index| **index >= self.size) {
            return Err(Error::input_shape("row index below", self.size, *index));
        }
        let rows = |values: &[f32], width: usize| -> Vec<f32> {
            indices
                .iter()
                .flat_map(|index| values[index * width..(index + 1) * width].iter().copied())
                .collect()
        };
        TransitionBatch::from_floats(
            &rows(&self.observation, self.observation_size),
            &rows(&self.next_observation, self.observation_size),
            &rows(&self.action, self.action_size),
            &rows(&self.reward, 1),
            &rows(&self.done, 1),
            device,
        )
    }
}

fn host<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| Error::TensorData(format!("{:?}", err)))
}
