use burn::{prelude::Backend, tensor::Tensor};

use crate::error::Result;

pub trait Critic<B: Backend> {
    type OBatch;
    type ABatch;

    fn q_batch(&self, observations: &Self::OBatch, actions: &Self::ABatch) -> Result<Tensor<B, 1>>;
}

/// Anything that picks actions for observations.
pub trait Policy {
    type A; // Action
    type O: ?Sized; // Observation

    fn a(&self, observation: &Self::O) -> Result<Self::A>;
}
