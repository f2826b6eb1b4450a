use burn::prelude::*;

use super::actor::{validate_bounds, Actor, ActorConfig};
use super::component::Policy;
use super::critic::{QNetwork, QNetworkConfig};
use super::nn::param_group::{freeze, ParamGroup};
use crate::error;

#[derive(Config)]
pub struct ActorCriticConfig {
    observation_size: usize,
    action_size: usize,
    #[config(default = "vec![16, 16, 16]")]
    actor_hidden_sizes: Vec<usize>,
    #[config(default = "vec![16, 16, 16]")]
    critic_hidden_sizes: Vec<usize>,
    #[config(default = "-1.0")]
    action_min: f32,
    #[config(default = "1.0")]
    action_max: f32,
    #[config(default = 0.0)]
    negative_slope: f64,
}

/// Networks that make up a Soft Actor-Critic agent: a policy and two
/// independently initialised action-value estimators.
#[derive(Module, Debug)]
pub struct ActorCritic<B: Backend> {
    pub actor: Actor<B>,
    pub q1: QNetwork<B>,
    pub q2: QNetwork<B>,
}

impl ActorCriticConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<ActorCritic<B>> {
        validate_bounds(self.action_min, self.action_max)?;
        let actor = ActorConfig::new(self.observation_size, self.action_size)
            .with_hidden_sizes(self.actor_hidden_sizes.clone())
            .with_action_min(self.action_min)
            .with_action_max(self.action_max)
            .with_negative_slope(self.negative_slope)
            .init(device)?;
        let q = QNetworkConfig::new(self.observation_size, self.action_size)
            .with_hidden_sizes(self.critic_hidden_sizes.clone())
            .with_negative_slope(self.negative_slope);
        ActorCritic::new(actor, q.init(device)?, q.init(device)?)
    }
}

impl<B: Backend> ActorCritic<B> {
    /// Composes the three networks, which must agree on observation and action sizes.
    pub fn new(actor: Actor<B>, q1: QNetwork<B>, q2: QNetwork<B>) -> error::Result<Self> {
        let expected = [actor.observation_size(), actor.action_size()];
        for q in [&q1, &q2] {
            let actual = [q.observation_size(), q.action_size()];
            if actual != expected {
                return Err(error::Error::ShapeMismatch {
                    what: "actor and critic (observation, action) sizes",
                    left: expected.to_vec(),
                    right: actual.to_vec(),
                });
            }
        }
        Ok(Self { actor, q1, q2 })
    }

    pub fn observation_size(&self) -> usize {
        self.actor.observation_size()
    }

    pub fn action_size(&self) -> usize {
        self.actor.action_size()
    }

    pub fn actor_params(&self) -> ParamGroup {
        ParamGroup::of(&self.actor)
    }

    /// Parameters of both critics, optimised jointly.
    pub fn q_params(&self) -> ParamGroup {
        ParamGroup::of(&self.q1).union(&ParamGroup::of(&self.q2))
    }

    /// Copy sharing the actor whose critics are excluded from the backward pass.
    ///
    /// Losses computed through it only produce gradients for the actor.
    pub fn with_frozen_critics(&self) -> Self {
        Self {
            actor: self.actor.clone(),
            q1: freeze(&self.q1),
            q2: freeze(&self.q2),
        }
    }

    /// `min(Q1, Q2)` for every row.
    pub fn q_min(&self, observation: Tensor<B, 2>, action: Tensor<B, 2>) -> error::Result<Tensor<B, 1>> {
        let q1 = self.q1.forward(observation.clone(), action.clone())?;
        let q2 = self.q2.forward(observation, action)?;
        Ok(q1.min_pair(q2))
    }

    /// Actions from a copy of the actor that tracks no gradients, so no
    /// autodiff graph is recorded.
    pub fn infer(&self, observation: Tensor<B, 2>, deterministic: bool) -> error::Result<Tensor<B, 2>> {
        freeze(&self.actor).forward(observation, deterministic)
    }

    /// Picks actions for a flat slice of observations, one row per agent.
    ///
    /// Returns the actions flattened the same way.
    pub fn act(&self, observations: &[f32], deterministic: bool) -> error::Result<Vec<f32>> {
        let observation_size = self.observation_size();
        if observations.is_empty() || observations.len() % observation_size != 0 {
            return Err(error::Error::input_shape(
                "observation length (multiple of)",
                observation_size,
                observations.len(),
            ));
        }
        let rows = observations.len() / observation_size;
        let device = self
            .devices()
            .into_iter()
            .next()
            .unwrap_or_default();
        let observation = Tensor::<B, 1>::from_floats(observations, &device)
            .reshape([rows, observation_size]);
        self.infer(observation, deterministic)?
            .into_data()
            .to_vec::<f32>()
            .map_err(|err| error::Error::TensorData(format!("{:?}", err)))
    }
}

/// Deterministic actions, as used for evaluation.
impl<B: Backend> Policy for ActorCritic<B> {
    type A = Vec<f32>;
    type O = [f32];

    fn a(&self, observation: &[f32]) -> error::Result<Vec<f32>> {
        self.act(observation, true)
    }
}
