use burn::{
    module::AutodiffModule,
    nn::loss::{MseLoss, Reduction},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use log::trace;

use super::temporal_difference::soft_bellman_backup;
use crate::data::transition::TransitionBatch;
use crate::error::{self, check_hyperparameter};
use crate::module::actor_critic::ActorCritic;

#[derive(Config, Debug)]
pub struct SoftActorCriticLossConfig {
    #[config(default = 0.99)]
    pub discount_factor: f64,
    #[config(default = 0.2)]
    pub entropy_temperature: f64,
}

impl SoftActorCriticLossConfig {
    pub fn init(&self) -> error::Result<SoftActorCriticLoss> {
        self.assertions()?;
        Ok(SoftActorCriticLoss {
            discount_factor: self.discount_factor,
            entropy_temperature: self.entropy_temperature,
        })
    }

    fn assertions(&self) -> error::Result<()> {
        check_hyperparameter(
            "discount_factor",
            self.discount_factor,
            0.0,
            1.0,
            false,
            "(0, 1]",
        )?;
        check_hyperparameter(
            "entropy_temperature",
            self.entropy_temperature,
            0.0,
            f64::MAX,
            true,
            "[0, inf)",
        )
    }
}

/// Critic and policy objectives of Soft Actor-Critic.
#[derive(Clone, Debug)]
pub struct SoftActorCriticLoss {
    discount_factor: f64,
    entropy_temperature: f64,
}

impl SoftActorCriticLoss {
    /// Regression target for both critics, computed without gradient tracking.
    ///
    /// Next actions come from the live actor, their values from the target critics.
    pub fn backup<B: AutodiffBackend>(
        &self,
        model: &ActorCritic<B>,
        target: &ActorCritic<B::InnerBackend>,
        batch: &TransitionBatch<B>,
    ) -> error::Result<Tensor<B, 1>> {
        let next_observation = batch.next_observation.clone().inner();
        let (next_action, next_log_prob) = model
            .actor
            .valid()
            .forward_with_log_prob(next_observation.clone())?;
        let next_q = target.q_min(next_observation, next_action)?;
        let backup = soft_bellman_backup(
            batch.reward.clone().inner(),
            batch.done.clone().inner(),
            next_q,
            next_log_prob,
            self.discount_factor,
            self.entropy_temperature,
        );
        Ok(Tensor::from_inner(backup))
    }

    /// `MSE(Q1, backup) + MSE(Q2, backup)` on the recorded actions.
    pub fn critic_loss<B: AutodiffBackend>(
        &self,
        model: &ActorCritic<B>,
        target: &ActorCritic<B::InnerBackend>,
        batch: &TransitionBatch<B>,
    ) -> error::Result<Tensor<B, 1>> {
        let q1 = model
            .q1
            .forward(batch.observation.clone(), batch.action.clone())?;
        let q2 = model
            .q2
            .forward(batch.observation.clone(), batch.action.clone())?;
        let backup = self.backup(model, target, batch)?;
        trace!("critic loss over {} rows", batch.len());
        let mse = MseLoss::new();
        Ok(mse.forward(q1, backup.clone(), Reduction::Mean) + mse.forward(q2, backup, Reduction::Mean))
    }

    /// `mean(temperature * log_prob - min(Q1, Q2))` on freshly sampled actions.
    ///
    /// Pass a model from [`ActorCritic::with_frozen_critics`] so only the actor
    /// receives gradients.
    pub fn policy_loss<B: Backend>(
        &self,
        model: &ActorCritic<B>,
        observation: Tensor<B, 2>,
    ) -> error::Result<Tensor<B, 1>> {
        let (action, log_prob) = model.actor.forward_with_log_prob(observation.clone())?;
        let q = model.q_min(observation, action)?;
        Ok((log_prob * self.entropy_temperature - q).mean())
    }
}
