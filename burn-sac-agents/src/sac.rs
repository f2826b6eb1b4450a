use std::fmt;

use burn::{
    module::AutodiffModule, optim::Optimizer, prelude::*, tensor::backend::AutodiffBackend,
};
use burn_sac::{
    data::transition::TransitionBatch,
    error::{self, check_hyperparameter},
    module::{
        actor_critic::ActorCritic,
        nn::{param_group::ParamGroup, target_model::WithTarget},
    },
    objective::sac::{SoftActorCriticLoss, SoftActorCriticLossConfig},
};
use log::{info, trace};

use crate::off_policy::OffPolicyAgent;

#[derive(Config, Debug)]
pub struct SoftActorCriticConfig {
    /// Discount factor, in (0, 1].
    #[config(default = 0.99)]
    pub discount_factor: f64,
    /// Polyak factor, in (0, 1]. Values close to 1 move the target slowly.
    #[config(default = 0.995)]
    pub target_update_factor: f64,
    /// Weight of the entropy bonus.
    #[config(default = 0.2)]
    pub entropy_temperature: f64,
    #[config(default = 1e-3)]
    pub q_learning_rate: f64,
    #[config(default = 1e-3)]
    pub pi_learning_rate: f64,
    /// Seeds the backend before the networks are built.
    pub seed: Option<u64>,
}

impl SoftActorCriticConfig {
    fn assertions(&self) -> error::Result<()> {
        check_hyperparameter(
            "target_update_factor",
            self.target_update_factor,
            0.0,
            1.0,
            false,
            "(0, 1]",
        )?;
        for (name, value) in [
            ("q_learning_rate", self.q_learning_rate),
            ("pi_learning_rate", self.pi_learning_rate),
        ] {
            check_hyperparameter(name, value, 0.0, f64::MAX, true, "[0, inf)")?;
        }
        Ok(())
    }
}

/// Averaged losses of one training step, read back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrainResult {
    pub loss_q: f32,
    pub loss_pi: f32,
}

impl TrainResult {
    /// Element-wise mean, `None` for an empty slice.
    pub fn mean(results: &[TrainResult]) -> Option<TrainResult> {
        if results.is_empty() {
            return None;
        }
        let n = results.len() as f32;
        Some(TrainResult {
            loss_q: results.iter().map(|r| r.loss_q).sum::<f32>() / n,
            loss_pi: results.iter().map(|r| r.loss_pi).sum::<f32>() / n,
        })
    }

    /// `false` once training has diverged to NaN or infinity.
    pub fn is_finite(&self) -> bool {
        self.loss_q.is_finite() && self.loss_pi.is_finite()
    }
}

impl fmt::Display for TrainResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LossQ: {}  LossPi: {}", self.loss_q, self.loss_pi)
    }
}

/// Soft Actor-Critic with twin critics and a Polyak-averaged target network.
///
/// `QO` steps the critics and `PO` steps the actor. Both are burn optimizers
/// over the whole [`ActorCritic`], but each only ever receives the gradients of
/// its own [`ParamGroup`].
pub struct SoftActorCriticTrainer<B, QO, PO>
where
    B: AutodiffBackend,
    QO: Optimizer<ActorCritic<B>, B>,
    PO: Optimizer<ActorCritic<B>, B>,
{
    model: WithTarget<B, ActorCritic<B>>,
    q_params: ParamGroup,
    pi_params: ParamGroup,
    q_optimizer: QO,
    pi_optimizer: PO,
    loss: SoftActorCriticLoss,
    config: SoftActorCriticConfig,
    steps: usize,
}

impl<B, QO, PO> SoftActorCriticTrainer<B, QO, PO>
where
    B: AutodiffBackend,
    QO: Optimizer<ActorCritic<B>, B>,
    PO: Optimizer<ActorCritic<B>, B>,
{
    /// Builds the live and target networks with `factory` and the two optimizers
    /// from the parameter groups they will step.
    ///
    /// The target starts as an exact copy of the live network.
    pub fn new<F, FQ, FP>(
        config: SoftActorCriticConfig,
        factory: F,
        q_optimizer_factory: FQ,
        pi_optimizer_factory: FP,
        device: &B::Device,
    ) -> error::Result<Self>
    where
        F: Fn(&B::Device) -> error::Result<ActorCritic<B>>,
        FQ: FnOnce(&ParamGroup) -> Option<QO>,
        FP: FnOnce(&ParamGroup) -> Option<PO>,
    {
        config.assertions()?;
        let loss = SoftActorCriticLossConfig::new()
            .with_discount_factor(config.discount_factor)
            .with_entropy_temperature(config.entropy_temperature)
            .init()?;
        if let Some(seed) = config.seed {
            B::seed(seed);
        }

        let live = factory(device)?;
        let target = factory(device)?.valid();
        let model = WithTarget::new(live, target)?;

        let q_params = model.model.q_params();
        let pi_params = model.model.actor_params();
        let q_optimizer = q_optimizer_factory(&q_params).ok_or(error::Error::MissingOptimizer("q"))?;
        let pi_optimizer =
            pi_optimizer_factory(&pi_params).ok_or(error::Error::MissingOptimizer("pi"))?;

        info!(
            "soft actor-critic: {} critic and {} actor parameters, {}",
            q_params.num_elements(),
            pi_params.num_elements(),
            config
        );
        Ok(Self {
            model,
            q_params,
            pi_params,
            q_optimizer,
            pi_optimizer,
            loss,
            config,
            steps: 0,
        })
    }

    pub fn config(&self) -> &SoftActorCriticConfig {
        &self.config
    }

    /// The live networks.
    pub fn model(&self) -> &ActorCritic<B> {
        &self.model.model
    }

    pub fn target(&self) -> &ActorCritic<B::InnerBackend> {
        &self.model.target
    }

    /// Number of completed calls to [`Self::train`].
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Copy of `batch` on the device holding the live networks.
    pub fn on_model_device(&self, batch: &TransitionBatch<B>) -> TransitionBatch<B> {
        match self.model.model.devices().into_iter().next() {
            Some(device) => batch.clone().to_device(&device),
            None => batch.clone(),
        }
    }

    /// Actions of the live policy without gradient tracking.
    pub fn act(&self, observations: &[f32], deterministic: bool) -> error::Result<Vec<f32>> {
        self.model.model.valid().act(observations, deterministic)
    }

    /// One update: critics, then actor against frozen critics, then the target.
    ///
    /// Shapes are checked before anything is changed, so an `Err` leaves the
    /// trainer untouched.
    pub fn train(&mut self, batch: &TransitionBatch<B>) -> error::Result<TrainResult> {
        let model = &self.model.model;
        batch.check_sizes(model.observation_size(), model.action_size())?;
        let batch = &self.on_model_device(batch);

        let loss_q = self
            .loss
            .critic_loss(model, &self.model.target, batch)?;
        let mut grads = loss_q.backward();
        let grads = self.q_params.gradients(&mut grads, model);
        let model = self
            .q_optimizer
            .step(self.config.q_learning_rate, model.clone(), grads);
        trace!("critics stepped");

        // The frozen copy is dropped at the end of this phase.
        let loss_pi = {
            let frozen = model.with_frozen_critics();
            let loss_pi = self
                .loss
                .policy_loss(&frozen, batch.observation.clone())?;
            let mut grads = loss_pi.backward();
            let grads = self.pi_params.gradients(&mut grads, &frozen);
            self.model.model = self
                .pi_optimizer
                .step(self.config.pi_learning_rate, model, grads);
            loss_pi
        };
        trace!("actor stepped");

        self.model
            .update_target_model(self.config.target_update_factor)?;
        self.steps += 1;

        Ok(TrainResult {
            loss_q: scalar(loss_q)?,
            loss_pi: scalar(loss_pi)?,
        })
    }
}

impl<B, QO, PO> OffPolicyAgent<B> for SoftActorCriticTrainer<B, QO, PO>
where
    B: AutodiffBackend,
    QO: Optimizer<ActorCritic<B>, B>,
    PO: Optimizer<ActorCritic<B>, B>,
{
    fn act(&self, observations: &[f32], deterministic: bool) -> error::Result<Vec<f32>> {
        SoftActorCriticTrainer::act(self, observations, deterministic)
    }

    fn update(&mut self, batch: &TransitionBatch<B>) -> error::Result<TrainResult> {
        self.train(batch)
    }
}

fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> error::Result<f32> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| error::Error::TensorData(format!("{:?}", err)))?
        .first()
        .copied()
        .ok_or(error::Error::ZeroSize("loss"))
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        module::{ModuleVisitor, ParamId},
        optim::AdamConfig,
    };
    use burn_sac::{
        error::{Error, ErrorKind, Result},
        module::actor_critic::ActorCriticConfig,
    };
    use expect_test::expect;

    use super::*;

    type B = Autodiff<NdArray>;

    fn factory(device: &<B as Backend>::Device) -> Result<ActorCritic<B>> {
        ActorCriticConfig::new(2, 1)
            .with_actor_hidden_sizes(vec![8, 8])
            .with_critic_hidden_sizes(vec![8, 8])
            .init(device)
    }

    fn adam(_: &ParamGroup) -> Option<impl Optimizer<ActorCritic<B>, B>> {
        Some(AdamConfig::new().init::<B, ActorCritic<B>>())
    }

    /// A factory that declines to build an optimizer.
    fn no_optimizer(group: &ParamGroup) -> Option<impl Optimizer<ActorCritic<B>, B>> {
        adam(group).filter(|_| false)
    }

    fn new_trainer(
        config: SoftActorCriticConfig,
    ) -> SoftActorCriticTrainer<B, impl Optimizer<ActorCritic<B>, B>, impl Optimizer<ActorCritic<B>, B>>
    {
        SoftActorCriticTrainer::new(
            config.with_seed(Some(3)),
            factory,
            adam,
            adam,
            &Default::default(),
        )
        .unwrap()
    }

    fn batch() -> TransitionBatch<B> {
        TransitionBatch::from_floats(
            &[0.1, 0.9, 0.4, 0.2, 0.7, 0.3, 0.5, 0.5],
            &[0.2, 0.8, 0.5, 0.1, 0.6, 0.4, 0.4, 0.6],
            &[0.5, -0.5, 0.25, 0.0],
            &[1.0, 0.5, 0.0, 0.75],
            &[0.0, 0.0, 1.0, 0.0],
            &Default::default(),
        )
        .unwrap()
    }

    /// Flattens every float parameter in traversal order.
    struct Flatten(Vec<f32>);

    impl<B: Backend> ModuleVisitor<B> for Flatten {
        fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
            self.0
                .extend(tensor.clone().into_data().to_vec::<f32>().unwrap());
        }
    }

    fn flatten<B: Backend, M: Module<B>>(module: &M) -> Vec<f32> {
        let mut flatten = Flatten(Vec::new());
        module.visit(&mut flatten);
        flatten.0
    }

    fn distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    #[test]
    fn test_target_starts_as_copy() {
        let trainer = new_trainer(SoftActorCriticConfig::new());
        assert_eq!(
            flatten(&trainer.model().valid()),
            flatten(trainer.target())
        );
    }

    #[test]
    fn test_target_moves_towards_live() {
        let mut trainer = new_trainer(SoftActorCriticConfig::new().with_target_update_factor(0.9));
        let batch = batch();
        for _ in 0..3 {
            let target_before = flatten(trainer.target());
            let result = trainer.train(&batch).unwrap();
            assert!(result.is_finite());
            let live = flatten(&trainer.model().valid());
            let target_after = flatten(trainer.target());
            assert!(distance(&target_after, &live) < distance(&target_before, &live));
        }
        assert_eq!(trainer.steps(), 3);
    }

    #[test]
    fn test_optimizers_only_step_their_own_group() {
        let batch = batch();

        let mut trainer = new_trainer(SoftActorCriticConfig::new().with_q_learning_rate(0.0));
        let critics = flatten(&trainer.model().q1);
        let actor = flatten(&trainer.model().actor);
        trainer.train(&batch).unwrap();
        assert_eq!(flatten(&trainer.model().q1), critics);
        assert_ne!(flatten(&trainer.model().actor), actor);

        let mut trainer = new_trainer(SoftActorCriticConfig::new().with_pi_learning_rate(0.0));
        let critics = flatten(&trainer.model().q2);
        let actor = flatten(&trainer.model().actor);
        trainer.train(&batch).unwrap();
        assert_ne!(flatten(&trainer.model().q2), critics);
        assert_eq!(flatten(&trainer.model().actor), actor);
    }

    #[test]
    fn test_shape_mismatch_changes_nothing() {
        let mut trainer = new_trainer(SoftActorCriticConfig::new());
        let before = flatten(&trainer.model().valid());
        let wrong = TransitionBatch::<B>::from_floats(
            &[0.1, 0.2, 0.3],
            &[0.1, 0.2, 0.3],
            &[0.5],
            &[1.0],
            &[0.0],
            &Default::default(),
        )
        .unwrap();
        let err = trainer.train(&wrong).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputShape);
        assert_eq!(flatten(&trainer.model().valid()), before);
        assert_eq!(trainer.steps(), 0);
    }

    #[test]
    fn test_batch_follows_model_device() {
        let mut trainer = new_trainer(SoftActorCriticConfig::new());
        let batch = batch();
        let moved = trainer.on_model_device(&batch);

        let device = trainer.model().devices()[0].clone();
        assert_eq!(moved.observation.device(), device);
        assert_eq!(moved.done.device(), device);
        assert_eq!(moved.len(), batch.len());
        assert_eq!(
            moved.action.into_data().to_vec::<f32>().unwrap(),
            batch.action.clone().into_data().to_vec::<f32>().unwrap()
        );
        assert!(trainer.train(&batch).unwrap().is_finite());
    }

    #[test]
    fn test_missing_optimizer() {
        let device = Default::default();
        let config = SoftActorCriticConfig::new();
        let result = SoftActorCriticTrainer::new(config.clone(), factory, adam, no_optimizer, &device);
        assert!(matches!(result, Err(Error::MissingOptimizer("pi"))));

        let result = SoftActorCriticTrainer::new(config, factory, no_optimizer, adam, &device);
        assert!(matches!(result, Err(Error::MissingOptimizer("q"))));
    }

    #[test]
    fn test_optimizer_factories_see_their_groups() {
        let mut q_group = 0;
        let mut pi_group = 0;
        SoftActorCriticTrainer::new(
            SoftActorCriticConfig::new(),
            factory,
            |group: &ParamGroup| {
                q_group = group.len();
                adam(group)
            },
            |group: &ParamGroup| {
                pi_group = group.len();
                adam(group)
            },
            &Default::default(),
        )
        .unwrap();
        // Three linear layers per critic; two backbone layers and two heads for the actor.
        assert_eq!((q_group, pi_group), (12, 8));
    }

    #[test]
    fn test_rejects_invalid_hyperparameters() {
        let configs = [
            SoftActorCriticConfig::new().with_target_update_factor(0.0),
            SoftActorCriticConfig::new().with_target_update_factor(1.01),
            SoftActorCriticConfig::new().with_discount_factor(0.0),
            SoftActorCriticConfig::new().with_entropy_temperature(-1.0),
            SoftActorCriticConfig::new().with_q_learning_rate(f64::INFINITY),
        ];
        for config in configs {
            let result =
                SoftActorCriticTrainer::new(config, factory, adam, adam, &Default::default());
            assert_eq!(
                result.err().map(|err| err.kind()),
                Some(ErrorKind::Construction)
            );
        }
    }

    #[test]
    fn test_act_and_display() {
        let trainer = new_trainer(SoftActorCriticConfig::new());
        let action = trainer.act(&[0.1, 0.2, 0.3, 0.4], true).unwrap();
        assert_eq!(action.len(), 2);
        assert!(action.iter().all(|a| (-1.0..=1.0).contains(a)));

        let result = TrainResult::mean(&[
            TrainResult {
                loss_q: 1.0,
                loss_pi: -2.0,
            },
            TrainResult {
                loss_q: 2.0,
                loss_pi: -1.0,
            },
        ])
        .unwrap();
        let expected = expect!["LossQ: 1.5  LossPi: -1.5"];
        expected.assert_eq(&result.to_string());
        assert!(TrainResult::mean(&[]).is_none());
        assert!(!TrainResult {
            loss_q: f32::NAN,
            loss_pi: 0.0
        }
        .is_finite());
    }
}
