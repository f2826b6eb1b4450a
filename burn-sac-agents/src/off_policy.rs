use std::marker::PhantomData;

use burn::config::Config;
use burn::tensor::backend::AutodiffBackend;
use burn_sac::{
    data::{replay_buffer::ReplayBuffer, transition::TransitionBatch, util::collect_step},
    environment::Environment,
    error,
    evaluation::evaluate_policy,
};
use log::{debug, info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use ringbuffer::{AllocRingBuffer, RingBuffer};
use tqdm::tqdm;

use crate::sac::TrainResult;

pub trait OffPolicyAgent<B: AutodiffBackend> {
    fn act(&self, observations: &[f32], deterministic: bool) -> error::Result<Vec<f32>>;

    fn update(&mut self, batch: &TransitionBatch<B>) -> error::Result<TrainResult>;
}

#[derive(Config, Debug)]
pub struct OffPolicyAlgorithmConfig {
    pub total_steps: usize,
    /// Steps acted with sampled actions before the policy takes over.
    #[config(default = 128)]
    pub random_steps: usize,
    #[config(default = 128)]
    pub update_after: usize,
    #[config(default = 1024)]
    pub update_every: usize,
    #[config(default = 128)]
    pub updates_per_round: usize,
    #[config(default = 128)]
    pub batch_size: usize,
    /// Every n-th step acts with the deterministic policy.
    pub deterministic_every: Option<usize>,
    #[config(default = true)]
    pub reset_after_update: bool,
    #[config(default = 1024)]
    pub reward_window: usize,
    #[config(default = false)]
    pub progress_bar: bool,
    #[config(default = 0)]
    pub seed: u64,
}

/// What a finished run reports.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub steps: usize,
    pub rounds: usize,
    pub updates: usize,
    /// Mean losses of the last training round.
    pub last_result: Option<TrainResult>,
    /// Mean per-agent reward over the most recent steps.
    pub recent_reward: f32,
}

pub struct OffPolicyAlgorithm<B, E, A, R>
where
    B: AutodiffBackend,
    E: Environment,
    A: OffPolicyAgent<B>,
    R: Rng,
{
    cfg: OffPolicyAlgorithmConfig,
    env: E,
    agent: A,
    memory: ReplayBuffer<R>,
    rng: StdRng,
    device: B::Device,
    _phantom: PhantomData<B>,
}

impl OffPolicyAlgorithmConfig {
    pub fn init<B, E, A, R>(
        &self,
        env: E,
        agent: A,
        memory: ReplayBuffer<R>,
        device: &B::Device,
    ) -> error::Result<OffPolicyAlgorithm<B, E, A, R>>
    where
        B: AutodiffBackend,
        E: Environment,
        A: OffPolicyAgent<B>,
        R: Rng,
    {
        for (name, value) in [
            ("update_every", self.update_every),
            ("batch_size", self.batch_size),
            ("reward_window", self.reward_window),
            ("deterministic_every", self.deterministic_every.unwrap_or(1)),
        ] {
            if value == 0 {
                return Err(error::Error::ZeroSize(name));
            }
        }
        let sizes = [
            ("replay buffer write batch size", env.agent_count(), memory.write_batch_size()),
            ("replay buffer observation size", env.observation_size(), memory.observation_size()),
            ("replay buffer action size", env.action_size(), memory.action_size()),
        ];
        for (what, expected, actual) in sizes {
            if expected != actual {
                return Err(error::Error::input_shape(what, expected, actual));
            }
        }
        Ok(OffPolicyAlgorithm {
            cfg: self.clone(),
            env,
            agent,
            memory,
            rng: StdRng::seed_from_u64(self.seed),
            device: device.clone(),
            _phantom: PhantomData,
        })
    }
}

impl<B, E, A, R> OffPolicyAlgorithm<B, E, A, R>
where
    B: AutodiffBackend,
    E: Environment,
    A: OffPolicyAgent<B>,
    R: Rng,
{
    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn memory(&self) -> &ReplayBuffer<R> {
        &self.memory
    }

    /// Mean reward of the deterministic policy over `steps` steps.
    pub fn evaluate(&mut self, steps: usize) -> error::Result<f32> {
        let agent = &self.agent;
        evaluate_policy(&mut self.env, &mut |o: &[f32]| agent.act(o, true), steps)
    }

    /// Acts, stores every step, and runs a training round every `update_every` steps.
    pub fn train(&mut self) -> error::Result<TrainingSummary> {
        let mut observation = self.env.reset(Some(self.rng.gen()));
        let mut recent_rewards = AllocRingBuffer::new(self.cfg.reward_window);
        let mut summary = TrainingSummary {
            steps: 0,
            rounds: 0,
            updates: 0,
            last_result: None,
            recent_reward: 0.0,
        };

        let steps: Box<dyn Iterator<Item = usize>> = if self.cfg.progress_bar {
            Box::new(tqdm(0..self.cfg.total_steps))
        } else {
            Box::new(0..self.cfg.total_steps)
        };
        for step in steps {
            // Step Environment
            let action = if step < self.cfg.random_steps {
                self.env.sample_action(&mut self.rng)
            } else {
                let deterministic = self
                    .cfg
                    .deterministic_every
                    .map_or(false, |every| step % every == 0);
                self.agent.act(&observation, deterministic)?
            };
            let (transition, next) = collect_step(&mut self.env, observation, action)?;
            observation = next;
            recent_rewards.push(mean(&transition.reward));
            self.memory.store_transition(&transition)?;
            summary.steps += 1;

            // Update Agent
            if step >= self.cfg.update_after && (step + 1) % self.cfg.update_every == 0 {
                let mut results = Vec::with_capacity(self.cfg.updates_per_round);
                for _ in 0..self.cfg.updates_per_round {
                    let batch = self
                        .memory
                        .sample_batch::<B>(self.cfg.batch_size, &self.device)?;
                    results.push(self.agent.update(&batch)?);
                }
                summary.updates += results.len();
                summary.rounds += 1;

                let reward = mean(&recent_rewards.to_vec());
                if let Some(result) = TrainResult::mean(&results) {
                    if !result.is_finite() {
                        warn!("step {}: losses are no longer finite ({})", step + 1, result);
                    }
                    info!("step {}: {}  avg. reward: {:.4}", step + 1, result, reward);
                    summary.last_result = Some(result);
                }
                debug!(
                    "replay buffer holds {}/{} rows",
                    self.memory.len(),
                    self.memory.capacity()
                );

                if self.cfg.reset_after_update {
                    observation = self.env.reset(None);
                }
            }
        }

        summary.recent_reward = mean(&recent_rewards.to_vec());
        Ok(summary)
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}
