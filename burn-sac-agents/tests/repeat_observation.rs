use burn::{
    backend::{Autodiff, NdArray},
    optim::AdamConfig,
    prelude::*,
};
use burn_sac::{
    data::replay_buffer::ReplayBuffer,
    environment::Environment,
    module::actor_critic::{ActorCritic, ActorCriticConfig},
    seed::SeedSource,
};
use burn_sac_agents::{
    off_policy::{OffPolicyAgent, OffPolicyAlgorithmConfig},
    repeat_observation::RepeatObservation,
    sac::{SoftActorCriticConfig, SoftActorCriticTrainer},
};

type B = Autodiff<NdArray>;

const AGENTS: usize = 8;
const SEED: u64 = 112;

#[test]
fn trains_on_repeat_observation() {
    let _ = env_logger::builder().is_test(true).try_init();
    let device: &Device<B> = &Default::default();

    let mut seeds = SeedSource::new(SEED);
    let env = RepeatObservation::new(AGENTS, seeds.next_seed());
    let (action_min, action_max) = env.action_bounds();
    let trainer = SoftActorCriticTrainer::new(
        SoftActorCriticConfig::new()
            .with_discount_factor(0.99)
            .with_target_update_factor(0.995)
            .with_entropy_temperature(0.2)
            .with_seed(Some(seeds.next_seed())),
        |device: &Device<B>| {
            ActorCriticConfig::new(env.observation_size(), env.action_size())
                .with_action_min(action_min)
                .with_action_max(action_max)
                .init::<B>(device)
        },
        |_| Some(AdamConfig::new().init::<B, ActorCritic<B>>()),
        |_| Some(AdamConfig::new().init::<B, ActorCritic<B>>()),
        device,
    )
    .unwrap();
    let memory = ReplayBuffer::new(1, 1, 64 * 1024, AGENTS, seeds.next_rng()).unwrap();

    let mut algorithm = OffPolicyAlgorithmConfig::new(16 * 1024)
        .with_random_steps(128)
        .with_update_after(128)
        .with_update_every(1024)
        .with_updates_per_round(128)
        .with_batch_size(128)
        .with_deterministic_every(Some(28))
        .with_seed(seeds.next_seed())
        .init::<B, _, _, _>(env, trainer, memory, device)
        .unwrap();
    let summary = algorithm.train().unwrap();
    assert_eq!(summary.rounds, 16);
    assert!(summary.last_result.is_some_and(|result| result.is_finite()));

    let observation = algorithm.env().observation().to_vec();
    let action = algorithm.agent().act(&observation, true).unwrap();
    let error = observation
        .iter()
        .zip(&action)
        .map(|(o, a)| (o - a).abs())
        .sum::<f32>()
        / AGENTS as f32;
    assert!(error < 0.1, "mean absolute error {}", error);
}
