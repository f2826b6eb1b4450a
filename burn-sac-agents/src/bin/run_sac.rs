use burn::{
    backend::{Autodiff, NdArray},
    optim::AdamConfig,
    prelude::*,
};
use burn_sac::{
    data::replay_buffer::ReplayBuffer,
    module::actor_critic::{ActorCritic, ActorCriticConfig},
    seed::SeedSource,
};
use burn_sac_agents::{
    off_policy::OffPolicyAlgorithmConfig,
    repeat_observation::RepeatObservation,
    sac::{SoftActorCriticConfig, SoftActorCriticTrainer},
};

const AGENTS: usize = 8;
const SEED: u64 = 112;

fn main() -> burn_sac::Result<()> {
    env_logger::init();
    log::info!("Running Soft Actor-Critic on the repeat observation task");
    type B = Autodiff<NdArray>;
    let device: &Device<B> = &Default::default();

    let mut seeds = SeedSource::new(SEED);
    let env = RepeatObservation::new(AGENTS, seeds.next_seed());
    let (action_min, action_max) = (-1.0, 1.0);
    let factory = |device: &Device<B>| -> burn_sac::Result<ActorCritic<B>> {
        ActorCriticConfig::new(1, 1)
            .with_action_min(action_min)
            .with_action_max(action_max)
            .init(device)
    };
    let trainer = SoftActorCriticTrainer::new(
        SoftActorCriticConfig::new().with_seed(Some(seeds.next_seed())),
        factory,
        |_| Some(AdamConfig::new().init::<B, ActorCritic<B>>()),
        |_| Some(AdamConfig::new().init::<B, ActorCritic<B>>()),
        device,
    )?;
    let memory = ReplayBuffer::new(1, 1, 64 * 1024, AGENTS, seeds.next_rng())?;

    // Algorithm
    let mut algorithm = OffPolicyAlgorithmConfig::new(8 * 1024)
        .with_deterministic_every(Some(28))
        .with_progress_bar(true)
        .with_seed(seeds.next_seed())
        .init::<B, _, _, _>(env, trainer, memory, device)?;

    // Execute Training Loop
    let summary = algorithm.train()?;
    log::info!("{:?}", summary);
    let reward = algorithm.evaluate(256)?;
    println!("Evaluation reward: {}", reward);
    Ok(())
}
