use log::info;

use crate::data::util::collect_multiple;
use crate::environment::Environment;
use crate::error::{Error, Result};

/// Runs `policy` for `steps` steps from a fresh reset and returns the mean
/// reward per agent and step. Nothing is recorded for training.
pub fn evaluate_policy<E, P>(env: &mut E, policy: &mut P, steps: usize) -> Result<f32>
where
    E: Environment,
    P: FnMut(&[f32]) -> Result<Vec<f32>>,
{
    if steps == 0 {
        return Err(Error::ZeroSize("evaluation steps"));
    }
    let observation = env.reset(None);
    let transitions = collect_multiple(env, Some(observation), policy, steps)?;
    let (total, count) = transitions
        .iter()
        .flat_map(|transition| transition.reward.iter())
        .fold((0.0, 0usize), |(total, count), reward| (total + reward, count + 1));
    if count == 0 {
        return Err(Error::ZeroSize("evaluation rewards"));
    }
    let mean = total / count as f32;
    info!("evaluation over {} steps: mean reward {:.4}", steps, mean);
    Ok(mean)
}
