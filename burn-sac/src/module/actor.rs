use burn::{nn::Linear, prelude::*, tensor::activation::relu};
use nn::LinearConfig;

use super::distribution::Normal;
use super::nn::multi_layer_perceptron::{MultiLayerPerceptron, MultiLayerPerceptronConfig};
use crate::error;

const LOG_STD_MIN: f64 = -20.0;
const LOG_STD_MAX: f64 = 2.0;

#[derive(Config)]
pub struct ActorConfig {
    observation_size: usize,
    action_size: usize,
    #[config(default = "vec![16, 16, 16]")]
    hidden_sizes: Vec<usize>,
    #[config(default = "-1.0")]
    action_min: f32,
    #[config(default = "1.0")]
    action_max: f32,
    #[config(default = 0.0)]
    negative_slope: f64,
}

/// Squashed Gaussian policy.
///
/// A shared backbone feeds a mean head and a log standard deviation head. Raw
/// samples are bounded with `tanh` and rescaled to `[action_min, action_max]`.
#[derive(Module, Debug)]
pub struct Actor<B: Backend> {
    backbone: MultiLayerPerceptron<B>,
    mean: Linear<B>,
    log_std: Linear<B>,
    action_min: f32,
    action_max: f32,
    observation_size: usize,
    action_size: usize,
}

pub(crate) fn validate_bounds(action_min: f32, action_max: f32) -> error::Result<()> {
    if action_min.is_nan() || action_max.is_nan() {
        return Err(error::Error::InvalidActionBounds {
            min: action_min,
            max: action_max,
        });
    }
    if action_min.is_infinite() || action_max.is_infinite() {
        return Err(error::Error::UnboundedActions {
            min: action_min,
            max: action_max,
        });
    }
    if action_max <= action_min {
        return Err(error::Error::InvalidActionBounds {
            min: action_min,
            max: action_max,
        });
    }
    Ok(())
}

impl ActorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<Actor<B>> {
        validate_bounds(self.action_min, self.action_max)?;
        if self.observation_size == 0 {
            return Err(error::Error::ZeroSize("observation_size"));
        }
        if self.action_size == 0 {
            return Err(error::Error::ZeroSize("action_size"));
        }

        let mut sizes = vec![self.observation_size];
        sizes.extend(self.hidden_sizes.iter().copied());
        let features = *sizes.last().unwrap_or(&self.observation_size);
        let backbone = if sizes.len() < 2 {
            // No hidden layers: an identity-sized projection keeps the heads uniform.
            MultiLayerPerceptronConfig::new(vec![self.observation_size, self.observation_size])
        } else {
            MultiLayerPerceptronConfig::new(sizes)
        }
        .with_negative_slope(self.negative_slope)
        .with_activate_output(true)
        .init(device)?;

        Ok(Actor {
            backbone,
            mean: LinearConfig::new(features, self.action_size).init(device),
            log_std: LinearConfig::new(features, self.action_size).init(device),
            action_min: self.action_min,
            action_max: self.action_max,
            observation_size: self.observation_size,
            action_size: self.action_size,
        })
    }
}

/// `log(1 + exp(x))` without overflow for large `x`.
fn softplus<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    relu(x.clone()) + x.abs().neg().exp().log1p()
}

impl<B: Backend> Actor<B> {
    pub fn observation_size(&self) -> usize {
        self.observation_size
    }

    pub fn action_size(&self) -> usize {
        self.action_size
    }

    fn check_observation(&self, observation: &Tensor<B, 2>) -> error::Result<()> {
        let [_, width] = observation.dims();
        if width != self.observation_size {
            return Err(error::Error::input_shape(
                "observation width",
                self.observation_size,
                width,
            ));
        }
        Ok(())
    }

    /// Returns `(mean, log_std)` with `log_std` clamped to `[-20, 2]`.
    fn mean_log_std(&self, observation: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let features = self.backbone.forward(observation);
        let mean = self.mean.forward(features.clone());
        let log_std = self
            .log_std
            .forward(features)
            .clamp(LOG_STD_MIN, LOG_STD_MAX);
        (mean, log_std)
    }

    /// Bounds a raw action to `(-1, 1)` with `tanh` and rescales it to the action range.
    fn squash(&self, raw_action: Tensor<B, 2>) -> Tensor<B, 2> {
        let half_range = (self.action_max as f64 - self.action_min as f64) / 2.0;
        (raw_action.tanh() + 1.0) * half_range + self.action_min as f64
    }

    /// Samples actions, or takes the mean when `deterministic` is set.
    pub fn forward(&self, observation: Tensor<B, 2>, deterministic: bool) -> error::Result<Tensor<B, 2>> {
        self.check_observation(&observation)?;
        let (mean, log_std) = self.mean_log_std(observation);
        let raw_action = if deterministic {
            mean
        } else {
            Normal::new(mean, log_std.exp())?.sample()
        };
        Ok(self.squash(raw_action))
    }

    /// Samples actions together with their log-probability under the squashed distribution.
    ///
    /// The Gaussian log-density of the raw sample `u` is corrected for the `tanh`
    /// change of variables with `2 * (log 2 - u - softplus(-2u))`, which equals
    /// `log(1 - tanh(u)^2)`. Both terms are summed over the action axis.
    pub fn forward_with_log_prob(
        &self,
        observation: Tensor<B, 2>,
    ) -> error::Result<(Tensor<B, 2>, Tensor<B, 1>)> {
        self.check_observation(&observation)?;
        let (mean, log_std) = self.mean_log_std(observation);
        let distribution = Normal::new(mean, log_std.exp())?;
        let raw_action = distribution.sample();

        let log_prob: Tensor<B, 1> = distribution
            .log_prob(raw_action.clone())
            .sum_dim(1)
            .squeeze(1);
        let correction: Tensor<B, 1> = ((raw_action.clone().neg() + std::f64::consts::LN_2
            - softplus(raw_action.clone() * -2.0))
            * 2.0)
            .sum_dim(1)
            .squeeze(1);

        Ok((self.squash(raw_action), log_prob - correction))
    }
}
