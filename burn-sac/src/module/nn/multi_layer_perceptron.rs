use burn::module::Module;
use burn::nn::Linear;
use burn::prelude::*;
use nn::{LeakyRelu, LeakyReluConfig, LinearConfig};

use crate::error;

#[derive(Config)]
pub struct MultiLayerPerceptronConfig {
    sizes: Vec<usize>,
    /// Slope of the leaky ReLU for negative inputs, 0 gives a plain ReLU.
    #[config(default = 0.01)]
    negative_slope: f64,
    /// Apply the activation after the last layer too (for feature extractors).
    #[config(default = false)]
    activate_output: bool,
}

#[derive(Module, Debug)]
pub struct MultiLayerPerceptron<B: Backend> {
    linear_layers: Vec<Linear<B>>,
    activation: LeakyRelu,
    activate_output: bool,
}

fn create_linear_layer<B: Backend>(
    input_size: usize,
    output_size: usize,
    device: &B::Device,
) -> Linear<B> {
    LinearConfig::new(input_size, output_size).init(device)
}

impl MultiLayerPerceptronConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<MultiLayerPerceptron<B>> {
        if self.sizes.len() < 2 || self.sizes.contains(&0) {
            return Err(error::Error::InvalidLayerSizes(self.sizes.clone()));
        }

        let linear_layers = self
            .sizes
            .windows(2)
            .map(|pair| create_linear_layer(pair[0], pair[1], device))
            .collect();

        let activation = LeakyReluConfig::new()
            .with_negative_slope(self.negative_slope)
            .init();
        Ok(MultiLayerPerceptron {
            linear_layers,
            activation,
            activate_output: self.activate_output,
        })
    }
}

impl<B: Backend> MultiLayerPerceptron<B> {
    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        let mut x = input;

        match self.linear_layers.last() {
            Some(f) => {
                for layer in self.linear_layers[..self.linear_layers.len() - 1].iter() {
                    x = layer.forward(x);
                    x = self.activation.forward(x);
                }
                let x = f.forward(x);
                if self.activate_output {
                    self.activation.forward(x)
                } else {
                    x
                }
            }
            None => x,
        }
    }

    pub fn input_size(&self) -> usize {
        self.linear_layers
            .first()
            .map(|layer| layer.weight.dims()[0])
            .unwrap_or(0)
    }

    pub fn output_size(&self) -> usize {
        self.linear_layers
            .last()
            .map(|layer| layer.weight.dims()[1])
            .unwrap_or(0)
    }
}
