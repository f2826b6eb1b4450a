use burn::prelude::*;

use super::component::Critic;
use super::nn::multi_layer_perceptron::{MultiLayerPerceptron, MultiLayerPerceptronConfig};
use crate::error;

#[derive(Config)]
pub struct QNetworkConfig {
    observation_size: usize,
    action_size: usize,
    #[config(default = "vec![16, 16, 16]")]
    hidden_sizes: Vec<usize>,
    #[config(default = 0.0)]
    negative_slope: f64,
}

/// Estimates the expected return of taking an action in an observed state.
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    network: MultiLayerPerceptron<B>,
    observation_size: usize,
    action_size: usize,
}

impl QNetworkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<QNetwork<B>> {
        if self.observation_size == 0 {
            return Err(error::Error::ZeroSize("observation_size"));
        }
        if self.action_size == 0 {
            return Err(error::Error::ZeroSize("action_size"));
        }
        let mut sizes = vec![self.observation_size + self.action_size];
        sizes.extend(self.hidden_sizes.iter().copied());
        sizes.push(1);
        let network = MultiLayerPerceptronConfig::new(sizes)
            .with_negative_slope(self.negative_slope)
            .init(device)?;
        Ok(QNetwork {
            network,
            observation_size: self.observation_size,
            action_size: self.action_size,
        })
    }
}

impl<B: Backend> QNetwork<B> {
    pub fn observation_size(&self) -> usize {
        self.observation_size
    }

    pub fn action_size(&self) -> usize {
        self.action_size
    }

    /// One value per row of `[observation, action]`.
    pub fn forward(&self, observation: Tensor<B, 2>, action: Tensor<B, 2>) -> error::Result<Tensor<B, 1>> {
        let [observation_rows, observation_width] = observation.dims();
        let [action_rows, action_width] = action.dims();
        if observation_width != self.observation_size {
            return Err(error::Error::input_shape(
                "observation width",
                self.observation_size,
                observation_width,
            ));
        }
        if action_width != self.action_size {
            return Err(error::Error::input_shape("action width", self.action_size, action_width));
        }
        if action_rows != observation_rows {
            return Err(error::Error::input_shape("action rows", observation_rows, action_rows));
        }
        Ok(self.network.forward(join_columns(observation, action)).squeeze(1))
    }
}

/// `[observation, action]` along the column axis.
///
/// Written into a zero tensor rather than with `Tensor::cat`: the autodiff `cat`
/// assigns column offsets to tracked inputs only, so with an untracked
/// observation the action would receive the observation's gradient.
fn join_columns<B: Backend>(observation: Tensor<B, 2>, action: Tensor<B, 2>) -> Tensor<B, 2> {
    let [rows, observation_width] = observation.dims();
    let [_, action_width] = action.dims();
    let width = observation_width + action_width;
    Tensor::zeros([rows, width], &observation.device())
        .slice_assign([0..rows, 0..observation_width], observation)
        .slice_assign([0..rows, observation_width..width], action)
}

impl<B: Backend> Critic<B> for QNetwork<B> {
    type OBatch = Tensor<B, 2>;
    type ABatch = Tensor<B, 2>;

    fn q_batch(&self, observations: &Self::OBatch, actions: &Self::ABatch) -> error::Result<Tensor<B, 1>> {
        self.forward(observations.clone(), actions.clone())
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        module::AutodiffModule,
        tensor::Distribution,
    };

    use super::*;
    use crate::error::ErrorKind;

    type B = NdArray;

    #[test]
    fn test_one_value_per_row() {
        let device = &Default::default();
        let q = QNetworkConfig::new(3, 2).init::<B>(device).unwrap();
        let observation = Tensor::<B, 2>::random([7, 3], Distribution::Default, device);
        let action = Tensor::<B, 2>::random([7, 2], Distribution::Default, device);
        assert_eq!(q.q_batch(&observation, &action).unwrap().dims(), [7]);
    }

    #[test]
    fn test_independent_initialisation() {
        let device = &Default::default();
        let config = QNetworkConfig::new(2, 1);
        let q1 = config.init::<B>(device).unwrap();
        let q2 = config.init::<B>(device).unwrap();
        let observation = Tensor::<B, 2>::ones([1, 2], device);
        let action = Tensor::<B, 2>::ones([1, 1], device);
        let v1 = q1.forward(observation.clone(), action.clone()).unwrap();
        let v2 = q2.forward(observation, action).unwrap();
        assert_ne!(
            v1.into_data().to_vec::<f32>().unwrap(),
            v2.into_data().to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn test_action_gradient_with_untracked_observation() {
        type AD = Autodiff<B>;
        let device = &Default::default();
        let q = QNetworkConfig::new(1, 1).init::<AD>(device).unwrap();
        let observation = Tensor::<AD, 2>::from_floats([[0.2], [0.7], [-0.4]], device);
        let action = Tensor::<AD, 2>::from_floats([[0.5], [-0.3], [0.9]], device).require_grad();
        let grads = q
            .forward(observation.clone(), action.clone())
            .unwrap()
            .sum()
            .backward();
        let analytic = action.grad(&grads).unwrap().into_data().to_vec::<f32>().unwrap();

        // Central differences on the action column only.
        let q = q.valid();
        let step = 1e-3;
        let value = |shift: f64| {
            q.forward(observation.clone().inner(), action.clone().inner() + shift)
                .unwrap()
                .into_data()
                .to_vec::<f32>()
                .unwrap()
        };
        let numeric = value(step)
            .into_iter()
            .zip(value(-step))
            .map(|(up, down)| (up - down) / (2.0 * step as f32));
        for (analytic, numeric) in analytic.iter().zip(numeric) {
            assert!((analytic - numeric).abs() < 1e-2, "{analytic} != {numeric}");
        }
    }

    #[test]
    fn test_join_keeps_column_order() {
        let device = &Default::default();
        let observation = Tensor::<B, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], device);
        let action = Tensor::<B, 2>::from_floats([[5.0], [6.0]], device);
        let joined = join_columns(observation, action);
        assert_eq!(
            joined.into_data().to_vec::<f32>().unwrap(),
            vec![1.0, 2.0, 5.0, 3.0, 4.0, 6.0]
        );
    }

    #[test]
    fn test_rejects_mismatched_inputs() {
        let device = &Default::default();
        let q = QNetworkConfig::new(3, 2).init::<B>(device).unwrap();
        let cases = [([4, 3], [4, 1]), ([4, 2], [4, 2]), ([4, 3], [5, 2])];
        for (observation_dims, action_dims) in cases {
            let err = q
                .forward(
                    Tensor::<B, 2>::zeros(observation_dims, device),
                    Tensor::<B, 2>::zeros(action_dims, device),
                )
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InputShape);
        }
    }
}
