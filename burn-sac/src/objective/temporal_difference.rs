use burn::{prelude::Backend, tensor::Tensor};

/// One-step soft Bellman target:
/// `reward + discount * (1 - done) * (next_q - temperature * next_log_prob)`.
///
/// `done` is `1.0` for terminal rows and `0.0` otherwise.
pub fn soft_bellman_backup<B: Backend>(
    reward: Tensor<B, 1>,
    done: Tensor<B, 1>,
    next_q: Tensor<B, 1>,
    next_log_prob: Tensor<B, 1>,
    discount_factor: f64,
    entropy_temperature: f64,
) -> Tensor<B, 1> {
    let soft_value = next_q - next_log_prob * entropy_temperature;
    let not_done = done.neg() + 1.0;
    reward + not_done * soft_value * discount_factor
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use expect_test::expect;

    use super::*;

    type B = NdArray;

    #[test]
    fn test_soft_bellman_backup() {
        let device = &Default::default();
        let backup = soft_bellman_backup::<B>(
            Tensor::from_floats([1.0, 1.0, -2.0], device),
            Tensor::from_floats([0.0, 1.0, 0.0], device),
            Tensor::from_floats([10.0, 10.0, 4.0], device),
            Tensor::from_floats([-5.0, -5.0, 10.0], device),
            0.5,
            0.2,
        );
        let expected = expect![[r#"
            [
                6.5,
                1.0,
                -1.0,
            ]
        "#]];
        expected.assert_debug_eq(&backup.into_data().to_vec::<f32>().unwrap());
    }
}
