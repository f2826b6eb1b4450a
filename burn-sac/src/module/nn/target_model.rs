use burn::{
    module::{AutodiffModule, ModuleMapper, ModuleVisitor, ParamId},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::{any::Any, collections::VecDeque, marker::PhantomData};

use crate::error::{Error, Result};

/// A trainable model paired with a slowly moving copy of itself.
///
/// The target lives on the inner backend, so its parameters can only change
/// through [`WithTarget::update_target_model`], never through gradients.
#[derive(Debug)]
pub struct WithTarget<B: AutodiffBackend, T: AutodiffModule<B>> {
    pub model: T,
    pub target: T::InnerModule,
    backend: PhantomData<B>,
}

/// Live parameters in traversal order.
struct ParamCollector {
    tensors: VecDeque<(Vec<usize>, Box<dyn Any>)>,
}

impl<B: Backend> ModuleVisitor<B> for ParamCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.tensors
            .push_back((tensor.dims().to_vec(), Box::new(tensor.clone())));
    }
}

enum Blend {
    Copy,
    Polyak(f64),
}

/// Consumes the collected live parameters in order and blends them into the target.
///
/// Pairing is by position, not by [`ParamId`]: target and live come from the same
/// factory, so ids differ while order and shapes agree.
struct SoftUpdater {
    live: ParamCollector,
    blend: Blend,
    mismatch: Option<String>,
    visited: usize,
}

impl<B: Backend> ModuleMapper<B> for SoftUpdater {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        let index = self.visited;
        self.visited += 1;
        let (dims, live) = match self.live.tensors.pop_front() {
            Some(entry) => entry,
            None => {
                self.mismatch
                    .get_or_insert_with(|| format!("target has more parameters than live ({})", index));
                return tensor;
            }
        };
        let live = match live.downcast::<Tensor<B, D>>() {
            Ok(live) if dims == tensor.dims().to_vec() => *live,
            _ => {
                self.mismatch.get_or_insert_with(|| {
                    format!(
                        "parameter {} has shape {:?} in live but {:?} in target",
                        index,
                        dims,
                        tensor.dims()
                    )
                });
                return tensor;
            }
        };
        match self.blend {
            Blend::Copy => live,
            Blend::Polyak(tau) => tensor * tau + live * (1.0 - tau),
        }
    }
}

fn blend_into<B: Backend, M: Module<B>>(live: &M, target: M, blend: Blend) -> Result<M> {
    let mut collector = ParamCollector {
        tensors: VecDeque::new(),
    };
    live.visit(&mut collector);
    let mut updater = SoftUpdater {
        live: collector,
        blend,
        mismatch: None,
        visited: 0,
    };
    let target = target.map(&mut updater);
    if !updater.live.tensors.is_empty() {
        updater.mismatch.get_or_insert_with(|| {
            format!(
                "live has {} parameters left after the target's {}",
                updater.live.tensors.len(),
                updater.visited
            )
        });
    }
    match updater.mismatch {
        Some(reason) => Err(Error::ArchitectureMismatch(reason)),
        None => Ok(target),
    }
}

/// Overwrites every target parameter with the matching live parameter.
pub fn copy_parameters<B: Backend, M: Module<B>>(live: &M, target: M) -> Result<M> {
    blend_into(live, target, Blend::Copy)
}

/// Polyak averaging: `target <- target * tau + live * (1 - tau)` for every parameter pair.
pub fn polyak_update<B: Backend, M: Module<B>>(live: &M, target: M, tau: f64) -> Result<M> {
    blend_into(live, target, Blend::Polyak(tau))
}

impl<B: AutodiffBackend, T: AutodiffModule<B>> WithTarget<B, T> {
    /// Pairs `model` with `target`, overwriting the target's parameters with the model's.
    ///
    /// Fails when the two networks do not share an architecture.
    pub fn new(model: T, target: T::InnerModule) -> Result<Self> {
        let target = copy_parameters(&model.valid(), target)?;
        Ok(WithTarget {
            model,
            target,
            backend: PhantomData,
        })
    }

    pub fn init(model: T) -> Self {
        let target = model.valid();
        WithTarget {
            model,
            target,
            backend: PhantomData,
        }
    }

    /// Moves the target towards the model with [`polyak_update`].
    pub fn update_target_model(&mut self, tau: f64) -> Result<()> {
        let live = self.model.valid();
        self.target = polyak_update(&live, self.target.clone(), tau)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        module::Param,
    };
    use expect_test::expect;
    use nn::{Linear, LinearConfig};

    use super::*;

    type B = Autodiff<NdArray>;

    fn reset_weights<B: Backend, const D: usize>(
        param: &Param<Tensor<B, D, Float>>,
        weight: f64,
    ) -> Param<Tensor<B, D, Float>> {
        Param::initialized(param.id, Tensor::ones_like(&param.val()) * weight)
    }

    #[test]
    fn test_target_model() {
        // Initialise testing model
        let device = &Default::default();
        let model: Linear<B> = LinearConfig::new(4, 2).init(device);
        let mut model = WithTarget::init(model);

        // Reset weights
        model.model.weight = reset_weights(&model.model.weight, 1.0);
        model.model.bias = Some(reset_weights(&model.model.bias.unwrap(), 1.0));
        model.target.weight = reset_weights(&model.target.weight, 0.0);
        model.target.bias = Some(reset_weights(&model.target.bias.unwrap(), 0.0));

        // Generate
        let x = [[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]];
        let x = Tensor::<NdArray, 2>::from_floats(x, device);
        let model_expected = expect![[r#"
            [
                11.0,
                11.0,
                27.0,
                27.0,
            ]
        "#]];
        let forward = |linear: &Linear<NdArray>| {
            linear
                .forward(x.clone())
                .into_data()
                .to_vec::<f32>()
                .unwrap()
        };
        model_expected.assert_debug_eq(&forward(&model.model.valid()));
        let target_expected = expect![[r#"
            [
                0.0,
                0.0,
                0.0,
                0.0,
            ]
        "#]];
        target_expected.assert_debug_eq(&forward(&model.target));

        model.update_target_model(0.5).unwrap();
        let target_expected = expect![[r#"
            [
                5.5,
                5.5,
                13.5,
                13.5,
            ]
        "#]];
        target_expected.assert_debug_eq(&forward(&model.target));

        model.update_target_model(0.0).unwrap();
        model_expected.assert_debug_eq(&forward(&model.model.valid()));
        model_expected.assert_debug_eq(&forward(&model.target));
    }

    #[test]
    fn test_slow_tau_keeps_most_of_the_target() {
        let device = &Default::default();
        let mut live = LinearConfig::new(1, 1).init::<NdArray>(device);
        live.weight = reset_weights(&live.weight, 1.0);
        live.bias = Some(reset_weights(&live.bias.unwrap(), 1.0));
        let mut target =
            copy_parameters(&live, LinearConfig::new(1, 1).init::<NdArray>(device)).unwrap();
        target.weight = reset_weights(&target.weight, 0.0);
        target.bias = Some(reset_weights(&target.bias.unwrap(), 0.0));

        let target = polyak_update(&live, target, 0.75).unwrap();
        let weight = target.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(weight, vec![0.25]);
    }

    #[test]
    fn test_copy_rejects_different_architectures() {
        let device = &Default::default();
        let live = LinearConfig::new(4, 2).init::<NdArray>(device);
        let target = LinearConfig::new(4, 3).init::<NdArray>(device);
        let err = copy_parameters(&live, target).unwrap_err();
        assert!(matches!(err, Error::ArchitectureMismatch(_)));

        let without_bias = LinearConfig::new(4, 2)
            .with_bias(false)
            .init::<NdArray>(device);
        let err = copy_parameters(&live, without_bias).unwrap_err();
        assert!(matches!(err, Error::ArchitectureMismatch(_)));
    }
}
