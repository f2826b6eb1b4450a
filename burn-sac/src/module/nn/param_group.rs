//! Explicit parameter ownership.
//!
//! A [`ParamGroup`] names the parameters a component owns, collected by walking
//! the module tree. Optimizers in this crate only ever see gradients gathered
//! for one group, which is how "an optimizer over Q1 ∪ Q2" is expressed with
//! burn's module-wide optimizers.

use std::collections::HashSet;

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

#[derive(Debug, Clone, Default)]
pub struct ParamGroup {
    ids: Vec<ParamId>,
    lookup: HashSet<ParamId>,
    sizes: Vec<usize>,
}

struct IdCollector<'a> {
    group: &'a mut ParamGroup,
}

impl<B: Backend> ModuleVisitor<B> for IdCollector<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, tensor: &Tensor<B, D>) {
        if self.group.lookup.insert(id) {
            self.group.ids.push(id);
            self.group.sizes.push(tensor.shape().num_elements());
        }
    }
}

struct GradientCollector<'a, B: AutodiffBackend> {
    group: &'a ParamGroup,
    grads: &'a mut B::Gradients,
    collected: GradientsParams,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradientCollector<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, tensor: &Tensor<B, D>) {
        if !self.group.contains(&id) {
            return;
        }
        if let Some(grad) = tensor.grad_remove(self.grads) {
            self.collected.register::<B::InnerBackend, D>(id, grad);
        }
    }
}

impl ParamGroup {
    /// Enumerates every float parameter owned by `module`, children included.
    pub fn of<B: Backend, M: Module<B>>(module: &M) -> Self {
        let mut group = ParamGroup::default();
        module.visit(&mut IdCollector { group: &mut group });
        group
    }

    pub fn union(mut self, other: &ParamGroup) -> Self {
        for (id, size) in other.ids.iter().zip(other.sizes.iter()) {
            if self.lookup.insert(*id) {
                self.ids.push(*id);
                self.sizes.push(*size);
            }
        }
        self
    }

    pub fn contains(&self, id: &ParamId) -> bool {
        self.lookup.contains(id)
    }

    pub fn ids(&self) -> &[ParamId] {
        &self.ids
    }

    /// Number of parameter tensors in the group.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of scalar values across all parameter tensors in the group.
    pub fn num_elements(&self) -> usize {
        self.sizes.iter().sum()
    }

    /// Moves the gradients of this group's parameters out of `grads`.
    ///
    /// Gradients of parameters outside the group are left in `grads` untouched.
    pub fn gradients<B, M>(&self, grads: &mut B::Gradients, module: &M) -> GradientsParams
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        let mut collector = GradientCollector::<B> {
            group: self,
            grads,
            collected: GradientsParams::new(),
        };
        module.visit(&mut collector);
        collector.collected
    }
}

/// Returns a copy of `module` whose parameters are excluded from the backward pass.
///
/// Gradients still flow through the frozen module into its inputs. The original
/// module keeps tracking gradients; dropping the copy ends the freeze.
pub fn freeze<B: Backend, M: Module<B>>(module: &M) -> M {
    module.clone().no_grad()
}
