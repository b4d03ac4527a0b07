//! Tensor operations for windowed-attention restoration transformers.
//!
//! These are operations that Burn does not ship: the inverse error function,
//! truncated-normal initialization, stochastic depth, and a reflection padding
//! that works for every float element type.

use burn::prelude::*;

mod drop_path;
mod erfinv;
mod reflection_pad;
mod trunc_normal;

#[doc(inline)]
pub use drop_path::{drop_path, DropPath, DropPathConfig};
#[doc(inline)]
pub use erfinv::{erfinv, Erfinv};
#[doc(inline)]
pub use reflection_pad::{reflection_pad2d, try_reflection_pad2d, PadError, PadResult};
#[doc(inline)]
pub use trunc_normal::{
    mean_outside_support, trunc_normal, trunc_normal_, TruncNormalConfig,
};

/// Extra operations as methods on Burn tensors.
pub trait TensorExtraOps<B: Backend, const D: usize> {
    /// Applies stochastic depth; see [`drop_path`].
    fn drop_path(self, drop_prob: f64, training: bool) -> Self;
}

impl<B: Backend, const D: usize> TensorExtraOps<B, D> for Tensor<B, D> {
    fn drop_path(self, drop_prob: f64, training: bool) -> Self {
        drop_path(self, drop_prob, training)
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Distribution;

    use super::*;

    pub type TestBackend = burn::backend::NdArray<f32>;

    #[test]
    fn drop_path_method_is_identity_at_inference() {
        let device = Default::default();
        let tensor =
            Tensor::<TestBackend, 4>::random([2, 3, 4, 5], Distribution::Normal(0.0, 1.0), &device);

        let output = tensor.clone().drop_path(0.1, false);

        output.into_data().assert_eq(&tensor.into_data(), true);
    }
}
