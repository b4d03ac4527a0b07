//! # Truncated Normal Initialization
//!
//! Fills tensors with samples from `N(mean, std^2)` restricted to `[a, b]`.
//! Sampling goes through the inverse CDF: uniform samples between the CDF
//! values of the two bounds are pushed through `erfinv`, so no sample is ever
//! rejected. The method degrades when `mean` is far outside `[a, b]`; that case
//! is logged and sampling continues.

use burn::{prelude::*, tensor::Distribution};
use core::f64::consts::SQRT_2;

use crate::erfinv::Erfinv;

/// Parameters of a truncated normal distribution.
#[derive(Config, Debug)]
pub struct TruncNormalConfig {
    /// Mean of the underlying normal distribution.
    #[config(default = "0.0")]
    pub mean: f64,
    /// Standard deviation of the underlying normal distribution.
    #[config(default = "1.0")]
    pub std: f64,
    /// Lower cutoff.
    #[config(default = "-2.0")]
    pub a: f64,
    /// Upper cutoff.
    #[config(default = "2.0")]
    pub b: f64,
}

impl TruncNormalConfig {
    /// Returns a tensor shaped like `x` filled with fresh samples.
    pub fn sample<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        trunc_normal(x, self.mean, self.std, self.a, self.b)
    }

    /// Overwrites `x` with fresh samples.
    pub fn fill_<'a, B: Backend, const D: usize>(
        &self,
        x: &'a mut Tensor<B, D>,
    ) -> &'a mut Tensor<B, D> {
        trunc_normal_(x, self.mean, self.std, self.a, self.b)
    }
}

/// Whether `mean` lies more than two standard deviations outside `[a, b]`.
pub fn mean_outside_support(mean: f64, std: f64, a: f64, b: f64) -> bool {
    mean < a - 2.0 * std || mean > b + 2.0 * std
}

/// Standard normal cumulative distribution function.
fn norm_cdf(x: f64) -> f64 {
    (1.0 + libm::erf(x / SQRT_2)) / 2.0
}

/// Returns a tensor shaped like `x` with values drawn from a truncated normal
/// distribution. The contents of `x` are ignored.
///
/// The result is detached from any autodiff graph.
///
/// # Arguments
///
/// * `x` - Tensor providing the shape and device.
/// * `mean` - The mean of the normal distribution.
/// * `std` - The standard deviation of the normal distribution.
/// * `a` - The minimum cutoff value.
/// * `b` - The maximum cutoff value.
pub fn trunc_normal<B: Backend, const D: usize>(
    x: Tensor<B, D>,
    mean: f64,
    std: f64,
    a: f64,
    b: f64,
) -> Tensor<B, D> {
    if mean_outside_support(mean, std, a, b) {
        tracing::warn!(
            mean,
            std,
            a,
            b,
            "mean is more than 2 std from [a, b] in trunc_normal; the distribution of values may be incorrect"
        );
    }

    let low = norm_cdf((a - mean) / std);
    let up = norm_cdf((b - mean) / std);

    // Map U(0, 1) onto [2l - 1, 2u - 1]; the range collapses to a point when
    // the mean sits far outside [a, b].
    let (lo, hi) = (2.0 * low - 1.0, 2.0 * up - 1.0);
    let uniform = x
        .detach()
        .random_like(Distribution::Uniform(0.0, 1.0))
        .mul_scalar(hi - lo)
        .add_scalar(lo);

    uniform
        .erfinv()
        .mul_scalar(std * SQRT_2)
        .add_scalar(mean)
        .clamp(a, b)
        .detach()
}

/// In-place form of [`trunc_normal`]: overwrites `tensor` and returns it for
/// chaining.
pub fn trunc_normal_<B: Backend, const D: usize>(
    tensor: &mut Tensor<B, D>,
    mean: f64,
    std: f64,
    a: f64,
    b: f64,
) -> &mut Tensor<B, D> {
    *tensor = trunc_normal(tensor.clone(), mean, std, a, b);
    tensor
}
