//! # Inverse Error Function
//!
//! Element-wise `erfinv` for Burn tensors, needed by the inverse-CDF sampler in
//! [`trunc_normal`](crate::trunc_normal).
//!
//! A rational approximation gives the starting point (one branch for the
//! central region `|y| <= 0.7`, another for the tails), then two Newton steps
//! on `erf(x) - y` bring it to working precision. `|y| >= 1` saturates to
//! `±inf`.

use burn::prelude::*;
use core::f64::consts::PI;

const CENTRAL_RANGE: f64 = 0.7;

// Central region: y * P(y^2) / Q(y^2).
const CENTRAL_NUM: [f64; 4] = [0.886_226_899, -1.645_349_621, 0.914_624_893, -0.140_543_331];
const CENTRAL_DEN: [f64; 4] = [-2.118_377_725, 1.442_710_462, -0.329_097_515, 0.012_229_801];

// Tails: sign(y) * P(z) / (1 + z Q(z)) with z = sqrt(-ln((1 - |y|) / 2)).
const TAIL_NUM: [f64; 4] = [-1.970_840_454, -1.624_906_493, 3.429_567_803, 1.641_345_311];
const TAIL_DEN: [f64; 2] = [3.543_889_200, 1.637_067_800];

const NEWTON_STEPS: usize = 2;

/// Inverse error function as a tensor extension.
pub trait Erfinv {
    /// Applies `erfinv` element-wise.
    fn erfinv(self) -> Self;
}

impl<B: Backend, const D: usize> Erfinv for Tensor<B, D> {
    fn erfinv(self) -> Self {
        erfinv(self)
    }
}

/// Element-wise inverse error function.
///
/// Values with `|y| >= 1` map to `+inf`/`-inf` following the sign of `y`.
pub fn erfinv<B: Backend, const D: usize>(y: Tensor<B, D>) -> Tensor<B, D> {
    let magnitude = y.clone().abs();

    let central = central_estimate(y.clone());
    let tail = tail_estimate(y.clone(), magnitude.clone());
    let estimate = central.mask_where(magnitude.clone().greater_elem(CENTRAL_RANGE), tail);

    let refined = newton_refine(estimate, y.clone());

    let saturated = y.sign().mul_scalar(f64::INFINITY);
    refined.mask_where(magnitude.greater_equal_elem(1.0), saturated)
}

fn central_estimate<B: Backend, const D: usize>(y: Tensor<B, D>) -> Tensor<B, D> {
    let z = y.clone().powf_scalar(2.0);

    let num = horner(z.clone(), &CENTRAL_NUM);
    let den = horner(z.clone(), &CENTRAL_DEN) * z + 1.0;

    y * num / den
}

fn tail_estimate<B: Backend, const D: usize>(
    y: Tensor<B, D>,
    magnitude: Tensor<B, D>,
) -> Tensor<B, D> {
    let z = magnitude.neg().add_scalar(1.0).div_scalar(2.0).log().neg().sqrt();

    let num = horner(z.clone(), &TAIL_NUM);
    let den = horner(z.clone(), &TAIL_DEN) * z + 1.0;

    y.sign() * num / den
}

/// Evaluates `c[0] + c[1] z + ... + c[n-1] z^(n-1)`.
fn horner<B: Backend, const D: usize>(z: Tensor<B, D>, coeffs: &[f64]) -> Tensor<B, D> {
    coeffs
        .iter()
        .rev()
        .fold(z.zeros_like(), |acc, c| acc * z.clone() + *c)
}

fn newton_refine<B: Backend, const D: usize>(
    mut x: Tensor<B, D>,
    y: Tensor<B, D>,
) -> Tensor<B, D> {
    let slope = 2.0 / PI.sqrt();
    for _ in 0..NEWTON_STEPS {
        let residual = x.clone().erf() - y.clone();
        let derivative = x.clone().powf_scalar(2.0).neg().exp().mul_scalar(slope);
        x = x - residual / derivative;
    }
    x
}
