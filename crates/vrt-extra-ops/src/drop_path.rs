//! # Stochastic Depth
//!
//! Drops the residual branch of whole samples during training. Each sample of
//! the leading batch axis is kept with probability `1 - drop_prob`; kept samples
//! are rescaled by `1 / (1 - drop_prob)` so the expected output matches the
//! input. Outside training the operation is the identity.

use burn::{prelude::*, tensor::Distribution};

/// Configuration for the [`DropPath`] module.
#[derive(Config, Debug)]
pub struct DropPathConfig {
    /// Probability of dropping the path for a sample.
    #[config(default = "0.0")]
    pub drop_prob: f64,
    /// Whether the module is in training mode.
    #[config(default = "false")]
    pub training: bool,
}

impl DropPathConfig {
    /// Initializes a new [`DropPath`] module.
    pub const fn init<B: Backend>(&self) -> DropPath<B> {
        DropPath {
            drop_prob: self.drop_prob,
            training: self.training,
            _phantom: core::marker::PhantomData,
        }
    }
}

/// Per-sample residual path dropping.
#[derive(Module, Debug)]
pub struct DropPath<B: Backend> {
    drop_prob: f64,
    training: bool,
    _phantom: core::marker::PhantomData<B>,
}

impl<B: Backend> DropPath<B> {
    /// Applies [`drop_path`] with the configured probability and mode.
    ///
    /// # Shapes
    /// - input: `[batch_size, ...]`
    /// - output: `[batch_size, ...]`
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        drop_path(x, self.drop_prob, self.training)
    }

    /// The configured drop probability.
    pub const fn drop_prob(&self) -> f64 {
        self.drop_prob
    }
}

/// Drops whole samples of `x` with probability `drop_prob`.
///
/// Returns `x` untouched when `drop_prob == 0` or `training` is false. Otherwise
/// a Bernoulli keep mask of shape `[batch_size, 1, ..., 1]` is drawn for this
/// call, broadcast over the remaining axes, and the output is
/// `x / keep_prob * mask`.
pub fn drop_path<B: Backend, const D: usize>(
    x: Tensor<B, D>,
    drop_prob: f64,
    training: bool,
) -> Tensor<B, D> {
    if drop_prob == 0.0 || !training {
        return x;
    }
    let keep_prob = 1.0 - drop_prob;

    let mut mask_shape = [1; D];
    mask_shape[0] = x.dims()[0];
    let keep = Tensor::<B, D>::random(mask_shape, Distribution::Bernoulli(keep_prob), &x.device());

    x.div_scalar(keep_prob) * keep
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use burn::tensor::ElementConversion;
    use rstest::rstest;

    use super::*;
    use crate::tests::TestBackend;

    fn random_input<const D: usize>(shape: [usize; D]) -> Tensor<TestBackend, D> {
        Tensor::random(shape, Distribution::Normal(0.0, 1.0), &Default::default())
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(0.3, false)]
    #[case(0.9, false)]
    #[case(0.0, false)]
    fn identity_when_disabled(#[case] drop_prob: f64, #[case] training: bool) {
        let x = random_input([3, 4, 5]);

        let output = drop_path(x.clone(), drop_prob, training);

        output.into_data().assert_eq(&x.into_data(), true);
    }

    #[test]
    fn module_follows_config() {
        let x = random_input([2, 8]);

        let eval = DropPathConfig::new().with_drop_prob(0.5).init::<TestBackend>();
        eval.forward(x.clone())
            .into_data()
            .assert_eq(&x.clone().into_data(), true);

        let train = DropPathConfig::new()
            .with_drop_prob(0.5)
            .with_training(true)
            .init::<TestBackend>();
        assert_eq!(train.drop_prob(), 0.5);
        assert_eq!(train.forward(x).dims(), [2, 8]);
    }

    #[rstest]
    #[case(0.5)]
    #[case(0.2)]
    #[case(0.75)]
    fn kept_samples_are_rescaled_and_dropped_samples_are_zero(#[case] drop_prob: f64) {
        let device = Default::default();
        let batch_size = 16;
        let x = Tensor::<TestBackend, 3>::ones([batch_size, 4, 4], &device);
        let scale = 1.0 / (1.0 - drop_prob);

        let output = drop_path(x, drop_prob, true);
        let data = output.into_data();
        let values = data.as_slice::<f32>().unwrap();

        for sample in values.chunks(16) {
            let first = sample[0];
            assert!(sample.iter().all(|v| *v == first), "mask must cover the whole sample");
            if first != 0.0 {
                assert_relative_eq!(f64::from(first), scale, max_relative = 1e-6);
            }
        }
    }

    #[rstest]
    #[case(0.5)]
    #[case(0.1)]
    fn empirical_keep_rate_matches_probability(#[case] drop_prob: f64) {
        let device = Default::default();
        let batch_size = 50;
        let trials = 40;
        let x = Tensor::<TestBackend, 2>::ones([batch_size, 3], &device);

        let mut kept = 0usize;
        for _ in 0..trials {
            let output = drop_path(x.clone(), drop_prob, true);
            let per_sample = output.sum_dim(1);
            kept += per_sample
                .greater_elem(0.0)
                .int()
                .sum()
                .into_scalar()
                .elem::<i64>() as usize;
        }

        let keep_rate = kept as f64 / (batch_size * trials) as f64;
        assert!(
            (keep_rate - (1.0 - drop_prob)).abs() < 0.05,
            "keep rate {keep_rate} deviates from {}",
            1.0 - drop_prob
        );
    }

    #[test]
    fn mask_is_fresh_per_call() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::ones([64, 2], &device);

        let first = drop_path(x.clone(), 0.5, true).into_data();
        let differs = (0..10).any(|_| drop_path(x.clone(), 0.5, true).into_data() != first);

        assert!(differs);
    }
}
