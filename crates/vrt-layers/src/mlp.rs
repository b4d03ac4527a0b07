//! # Gated Feed-Forward Block
//!
//! The GEGLU variant of the transformer MLP: two parallel projections to the
//! hidden width, one passed through the gate nonlinearity, multiplied together,
//! then projected to the output width.
//!
//! ```text
//! x -> fc11 -> act --\
//!                     * -> dropout -> fc2 -> out
//! x -> fc12 ---------/
//! ```
//!
//! Reference: "GLU Variants Improve Transformer", <https://arxiv.org/abs/2002.05202>

use burn::{
    module::{Ignored, Param},
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation,
};
use vrt_extra_ops::trunc_normal;

/// Nonlinearity applied to the gating branch.
#[derive(Config, Debug, PartialEq, Eq, Hash)]
pub enum GateActivation {
    Gelu,
    Relu,
    Silu,
    Sigmoid,
    Tanh,
}

impl GateActivation {
    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Self::Gelu => activation::gelu(x),
            Self::Relu => activation::relu(x),
            Self::Silu => activation::silu(x),
            Self::Sigmoid => activation::sigmoid(x),
            Self::Tanh => activation::tanh(x),
        }
    }
}

/// Configuration for [`MlpGeglu`].
#[derive(Config, Debug)]
pub struct MlpGegluConfig {
    /// Size of the trailing feature axis of the input.
    pub in_features: usize,
    /// Hidden width. Defaults to `in_features`.
    #[config(default = "None")]
    pub hidden_features: Option<usize>,
    /// Output width. Defaults to `in_features`.
    #[config(default = "None")]
    pub out_features: Option<usize>,
    #[config(default = "GateActivation::Gelu")]
    pub activation: GateActivation,
    /// Dropout applied to the gated hidden features.
    #[config(default = "0.0")]
    pub drop: f64,
    #[config(default = "true")]
    pub bias: bool,
    /// When set, linear weights are drawn from a normal distribution with this
    /// std truncated to `[-2, 2]` and biases start at zero.
    #[config(default = "None")]
    pub init_std: Option<f64>,
}

impl MlpGegluConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> MlpGeglu<B> {
        let out_features = self.out_features.unwrap_or(self.in_features);
        let hidden_features = self.hidden_features.unwrap_or(self.in_features);

        MlpGeglu {
            fc11: self.linear(self.in_features, hidden_features, device),
            fc12: self.linear(self.in_features, hidden_features, device),
            act: Ignored(self.activation.clone()),
            fc2: self.linear(hidden_features, out_features, device),
            drop: DropoutConfig::new(self.drop).init(),
        }
    }

    fn linear<B: Backend>(&self, d_input: usize, d_output: usize, device: &Device<B>) -> Linear<B> {
        let mut linear = LinearConfig::new(d_input, d_output)
            .with_bias(self.bias)
            .init(device);

        if let Some(std) = self.init_std {
            let weight = trunc_normal(linear.weight.val(), 0.0, std, -2.0, 2.0);
            linear.weight = Param::from_tensor(weight);
            linear.bias = linear
                .bias
                .map(|bias| Param::from_tensor(bias.val().zeros_like()));
        }
        linear
    }
}

/// GEGLU feed-forward block acting on the trailing feature axis.
#[derive(Module, Debug)]
pub struct MlpGeglu<B: Backend> {
    fc11: Linear<B>,
    fc12: Linear<B>,
    act: Ignored<GateActivation>,
    fc2: Linear<B>,
    drop: Dropout,
}

impl<B: Backend> MlpGeglu<B> {
    /// # Shapes
    /// - input: `[..., in_features]`
    /// - output: `[..., out_features]`
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let gate = self.act.0.forward(self.fc11.forward(x.clone()));
        let x = gate * self.fc12.forward(x);
        let x = self.drop.forward(x);
        self.fc2.forward(x)
    }
}
