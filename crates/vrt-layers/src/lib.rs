//! Building blocks for windowed-attention video restoration transformers.
//!
//! - [`window`]: effective window sizes and the partition/reverse transforms
//!   between feature volumes and attention windows.
//! - [`mask`]: additive masks for shifted-window attention and their cache.
//! - [`mlp`]: the GEGLU feed-forward block.
//!
//! Tensor-level helpers (stochastic depth, truncated-normal init, reflection
//! padding) are re-exported from `vrt-extra-ops`.

pub mod mask;
pub mod mlp;
pub mod window;

#[doc(inline)]
pub use mask::{build_attention_mask, AttentionMaskCache, MaskKey, MASKED};
#[doc(inline)]
pub use mlp::{GateActivation, MlpGeglu, MlpGegluConfig};
#[doc(inline)]
pub use window::{
    get_window_and_shift_size, get_window_size, padded_extent, try_window_partition,
    try_window_reverse, window_partition, window_reverse, WindowConfig, WindowError,
    WindowResult,
};

pub use vrt_extra_ops::{
    drop_path, reflection_pad2d, trunc_normal, trunc_normal_, DropPath, DropPathConfig,
    TruncNormalConfig,
};
