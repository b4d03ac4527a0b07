//! # Window Geometry
//!
//! Index transforms between a volumetric feature map `[batch, depth, height,
//! width, channels]` and a batch of flattened attention windows
//! `[batch * num_windows, window_volume, channels]`.
//!
//! Windows are ordered row-major over their (depth, height, width) grid index,
//! and the positions inside a window are ordered the same way. Partitioning and
//! reversing are pure reshapes and permutations, so a round trip reproduces the
//! input exactly.
//!
//! The unchecked functions assume every spatial extent is a multiple of the
//! matching window component. The `try_` variants validate that first.

use burn::prelude::*;
use thiserror::Error;

/// Names of the three spatial axes, in tensor order.
pub const AXIS_NAMES: [&str; 3] = ["depth", "height", "width"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("{} extent {extent} is not a multiple of window size {window}", axis_name(.axis))]
    NotDivisible {
        axis: usize,
        extent: usize,
        window: usize,
    },
    #[error("window size along {} must be non-zero", axis_name(.axis))]
    ZeroWindow { axis: usize },
    #[error("shift {shift} along {} must be smaller than window size {window}", axis_name(.axis))]
    ShiftTooLarge {
        axis: usize,
        shift: usize,
        window: usize,
    },
    #[error("expected {expected} windows of {volume} positions, got {actual_windows} of {actual_volume}")]
    WindowCount {
        expected: usize,
        volume: usize,
        actual_windows: usize,
        actual_volume: usize,
    },
}

pub type WindowResult<T> = Result<T, WindowError>;

fn axis_name(axis: &usize) -> &'static str {
    AXIS_NAMES.get(*axis).copied().unwrap_or("unknown")
}

/// Window layout of one attention stage.
#[derive(Config, Debug)]
pub struct WindowConfig {
    /// Window extent along (depth, height, width).
    pub window_size: [usize; 3],
    /// Cyclic shift applied before windowing, along (depth, height, width).
    #[config(default = "[0, 0, 0]")]
    pub shift_size: [usize; 3],
}

impl WindowConfig {
    /// Sets the shift to half the window along every axis, the layout used by
    /// the shifted-window layers.
    pub fn shifted_by_half(self) -> Self {
        let shift_size = self.window_size.map(|w| w / 2);
        self.with_shift_size(shift_size)
    }

    /// Whether any axis is shifted.
    pub fn is_shifted(&self) -> bool {
        self.shift_size.iter().any(|&s| s > 0)
    }

    /// Checks that every window component is non-zero and every shift is
    /// smaller than its window.
    pub fn validate(&self) -> WindowResult<()> {
        for axis in 0..3 {
            let window = self.window_size[axis];
            let shift = self.shift_size[axis];
            if window == 0 {
                return Err(WindowError::ZeroWindow { axis });
            }
            if shift >= window {
                return Err(WindowError::ShiftTooLarge {
                    axis,
                    shift,
                    window,
                });
            }
        }
        Ok(())
    }

    /// Window and shift sizes to use for an input with spatial extent `x_size`.
    pub fn effective_sizes(&self, x_size: [usize; 3]) -> ([usize; 3], [usize; 3]) {
        get_window_and_shift_size(x_size, self.window_size, self.shift_size)
    }
}

/// Clamps the window to the input along every axis where the input is not
/// larger than the window.
pub fn get_window_size(x_size: [usize; 3], window_size: [usize; 3]) -> [usize; 3] {
    let mut window = window_size;
    for axis in 0..3 {
        if x_size[axis] <= window_size[axis] {
            window[axis] = x_size[axis];
        }
    }
    window
}

/// Like [`get_window_size`], and also zeroes the shift on every clamped axis.
pub fn get_window_and_shift_size(
    x_size: [usize; 3],
    window_size: [usize; 3],
    shift_size: [usize; 3],
) -> ([usize; 3], [usize; 3]) {
    let mut shift = shift_size;
    for axis in 0..3 {
        if x_size[axis] <= window_size[axis] {
            shift[axis] = 0;
        }
    }
    (get_window_size(x_size, window_size), shift)
}

/// Rounds every spatial extent up to the next multiple of the window.
pub fn padded_extent(x_size: [usize; 3], window_size: [usize; 3]) -> [usize; 3] {
    core::array::from_fn(|axis| x_size[axis].div_ceil(window_size[axis]) * window_size[axis])
}

/// Number of windows covering an extent that is a multiple of the window.
pub fn num_windows(x_size: [usize; 3], window_size: [usize; 3]) -> usize {
    (0..3).map(|axis| x_size[axis] / window_size[axis]).product()
}

/// Number of positions inside one window.
pub fn window_volume(window_size: [usize; 3]) -> usize {
    window_size.iter().product()
}

/// Splits a feature map into non-overlapping windows.
///
/// # Shapes
/// - input: `[batch, depth, height, width, channels]`
/// - output: `[batch * num_windows, wd * wh * ww, channels]`
pub fn window_partition<B: Backend>(x: Tensor<B, 5>, window_size: [usize; 3]) -> Tensor<B, 3> {
    let [b, d, h, w, c] = x.dims();
    let [wd, wh, ww] = window_size;

    // Batch folds into the depth grid and channels into the width window so
    // the permutation stays at rank 6.
    x.reshape([b * (d / wd), wd, h / wh, wh, w / ww, ww * c])
        .permute([0, 2, 4, 1, 3, 5])
        .reshape([
            b * num_windows([d, h, w], window_size),
            window_volume(window_size),
            c,
        ])
}

/// Reassembles windows produced by [`window_partition`] into a feature map.
///
/// # Shapes
/// - input: `[batch * num_windows, wd * wh * ww, channels]`
/// - output: `[batch, depth, height, width, channels]`
pub fn window_reverse<B: Backend>(
    windows: Tensor<B, 3>,
    window_size: [usize; 3],
    b: usize,
    d: usize,
    h: usize,
    w: usize,
) -> Tensor<B, 5> {
    let [_, _, c] = windows.dims();
    let [wd, wh, ww] = window_size;

    windows
        .reshape([b * (d / wd), h / wh, w / ww, wd, wh, ww * c])
        .permute([0, 3, 1, 4, 2, 5])
        .reshape([b, d, h, w, c])
}

fn check_divisible(x_size: [usize; 3], window_size: [usize; 3]) -> WindowResult<()> {
    for axis in 0..3 {
        let (extent, window) = (x_size[axis], window_size[axis]);
        if window == 0 {
            return Err(WindowError::ZeroWindow { axis });
        }
        if extent % window != 0 {
            return Err(WindowError::NotDivisible {
                axis,
                extent,
                window,
            });
        }
    }
    Ok(())
}

/// [`window_partition`] with the divisibility precondition checked.
pub fn try_window_partition<B: Backend>(
    x: Tensor<B, 5>,
    window_size: [usize; 3],
) -> WindowResult<Tensor<B, 3>> {
    let [_, d, h, w, _] = x.dims();
    check_divisible([d, h, w], window_size)?;
    Ok(window_partition(x, window_size))
}

/// [`window_reverse`] with divisibility and window count checked.
pub fn try_window_reverse<B: Backend>(
    windows: Tensor<B, 3>,
    window_size: [usize; 3],
    b: usize,
    d: usize,
    h: usize,
    w: usize,
) -> WindowResult<Tensor<B, 5>> {
    check_divisible([d, h, w], window_size)?;

    let [actual_windows, actual_volume, _] = windows.dims();
    let expected = b * num_windows([d, h, w], window_size);
    let volume = window_volume(window_size);
    if actual_windows != expected || actual_volume != volume {
        return Err(WindowError::WindowCount {
            expected,
            volume,
            actual_windows,
            actual_volume,
        });
    }

    Ok(window_reverse(windows, window_size, b, d, h, w))
}
