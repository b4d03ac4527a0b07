//! # Reflection Padding
//!
//! Pads the two spatial axes of a `[batch, channels, height, width]` tensor by
//! mirroring interior values across each border, excluding the border value
//! itself (`[a, b, c]` with `pad = 1` becomes `[b, a, b, c, b]`).
//!
//! The padding is assembled from `narrow` and `cat` only, so it works for any
//! float element type the backend stores, including the narrow formats that a
//! backend padding kernel may not implement.

use burn::prelude::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PadError {
    #[error("reflection padding {pad} must be smaller than the spatial extent {height}x{width}")]
    TooLarge {
        pad: usize,
        height: usize,
        width: usize,
    },
}

pub type PadResult<T> = Result<T, PadError>;

/// Reflection-pads the last two axes of `x` by `pad` on every side.
///
/// Requires `pad < height` and `pad < width`; see [`try_reflection_pad2d`] for
/// the checked form.
///
/// # Shapes
/// - input: `[batch, channels, height, width]`
/// - output: `[batch, channels, height + 2 * pad, width + 2 * pad]`
pub fn reflection_pad2d<B: Backend>(x: Tensor<B, 4>, pad: usize) -> Tensor<B, 4> {
    if pad == 0 {
        return x;
    }
    let x = reflect_axis(x, 2, pad);
    reflect_axis(x, 3, pad)
}

/// [`reflection_pad2d`] with the size precondition checked up front.
pub fn try_reflection_pad2d<B: Backend>(x: Tensor<B, 4>, pad: usize) -> PadResult<Tensor<B, 4>> {
    let [_, _, height, width] = x.dims();
    if pad >= height || pad >= width {
        return Err(PadError::TooLarge { pad, height, width });
    }
    Ok(reflection_pad2d(x, pad))
}

fn reflect_axis<B: Backend>(x: Tensor<B, 4>, axis: usize, pad: usize) -> Tensor<B, 4> {
    let len = x.dims()[axis];

    let leading = (1..=pad).rev().map(|i| x.clone().narrow(axis, i, 1));
    let trailing = (len - 1 - pad..len - 1)
        .rev()
        .map(|i| x.clone().narrow(axis, i, 1));

    let parts = leading
        .chain(core::iter::once(x.clone()))
        .chain(trailing)
        .collect::<Vec<_>>();

    Tensor::cat(parts, axis)
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, tensor::TensorData};
    use rstest::rstest;

    use super::*;
    use crate::tests::TestBackend;

    fn reflect_index(i: isize, len: usize) -> usize {
        let last = len as isize - 1;
        let i = i.abs();
        (if i > last { 2 * last - i } else { i }) as usize
    }

    #[test]
    fn pads_known_input_by_one() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::from_floats(
            [[[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]]],
            &device,
        );

        let padded = reflection_pad2d(x, 1);

        let expected = TensorData::from([[[
            [5.0f32, 4.0, 5.0, 6.0, 5.0],
            [2.0, 1.0, 2.0, 3.0, 2.0],
            [5.0, 4.0, 5.0, 6.0, 5.0],
            [8.0, 7.0, 8.0, 9.0, 8.0],
            [5.0, 4.0, 5.0, 6.0, 5.0],
        ]]]);
        padded.into_data().assert_eq(&expected, true);
    }

    #[rstest]
    #[case([1, 1, 4, 5], 1)]
    #[case([2, 3, 4, 5], 2)]
    #[case([1, 2, 6, 3], 2)]
    #[case([2, 1, 7, 9], 3)]
    fn matches_index_reflection(#[case] shape: [usize; 4], #[case] pad: usize) {
        let device = Default::default();
        let [b, c, h, w] = shape;
        let x = Tensor::<TestBackend, 1, Int>::arange(0..(b * c * h * w) as i64, &device)
            .float()
            .reshape(shape);

        let padded = reflection_pad2d(x.clone(), pad);
        assert_eq!(padded.dims(), [b, c, h + 2 * pad, w + 2 * pad]);

        let source = x.into_data();
        let source = source.as_slice::<f32>().unwrap();
        let data = padded.into_data();
        let values = data.as_slice::<f32>().unwrap();

        let (hp, wp) = (h + 2 * pad, w + 2 * pad);
        for plane in 0..b * c {
            for i in 0..hp {
                for j in 0..wp {
                    let si = reflect_index(i as isize - pad as isize, h);
                    let sj = reflect_index(j as isize - pad as isize, w);
                    assert_eq!(
                        values[(plane * hp + i) * wp + j],
                        source[(plane * h + si) * w + sj],
                        "mismatch at plane {plane}, row {i}, col {j}"
                    );
                }
            }
        }
    }

    #[test]
    fn zero_pad_is_identity() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::ones([1, 2, 3, 3], &device);

        assert_eq!(reflection_pad2d(x, 0).dims(), [1, 2, 3, 3]);
    }

    #[test]
    fn works_for_double_precision() {
        let device = Default::default();
        let x = Tensor::<NdArray<f64>, 4>::from_floats([[[[0.5, 1.5], [2.5, 3.5]]]], &device);

        let padded = reflection_pad2d(x, 1);

        let expected = TensorData::from([[[
            [3.5f64, 2.5, 3.5, 2.5],
            [1.5, 0.5, 1.5, 0.5],
            [3.5, 2.5, 3.5, 2.5],
            [1.5, 0.5, 1.5, 0.5],
        ]]]);
        padded.into_data().assert_eq(&expected, true);
    }

    #[rstest]
    #[case(3, 3, 3)]
    #[case(4, 2, 5)]
    #[case(2, 5, 2)]
    fn rejects_pad_not_smaller_than_extent(
        #[case] pad: usize,
        #[case] height: usize,
        #[case] width: usize,
    ) {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::zeros([1, 1, height, width], &device);

        let err = try_reflection_pad2d(x, pad).unwrap_err();
        assert_eq!(err, PadError::TooLarge { pad, height, width });
    }
}
