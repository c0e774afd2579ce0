//! A small extension of rust-ndarray
//!
//! Mainly provides `array_gen`, a collection of array generator functions.
use smallvec::SmallVec;

pub type NdArray<T> = ndarray::Array<T, ndarray::IxDyn>;

pub type NdArrayView<'a, T> = ndarray::ArrayView<'a, T, ndarray::IxDyn>;

/// One flag per dimension. Ranks above 8 spill to the heap.
pub type AxisMask = SmallVec<[bool; 8]>;

#[inline]
pub(crate) fn normalize_negative_axis(axis: isize, ndim: usize) -> usize {
    if axis < 0 {
        (ndim as isize + axis) as usize
    } else {
        axis as usize
    }
}

/// Turns an `axis` list into the set of dimensions to flip.
///
/// Each listed axis toggles its dimension, so duplicates cancel in pairs.
/// Returns `None` if an entry lies outside `[-ndim, ndim)`.
pub fn flip_mask(axes: &[i32], ndim: usize) -> Option<AxisMask> {
    let mut mask: AxisMask = SmallVec::from_elem(false, ndim);
    for &a in axes {
        let a = a as isize;
        if a >= ndim as isize || a < -(ndim as isize) {
            return None;
        }
        let a = normalize_negative_axis(a, ndim);
        mask[a] = !mask[a];
    }
    Some(mask)
}

/// Row-major strides of `shape`, in elements.
pub(crate) fn contiguous_strides(shape: &[usize]) -> SmallVec<[usize; 8]> {
    let mut strides: SmallVec<[usize; 8]> = SmallVec::from_elem(1, shape.len());
    let mut acc = 1;
    for i in (0..shape.len()).rev() {
        strides[i] = acc;
        acc *= shape[i];
    }
    strides
}

/// Array generators, handy for building inputs of any element type.
pub mod array_gen {
    use super::NdArray;
    use crate::dtype::Element;
    use rand::distributions::{Distribution, Standard};
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;

    /// `0, 1, 2, ...` in row-major order, cast to `T`.
    pub fn seq<T: Element>(shape: &[usize]) -> NdArray<T> {
        let len = shape.iter().product();
        let v = (0..len).map(T::from_index).collect::<Vec<T>>();
        // len matches the shape by construction
        NdArray::from_shape_vec(ndarray::IxDyn(shape), v).unwrap()
    }

    /// Seeded random array generator.
    pub struct ArrayRng<R: Rng = XorShiftRng> {
        rng: R,
    }

    impl ArrayRng<XorShiftRng> {
        pub fn from_seed(seed: u64) -> Self {
            ArrayRng {
                rng: XorShiftRng::seed_from_u64(seed),
            }
        }
    }

    impl Default for ArrayRng<XorShiftRng> {
        fn default() -> Self {
            Self::from_seed(42)
        }
    }

    impl<R: Rng> ArrayRng<R> {
        pub fn new(rng: R) -> Self {
            ArrayRng { rng }
        }

        pub fn as_rng_mut(&mut self) -> &mut R {
            &mut self.rng
        }

        /// Array of independent samples from `Standard`.
        pub fn standard<T: Element>(&mut self, shape: &[usize]) -> NdArray<T>
        where
            Standard: Distribution<T>,
        {
            let len = shape.iter().product();
            let v = (0..len).map(|_| self.rng.gen::<T>()).collect::<Vec<T>>();
            NdArray::from_shape_vec(ndarray::IxDyn(shape), v).unwrap()
        }

        /// Random shape of rank `ndim` with extents in `1..=max_extent`.
        pub fn shape(&mut self, ndim: usize, max_extent: usize) -> Vec<usize> {
            (0..ndim)
                .map(|_| self.rng.gen_range(1..=max_extent))
                .collect()
        }
    }
}
