use crate::device::{DeviceContext, DeviceKind};
use crate::dtype::Element;
use crate::ndarray_ext::{self, contiguous_strides, AxisMask, NdArray};
use crate::op::{self, ExecutionContext, GradOpContext, InferShapeContext, InferVarTypeContext, OpError};
use crate::op_desc::{AttrsExt, OpDesc};
use crate::tensor::{Tensor, TensorList, Value, VarKind};
use log::trace;
use rayon::prelude::*;
use smallvec::SmallVec;

/// Reverses `X` along the axes of the `axis` attribute.
///
/// The same `Op` serves `reverse` and its backward alias `reverse_grad`.
pub struct Reverse;

impl op::Op for Reverse {
    fn name(&self) -> &'static str {
        "Reverse"
    }

    fn infer_shape(&self, ctx: &mut dyn InferShapeContext) -> Result<(), OpError> {
        op::check_binding(ctx.has_input("X"), "Input", "X", "Reverse")?;
        op::check_binding(ctx.has_output("Out"), "Output", "Out", "Reverse")?;

        let axis = ctx.attrs().ints("axis")?.to_vec();
        if ctx.input_var_kind("X")? == VarKind::TensorList {
            if axis.len() != 1 {
                return Err(OpError::InvalidArgument(format!(
                    "the size of axis must be 1 when the input X is a tensor list, but received {}",
                    axis.len()
                )));
            }
            if axis[0] != 0 {
                return Err(OpError::InvalidArgument(format!(
                    "the value of axis must be 0 when the input X is a tensor list, but received {}",
                    axis[0]
                )));
            }
            // The length of a list is only known once it's filled.
            if !ctx.is_runtime() {
                let dims = ctx.input_dim("X")?;
                ctx.set_output_dim("Out", &dims)?;
            }
            return Ok(());
        }

        let x_dims = ctx.input_dim("X")?;
        if axis.is_empty() {
            return Err(OpError::InvalidArgument("'axis' can not be empty".to_string()));
        }
        let rank = x_dims.len() as i64;
        for &a in &axis {
            let a = a as i64;
            if a >= rank {
                return Err(OpError::OutOfRange(format!(
                    "the axis must be less than the rank of the input tensor, but got {} >= {}",
                    a, rank
                )));
            }
            if a < -rank {
                return Err(OpError::OutOfRange(format!(
                    "the axis must be greater than or equal to minus the rank of the input tensor, but got {} < {}",
                    a, -rank
                )));
            }
        }
        ctx.set_output_dim("Out", &x_dims)
    }

    fn infer_var_type(&self, ctx: &mut dyn InferVarTypeContext) -> Result<(), OpError> {
        let kind = ctx.input_kind("X")?;
        let dtype = ctx.input_data_type("X")?;
        ctx.set_output_kind("Out", kind)?;
        ctx.set_output_data_type("Out", dtype)
    }

    // flip_A . flip_A = id, so the backward op is `reverse` on the upstream gradient.
    fn grad(&self, ctx: &mut GradOpContext) {
        let mut grad_op = OpDesc::default();
        grad_op
            .set_type(super::REVERSE)
            .set_input("X", ctx.output_grad("Out"))
            .set_output("Out", ctx.input_grad("X"));
        if let Some(axis) = ctx.attr("axis") {
            grad_op.set_attr("axis", axis.clone());
        }
        ctx.append_grad_op(grad_op);
    }
}

/// Index-space layout of one reversal.
///
/// Unit dims are dropped (flipping them is a no-op) and neighbouring dims with
/// the same flip flag are merged: flipping both of two adjacent dims is the
/// same as flipping their product.
#[derive(Debug, PartialEq)]
pub(crate) struct FlipPlan {
    dims: SmallVec<[usize; 8]>,
    flipped: AxisMask,
    strides: SmallVec<[usize; 8]>,
}

impl FlipPlan {
    pub(crate) fn new(shape: &[usize], mask: &[bool]) -> Self {
        let mut dims: SmallVec<[usize; 8]> = SmallVec::new();
        let mut flipped = AxisMask::new();
        for (&d, &f) in shape.iter().zip(mask) {
            if d == 1 {
                continue;
            }
            match (dims.last_mut(), flipped.last()) {
                (Some(last), Some(&last_f)) if last_f == f => *last *= d,
                _ => {
                    dims.push(d);
                    flipped.push(f);
                }
            }
        }
        let strides = contiguous_strides(&dims);
        FlipPlan {
            dims,
            flipped,
            strides,
        }
    }

    /// Length of the contiguous innermost runs.
    #[inline]
    pub(crate) fn run_len(&self) -> usize {
        self.dims.last().copied().unwrap_or(1)
    }

    #[inline]
    fn innermost_flipped(&self) -> bool {
        self.flipped.last().copied().unwrap_or(false)
    }

    /// Source offset of the first element of output run `r`.
    fn run_base(&self, mut r: usize) -> usize {
        let n = self.dims.len();
        let mut off = 0;
        for k in (0..n.saturating_sub(1)).rev() {
            let d = self.dims[k];
            let c = r % d;
            r /= d;
            let c = if self.flipped[k] { d - 1 - c } else { c };
            off += c * self.strides[k];
        }
        off
    }

    /// Source offset of flat output index `i`.
    fn source_offset(&self, mut i: usize) -> usize {
        let mut off = 0;
        for k in (0..self.dims.len()).rev() {
            let d = self.dims[k];
            let c = i % d;
            i /= d;
            let c = if self.flipped[k] { d - 1 - c } else { c };
            off += c * self.strides[k];
        }
        off
    }
}

/// Per-device iteration driver of the reverse kernel.
pub(crate) trait Driver {
    const DEVICE: DeviceKind;

    /// Fills `out` (row-major, same length as `src`) following `plan`.
    fn run<T: Element>(dev: &dyn DeviceContext, plan: &FlipPlan, src: &[T], out: &mut [T]);
}

/// Host driver: walks innermost runs, copying each one forward or backward.
///
/// Above the parallel threshold runs are spread over the rayon pool. When the
/// whole tensor is a single run, that run is cut into per-thread pieces.
pub(crate) struct CpuDriver;

// Fills `dst`, the piece of a single-run output starting at `start`.
fn fill_piece<T: Element>(src: &[T], reversed: bool, start: usize, dst: &mut [T]) {
    if reversed {
        let end = src.len() - start;
        let n = dst.len();
        for (o, s) in dst.iter_mut().zip(src[end - n..end].iter().rev()) {
            *o = *s;
        }
    } else {
        dst.copy_from_slice(&src[start..start + dst.len()]);
    }
}

impl Driver for CpuDriver {
    const DEVICE: DeviceKind = DeviceKind::Cpu;

    fn run<T: Element>(dev: &dyn DeviceContext, plan: &FlipPlan, src: &[T], out: &mut [T]) {
        let run = plan.run_len();
        let reversed = plan.innermost_flipped();
        let fill_run = |(r, chunk): (usize, &mut [T])| {
            let base = plan.run_base(r);
            let src_run = &src[base..base + run];
            if reversed {
                for (o, s) in chunk.iter_mut().zip(src_run.iter().rev()) {
                    *o = *s;
                }
            } else {
                chunk.copy_from_slice(src_run);
            }
        };
        if out.len() >= dev.parallel_threshold() {
            if run == out.len() {
                let piece = (run / rayon::current_num_threads()).max(1);
                out.par_chunks_mut(piece)
                    .enumerate()
                    .for_each(|(p, dst)| fill_piece(src, reversed, p * piece, dst));
            } else {
                out.par_chunks_mut(run).enumerate().for_each(fill_run);
            }
        } else {
            out.chunks_mut(run).enumerate().for_each(fill_run);
        }
    }
}

/// Grid driver: one work item per output element, parallel over the output index space.
pub(crate) struct GpuDriver;

impl Driver for GpuDriver {
    const DEVICE: DeviceKind = DeviceKind::Gpu;

    fn run<T: Element>(_dev: &dyn DeviceContext, plan: &FlipPlan, src: &[T], out: &mut [T]) {
        out.par_iter_mut()
            .enumerate()
            .for_each(|(i, o)| *o = src[plan.source_offset(i)]);
    }
}

/// Kernel of `reverse` for driver `D` and element type `T`.
pub(crate) fn compute<D: Driver, T: Element>(ctx: &mut dyn ExecutionContext) -> Result<(), OpError> {
    debug_assert_eq!(ctx.place().kind(), D::DEVICE);
    let out = match ctx.input("X")? {
        Value::TensorList(xs) => Value::TensorList(reverse_list(xs)?),
        Value::Tensor(x) => {
            let axis = ctx.attrs().ints("axis")?;
            Value::Tensor(reverse_tensor::<D, T>(ctx.device_context(), x, axis)?)
        }
    };
    ctx.set_output("Out", out)
}

fn reverse_tensor<D: Driver, T: Element>(
    dev: &dyn DeviceContext,
    x: &Tensor,
    axis: &[i32],
) -> Result<Tensor, OpError> {
    let view = x.view::<T>().ok_or_else(|| match x.dtype() {
        Some(dtype) => OpError::TypeUnsupported(format!(
            "{} kernel of reverse received a {} tensor",
            T::DTYPE,
            dtype
        )),
        None => OpError::PreconditionNotMet("the input tensor X holds no memory".to_string()),
    })?;
    let shape = view.shape().to_vec();
    let numel = view.len();

    dev.allocate(T::DTYPE, numel)?;
    let mut buf: Vec<T> = Vec::new();
    buf.try_reserve_exact(numel).map_err(|e| {
        OpError::Execution(format!("cannot allocate {} output elements: {}", numel, e))
    })?;
    buf.resize(numel, T::default());

    if numel > 0 {
        let mask = ndarray_ext::flip_mask(axis, shape.len()).ok_or_else(|| {
            OpError::OutOfRange(format!("axis {:?} is invalid for rank {}", axis, shape.len()))
        })?;
        let plan = FlipPlan::new(&shape, &mask);
        trace!("reverse {:?} along {:?}: {:?}", shape, axis, plan);
        let x_std = view.as_standard_layout();
        let src = x_std
            .as_slice()
            .ok_or_else(|| OpError::Execution("input buffer is not contiguous".to_string()))?;
        D::run(dev, &plan, src, &mut buf);
    }

    let out = NdArray::from_shape_vec(ndarray::IxDyn(&shape), buf)
        .map_err(|e| OpError::Execution(format!("reverse: {}", e)))?;
    Ok(Tensor::from_array(out).with_lod(x.lod().clone()))
}

// Output slot k holds input element n-1-k; elements are copied as they are.
fn reverse_list(xs: &TensorList) -> Result<TensorList, OpError> {
    let mut out = TensorList::with_capacity(xs.len());
    for (offset, x) in xs.iter().enumerate().rev() {
        if !x.is_initialized() {
            return Err(OpError::PreconditionNotMet(format!(
                "the input tensor list X[{}] holds no memory",
                offset
            )));
        }
        out.push(x.clone());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CpuDeviceContext, GpuDeviceContext};
    use crate::ndarray_ext::array_gen::{self, ArrayRng};
    use crate::Config;

    fn flip_with<D: Driver>(dev: &dyn DeviceContext, x: &NdArray<i64>, axis: &[i32]) -> NdArray<i64> {
        let t = reverse_tensor::<D, i64>(dev, &Tensor::from_array(x.clone()), axis).unwrap();
        t.to_array::<i64>().unwrap()
    }

    // Reference: ndarray's negative-stride view.
    fn flip_reference(x: &NdArray<i64>, axis: &[i32]) -> NdArray<i64> {
        let mask = ndarray_ext::flip_mask(axis, x.ndim()).unwrap();
        let mut v = x.view();
        for (k, &f) in mask.iter().enumerate() {
            if f {
                v.invert_axis(ndarray::Axis(k));
            }
        }
        v.as_standard_layout().into_owned()
    }

    #[test]
    fn test_plan_merges_dims() {
        let plan = FlipPlan::new(&[2, 1, 3, 4, 5], &[true, true, true, false, false]);
        assert_eq!(plan.dims.as_slice(), &[6, 20]);
        assert_eq!(plan.flipped.as_slice(), &[true, false]);
        assert_eq!(plan.run_len(), 20);
    }

    #[test]
    fn test_plan_of_unit_dims() {
        let plan = FlipPlan::new(&[1, 1], &[true, false]);
        assert!(plan.dims.is_empty());
        assert_eq!(plan.run_len(), 1);
        assert_eq!(plan.source_offset(0), 0);
    }

    #[test]
    fn test_drivers_match_reference() {
        let mut rng = ArrayRng::from_seed(7);
        let cpu_serial = CpuDeviceContext::new(Config {
            parallel_threshold: usize::MAX,
            ..Config::default()
        });
        let cpu_parallel = CpuDeviceContext::new(Config {
            parallel_threshold: 0,
            ..Config::default()
        });
        let gpu = GpuDeviceContext::new(0, Config::default());
        for ndim in 1..6 {
            let shape = rng.shape(ndim, 4);
            let x = array_gen::seq::<i64>(&shape);
            for axis in [vec![0], vec![-1], vec![0, ndim as i32 - 1], (0..ndim as i32).collect()] {
                let expected = flip_reference(&x, &axis);
                assert_eq!(flip_with::<CpuDriver>(&cpu_serial, &x, &axis), expected);
                assert_eq!(flip_with::<CpuDriver>(&cpu_parallel, &x, &axis), expected);
                assert_eq!(flip_with::<GpuDriver>(&gpu, &x, &axis), expected);
            }
        }
    }

    #[test]
    fn test_single_run_is_split() {
        let parallel = CpuDeviceContext::new(Config {
            parallel_threshold: 0,
            ..Config::default()
        });
        // one reversed run
        let x = array_gen::seq::<i64>(&[10_007]);
        assert_eq!(flip_with::<CpuDriver>(&parallel, &x, &[0]), flip_reference(&x, &[0]));
        // one run copied as it is
        let x = array_gen::seq::<i64>(&[1, 10_007]);
        assert_eq!(flip_with::<CpuDriver>(&parallel, &x, &[0]), x);
        // pieces never cross the end of the run
        let mut out = vec![0i64; 5];
        let src: Vec<i64> = (0..5).collect();
        for start in (0..5).step_by(2) {
            let len = (5 - start).min(2);
            fill_piece(&src, true, start, &mut out[start..start + len]);
        }
        assert_eq!(out, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_empty_tensor() {
        let dev = CpuDeviceContext::default();
        let x = array_gen::seq::<i64>(&[3, 0, 2]);
        assert_eq!(flip_with::<CpuDriver>(&dev, &x, &[0, 2]).shape(), &[3, 0, 2]);
    }

    #[test]
    fn test_lod_is_kept() {
        let dev = CpuDeviceContext::default();
        let x = Tensor::from_array(array_gen::seq::<f32>(&[4, 2])).with_lod(vec![vec![0, 1, 4]]);
        let y = reverse_tensor::<CpuDriver, f32>(&dev, &x, &[0]).unwrap();
        assert_eq!(y.lod(), x.lod());
    }

    #[test]
    fn test_dtype_mismatch() {
        let dev = CpuDeviceContext::default();
        let x = Tensor::from_array(array_gen::seq::<u8>(&[3]));
        assert!(matches!(
            reverse_tensor::<CpuDriver, f32>(&dev, &x, &[0]),
            Err(OpError::TypeUnsupported(_))
        ));
    }

    #[test]
    fn test_list_with_empty_slot() {
        let xs = vec![Tensor::from_array(array_gen::seq::<f32>(&[2])), Tensor::new()];
        assert_eq!(
            reverse_list(&xs),
            Err(OpError::PreconditionNotMet(
                "the input tensor list X[1] holds no memory".to_string()
            ))
        );
    }
}
