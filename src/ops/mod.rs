//! Operators shipped with this crate, plus helpers to apply them eagerly or
//! append them to a block.
use crate::dtype::Element;
use crate::framework::{infer_op, BlockDesc, Executor, Scope};
use crate::op::{Op, OpError};
use crate::op_desc::OpDesc;
use crate::registry::{KernelKey, OpRegistry};
use crate::tensor::Value;
use std::sync::Arc;

mod reverse;

pub use self::reverse::Reverse;
use self::reverse::{CpuDriver, Driver, GpuDriver};

/// Op type of the forward reverse node.
pub const REVERSE: &str = "reverse";

/// Registered alias of `reverse` for backward bookkeeping.
pub const REVERSE_GRAD: &str = "reverse_grad";

// One kernel per listed element type for the given driver.
macro_rules! register_reverse_kernels {
    ($reg:expr, $op_type:expr, $driver:ty, [$($t:ty),*]) => {
        $(
            $reg.register_kernel(
                $op_type,
                KernelKey::new(<$driver as Driver>::DEVICE, <$t as Element>::DTYPE),
                reverse::compute::<$driver, $t>,
            )?;
        )*
    };
}

pub(crate) fn register_builtin_ops(reg: &mut OpRegistry) -> Result<(), OpError> {
    let op: Arc<dyn Op> = Arc::new(Reverse);
    reg.register(REVERSE, op.clone(), true)?;
    reg.register(REVERSE_GRAD, op, false)?;
    for op_type in [REVERSE, REVERSE_GRAD] {
        register_reverse_kernels!(reg, op_type, CpuDriver, [i32, u8, i64, bool, f32, f64]);
        register_reverse_kernels!(reg, op_type, GpuDriver, [i32, u8, i64, bool, f32, f64]);
    }
    Ok(())
}

/// Axis argument of [reverse] and [append_reverse].
///
/// A single axis is promoted to a one-element list.
pub trait IntoAxis {
    fn into_axis(self) -> Vec<i32>;
}

impl IntoAxis for i32 {
    fn into_axis(self) -> Vec<i32> {
        vec![self]
    }
}

impl IntoAxis for Vec<i32> {
    fn into_axis(self) -> Vec<i32> {
        self
    }
}

impl IntoAxis for &[i32] {
    fn into_axis(self) -> Vec<i32> {
        self.to_vec()
    }
}

impl<const N: usize> IntoAxis for [i32; N] {
    fn into_axis(self) -> Vec<i32> {
        self.to_vec()
    }
}

/// Reverses `x` along `axis` right away, on the host.
///
/// ```
/// use ndarray::array;
/// use reverse_op::{ops, Tensor, Value};
///
/// let x = Value::from(Tensor::from_array(array![1, 2, 3]));
/// let y = ops::reverse(&x, -1).unwrap();
/// assert_eq!(y.as_tensor().unwrap().to_array::<i32>().unwrap(), array![3, 2, 1].into_dyn());
/// ```
pub fn reverse(x: &Value, axis: impl IntoAxis) -> Result<Value, OpError> {
    let exec = Executor::cpu(OpRegistry::builtin());
    reverse_with(&exec, x, axis)
}

/// Like [reverse], on the device of `exec`.
pub fn reverse_with(exec: &Executor, x: &Value, axis: impl IntoAxis) -> Result<Value, OpError> {
    let mut scope = Scope::new();
    scope.set("x", x.clone());
    let mut op = OpDesc::new(REVERSE);
    op.set_input("X", vec!["x".to_string()])
        .set_output("Out", vec!["out".to_string()])
        .set_attr("axis", axis.into_axis());
    exec.run_op(&op, &mut scope)?;
    scope.take("out").ok_or_else(|| OpError::MissingBinding {
        op: REVERSE.to_string(),
        kind: "Output",
        name: "Out".to_string(),
    })
}

/// Appends `reverse(x, axis)` to `block` and returns the name of its output.
///
/// Build-time shape and type inference run immediately; if they fail, the
/// block is left as it was.
pub fn append_reverse(
    block: &mut BlockDesc,
    registry: &OpRegistry,
    x: &str,
    axis: impl IntoAxis,
) -> Result<String, OpError> {
    let out = block.create_temp_var(REVERSE);
    let mut op = OpDesc::new(REVERSE);
    op.set_input("X", vec![x.to_string()])
        .set_output("Out", vec![out.clone()])
        .set_attr("axis", axis.into_axis());
    let idx = block.append_op(op);
    if let Err(e) = infer_op(block, registry, idx) {
        block.pop_op();
        block.remove_var(&out);
        return Err(e);
    }
    Ok(out)
}
