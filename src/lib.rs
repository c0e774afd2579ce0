//! A multi-axis `reverse` operator for dataflow-graph engines.
//!
//! The operator flips the order of elements of its input `X` along the axes
//! listed in the `axis` attribute and writes the result to `Out`.
//! Inputs come in two flavors (see [Value]):
//!
//! * a dense [Tensor]: every entry of `axis` selects a dimension, negative
//!   entries count from the back;
//! * a [TensorList]: `axis` must be `[0]`, and the order of the list itself is reversed.
//!
//! Reversal is an involution, so the backward node emitted by [Op::grad] is
//! just another `reverse` node fed with the upstream gradient.
//!
//! ```
//! use ndarray::array;
//! use reverse_op as rv;
//!
//! let x = rv::Value::from(rv::Tensor::from_array(array![[1, 2, 3], [4, 5, 6]]));
//! let y = rv::ops::reverse(&x, [0, 1]).unwrap();
//! let y = y.as_tensor().unwrap().to_array::<i32>().unwrap();
//! assert_eq!(y, array![[6, 5, 4], [3, 2, 1]].into_dyn());
//! ```
//!
//! The graph-engine side (shape inference contexts, kernel registry, executor,
//! backward pass) lives in [framework] and [registry]; the operator itself in [ops].
#[macro_use]
extern crate serde_derive;

pub extern crate ndarray;
pub extern crate rand;

#[doc(hidden)]
pub mod test_helper;

pub mod config;
pub mod device;
pub mod dtype;
pub mod framework;
pub mod ndarray_ext;
pub mod op;
pub mod op_desc;
pub mod ops;
pub mod registry;
pub mod tensor;

pub(crate) type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

pub use crate::config::{Config, ConfigError};
pub use crate::device::{CpuDeviceContext, DeviceContext, DeviceKind, GpuDeviceContext, Place};
pub use crate::dtype::{DataType, Element};
pub use crate::framework::{append_backward, infer_op, BlockDesc, Executor, Scope, VarDesc};
pub use crate::ndarray_ext::{NdArray, NdArrayView};
pub use crate::op::{Op, OpError};
pub use crate::op_desc::{grad_var_name, Attribute, AttributeMap, OpDesc};
pub use crate::registry::{KernelKey, OpRegistry};
pub use crate::tensor::{Lod, Tensor, TensorData, TensorList, Value, VarKind};
