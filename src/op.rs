//! Defining things related to `Op`: the error type and the contexts an
//! engine hands to an operator.
//!
//! An operator is split into three phases, each driven through a context trait:
//!
//! * graph construction: [Op::infer_shape] with an [InferShapeContext], then
//!   [Op::infer_var_type] with an [InferVarTypeContext];
//! * execution: a kernel (`fn(&mut dyn ExecutionContext)`) looked up in the
//!   [crate::OpRegistry] by device and dtype;
//! * differentiation: [Op::grad] with a [GradOpContext].
//!
//! The engine in [crate::framework] implements these traits over
//! [crate::BlockDesc] and [crate::Scope], but nothing in the operator depends
//! on that engine.
use crate::device::{DeviceContext, Place};
use crate::dtype::DataType;
use crate::op_desc::{grad_var_name, Attribute, AttributeMap, OpDesc};
use crate::tensor::{Value, VarKind};
use std::any::type_name;

/// Error raised while validating, executing or differentiating an op.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum OpError {
    /// A required named input/output is not bound.
    #[error("{kind}({name}) of {op} is not bound")]
    MissingBinding {
        op: String,
        kind: &'static str,
        name: String,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("out of range: {0}")]
    OutOfRange(String),
    #[error("attribute `{0}` is not found")]
    AttributeNotFound(String),
    /// No kernel for the requested dtype/device pair.
    #[error("type unsupported: {0}")]
    TypeUnsupported(String),
    #[error("precondition not met: {0}")]
    PreconditionNotMet(String),
    #[error("operator `{0}` is not registered")]
    NotRegistered(String),
    #[error("unimplemented: {0}")]
    Unimplemented(String),
    /// Allocation or device failure while a kernel runs.
    #[error("execution error: {0}")]
    Execution(String),
}

/// Fails with `MissingBinding` unless `present`.
#[inline]
pub fn check_binding(present: bool, kind: &'static str, name: &str, op: &str) -> Result<(), OpError> {
    if present {
        Ok(())
    } else {
        Err(OpError::MissingBinding {
            op: op.to_string(),
            kind,
            name: name.to_string(),
        })
    }
}

/// Graph-build (or runtime) shape inference context.
pub trait InferShapeContext {
    fn has_input(&self, name: &str) -> bool;

    fn has_output(&self, name: &str) -> bool;

    fn input_var_kind(&self, name: &str) -> Result<VarKind, OpError>;

    /// Dims of the named input; `-1` marks an unknown extent at build time.
    fn input_dim(&self, name: &str) -> Result<Vec<i64>, OpError>;

    fn set_output_dim(&mut self, name: &str, dims: &[i64]) -> Result<(), OpError>;

    fn attrs(&self) -> &AttributeMap;

    /// `true` when invoked right before a kernel runs, `false` while building the graph.
    fn is_runtime(&self) -> bool;
}

/// Propagates container kind and dtype from inputs to outputs.
pub trait InferVarTypeContext {
    fn input_kind(&self, name: &str) -> Result<VarKind, OpError>;

    fn set_output_kind(&mut self, name: &str, kind: VarKind) -> Result<(), OpError>;

    fn input_data_type(&self, name: &str) -> Result<Option<DataType>, OpError>;

    fn set_output_data_type(&mut self, name: &str, dtype: Option<DataType>) -> Result<(), OpError>;
}

/// What a kernel sees while it runs.
pub trait ExecutionContext {
    fn place(&self) -> Place;

    fn device_context(&self) -> &dyn DeviceContext;

    fn attrs(&self) -> &AttributeMap;

    fn input(&self, name: &str) -> Result<&Value, OpError>;

    /// Hands the finished value of output `name` to the engine.
    fn set_output(&mut self, name: &str, value: Value) -> Result<(), OpError>;
}

/// Context of an `Op`'s gradient construction phase.
///
/// `Op::grad` reads the forward op through this and appends backward op
/// descriptions with [GradOpContext::append_grad_op].
pub struct GradOpContext<'a> {
    fwd: &'a OpDesc,
    grad_ops: Vec<OpDesc>,
}

impl<'a> GradOpContext<'a> {
    #[inline]
    pub fn new(fwd: &'a OpDesc) -> Self {
        GradOpContext {
            fwd,
            grad_ops: Vec::new(),
        }
    }

    /// The forward op being differentiated.
    #[inline]
    pub fn forward(&self) -> &OpDesc {
        self.fwd
    }

    /// Gradient variable names of the forward output `name` (upstream gradients).
    pub fn output_grad(&self, name: &str) -> Vec<String> {
        self.fwd.output(name).iter().map(|v| grad_var_name(v)).collect()
    }

    /// Gradient variable names of the forward input `name` (slots to fill).
    pub fn input_grad(&self, name: &str) -> Vec<String> {
        self.fwd.input(name).iter().map(|v| grad_var_name(v)).collect()
    }

    #[inline]
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.fwd.attr(name)
    }

    #[inline]
    pub fn attrs(&self) -> &AttributeMap {
        self.fwd.attrs()
    }

    #[inline]
    pub fn append_grad_op(&mut self, op: OpDesc) {
        self.grad_ops.push(op);
    }

    #[inline]
    pub(crate) fn into_grad_ops(self) -> Vec<OpDesc> {
        self.grad_ops
    }
}

/// Trait for graph operators. Kernels are registered separately, per device and dtype.
pub trait Op: Send + Sync {
    /// Name of this op
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Validates bindings and attributes, then sets output dims.
    fn infer_shape(&self, ctx: &mut dyn InferShapeContext) -> Result<(), OpError>;

    /// Sets output kind and dtype from the inputs'.
    fn infer_var_type(&self, ctx: &mut dyn InferVarTypeContext) -> Result<(), OpError>;

    /// Appends the backward ops of this op. Non-differentiable ops append nothing.
    fn grad(&self, _ctx: &mut GradOpContext) {}
}
