//! Operator registry: op type -> validator/inferencer/grad maker + kernel matrix.
use crate::device::DeviceKind;
use crate::dtype::DataType;
use crate::op::{ExecutionContext, GradOpContext, Op, OpError};
use crate::op_desc::OpDesc;
use crate::FxHashMap;
use log::debug;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A kernel instantiated for one device kind and one element type.
pub type KernelFn = fn(&mut dyn ExecutionContext) -> Result<(), OpError>;

/// Cell of the kernel dispatch matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub device: DeviceKind,
    pub dtype: DataType,
}

impl KernelKey {
    #[inline]
    pub fn new(device: DeviceKind, dtype: DataType) -> Self {
        KernelKey { device, dtype }
    }
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}/{}", self.device, self.dtype)
    }
}

/// Everything the engine knows about one registered op type.
#[derive(Clone)]
pub struct OpInfo {
    op: Arc<dyn Op>,
    differentiable: bool,
    kernels: FxHashMap<KernelKey, KernelFn>,
}

impl OpInfo {
    #[inline]
    pub fn op(&self) -> &dyn Op {
        self.op.as_ref()
    }

    #[inline]
    pub fn is_differentiable(&self) -> bool {
        self.differentiable
    }

    #[inline]
    pub fn kernel(&self, key: &KernelKey) -> Option<KernelFn> {
        self.kernels.get(key).copied()
    }

    pub fn kernel_keys(&self) -> impl Iterator<Item = &KernelKey> {
        self.kernels.keys()
    }
}

/// Maps op types to [OpInfo].
///
/// Engines own their registry; [OpRegistry::builtin] is a shared read-only
/// instance for eager calls.
#[derive(Clone, Default)]
pub struct OpRegistry {
    ops: FxHashMap<String, OpInfo>,
}

impl OpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `reverse` and `reverse_grad` and their full kernel matrix.
    pub fn with_builtin_ops() -> Self {
        let mut reg = Self::new();
        // an empty registry can't collide with builtin names
        crate::ops::register_builtin_ops(&mut reg).expect("builtin op registration");
        reg
    }

    /// Process-wide [OpRegistry::with_builtin_ops], built on first use.
    pub fn builtin() -> Arc<OpRegistry> {
        static BUILTIN: OnceLock<Arc<OpRegistry>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| Arc::new(OpRegistry::with_builtin_ops()))
            .clone()
    }

    /// Registers `op` under `op_type`.
    ///
    /// Only differentiable ops are asked for grad ops by [OpRegistry::grad_op_descs].
    pub fn register(
        &mut self,
        op_type: &str,
        op: Arc<dyn Op>,
        differentiable: bool,
    ) -> Result<(), OpError> {
        if self.ops.contains_key(op_type) {
            return Err(OpError::InvalidArgument(format!(
                "operator `{}` is registered more than once",
                op_type
            )));
        }
        debug!("register op `{}` ({})", op_type, op.name());
        self.ops.insert(
            op_type.to_string(),
            OpInfo {
                op,
                differentiable,
                kernels: FxHashMap::default(),
            },
        );
        Ok(())
    }

    /// Adds (or replaces) the kernel of `op_type` for `key`.
    pub fn register_kernel(
        &mut self,
        op_type: &str,
        key: KernelKey,
        kernel: KernelFn,
    ) -> Result<(), OpError> {
        let info = self
            .ops
            .get_mut(op_type)
            .ok_or_else(|| OpError::NotRegistered(op_type.to_string()))?;
        info.kernels.insert(key, kernel);
        Ok(())
    }

    #[inline]
    pub fn contains(&self, op_type: &str) -> bool {
        self.ops.contains_key(op_type)
    }

    pub fn get(&self, op_type: &str) -> Result<&OpInfo, OpError> {
        self.ops
            .get(op_type)
            .ok_or_else(|| OpError::NotRegistered(op_type.to_string()))
    }

    /// Looks up the kernel cell for `key`.
    pub fn kernel(&self, op_type: &str, key: KernelKey) -> Result<KernelFn, OpError> {
        self.get(op_type)?.kernel(&key).ok_or_else(|| {
            OpError::TypeUnsupported(format!(
                "operator `{}` has no kernel for {}",
                op_type, key
            ))
        })
    }

    /// Backward op descriptions of `fwd`. Empty for non-differentiable ops.
    pub fn grad_op_descs(&self, fwd: &OpDesc) -> Result<Vec<OpDesc>, OpError> {
        let info = self.get(fwd.op_type())?;
        if !info.differentiable {
            return Ok(Vec::new());
        }
        let mut ctx = GradOpContext::new(fwd);
        info.op.grad(&mut ctx);
        Ok(ctx.into_grad_ops())
    }
}
