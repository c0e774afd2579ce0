use super::block::BlockDesc;
use super::infer::RuntimeInferShapeContext;
use super::scope::Scope;
use crate::config::Config;
use crate::device::{CpuDeviceContext, DeviceContext, GpuDeviceContext, Place};
use crate::dtype::DataType;
use crate::op::{ExecutionContext, OpError};
use crate::op_desc::{AttributeMap, OpDesc};
use crate::registry::{KernelKey, OpRegistry};
use crate::tensor::Value;
use log::{debug, trace};
use std::sync::Arc;

/// Runs ops of a block against a [Scope] on one device.
///
/// ```
/// use std::sync::Arc;
/// use ndarray::array;
/// use reverse_op::{Executor, OpDesc, OpRegistry, Scope, Tensor};
///
/// let exec = Executor::cpu(Arc::new(OpRegistry::with_builtin_ops()));
/// let mut scope = Scope::new();
/// scope.set("x", Tensor::from_array(array![[1., 2.], [3., 4.]]));
///
/// let mut op = OpDesc::new("reverse");
/// op.set_input("X", vec!["x".into()])
///     .set_output("Out", vec!["y".into()])
///     .set_attr("axis", vec![1]);
/// exec.run_op(&op, &mut scope).unwrap();
///
/// let y = scope.get("y").unwrap().as_tensor().unwrap();
/// assert_eq!(y.to_array::<f64>().unwrap(), array![[2., 1.], [4., 3.]].into_dyn());
/// ```
pub struct Executor {
    registry: Arc<OpRegistry>,
    device: Box<dyn DeviceContext>,
}

impl Executor {
    pub fn new(registry: Arc<OpRegistry>, device: Box<dyn DeviceContext>) -> Self {
        Executor { registry, device }
    }

    /// Host executor with the default [Config].
    pub fn cpu(registry: Arc<OpRegistry>) -> Self {
        Self::with_config(registry, Place::Cpu, &Config::default())
    }

    /// Executor on `place` with a reference device context built from `config`.
    pub fn with_config(registry: Arc<OpRegistry>, place: Place, config: &Config) -> Self {
        let device: Box<dyn DeviceContext> = match place {
            Place::Cpu => Box::new(CpuDeviceContext::new(config.clone())),
            Place::Gpu(id) => Box::new(GpuDeviceContext::new(id, config.clone())),
        };
        Executor { registry, device }
    }

    #[inline]
    pub fn place(&self) -> Place {
        self.device.place()
    }

    #[inline]
    pub fn registry(&self) -> &OpRegistry {
        &self.registry
    }

    /// Runs every op of `block` in order.
    pub fn run(&self, block: &BlockDesc, scope: &mut Scope) -> Result<(), OpError> {
        for op in block.ops() {
            self.run_op(op, scope)?;
        }
        Ok(())
    }

    /// Runs a single op: runtime shape inference, kernel selection, kernel, commit.
    pub fn run_op(&self, op: &OpDesc, scope: &mut Scope) -> Result<(), OpError> {
        let info = self.registry.get(op.op_type())?;

        let mut shape_ctx = RuntimeInferShapeContext::new(op, scope);
        info.op().infer_shape(&mut shape_ctx)?;
        let expected_dims = shape_ctx.into_output_dims();

        let key = KernelKey::new(self.place().kind(), kernel_data_type(op, scope));
        trace!("select `{}` kernel {}", op.op_type(), key);
        let kernel = info.kernel(&key).ok_or_else(|| {
            OpError::TypeUnsupported(format!(
                "operator `{}` has no kernel for {}",
                op.op_type(),
                key
            ))
        })?;

        debug!("run `{}` on {}", op.op_type(), self.place());
        let mut ctx = KernelContext {
            op,
            scope: &*scope,
            device: self.device.as_ref(),
            outputs: Vec::new(),
        };
        kernel(&mut ctx)?;
        let outputs = ctx.outputs;

        for (name, value) in outputs {
            if let (Some(expected), Value::Tensor(t)) = (expected_dims.get(&name), &value) {
                let got = t.dims().unwrap_or_default();
                if &got != expected {
                    return Err(OpError::Execution(format!(
                        "`{}` produced {} with dims {:?}, but {:?} was inferred",
                        op.op_type(),
                        name,
                        got,
                        expected
                    )));
                }
            }
            scope.set(name, value);
        }
        Ok(())
    }
}

// dtype of the first input holding data; empty lists fall back to float32.
fn kernel_data_type(op: &OpDesc, scope: &Scope) -> DataType {
    op.inputs()
        .values()
        .flatten()
        .filter_map(|arg| scope.get(arg))
        .find_map(|v| v.dtype())
        .unwrap_or(DataType::Float32)
}

struct KernelContext<'a> {
    op: &'a OpDesc,
    scope: &'a Scope,
    device: &'a dyn DeviceContext,
    outputs: Vec<(String, Value)>,
}

impl<'a> ExecutionContext for KernelContext<'a> {
    fn place(&self) -> Place {
        self.device.place()
    }

    fn device_context(&self) -> &dyn DeviceContext {
        self.device
    }

    fn attrs(&self) -> &AttributeMap {
        self.op.attrs()
    }

    fn input(&self, name: &str) -> Result<&Value, OpError> {
        let missing = |arg: &str| OpError::MissingBinding {
            op: self.op.op_type().to_string(),
            kind: "Input",
            name: arg.to_string(),
        };
        let arg = self.op.input(name).first().ok_or_else(|| missing(name))?;
        self.scope.get(arg).ok_or_else(|| missing(arg))
    }

    fn set_output(&mut self, name: &str, value: Value) -> Result<(), OpError> {
        let arg = self
            .op
            .output(name)
            .first()
            .ok_or_else(|| OpError::MissingBinding {
                op: self.op.op_type().to_string(),
                kind: "Output",
                name: name.to_string(),
            })?;
        self.outputs.push((arg.clone(), value));
        Ok(())
    }
}
