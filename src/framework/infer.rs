//! Shape and type inference contexts over a [BlockDesc] (build time) and a
//! [Scope] (run time).
use super::block::BlockDesc;
use super::scope::Scope;
use crate::dtype::DataType;
use crate::op::{InferShapeContext, InferVarTypeContext, OpError};
use crate::op_desc::{AttributeMap, OpDesc};
use crate::registry::OpRegistry;
use crate::tensor::{Value, VarKind};
use crate::FxHashMap;
use log::debug;

fn first_arg<'a>(
    args: &'a [String],
    kind: &'static str,
    name: &str,
    op: &OpDesc,
) -> Result<&'a str, OpError> {
    args.first()
        .map(|s| s.as_str())
        .ok_or_else(|| OpError::MissingBinding {
            op: op.op_type().to_string(),
            kind,
            name: name.to_string(),
        })
}

/// Runs build-time shape inference, then type inference, for the `i` th op of `block`.
pub fn infer_op(block: &mut BlockDesc, registry: &OpRegistry, i: usize) -> Result<(), OpError> {
    let op = block.op(i).cloned().ok_or_else(|| {
        OpError::OutOfRange(format!(
            "op index {} is out of a block of {} ops",
            i,
            block.ops().len()
        ))
    })?;
    let info = registry.get(op.op_type())?;
    debug!("infer `{}` (op {})", op.op_type(), i);
    info.op()
        .infer_shape(&mut CompileTimeInferShapeContext {
            op: &op,
            block: &mut *block,
        })?;
    info.op()
        .infer_var_type(&mut CompileTimeVarTypeContext {
            op: &op,
            block: &mut *block,
        })
}

pub(crate) struct CompileTimeInferShapeContext<'a> {
    op: &'a OpDesc,
    block: &'a mut BlockDesc,
}

impl<'a> CompileTimeInferShapeContext<'a> {
    fn input_var(&self, name: &str) -> Result<&super::VarDesc, OpError> {
        let arg = first_arg(self.op.input(name), "Input", name, self.op)?;
        self.block.var(arg).ok_or_else(|| OpError::MissingBinding {
            op: self.op.op_type().to_string(),
            kind: "Input",
            name: arg.to_string(),
        })
    }
}

impl<'a> InferShapeContext for CompileTimeInferShapeContext<'a> {
    fn has_input(&self, name: &str) -> bool {
        let args = self.op.input(name);
        !args.is_empty() && args.iter().all(|a| self.block.has_var(a))
    }

    fn has_output(&self, name: &str) -> bool {
        let args = self.op.output(name);
        !args.is_empty() && args.iter().all(|a| self.block.has_var(a))
    }

    fn input_var_kind(&self, name: &str) -> Result<VarKind, OpError> {
        Ok(self.input_var(name)?.kind())
    }

    fn input_dim(&self, name: &str) -> Result<Vec<i64>, OpError> {
        Ok(self.input_var(name)?.dims().to_vec())
    }

    fn set_output_dim(&mut self, name: &str, dims: &[i64]) -> Result<(), OpError> {
        let arg = first_arg(self.op.output(name), "Output", name, self.op)?;
        let var = self.block.var_mut(arg).ok_or_else(|| OpError::MissingBinding {
            op: self.op.op_type().to_string(),
            kind: "Output",
            name: arg.to_string(),
        })?;
        var.set_dims(dims);
        Ok(())
    }

    fn attrs(&self) -> &AttributeMap {
        self.op.attrs()
    }

    fn is_runtime(&self) -> bool {
        false
    }
}

pub(crate) struct CompileTimeVarTypeContext<'a> {
    op: &'a OpDesc,
    block: &'a mut BlockDesc,
}

impl<'a> CompileTimeVarTypeContext<'a> {
    fn input_var(&self, name: &str) -> Result<&super::VarDesc, OpError> {
        let arg = first_arg(self.op.input(name), "Input", name, self.op)?;
        self.block.var(arg).ok_or_else(|| OpError::MissingBinding {
            op: self.op.op_type().to_string(),
            kind: "Input",
            name: arg.to_string(),
        })
    }

    fn output_var_mut(&mut self, name: &str) -> Result<&mut super::VarDesc, OpError> {
        let arg = first_arg(self.op.output(name), "Output", name, self.op)?;
        let op_type = self.op.op_type();
        self.block.var_mut(arg).ok_or_else(|| OpError::MissingBinding {
            op: op_type.to_string(),
            kind: "Output",
            name: arg.to_string(),
        })
    }
}

impl<'a> InferVarTypeContext for CompileTimeVarTypeContext<'a> {
    fn input_kind(&self, name: &str) -> Result<VarKind, OpError> {
        Ok(self.input_var(name)?.kind())
    }

    fn set_output_kind(&mut self, name: &str, kind: VarKind) -> Result<(), OpError> {
        self.output_var_mut(name)?.set_kind(kind);
        Ok(())
    }

    fn input_data_type(&self, name: &str) -> Result<Option<DataType>, OpError> {
        Ok(self.input_var(name)?.dtype())
    }

    fn set_output_data_type(&mut self, name: &str, dtype: Option<DataType>) -> Result<(), OpError> {
        self.output_var_mut(name)?.set_dtype(dtype);
        Ok(())
    }
}

/// Shape inference right before a kernel runs.
///
/// Output dims are recorded rather than applied; the executor checks the
/// kernel's outputs against them.
pub(crate) struct RuntimeInferShapeContext<'a> {
    op: &'a OpDesc,
    scope: &'a Scope,
    output_dims: FxHashMap<String, Vec<i64>>,
}

impl<'a> RuntimeInferShapeContext<'a> {
    pub(crate) fn new(op: &'a OpDesc, scope: &'a Scope) -> Self {
        RuntimeInferShapeContext {
            op,
            scope,
            output_dims: FxHashMap::default(),
        }
    }

    pub(crate) fn into_output_dims(self) -> FxHashMap<String, Vec<i64>> {
        self.output_dims
    }

    fn input_value(&self, name: &str) -> Result<&'a Value, OpError> {
        let scope: &'a Scope = self.scope;
        let arg = first_arg(self.op.input(name), "Input", name, self.op)?;
        scope.get(arg).ok_or_else(|| OpError::MissingBinding {
            op: self.op.op_type().to_string(),
            kind: "Input",
            name: arg.to_string(),
        })
    }
}

impl<'a> InferShapeContext for RuntimeInferShapeContext<'a> {
    fn has_input(&self, name: &str) -> bool {
        let args = self.op.input(name);
        !args.is_empty() && args.iter().all(|a| self.scope.contains(a))
    }

    // Outputs are bound when the kernel hands them over.
    fn has_output(&self, name: &str) -> bool {
        !self.op.output(name).is_empty()
    }

    fn input_var_kind(&self, name: &str) -> Result<VarKind, OpError> {
        Ok(self.input_value(name)?.kind())
    }

    fn input_dim(&self, name: &str) -> Result<Vec<i64>, OpError> {
        match self.input_value(name)? {
            Value::Tensor(t) => t.dims().ok_or_else(|| {
                OpError::PreconditionNotMet(format!("the input tensor {} holds no memory", name))
            }),
            Value::TensorList(_) => Err(OpError::PreconditionNotMet(format!(
                "the dims of the tensor list {} are only known to its kernel",
                name
            ))),
        }
    }

    fn set_output_dim(&mut self, name: &str, dims: &[i64]) -> Result<(), OpError> {
        let arg = first_arg(self.op.output(name), "Output", name, self.op)?;
        self.output_dims.insert(arg.to_string(), dims.to_vec());
        Ok(())
    }

    fn attrs(&self) -> &AttributeMap {
        self.op.attrs()
    }

    fn is_runtime(&self) -> bool {
        true
    }
}
