//! Defining things related to gradient construction over a block.
use super::block::{BlockDesc, VarDesc};
use super::infer::infer_op;
use crate::op::OpError;
use crate::op_desc::{OpDesc, GRAD_SUFFIX};
use crate::registry::OpRegistry;
use crate::tensor::VarKind;
use log::debug;
use rustc_hash::FxHashSet;

/// Appends the backward ops of every op currently in `block`, last op first.
///
/// Gradient variables are declared with the kind, dtype and dims of the
/// variable they differentiate, then each backward op goes through build-time
/// inference like any other op. Returns the indices of the appended ops.
///
/// Ops writing a gradient variable (one ending in `@GRAD`) are backward ops
/// from an earlier call and are not differentiated again.
///
/// Gradients are not accumulated: if two backward ops would write the same
/// gradient variable, including one already in `block`, this fails with
/// `OpError::Unimplemented` before the offending op is appended.
pub fn append_backward(block: &mut BlockDesc, registry: &OpRegistry) -> Result<Vec<usize>, OpError> {
    let (bwd_ops, fwd_ops): (Vec<_>, Vec<_>) =
        block.ops().iter().cloned().partition(is_backward_op);
    let mut produced: FxHashSet<String> = bwd_ops
        .iter()
        .flat_map(|op| op.outputs().values().flatten().cloned())
        .collect();
    let mut appended = Vec::new();

    for fwd in fwd_ops.iter().rev() {
        for grad_op in registry.grad_op_descs(fwd)? {
            for arg in grad_op.outputs().values().flatten() {
                if !produced.insert(arg.clone()) {
                    return Err(OpError::Unimplemented(format!(
                        "gradient `{}` is written by more than one op and would need accumulation",
                        arg
                    )));
                }
            }
            for arg in grad_op.inputs().values().chain(grad_op.outputs().values()).flatten() {
                declare_grad_var(block, arg);
            }
            debug!("append `{}` for `{}`", grad_op.op_type(), fwd.op_type());
            let idx = block.append_op(grad_op);
            infer_op(block, registry, idx)?;
            appended.push(idx);
        }
    }
    Ok(appended)
}

fn is_backward_op(op: &OpDesc) -> bool {
    op.outputs()
        .values()
        .flatten()
        .any(|arg| arg.ends_with(GRAD_SUFFIX))
}

fn declare_grad_var(block: &mut BlockDesc, grad_name: &str) {
    if block.has_var(grad_name) {
        return;
    }
    let desc = match grad_name
        .strip_suffix(GRAD_SUFFIX)
        .and_then(|fwd_name| block.var(fwd_name))
    {
        Some(fwd) => fwd.renamed(grad_name),
        None => VarDesc::new(grad_name, VarKind::Tensor),
    };
    block.add_var(desc);
}
