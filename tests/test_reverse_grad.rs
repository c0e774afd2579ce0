extern crate ndarray;
extern crate reverse_op as rv;

use ndarray::{arr2, IxDyn};
use rv::ndarray_ext::array_gen::{self, ArrayRng};
use rv::ndarray_ext::NdArray;
use rv::ops;
use rv::{
    append_backward, grad_var_name, Attribute, BlockDesc, DataType, Executor, OpDesc, OpError,
    OpRegistry, Scope, Tensor, Value, VarDesc,
};
use std::sync::Arc;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn forward_block(registry: &OpRegistry, dims: &[i64], axis: Vec<i32>) -> (BlockDesc, String) {
    let mut block = BlockDesc::new();
    block.add_var(VarDesc::tensor("x", DataType::Float64, dims));
    let y = ops::append_reverse(&mut block, registry, "x", axis).unwrap();
    (block, y)
}

// Runs forward and backward of `reverse(x, axis)` with upstream gradient `dy`, returns dx.
fn backward(x: &NdArray<f64>, dy: &NdArray<f64>, axis: Vec<i32>) -> NdArray<f64> {
    let registry = Arc::new(OpRegistry::with_builtin_ops());
    let dims: Vec<i64> = x.shape().iter().map(|&d| d as i64).collect();
    let (mut block, y) = forward_block(&registry, &dims, axis);
    append_backward(&mut block, &registry).unwrap();

    let mut scope = Scope::new();
    scope.set("x", Tensor::from_array(x.clone()));
    scope.set(grad_var_name(&y), Tensor::from_array(dy.clone()));
    Executor::cpu(registry).run(&block, &mut scope).unwrap();

    let dx = scope.get(&grad_var_name("x")).unwrap();
    dx.as_tensor().unwrap().to_array::<f64>().unwrap()
}

#[test]
fn grad_op_description() {
    let registry = OpRegistry::with_builtin_ops();
    let mut fwd = OpDesc::new(ops::REVERSE);
    fwd.set_input("X", vec!["x".to_string()])
        .set_output("Out", vec!["y".to_string()])
        .set_attr("axis", vec![0, -1]);

    let grads = registry.grad_op_descs(&fwd).unwrap();
    assert_eq!(grads.len(), 1);
    let g = &grads[0];
    assert_eq!(g.op_type(), "reverse");
    assert_eq!(g.input("X"), &["y@GRAD".to_string()]);
    assert_eq!(g.output("Out"), &["x@GRAD".to_string()]);
    assert_eq!(g.attr("axis"), Some(&Attribute::Ints(vec![0, -1])));
}

#[test]
fn append_backward_declares_gradients() {
    init_logger();
    let registry = OpRegistry::with_builtin_ops();
    let (mut block, y) = forward_block(&registry, &[-1, 6], vec![1]);
    let appended = append_backward(&mut block, &registry).unwrap();
    assert_eq!(appended, vec![1]);
    assert_eq!(block.ops().len(), 2);

    let dy = block.var(&grad_var_name(&y)).unwrap();
    assert_eq!(dy.dims(), &[-1, 6]);
    let dx = block.var("x@GRAD").unwrap();
    assert_eq!(dx.dims(), &[-1, 6]);
    assert_eq!(dx.dtype(), Some(DataType::Float64));
}

#[test]
fn backward_reverses_upstream_gradient() {
    let x = array_gen::seq::<f64>(&[2, 3]);
    let dy = arr2(&[[1., 2., 3.], [4., 5., 6.]]).into_dyn();
    let dx = backward(&x, &dy, vec![0, 1]);
    assert_eq!(dx, arr2(&[[6., 5., 4.], [3., 2., 1.]]).into_dyn());

    let dx = backward(&x, &dy, vec![-1]);
    assert_eq!(dx, arr2(&[[3., 2., 1.], [6., 5., 4.]]).into_dyn());
}

#[test]
fn numerical_gradient() {
    let mut rng = ArrayRng::from_seed(5);
    let shape = [3, 2, 4];
    let x = rng.standard::<f64>(&shape);
    let w = rng.standard::<f64>(&shape);
    let axis = vec![0, 2];

    let analytic = backward(&x, &w, axis.clone());
    let objective = |x: &NdArray<f64>| {
        let y = ops::reverse(&Value::from(Tensor::from_array(x.clone())), axis.clone()).unwrap();
        let y = y.as_tensor().unwrap().to_array::<f64>().unwrap();
        (&y * &w).sum()
    };
    rv::test_helper::gradient_check(objective, &x, &analytic, 1e-4, 1e-6);
}

#[test]
fn reverse_grad_alias_runs_and_has_no_grad() {
    let registry = Arc::new(OpRegistry::with_builtin_ops());
    let mut op = OpDesc::new(ops::REVERSE_GRAD);
    op.set_input("X", vec!["dy".to_string()])
        .set_output("Out", vec!["dx".to_string()])
        .set_attr("axis", vec![0]);
    assert!(registry.grad_op_descs(&op).unwrap().is_empty());
    assert!(!registry.get(ops::REVERSE_GRAD).unwrap().is_differentiable());

    let mut scope = Scope::new();
    scope.set("dy", Tensor::from_array(array_gen::seq::<f32>(&[3])));
    Executor::cpu(registry).run_op(&op, &mut scope).unwrap();
    let dx = scope.get("dx").unwrap().as_tensor().unwrap();
    assert_eq!(
        dx.to_array::<f32>().unwrap(),
        NdArray::from_shape_vec(IxDyn(&[3]), vec![2., 1., 0.]).unwrap()
    );
}

#[test]
fn gradient_written_twice() {
    let registry = OpRegistry::with_builtin_ops();
    let mut block = BlockDesc::new();
    block.add_var(VarDesc::tensor("x", DataType::Float32, &[4]));
    ops::append_reverse(&mut block, &registry, "x", 0).unwrap();
    ops::append_reverse(&mut block, &registry, "x", -1).unwrap();
    assert!(matches!(
        append_backward(&mut block, &registry),
        Err(OpError::Unimplemented(_))
    ));
}

#[test]
fn backward_appended_only_once() {
    let registry = OpRegistry::with_builtin_ops();
    let (mut block, y) = forward_block(&registry, &[3], vec![0]);
    append_backward(&mut block, &registry).unwrap();
    let before = block.clone();

    assert!(matches!(
        append_backward(&mut block, &registry),
        Err(OpError::Unimplemented(_))
    ));
    assert_eq!(block, before);
    assert!(!block.has_var("x@GRAD@GRAD"));
    assert!(!block.has_var(&grad_var_name(&grad_var_name(&y))));
    let writers = block
        .ops()
        .iter()
        .filter(|op| op.output("Out") == ["x@GRAD".to_string()])
        .count();
    assert_eq!(writers, 1);
}

#[test]
fn backward_of_a_block_without_forward_ops() {
    let registry = OpRegistry::with_builtin_ops();
    let (mut block, _) = forward_block(&registry, &[3], vec![0]);
    append_backward(&mut block, &registry).unwrap();
    // keep only the backward op
    let mut bwd_only = BlockDesc::new();
    for var in block.vars() {
        bwd_only.add_var(var.clone());
    }
    bwd_only.append_op(block.ops()[1].clone());
    assert_eq!(append_backward(&mut bwd_only, &registry).unwrap(), Vec::<usize>::new());
    assert_eq!(bwd_only.ops().len(), 1);
}
