extern crate ndarray;
extern crate reverse_op as rv;

use ndarray::{arr1, arr2, arr3, IxDyn};
use rv::ndarray_ext::array_gen::{self, ArrayRng};
use rv::ndarray_ext::NdArray;
use rv::ops;
use rv::{Config, Element, Executor, OpError, OpRegistry, Place, Tensor, Value};
use std::sync::Arc;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn value<T: Element>(arr: NdArray<T>) -> Value {
    Value::from(Tensor::from_array(arr))
}

fn flip<T: Element>(x: &NdArray<T>, axis: &[i32]) -> NdArray<T> {
    let y = ops::reverse(&value(x.clone()), axis).unwrap();
    y.as_tensor().unwrap().to_array::<T>().unwrap()
}

#[test]
fn reverse_rows() {
    init_logger();
    let x = arr2(&[[1, 2, 3, 4, 5], [6, 7, 8, 9, 10], [11, 12, 13, 14, 15]]).into_dyn();
    let answer = arr2(&[[11, 12, 13, 14, 15], [6, 7, 8, 9, 10], [1, 2, 3, 4, 5]]).into_dyn();
    assert_eq!(flip(&x, &[0]), answer);
}

#[test]
fn reverse_first_and_last_axes() {
    let x = arr3(&[[[1, 2, 3, 4], [5, 6, 7, 8]], [[9, 10, 11, 12], [13, 14, 15, 16]]]).into_dyn();
    let answer =
        arr3(&[[[12, 11, 10, 9], [16, 15, 14, 13]], [[4, 3, 2, 1], [8, 7, 6, 5]]]).into_dyn();
    assert_eq!(flip(&x, &[0, 2]), answer);
}

#[test]
fn reverse_negative_axis() {
    let x = arr1(&[1, 2, 3]).into_dyn();
    assert_eq!(flip(&x, &[-1]), arr1(&[3, 2, 1]).into_dyn());
    assert_eq!(flip(&x, &[0]), flip(&x, &[-1]));
}

#[test]
fn reverse_single_int_axis() {
    let x = value(arr2(&[[1., 2.], [3., 4.]]).into_dyn());
    let y = ops::reverse(&x, 1).unwrap();
    assert_eq!(
        y.as_tensor().unwrap().to_array::<f64>().unwrap(),
        arr2(&[[2., 1.], [4., 3.]]).into_dyn()
    );
}

#[test]
fn duplicate_axes_cancel_in_pairs() {
    let x = array_gen::seq::<i32>(&[3, 4]);
    assert_eq!(flip(&x, &[1, 1]), x);
    assert_eq!(flip(&x, &[0, 1, -1]), flip(&x, &[0]));
    assert_eq!(flip(&x, &[0, -2, 0]), flip(&x, &[0]));
}

#[test]
fn every_dtype() {
    fn check<T: Element>() {
        let x = array_gen::seq::<T>(&[2, 3]);
        let y = flip(&x, &[1]);
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(y[[i, j]], x[[i, 2 - j]]);
            }
        }
    }
    check::<i32>();
    check::<u8>();
    check::<i64>();
    check::<bool>();
    check::<f32>();
    check::<f64>();
}

#[test]
fn output_keeps_shape_dtype_and_lod() {
    let lod = vec![vec![0, 2, 5]];
    let x = Value::from(Tensor::from_array(array_gen::seq::<f32>(&[5, 3])).with_lod(lod.clone()));
    let y = ops::reverse(&x, [0, 1]).unwrap();
    let y = y.as_tensor().unwrap();
    assert_eq!(y.shape(), Some(&[5, 3][..]));
    assert_eq!(y.dtype(), x.dtype());
    assert_eq!(y.lod(), &lod);
}

#[test]
fn involution_on_random_inputs() {
    let mut rng = ArrayRng::from_seed(1234);
    for ndim in 1..=5 {
        let shape = rng.shape(ndim, 5);
        let x = rng.standard::<f64>(&shape);
        let axis: Vec<i32> = (0..ndim as i32).filter(|a| a % 2 == 0).collect();
        assert_eq!(flip(&flip(&x, &axis), &axis), x);
    }
}

#[test]
fn composition_is_symmetric_difference() {
    let x = array_gen::seq::<i64>(&[2, 3, 4, 5]);
    // A = {0, 2}, B = {2, 3} -> A xor B = {0, 3}
    assert_eq!(flip(&flip(&x, &[0, 2]), &[2, 3]), flip(&x, &[0, 3]));
    // disjoint sets compose into their union
    assert_eq!(flip(&flip(&x, &[1]), &[-1]), flip(&x, &[1, 3]));
}

#[test]
fn zero_sized_tensor() {
    let x = NdArray::<f32>::zeros(IxDyn(&[0, 4]));
    assert_eq!(flip(&x, &[0, 1]).shape(), &[0, 4]);
}

#[test]
fn gpu_and_cpu_agree() {
    init_logger();
    let registry = Arc::new(OpRegistry::with_builtin_ops());
    let gpu = Executor::with_config(registry.clone(), Place::Gpu(0), &Config::default());
    let cpu = Executor::with_config(
        registry,
        Place::Cpu,
        &Config {
            parallel_threshold: 0,
            ..Config::default()
        },
    );
    let mut rng = ArrayRng::from_seed(99);
    for ndim in 1..=4 {
        let shape = rng.shape(ndim, 6);
        let x = value(rng.standard::<i32>(&shape));
        for axis in [vec![0], vec![-1], (0..ndim as i32).collect::<Vec<_>>()] {
            let a = ops::reverse_with(&gpu, &x, axis.clone()).unwrap();
            let b = ops::reverse_with(&cpu, &x, axis).unwrap();
            assert_eq!(a, b);
        }
    }
}

#[test]
fn allocation_failure_is_an_execution_error() {
    let registry = Arc::new(OpRegistry::with_builtin_ops());
    let config = Config {
        memory_limit: Some(64),
        ..Config::default()
    };
    let exec = Executor::with_config(registry, Place::Cpu, &config);
    let small = value(array_gen::seq::<f64>(&[8]));
    assert!(ops::reverse_with(&exec, &small, 0).is_ok());
    let large = value(array_gen::seq::<f64>(&[9]));
    assert!(matches!(
        ops::reverse_with(&exec, &large, 0),
        Err(OpError::Execution(_))
    ));
}

#[test]
fn scalar_cannot_be_reversed() {
    let x = value(NdArray::from_elem(IxDyn(&[]), 1.0f32));
    assert!(matches!(ops::reverse(&x, 0), Err(OpError::OutOfRange(_))));
}

#[test]
fn uninitialized_input() {
    let x = Value::from(Tensor::new());
    assert!(matches!(
        ops::reverse(&x, 0),
        Err(OpError::PreconditionNotMet(_))
    ));
}
