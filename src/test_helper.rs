//! Helpers shared by the integration tests.
use crate::ndarray_ext::NdArray;

/// Checks `analytic` gradients of `objective` at `x` with the finite difference trick.
///
/// Panics on the first element whose central difference is farther than
/// `tol` from the analytic value.
pub fn gradient_check<F>(objective: F, x: &NdArray<f64>, analytic: &NdArray<f64>, eps: f64, tol: f64)
where
    F: Fn(&NdArray<f64>) -> f64,
{
    assert_eq!(x.shape(), analytic.shape(), "gradient shape mismatch");
    let mut probe = x.clone();
    for (i, (&th_grad, &evacuated)) in analytic.iter().zip(x.iter()).enumerate() {
        // perturbation (+)
        set_flat(&mut probe, i, evacuated + eps);
        let obj_pos = objective(&probe);
        // perturbation (-)
        set_flat(&mut probe, i, evacuated - eps);
        let obj_neg = objective(&probe);
        // restore
        set_flat(&mut probe, i, evacuated);

        let g_num = (obj_pos - obj_neg) / (2. * eps);
        assert!(
            (g_num - th_grad).abs() <= tol,
            "gradient mismatch at element {}: numerical {}, analytic {}",
            i,
            g_num,
            th_grad
        );
    }
}

fn set_flat(arr: &mut NdArray<f64>, i: usize, value: f64) {
    if let Some(slot) = arr.iter_mut().nth(i) {
        *slot = value;
    }
}
