//! Damped normal equations.
//!
//! Each trial step solves `(JᵀJ + λ·D) δ = -Jᵀr` where `D` scales every
//! diagonal entry by `1 + |H_ii|`. The damped matrix is symmetric positive
//! definite whenever λ > 0, so a Cholesky factorization is used; a failed
//! factorization or a non-finite solution is reported as a singular system.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

use crate::error::{Result, WellFitError};

/// `H = JᵀJ` and `g = -Jᵀr`
pub fn normal_equations(jacobian: &Array2<f64>, residuals: &Array1<f64>) -> (Array2<f64>, Array1<f64>) {
    let jt = jacobian.t();
    let hessian = jt.dot(jacobian);
    let gradient = -jt.dot(residuals);
    (hessian, gradient)
}

/// Copy of `hessian` with `λ(1 + |H_ii|)` added on the diagonal
pub fn damp(hessian: &Array2<f64>, lambda: f64) -> Array2<f64> {
    let mut damped = hessian.clone();
    for i in 0..damped.nrows().min(damped.ncols()) {
        let h = damped[[i, i]];
        damped[[i, i]] = h + lambda * (1.0 + h.abs());
    }
    damped
}

/// Solve `H δ = g` for a symmetric positive definite `H`
pub fn solve(hessian: &Array2<f64>, gradient: &Array1<f64>) -> Result<Array1<f64>> {
    let (rows, cols) = hessian.dim();
    if rows != cols || rows != gradient.len() {
        return Err(WellFitError::DimensionMismatch(format!(
            "cannot solve a {}x{} system with a right-hand side of length {}",
            rows,
            cols,
            gradient.len()
        )));
    }

    let h = DMatrix::from_fn(rows, cols, |i, j| hessian[[i, j]]);
    let g = DVector::from_iterator(rows, gradient.iter().copied());

    let cholesky = h.cholesky().ok_or(WellFitError::SingularMatrix)?;
    let delta = cholesky.solve(&g);

    if delta.iter().all(|v| v.is_finite()) {
        Ok(Array1::from_iter(delta.iter().copied()))
    } else {
        Err(WellFitError::SingularMatrix)
    }
}

/// Damp and solve in one call
pub fn damped_step(hessian: &Array2<f64>, gradient: &Array1<f64>, lambda: f64) -> Result<Array1<f64>> {
    solve(&damp(hessian, lambda), gradient)
}
