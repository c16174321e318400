//! Dense linear algebra helpers.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use crate::error::{Error, Result};

/// Relative singular value cutoff used by [`pseudo_inverse`].
pub const PINV_RCOND: f64 = 1e-15;

/// Schur iteration limit for [`eigenvalues`].
const SCHUR_MAX_ITER: usize = 10_000;

/// Solve a linear system Ax = b using LU decomposition.
pub fn solve_dense(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    if a.nrows() != a.ncols() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            actual: a.ncols(),
        });
    }
    if a.nrows() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            actual: b.len(),
        });
    }

    let x = a.clone().lu().solve(b).ok_or(Error::SingularMatrix)?;
    ensure_finite(x.iter(), "linear solve")?;
    Ok(x)
}

/// Invert a square matrix.
pub fn invert(a: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if a.nrows() != a.ncols() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            actual: a.ncols(),
        });
    }
    let inv = a.clone().try_inverse().ok_or(Error::SingularMatrix)?;
    ensure_finite(inv.iter(), "matrix inverse")?;
    Ok(inv)
}

/// Moore-Penrose pseudo-inverse via SVD.
///
/// Singular values below `PINV_RCOND * sigma_max` are treated as zero.
pub fn pseudo_inverse(a: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    ensure_finite(a.iter(), "pseudo-inverse input")?;
    let svd = a.clone().svd(true, true);
    let sigma_max = svd.singular_values.iter().cloned().fold(0.0, f64::max);
    svd.pseudo_inverse(PINV_RCOND * sigma_max)
        .map_err(|e| Error::NumericalDegeneracy(e.to_string()))
}

/// Complex eigenvalues of a real square matrix (real Schur form).
pub fn eigenvalues(a: &DMatrix<f64>) -> Result<DVector<Complex64>> {
    if a.nrows() != a.ncols() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            actual: a.ncols(),
        });
    }
    let schur = a
        .clone()
        .try_schur(f64::EPSILON, SCHUR_MAX_ITER)
        .ok_or_else(|| Error::NumericalDegeneracy("Schur decomposition did not converge".into()))?;
    Ok(schur.complex_eigenvalues())
}

fn ensure_finite<'a>(values: impl IntoIterator<Item = &'a f64>, what: &str) -> Result<()> {
    if values.into_iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Error::NumericalDegeneracy(format!(
            "{what} produced non-finite values"
        )))
    }
}
