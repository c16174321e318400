//! Least-Squares Frequency-Domain (LSFD) modal constants and FRF reconstruction.
//!
//! For a fixed set of poles the receptance model
//!
//! ```text
//! H(w) = sum_r [ A_r / (jw - p_r) + conj(A_r) / (jw - conj(p_r)) ] - LR / w^2 + UR
//! ```
//!
//! is linear in the modal constants `A_r` and the lower and upper residuals.
//! The real part of the measured FRF is fitted with a real-valued design
//! matrix through the pseudo-inverse of its normal matrix.

use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use modema_core::PoleRef;

use crate::error::{Error, Result};
use crate::linear::pseudo_inverse;
use crate::lscf::{Lscf, SolverResult};

/// Angular frequency substituted for w = 0 in the residual terms.
pub const ZERO_OMEGA_GUARD: f64 = 0.01;

/// Options controlling the LSFD fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LsfdOptions {
    /// Fit band (Hz). Defaults to the estimator's lower and upper limits.
    pub band: Option<(f64, f64)>,
    /// Include the imaginary (complex mode) basis columns.
    pub complex_mode: bool,
    /// Estimate the upper residual.
    pub upper_residual: bool,
    /// Estimate the lower residual.
    pub lower_residual: bool,
}

impl Default for LsfdOptions {
    fn default() -> Self {
        Self {
            band: None,
            complex_mode: true,
            upper_residual: true,
            lower_residual: true,
        }
    }
}

/// Which FRF rows to reconstruct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructTarget {
    /// Modal constants only.
    None,
    /// Every response location.
    All,
    /// A single response location.
    Index(usize),
}

impl FromStr for ReconstructTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "none" | "None" => Ok(Self::None),
            "all" => Ok(Self::All),
            other => other.parse::<usize>().map(Self::Index).map_err(|_| {
                Error::InvalidArgument(format!(
                    "reconstruction target must be none, \"all\" or an index, got {other:?}"
                ))
            }),
        }
    }
}

impl fmt::Display for ReconstructTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::All => write!(f, "all"),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Modal constants and residuals of every response location.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalConstants {
    /// Poles the constants belong to.
    pub poles: Vec<Complex64>,
    /// Raw least-squares solution, (locations x (2 * poles + 4)).
    pub coefficients: DMatrix<f64>,
    /// Complex modal constants, (locations x poles).
    pub residues: DMatrix<Complex64>,
    /// Lower residual per location.
    pub lower_residual: DVector<Complex64>,
    /// Upper residual per location.
    pub upper_residual: DVector<Complex64>,
}

impl ModalConstants {
    pub fn num_poles(&self) -> usize {
        self.poles.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.coefficients.nrows()
    }

    /// Evaluate the modal model of one location at angular frequencies `omega`.
    pub fn reconstruct_row(&self, omega: &[f64], row: usize) -> Result<DVector<Complex64>> {
        if row >= self.num_outputs() {
            return Err(Error::InvalidArgument(format!(
                "location index {} out of range for {} locations",
                row,
                self.num_outputs()
            )));
        }

        let lr = self.lower_residual[row];
        let ur = self.upper_residual[row];
        Ok(DVector::from_iterator(
            omega.len(),
            omega.iter().map(|&w| {
                let jw = Complex64::new(0.0, w);
                let modal: Complex64 = self
                    .poles
                    .iter()
                    .enumerate()
                    .map(|(n, &p)| {
                        let a = self.residues[(row, n)];
                        a / (jw - p) + a.conj() / (jw - p.conj())
                    })
                    .sum();
                let w = guard(w);
                modal - lr / (w * w) + ur
            }),
        ))
    }

    /// Evaluate the modal model of every location.
    pub fn reconstruct_all(&self, omega: &[f64]) -> Result<DMatrix<Complex64>> {
        let mut frf = DMatrix::zeros(self.num_outputs(), omega.len());
        for row in 0..self.num_outputs() {
            let h = self.reconstruct_row(omega, row)?;
            frf.row_mut(row).copy_from(&h.transpose());
        }
        Ok(frf)
    }
}

/// Result of [`Lscf::lsfd`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub constants: ModalConstants,
    /// Reconstructed FRF over the stored frequency axis; one row for
    /// [`ReconstructTarget::Index`], all rows for [`ReconstructTarget::All`].
    pub frf: Option<DMatrix<Complex64>>,
}

fn guard(w: f64) -> f64 {
    if w == 0.0 { ZERO_OMEGA_GUARD } else { w }
}

/// Real-valued LSFD design matrix, (bins x (2 * poles + 4)).
///
/// Columns: real two-pole bases, imaginary two-pole bases (zero without
/// complex modes), lower residual and its imaginary part, upper residual and
/// its imaginary part. The imaginary residual columns are always zero.
pub fn design_matrix(omega: &[f64], poles: &[Complex64], options: &LsfdOptions) -> DMatrix<f64> {
    let m = poles.len();
    let cols = 2 * m + 4;
    let mut ta = DMatrix::from_element(omega.len(), cols, 1.0);

    for (i, &w) in omega.iter().enumerate() {
        let jw = Complex64::new(0.0, w);
        for (n, &p) in poles.iter().enumerate() {
            let u = (jw - p).inv();
            let v = (jw - p.conj()).inv();
            ta[(i, n)] = (u + v).re;
            ta[(i, m + n)] = if options.complex_mode {
                (u - v).im
            } else {
                0.0
            };
        }

        let w = guard(w);
        ta[(i, cols - 4)] = if options.lower_residual {
            -1.0 / (w * w)
        } else {
            0.0
        };
        ta[(i, cols - 3)] = 0.0;
        ta[(i, cols - 2)] = if options.upper_residual { 1.0 } else { 0.0 };
        ta[(i, cols - 1)] = 0.0;
    }
    ta
}

/// Fit modal constants to the (locations x bins) FRF slice measured at `omega`.
pub fn estimate_modal_constants(
    frf: &DMatrix<Complex64>,
    omega: &[f64],
    poles: &[Complex64],
    options: &LsfdOptions,
) -> Result<ModalConstants> {
    if frf.ncols() != omega.len() {
        return Err(Error::DimensionMismatch {
            expected: omega.len(),
            actual: frf.ncols(),
        });
    }

    let m = poles.len();
    let cols = 2 * m + 4;
    let ta = design_matrix(omega, poles, options);
    let at = pseudo_inverse(&(ta.transpose() * &ta))? * ta.transpose();

    let measured = frf.map(|h| h.re);
    let coefficients = measured * at.transpose();

    let outputs = frf.nrows();
    let residues = DMatrix::from_fn(outputs, m, |v, n| {
        Complex64::new(coefficients[(v, n)], -coefficients[(v, m + n)])
    });
    let lower_residual = DVector::from_fn(outputs, |v, _| {
        Complex64::new(coefficients[(v, cols - 4)], coefficients[(v, cols - 3)])
    });
    let upper_residual = DVector::from_fn(outputs, |v, _| {
        Complex64::new(coefficients[(v, cols - 2)], coefficients[(v, cols - 1)])
    });

    Ok(ModalConstants {
        poles: poles.to_vec(),
        coefficients,
        residues,
        lower_residual,
        upper_residual,
    })
}

impl Lscf {
    /// Estimate modal constants for the selected poles and optionally
    /// reconstruct the FRF.
    ///
    /// `poles` may belong to a different estimator; the fit always uses this
    /// estimator's FRF data.
    pub fn lsfd(
        &self,
        poles: &SolverResult,
        selection: &[PoleRef],
        options: &LsfdOptions,
        target: ReconstructTarget,
    ) -> Result<Reconstruction> {
        let data = self.data();
        if let ReconstructTarget::Index(i) = target {
            if i >= data.num_outputs() {
                return Err(Error::InvalidArgument(format!(
                    "location index {} out of range for {} locations",
                    i,
                    data.num_outputs()
                )));
            }
        }
        let selected = poles.resolve(selection)?;

        let (f_lower, f_upper) = options
            .band
            .unwrap_or((self.config().lower, self.config().upper));
        if !f_lower.is_finite() || !f_upper.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "fit band must be finite, got ({f_lower}, {f_upper})"
            )));
        }
        let lower = data.nearest_bin(f_lower).unwrap_or(0);
        let upper = data.nearest_bin(f_upper).unwrap_or(0);
        if upper <= lower {
            return Err(Error::InvalidArgument(format!(
                "fit band ({f_lower}, {f_upper}) Hz contains no frequency bins"
            )));
        }

        let omega = data.omega();
        let band_frf = data.frf().columns(lower, upper - lower).into_owned();
        let constants =
            estimate_modal_constants(&band_frf, &omega[lower..upper], &selected, options)?;

        debug!(
            "LSFD: {} poles, bins {}..{}, target {}",
            selected.len(),
            lower,
            upper,
            target
        );

        let frf = match target {
            ReconstructTarget::None => None,
            ReconstructTarget::All => Some(constants.reconstruct_all(&omega)?),
            ReconstructTarget::Index(i) => {
                let row = constants.reconstruct_row(&omega, i)?;
                Some(DMatrix::from_fn(1, row.len(), |_, k| row[k]))
            }
        };

        Ok(Reconstruction { constants, frf })
    }
}
