//! Toeplitz correlation matrices for the LSCF normal equations.
//!
//! The correlation sequences are obtained with a real inverse FFT of the
//! one-sided FRF spectrum. Bins below the lower frequency limit are removed by
//! subtracting the inverse transform of the sub-band, which keeps the exact
//! Z-domain periodicity of the full transform while estimating only inside
//! the band of interest.

use std::sync::Arc;

use nalgebra::DMatrix;
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::error::{Error, Result};

/// Real inverse FFT of a one-sided spectrum, scaled by the transform length.
///
/// The spectrum is extended to its Hermitian counterpart. Imaginary parts of
/// the DC and Nyquist bins are ignored and missing bins are zero.
pub struct ScaledIrfft {
    nf: usize,
    fft: Arc<dyn Fft<f64>>,
}

impl ScaledIrfft {
    /// Plan an inverse transform of even length `nf`.
    pub fn new(nf: usize) -> Result<Self> {
        if nf < 2 || nf % 2 != 0 {
            return Err(Error::InvalidArgument(format!(
                "transform length must be even and at least 2, got {nf}"
            )));
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_inverse(nf);
        Ok(Self { nf, fft })
    }

    /// Transform length.
    pub fn nf(&self) -> usize {
        self.nf
    }

    /// Full real time sequence `nf * irfft(bins, nf)`.
    pub fn transform(&self, bins: &[Complex64]) -> Vec<f64> {
        let nf = self.nf;
        let half = nf / 2;
        let mut buffer = vec![Complex64::new(0.0, 0.0); nf];

        for (k, &x) in bins.iter().enumerate().take(half + 1) {
            if k == 0 || k == half {
                buffer[k] = Complex64::new(x.re, 0.0);
            } else {
                buffer[k] = x;
                buffer[nf - k] = x.conj();
            }
        }

        self.fft.process(&mut buffer);
        buffer.iter().map(|c| c.re).collect()
    }

    /// Transform sampled at integer lags. Negative lags wrap around.
    pub fn sample(&self, bins: &[Complex64], lags: &[isize]) -> Vec<f64> {
        let y = self.transform(bins);
        let nf = self.nf as isize;
        lags.iter()
            .map(|&m| y[m.rem_euclid(nf) as usize])
            .collect()
    }
}

/// Row-wise inverse FFT with the lower summation limit moved to `low_lim`.
///
/// Returns `a - b` for every row, sampled at `lags`, where `a` is the scaled
/// inverse transform of the whole row and `b` the one of its first `low_lim`
/// bins. The transform length is `2 * (bins - 1)`.
pub fn irfft_adjusted_lower_limit(
    x: &DMatrix<Complex64>,
    low_lim: usize,
    lags: &[isize],
) -> Result<DMatrix<f64>> {
    let bins = x.ncols();
    if bins < 2 {
        return Err(Error::InvalidArgument(format!(
            "at least two frequency bins required, got {bins}"
        )));
    }
    let irfft = ScaledIrfft::new(2 * (bins - 1))?;
    Ok(adjusted_with(&irfft, x, low_lim.min(bins), lags))
}

fn adjusted_with(
    irfft: &ScaledIrfft,
    x: &DMatrix<Complex64>,
    low_lim: usize,
    lags: &[isize],
) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(x.nrows(), lags.len());
    let mut row = Vec::with_capacity(x.ncols());

    for i in 0..x.nrows() {
        row.clear();
        row.extend(x.row(i).iter().cloned());

        let a = irfft.sample(&row, lags);
        let b = irfft.sample(&row[..low_lim], lags);
        for (j, (av, bv)) in a.iter().zip(&b).enumerate() {
            out[(i, j)] = av - bv;
        }
    }
    out
}

/// Toeplitz matrix with first column `column` and first row `row`.
///
/// `row[0]` is ignored in favour of `column[0]`.
pub fn toeplitz(column: &[f64], row: &[f64]) -> DMatrix<f64> {
    DMatrix::from_fn(column.len(), row.len(), |i, j| {
        if i >= j {
            column[i - j]
        } else {
            row[j - i]
        }
    })
}

/// Correlation matrices `S_i`, `T` and `R` of size `(n+1) x (n+1)`.
#[derive(Debug, Clone)]
pub struct CorrelationMatrices {
    /// Cross term, one matrix per response location.
    pub s: Vec<DMatrix<f64>>,
    /// Power term summed over the response locations.
    pub t: DMatrix<f64>,
    /// Frequency weighting term shared by all locations.
    pub r: DMatrix<f64>,
    /// Highest polynomial order `n` the matrices support.
    pub order: usize,
}

impl CorrelationMatrices {
    /// Build the matrices for polynomial orders up to `n`.
    ///
    /// `lower_index` is the first bin that takes part in the estimate.
    pub fn build(frf: &DMatrix<Complex64>, lower_index: usize, n: usize) -> Result<Self> {
        let bins = frf.ncols();
        if bins < 2 {
            return Err(Error::InvalidArgument(format!(
                "at least two frequency bins required, got {bins}"
            )));
        }
        let irfft = ScaledIrfft::new(2 * (bins - 1))?;
        let nf = irfft.nf();
        if n >= nf {
            return Err(Error::InvalidArgument(format!(
                "polynomial order {n} needs more than {} frequency bins",
                bins
            )));
        }
        let lower_index = lower_index.min(bins);

        let n_lag = n as isize;
        let lags_s: Vec<isize> = (-n_lag..=n_lag).collect();
        let lags_t: Vec<isize> = (0..=n_lag).collect();

        // Cross term, S_i[p, q] = sk_i(p - q)
        let sk = -adjusted_with(&irfft, frf, lower_index, &lags_s);
        let s = (0..frf.nrows())
            .map(|i| {
                let column: Vec<f64> = (n..=2 * n).map(|k| sk[(i, k)]).collect();
                let row: Vec<f64> = (0..=n).rev().map(|k| sk[(i, k)]).collect();
                toeplitz(&column, &row)
            })
            .collect();

        // Power term
        let power = frf.map(|h| Complex64::new(h.norm_sqr(), 0.0));
        let tk = adjusted_with(&irfft, &power, lower_index, &lags_t);
        let t_seq: Vec<f64> = tk.row_sum().iter().cloned().collect();
        let t = toeplitz(&t_seq, &t_seq);

        // Weighting term: unit spectrum with the sub-band removed
        let ones = vec![Complex64::new(1.0, 0.0); lower_index];
        let mut r_seq: Vec<f64> = irfft.sample(&ones, &lags_t).iter().map(|v| -v).collect();
        r_seq[0] += nf as f64;
        let r = toeplitz(&r_seq, &r_seq);

        Ok(Self {
            s,
            t,
            r,
            order: n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn test_frf(rows: usize, bins: usize) -> DMatrix<Complex64> {
        DMatrix::from_fn(rows, bins, |i, k| {
            let x = k as f64 * 0.37 + i as f64;
            Complex64::new(x.sin() + 0.5, (1.3 * x).cos())
        })
    }

    /// Direct evaluation of the band-limited inverse transform.
    fn direct(row: &[Complex64], low: usize, m: isize) -> f64 {
        let nf = 2 * (row.len() - 1);
        let half = nf / 2;
        let mut sum = 0.0;
        for (k, x) in row.iter().enumerate().skip(low) {
            let phase = 2.0 * PI * (k as f64) * (m as f64) / nf as f64;
            let term = (x * Complex64::new(phase.cos(), phase.sin())).re;
            if k == 0 || k == half {
                sum += x.re * phase.cos();
            } else {
                sum += 2.0 * term;
            }
        }
        sum
    }

    #[test]
    fn test_adjusted_matches_direct_sum() {
        let frf = test_frf(2, 33);
        let lags: Vec<isize> = (-6..=6).collect();
        for low in [0, 1, 5, 12] {
            let y = irfft_adjusted_lower_limit(&frf, low, &lags).unwrap();
            for i in 0..2 {
                let row: Vec<Complex64> = frf.row(i).iter().cloned().collect();
                for (j, &m) in lags.iter().enumerate() {
                    assert_relative_eq!(y[(i, j)], direct(&row, low, m), epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_unit_spectrum_is_scaled_delta() {
        let irfft = ScaledIrfft::new(16).unwrap();
        assert_eq!(irfft.nf(), 16);
        let ones = vec![Complex64::new(1.0, 0.0); 9];
        let y = irfft.transform(&ones);
        assert_relative_eq!(y[0], 16.0, epsilon = 1e-12);
        for v in &y[1..] {
            assert_relative_eq!(*v, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_odd_length_rejected() {
        assert!(ScaledIrfft::new(7).is_err());
        assert!(ScaledIrfft::new(0).is_err());
    }

    #[test]
    fn test_toeplitz_layout() {
        let t = toeplitz(&[1.0, 2.0, 3.0], &[9.0, 4.0, 5.0]);
        assert_eq!(t[(0, 0)], 1.0);
        assert_eq!(t[(1, 0)], 2.0);
        assert_eq!(t[(2, 0)], 3.0);
        assert_eq!(t[(0, 1)], 4.0);
        assert_eq!(t[(0, 2)], 5.0);
        assert_eq!(t[(2, 1)], 2.0);
        assert_eq!(t[(1, 2)], 4.0);
    }

    #[test]
    fn test_full_band_weighting_is_scaled_identity() {
        let frf = test_frf(1, 41);
        let corr = CorrelationMatrices::build(&frf, 0, 6).unwrap();
        assert_eq!(corr.r.nrows(), 7);
        for i in 0..7 {
            for j in 0..7 {
                let expected = if i == j { 80.0 } else { 0.0 };
                assert_relative_eq!(corr.r[(i, j)], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_matrix_structure() {
        let frf = test_frf(3, 41);
        let n = 8;
        let corr = CorrelationMatrices::build(&frf, 4, n).unwrap();

        assert_eq!(corr.s.len(), 3);
        assert_eq!(corr.t.shape(), (n + 1, n + 1));

        let lags: Vec<isize> = (-(n as isize)..=n as isize).collect();
        let sk = irfft_adjusted_lower_limit(&frf, 4, &lags).unwrap();
        for (i, s) in corr.s.iter().enumerate() {
            for p in 0..=n {
                for q in 0..=n {
                    // S[p, q] = -y(p - q)
                    let k = (p as isize - q as isize + n as isize) as usize;
                    assert_relative_eq!(s[(p, q)], -sk[(i, k)], epsilon = 1e-12);
                }
            }
        }
        assert_relative_eq!(corr.t, corr.t.transpose(), epsilon = 1e-12);
        assert_relative_eq!(corr.r, corr.r.transpose(), epsilon = 1e-12);
    }

    #[test]
    fn test_order_must_fit_transform() {
        let frf = test_frf(1, 5);
        assert!(CorrelationMatrices::build(&frf, 0, 8).is_err());
        assert!(CorrelationMatrices::build(&frf, 0, 7).is_ok());
    }
}
