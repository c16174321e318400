//! Measured frequency response data.

use std::f64::consts::PI;

use nalgebra::DMatrix;
use num_complex::Complex64;
use tracing::debug;

use crate::error::{Error, Result};

/// Bins below this frequency (Hz) are dropped by [`FrfData::append_location`].
pub const MIN_APPEND_FREQUENCY: f64 = 1.0e-1;

/// Receptance FRF matrix paired with its frequency axis.
///
/// Rows are response locations, columns are frequency bins. The frequency
/// axis is finite and strictly ascending and has one entry per column.
#[derive(Debug, Clone, PartialEq)]
pub struct FrfData {
    frf: DMatrix<Complex64>,
    freq: Vec<f64>,
}

impl FrfData {
    /// Create FRF data from a (locations x bins) matrix and a frequency axis in Hz.
    pub fn new(frf: DMatrix<Complex64>, freq: Vec<f64>) -> Result<Self> {
        validate_axis(&freq)?;
        if frf.ncols() != freq.len() {
            return Err(Error::DimensionMismatch {
                expected: freq.len(),
                actual: frf.ncols(),
            });
        }
        if frf.nrows() == 0 {
            return Err(Error::InvalidArgument(
                "FRF matrix has no response locations".to_string(),
            ));
        }
        Ok(Self { frf, freq })
    }

    /// Create FRF data for a single response location.
    pub fn from_row(frf: &[Complex64], freq: Vec<f64>) -> Result<Self> {
        Self::new(DMatrix::from_row_slice(1, frf.len(), frf), freq)
    }

    /// Empty data set, to be filled with [`FrfData::append_location`].
    pub fn empty() -> Self {
        Self {
            frf: DMatrix::zeros(0, 0),
            freq: Vec::new(),
        }
    }

    /// Append the FRFs measured at further locations.
    ///
    /// `frf` is (locations x bins) and `freq` its frequency axis. Bins below
    /// [`MIN_APPEND_FREQUENCY`] are dropped and the stored frequency axis is
    /// replaced by the filtered one, so the Nyquist sampling time follows the
    /// most recently appended data.
    pub fn append_location(&mut self, frf: &DMatrix<Complex64>, freq: &[f64]) -> Result<()> {
        if frf.ncols() != freq.len() {
            return Err(Error::DimensionMismatch {
                expected: freq.len(),
                actual: frf.ncols(),
            });
        }

        let keep: Vec<usize> = freq
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f >= MIN_APPEND_FREQUENCY)
            .map(|(i, _)| i)
            .collect();
        let new_freq: Vec<f64> = keep.iter().map(|&i| freq[i]).collect();
        validate_axis(&new_freq)?;

        if self.frf.nrows() > 0 && self.frf.ncols() != keep.len() {
            return Err(Error::DimensionMismatch {
                expected: self.frf.ncols(),
                actual: keep.len(),
            });
        }

        let old_rows = self.frf.nrows();
        let rows = old_rows + frf.nrows();
        let stacked = DMatrix::from_fn(rows, keep.len(), |i, j| {
            if i < old_rows {
                self.frf[(i, j)]
            } else {
                frf[(i - old_rows, keep[j])]
            }
        });

        debug!(
            "appended {} location(s), {} bins kept of {}",
            frf.nrows(),
            keep.len(),
            freq.len()
        );

        self.frf = stacked;
        self.freq = new_freq;
        Ok(())
    }

    /// Drop all bins from the one nearest to `upper` onwards.
    ///
    /// The last remaining frequency is therefore never above `upper`.
    pub fn truncate_above(self, upper: f64) -> Result<Self> {
        let cutoff = nearest_index(&self.freq, upper).unwrap_or(0);
        if cutoff < 2 {
            return Err(Error::InvalidArgument(format!(
                "upper limit {upper} Hz leaves fewer than two frequency bins"
            )));
        }
        let frf = self.frf.columns(0, cutoff).into_owned();
        let mut freq = self.freq;
        freq.truncate(cutoff);
        debug!("truncated FRF to {} bins (upper = {} Hz)", cutoff, upper);
        Ok(Self { frf, freq })
    }

    /// FRF matrix (locations x bins).
    pub fn frf(&self) -> &DMatrix<Complex64> {
        &self.frf
    }

    /// Frequency axis (Hz).
    pub fn freq(&self) -> &[f64] {
        &self.freq
    }

    /// Angular frequency axis (rad/s).
    pub fn omega(&self) -> Vec<f64> {
        self.freq.iter().map(|f| 2.0 * PI * f).collect()
    }

    /// Number of response locations.
    pub fn num_outputs(&self) -> usize {
        self.frf.nrows()
    }

    /// Number of frequency bins.
    pub fn num_bins(&self) -> usize {
        self.freq.len()
    }

    /// True if no location has been added yet.
    pub fn is_empty(&self) -> bool {
        self.frf.nrows() == 0
    }

    /// Sampling time from the Nyquist relation, 1 / (2 * f_max).
    pub fn nyquist_sampling_time(&self) -> Option<f64> {
        self.freq.last().map(|&f| 1.0 / (2.0 * f))
    }

    /// Index of the bin nearest to `frequency`.
    pub fn nearest_bin(&self, frequency: f64) -> Option<usize> {
        nearest_index(&self.freq, frequency)
    }
}

/// Index of the value nearest to `target`. Ties resolve to the first index.
pub fn nearest_index(values: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        let dist = (v - target).abs();
        if dist.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, d)| dist < d) {
            best = Some((i, dist));
        }
    }
    best.map(|(i, _)| i)
}

fn validate_axis(freq: &[f64]) -> Result<()> {
    if freq.is_empty() {
        return Err(Error::InvalidArgument(
            "frequency vector is empty".to_string(),
        ));
    }
    if let Some(f) = freq.iter().find(|f| !f.is_finite()) {
        return Err(Error::InvalidArgument(format!(
            "frequency vector contains a non-finite value ({f})"
        )));
    }
    if let Some(i) = freq.windows(2).position(|w| w[1] <= w[0]) {
        return Err(Error::InvalidArgument(format!(
            "frequency vector is not strictly ascending at index {}",
            i + 1
        )));
    }
    Ok(())
}
