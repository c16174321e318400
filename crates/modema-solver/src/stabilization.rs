//! Stabilization chart: classification of candidate poles across orders.
//!
//! Every order's frequencies and damping ratios are compared with the values
//! stored in the preceding column of the chart. A value is stable if its
//! relative deviation from some stored value is below the tolerance.
//!
//! Column bookkeeping follows the even-order stepping of the solver: order
//! index 1 is written to column 0, order index `n >= 2` to column `n - 1` and
//! compared with column `n - 2` over its first `2 * n` rows. Order index 0 is
//! written to the last column and has no comparison. Rows are positions in
//! the deduplicated pole list of an order, not pole identities.

use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use modema_core::complex_freq_to_freq_and_damp;

use crate::error::{Error, Result};
use crate::lscf::SolverResult;

/// Absolute frequency difference (Hz) below which two poles are duplicates.
pub const REDUNDANT_PRECISION: f64 = 1e-3;

/// Relative tolerances for the stability tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationTolerances {
    /// Relative error in natural frequency.
    pub frequency: f64,
    /// Relative error in damping ratio.
    pub damping: f64,
}

impl Default for StabilizationTolerances {
    fn default() -> Self {
        Self {
            frequency: 0.001,
            damping: 0.05,
        }
    }
}

impl StabilizationTolerances {
    pub fn new(frequency: f64, damping: f64) -> Self {
        Self { frequency, damping }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [("frequency", self.frequency), ("damping", self.damping)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidArgument(format!(
                    "{name} tolerance must be positive and finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Stability class of a chart cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoleClass {
    /// Stable frequency, unstable damping.
    StableFrequency,
    /// Stable frequency and damping; physical pole candidates.
    Stable,
    /// Unstable frequency and damping.
    Unstable,
    /// Unstable frequency, stable damping.
    StableDamping,
}

/// One cell of the chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub row: usize,
    /// Chart column. Column `c < nmax - 1` holds order index `c + 1`; the last
    /// column holds order index 0. Plotted at ordinate `1 + column`.
    pub column: usize,
    pub frequency: f64,
    pub damping: f64,
    pub class: PoleClass,
}

/// Drop duplicate frequencies caused by conjugate pairs.
///
/// Entry `j` is kept only if no later entry lies within `prec` of it, so the
/// last member of each group of duplicates survives.
pub fn redundant_values(freq: &[f64], damp: &[f64], prec: f64) -> (Vec<f64>, Vec<f64>) {
    let n = freq.len();
    let mut kept_freq = Vec::with_capacity(n);
    let mut kept_damp = Vec::with_capacity(n);

    for j in 0..n {
        let duplicated = (j + 1..n).any(|i| (freq[i] - freq[j]).abs() < prec);
        if !duplicated {
            kept_freq.push(freq[j]);
            kept_damp.push(damp[j]);
        }
    }
    (kept_freq, kept_damp)
}

/// Frequency, damping and stability-test tables, shape `(2 * nmax) x nmax`.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilizationChart {
    frequencies: DMatrix<f64>,
    dampings: DMatrix<f64>,
    frequency_tests: DMatrix<usize>,
    damping_tests: DMatrix<usize>,
}

impl StabilizationChart {
    /// Classify all orders of a solver result.
    pub fn classify(result: &SolverResult, tolerances: &StabilizationTolerances) -> Result<Self> {
        Self::from_orders(&result.all_poles(), result.num_orders(), tolerances)
    }

    /// Classify the first `nmax` pole lists.
    pub fn from_orders<P: AsRef<[Complex64]>>(
        poles: &[P],
        nmax: usize,
        tolerances: &StabilizationTolerances,
    ) -> Result<Self> {
        tolerances.validate()?;
        if nmax == 0 {
            return Err(Error::InvalidArgument("nmax must be positive".to_string()));
        }
        if nmax > poles.len() {
            return Err(Error::InvalidArgument(format!(
                "nmax {} exceeds the {} available orders",
                nmax,
                poles.len()
            )));
        }

        let rows = 2 * nmax;
        let mut fn_temp = DMatrix::zeros(rows, nmax);
        let mut xi_temp = DMatrix::zeros(rows, nmax);
        let mut test_fn = DMatrix::from_element(rows, nmax, 0usize);
        let mut test_xi = DMatrix::from_element(rows, nmax, 0usize);

        for (n, order) in poles.iter().take(nmax).enumerate() {
            let (freq, damp): (Vec<f64>, Vec<f64>) = order
                .as_ref()
                .iter()
                .map(|&p| complex_freq_to_freq_and_damp(p))
                .unzip();
            let (freq, damp) = redundant_values(&freq, &damp, REDUNDANT_PRECISION);
            if freq.len() > rows {
                return Err(Error::InvalidArgument(format!(
                    "order index {} has {} distinct poles, chart holds {}",
                    n,
                    freq.len(),
                    rows
                )));
            }

            if n == 1 {
                for (i, (&f, &x)) in freq.iter().zip(&damp).enumerate() {
                    fn_temp[(i, 0)] = f;
                    xi_temp[(i, 0)] = x;
                }
                continue;
            }

            let col = if n == 0 { nmax - 1 } else { n - 1 };
            let window = 2 * n;
            for (i, (&f, &x)) in freq.iter().zip(&damp).enumerate() {
                if n >= 2 {
                    let prev = n - 2;
                    test_fn[(i, col)] =
                        count_matches(&fn_temp, prev, window, f, tolerances.frequency);
                    test_xi[(i, col)] =
                        count_matches(&xi_temp, prev, window, x, tolerances.damping);
                }
                fn_temp[(i, col)] = f;
                xi_temp[(i, col)] = x;
            }
        }

        let chart = Self {
            frequencies: fn_temp,
            dampings: xi_temp,
            frequency_tests: test_fn,
            damping_tests: test_xi,
        };
        debug!(
            "stabilization chart: {} orders, {} stable cells",
            nmax,
            chart.points(PoleClass::Stable).len()
        );
        Ok(chart)
    }

    /// Number of chart columns.
    pub fn nmax(&self) -> usize {
        self.frequencies.ncols()
    }

    /// Number of chart rows.
    pub fn rows(&self) -> usize {
        self.frequencies.nrows()
    }

    pub fn frequencies(&self) -> &DMatrix<f64> {
        &self.frequencies
    }

    pub fn dampings(&self) -> &DMatrix<f64> {
        &self.dampings
    }

    /// Frequency match counts.
    pub fn frequency_tests(&self) -> &DMatrix<usize> {
        &self.frequency_tests
    }

    /// Damping match counts.
    pub fn damping_tests(&self) -> &DMatrix<usize> {
        &self.damping_tests
    }

    pub fn is_frequency_stable(&self, row: usize, col: usize) -> bool {
        self.frequency_tests[(row, col)] > 0
    }

    /// Damping is stable only for a positive damping ratio with a match.
    pub fn is_damping_stable(&self, row: usize, col: usize) -> bool {
        self.damping_tests[(row, col)] > 0 && self.dampings[(row, col)] > 0.0
    }

    pub fn class_at(&self, row: usize, col: usize) -> PoleClass {
        match (self.is_frequency_stable(row, col), self.is_damping_stable(row, col)) {
            (true, false) => PoleClass::StableFrequency,
            (true, true) => PoleClass::Stable,
            (false, false) => PoleClass::Unstable,
            (false, true) => PoleClass::StableDamping,
        }
    }

    /// All cells of one class in row-major order.
    pub fn points(&self, class: PoleClass) -> Vec<ChartPoint> {
        let mut points = Vec::new();
        for row in 0..self.rows() {
            for col in 0..self.nmax() {
                if self.class_at(row, col) == class {
                    points.push(ChartPoint {
                        row,
                        column: col,
                        frequency: self.frequencies[(row, col)],
                        damping: self.dampings[(row, col)],
                        class,
                    });
                }
            }
        }
        points
    }

    /// `true` for every [`PoleClass::Stable`] cell.
    pub fn stable_mask(&self) -> DMatrix<bool> {
        DMatrix::from_fn(self.rows(), self.nmax(), |row, col| {
            self.class_at(row, col) == PoleClass::Stable
        })
    }

    /// Frequencies of stable cells, zero elsewhere.
    pub fn stable_frequencies(&self) -> DMatrix<f64> {
        self.masked(&self.frequencies)
    }

    /// Damping ratios of stable cells, zero elsewhere.
    pub fn stable_dampings(&self) -> DMatrix<f64> {
        self.masked(&self.dampings)
    }

    fn masked(&self, values: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(self.rows(), self.nmax(), |row, col| {
            if self.class_at(row, col) == PoleClass::Stable {
                values[(row, col)]
            } else {
                0.0
            }
        })
    }
}

fn count_matches(table: &DMatrix<f64>, col: usize, window: usize, value: f64, tol: f64) -> usize {
    let window = window.min(table.nrows());
    (0..window)
        .filter(|&r| {
            let stored = table[(r, col)];
            ((value - stored) / stored).abs() < tol
        })
        .count()
}
