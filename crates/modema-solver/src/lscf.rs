//! Least-Squares Complex Frequency-domain (LSCF) pole estimation.
//!
//! The normal equations of the common-denominator Z-domain model are reduced
//! to `D = T - sum_i S_i^T R^-1 S_i` for every even polynomial order. The
//! denominator coefficients follow from `D[0..j, 0..j] a = -D[0..j, j]` with
//! the highest coefficient fixed to one, and the poles from the roots of the
//! resulting polynomial.
//!
//! # Example
//!
//! ```ignore
//! use modema_solver::Lscf;
//! use modema_core::LscfConfig;
//!
//! let lscf = Lscf::new(frf, freq, LscfConfig::new(10.0, 500.0, 30))?;
//! let poles = lscf.compute_poles()?;
//! for order in poles.orders() {
//!     println!("order {}: {} poles", order.order, order.poles.len());
//! }
//! ```

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use tracing::{debug, info};

use modema_core::{FrfData, LscfConfig, PoleRef, complex_freq_to_freq_and_damp};

use crate::error::{Error, Result};
use crate::linear::{eigenvalues, invert, solve_dense};
use crate::spectral::CorrelationMatrices;

/// Poles estimated at one polynomial order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPoles {
    /// Polynomial order.
    pub order: usize,
    /// Continuous-time poles.
    pub poles: Vec<Complex64>,
    /// Natural frequency of each pole (Hz), signed like its imaginary part.
    pub frequencies: Vec<f64>,
    /// Damping ratio of each pole.
    pub dampings: Vec<f64>,
    /// Participation factor of each pole.
    pub participation: Vec<Complex64>,
}

impl OrderPoles {
    /// Wrap a pole list, deriving the frequencies and damping ratios.
    pub fn new(order: usize, poles: Vec<Complex64>, participation: Vec<Complex64>) -> Self {
        let (frequencies, dampings) = poles
            .iter()
            .map(|&p| complex_freq_to_freq_and_damp(p))
            .unzip();
        Self {
            order,
            poles,
            frequencies,
            dampings,
            participation,
        }
    }
}

/// Per-order pole sets produced by [`Lscf::compute_poles`].
///
/// Order index `k` holds the poles of polynomial order `2 * (k + 1)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SolverResult {
    orders: Vec<OrderPoles>,
}

impl SolverResult {
    pub fn new(orders: Vec<OrderPoles>) -> Self {
        Self { orders }
    }

    /// Build a result from bare pole lists, one per order index.
    ///
    /// Participation factors are left empty.
    pub fn from_poles(poles: Vec<Vec<Complex64>>) -> Self {
        let orders = poles
            .into_iter()
            .enumerate()
            .map(|(k, p)| OrderPoles::new(2 * (k + 1), p, Vec::new()))
            .collect();
        Self { orders }
    }

    /// Number of solved orders.
    pub fn num_orders(&self) -> usize {
        self.orders.len()
    }

    pub fn orders(&self) -> &[OrderPoles] {
        &self.orders
    }

    pub fn order(&self, order_index: usize) -> Option<&OrderPoles> {
        self.orders.get(order_index)
    }

    /// Pole lists of all orders.
    pub fn all_poles(&self) -> Vec<&[Complex64]> {
        self.orders.iter().map(|o| o.poles.as_slice()).collect()
    }

    /// Pole frequencies (Hz) of one order.
    pub fn pole_frequencies(&self, order_index: usize) -> Option<&[f64]> {
        self.orders.get(order_index).map(|o| o.frequencies.as_slice())
    }

    pub fn pole(&self, pole: PoleRef) -> Option<Complex64> {
        self.orders
            .get(pole.order_index)
            .and_then(|o| o.poles.get(pole.pole_index))
            .copied()
    }

    /// Natural frequency (Hz) and damping ratio of a referenced pole.
    pub fn frequency_and_damping(&self, pole: PoleRef) -> Option<(f64, f64)> {
        let order = self.orders.get(pole.order_index)?;
        Some((
            *order.frequencies.get(pole.pole_index)?,
            *order.dampings.get(pole.pole_index)?,
        ))
    }

    /// Look up every referenced pole.
    pub fn resolve(&self, selection: &[PoleRef]) -> Result<Vec<Complex64>> {
        selection
            .iter()
            .map(|&r| {
                self.pole(r).ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "no pole {} at order index {}",
                        r.pole_index, r.order_index
                    ))
                })
            })
            .collect()
    }
}

/// Progress report emitted after each solved order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderProgress {
    /// Polynomial order just solved.
    pub order: usize,
    /// Number of orders solved so far.
    pub completed: usize,
    /// Total number of orders.
    pub total: usize,
}

/// LSCF estimator over a validated, truncated FRF data set.
#[derive(Debug, Clone)]
pub struct Lscf {
    data: FrfData,
    config: LscfConfig,
    sampling_time: f64,
    lower_index: usize,
}

impl Lscf {
    /// Validate the inputs and truncate the FRF above `config.upper`.
    ///
    /// All checks run before any numerical work.
    pub fn new(frf: DMatrix<Complex64>, freq: Vec<f64>, config: LscfConfig) -> Result<Self> {
        config.validate()?;
        let data = FrfData::new(frf, freq)?;
        Self::from_validated(data, config)
    }

    /// Same as [`Lscf::new`] for data assembled with [`FrfData::append_location`].
    pub fn from_frf_data(data: FrfData, config: LscfConfig) -> Result<Self> {
        config.validate()?;
        if data.is_empty() {
            return Err(Error::InvalidArgument(
                "no FRF locations supplied".to_string(),
            ));
        }
        Self::from_validated(data, config)
    }

    fn from_validated(data: FrfData, config: LscfConfig) -> Result<Self> {
        let data = data.truncate_above(config.upper)?;

        let bins = data.num_bins();
        let n = config.max_polynomial_order();
        if n >= 2 * (bins - 1) {
            return Err(Error::InvalidArgument(format!(
                "polynomial order {} needs more than {} frequency bins",
                n, bins
            )));
        }

        let sampling_time = match config.sampling_time {
            Some(dt) => dt,
            None => data
                .nyquist_sampling_time()
                .ok_or_else(|| Error::InvalidArgument("empty frequency vector".to_string()))?,
        };
        if !sampling_time.is_finite() || sampling_time <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "sampling time must be positive and finite, got {sampling_time}"
            )));
        }

        let lower_index = data.nearest_bin(config.lower).unwrap_or(0);

        debug!(
            "LSCF set up: {} locations, {} bins, lower index {}, dt = {:e} s",
            data.num_outputs(),
            bins,
            lower_index,
            sampling_time
        );

        Ok(Self {
            data,
            config,
            sampling_time,
            lower_index,
        })
    }

    /// Truncated FRF data.
    pub fn data(&self) -> &FrfData {
        &self.data
    }

    pub fn config(&self) -> &LscfConfig {
        &self.config
    }

    /// Sampling time mapping Z-domain roots to continuous-time poles.
    pub fn sampling_time(&self) -> f64 {
        self.sampling_time
    }

    /// First bin that takes part in the estimate.
    pub fn lower_index(&self) -> usize {
        self.lower_index
    }

    /// Correlation matrices for the configured maximum order.
    pub fn correlation(&self) -> Result<CorrelationMatrices> {
        CorrelationMatrices::build(
            self.data.frf(),
            self.lower_index,
            self.config.max_polynomial_order(),
        )
    }

    /// Solve all orders 2, 4, ..., 2 * pol_order_high.
    pub fn compute_poles(&self) -> Result<SolverResult> {
        self.compute_poles_with_progress(|_| {})
    }

    /// Solve all orders, reporting after each one.
    pub fn compute_poles_with_progress(
        &self,
        mut progress: impl FnMut(OrderProgress),
    ) -> Result<SolverResult> {
        let corr = self.correlation()?;
        let total = self.config.pol_order_high;
        let mut orders = Vec::with_capacity(total);

        for (k, j) in (2..=corr.order).step_by(2).enumerate() {
            let order = solve_order(&corr, j, self.sampling_time)?;
            debug!("order {}: {} poles", j, order.poles.len());
            orders.push(order);
            progress(OrderProgress {
                order: j,
                completed: k + 1,
                total,
            });
        }

        info!("LSCF solved {} polynomial orders", orders.len());
        Ok(SolverResult { orders })
    }
}

/// Solve the reduced normal equations for polynomial order `j`.
fn solve_order(corr: &CorrelationMatrices, j: usize, dt: f64) -> Result<OrderPoles> {
    let size = j + 1;
    let rinv = invert(&corr.r.view((0, 0), (size, size)).into_owned())?;

    let mut d = corr.t.view((0, 0), (size, size)).into_owned();
    for s in &corr.s {
        let sj = s.view((0, 0), (size, size)).into_owned();
        d -= sj.transpose() * &rinv * &sj;
    }

    let lhs = -d.view((0, 0), (j, j)).into_owned();
    let rhs = DVector::from_fn(j, |i, _| d[(i, j)]);
    let coeffs = solve_dense(&lhs, &rhs)?;

    let roots = eigenvalues(&companion(&coeffs))?;
    let poles = roots.iter().map(|z| -z.ln() / dt).collect();
    let participation = roots.iter().map(|&z| participation_factor(z, j)).collect();

    Ok(OrderPoles::new(j, poles, participation))
}

/// Companion matrix of the monic polynomial `z^j + a[j-1] z^(j-1) + ... + a[0]`.
pub fn companion(a: &DVector<f64>) -> DMatrix<f64> {
    let j = a.len();
    DMatrix::from_fn(j, j, |row, col| {
        if row == 0 {
            -a[j - 1 - col]
        } else if row == col + 1 {
            1.0
        } else {
            0.0
        }
    })
}

/// Last entry of the companion eigenvector belonging to root `lambda`.
///
/// The eigenvector is `[lambda^(j-1), ..., lambda, 1]`, normalised to unit
/// length and rotated so that its largest component is real and positive.
pub fn participation_factor(lambda: Complex64, j: usize) -> Complex64 {
    let r = lambda.norm();
    let m = j as i32 - 1;
    if r < 1.0 {
        let s: f64 = (0..j as i32).map(|k| r.powi(2 * k)).sum();
        Complex64::new(1.0 / s.sqrt(), 0.0)
    } else {
        let s: f64 = (0..j as i32).map(|k| r.powi(-2 * k)).sum();
        (lambda.conj() / r).powi(m) / (r.powi(m) * s.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::dvector;
    use std::f64::consts::PI;

    fn sdof(freq: &[f64], fr: f64, xi: f64) -> DMatrix<Complex64> {
        let wn = 2.0 * PI * fr;
        DMatrix::from_fn(1, freq.len(), |_, k| {
            let w = 2.0 * PI * freq[k];
            Complex64::new(1.0, 0.0) / Complex64::new(wn * wn - w * w, 2.0 * xi * wn * w)
        })
    }

    fn axis(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn test_invalid_bounds() {
        let freq = axis(101);
        let frf = sdof(&freq, 30.0, 0.02);
        let result = Lscf::new(frf, freq, LscfConfig::new(60.0, 20.0, 5));
        assert!(matches!(
            result,
            Err(Error::Core(modema_core::Error::InvalidArgument(_)))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let freq = axis(101);
        let frf = sdof(&freq[..100], 30.0, 0.02);
        let result = Lscf::new(frf, freq, LscfConfig::new(0.0, 90.0, 5));
        assert!(matches!(
            result,
            Err(Error::Core(modema_core::Error::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_order_too_high_for_bins() {
        let freq = axis(11);
        let frf = sdof(&freq, 3.0, 0.02);
        let result = Lscf::new(frf, freq, LscfConfig::new(0.0, 10.0, 20));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_truncation_and_sampling_time() {
        let freq = axis(201);
        let frf = sdof(&freq, 30.0, 0.02);
        let lscf = Lscf::new(frf, freq, LscfConfig::new(5.0, 100.0, 4)).unwrap();

        assert_eq!(lscf.data().num_bins(), 100);
        assert_eq!(lscf.data().frf().ncols(), 100);
        assert_eq!(lscf.lower_index(), 5);
        assert_relative_eq!(lscf.sampling_time(), 1.0 / (2.0 * 99.0));
    }

    #[test]
    fn test_explicit_sampling_time() {
        let freq = axis(201);
        let frf = sdof(&freq, 30.0, 0.02);
        let config = LscfConfig::new(5.0, 100.0, 4).with_sampling_time(1e-3);
        let lscf = Lscf::new(frf, freq, config).unwrap();
        assert_eq!(lscf.sampling_time(), 1e-3);
    }

    #[test]
    fn test_pole_count_per_order() {
        let freq = axis(201);
        let frf = sdof(&freq, 40.0, 0.03);
        let lscf = Lscf::new(frf, freq, LscfConfig::new(0.0, 200.0, 6)).unwrap();

        let mut reports = Vec::new();
        let result = lscf.compute_poles_with_progress(|p| reports.push(p)).unwrap();

        assert_eq!(result.num_orders(), 6);
        for (k, order) in result.orders().iter().enumerate() {
            assert_eq!(order.order, 2 * (k + 1));
            assert_eq!(order.poles.len(), order.order);
            assert_eq!(order.frequencies.len(), order.order);
            assert_eq!(order.participation.len(), order.order);
        }
        assert_eq!(reports.len(), 6);
        assert_eq!(reports.last().unwrap().completed, 6);
        assert_eq!(reports.last().unwrap().order, 12);
    }

    #[test]
    fn test_companion_roots() {
        // (z - 1)(z - 2)(z - 3) = z^3 - 6z^2 + 11z - 6
        let c = companion(&dvector![-6.0, 11.0, -6.0]);
        let mut roots: Vec<f64> = eigenvalues(&c).unwrap().iter().map(|z| z.re).collect();
        roots.sort_by(f64::total_cmp);
        assert_relative_eq!(roots[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(roots[1], 2.0, epsilon = 1e-10);
        assert_relative_eq!(roots[2], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn test_participation_factor_matches_eigenvector() {
        let a = dvector![0.3, -0.2, 0.5, 0.1];
        let c = companion(&a);
        let c = c.map(|v| Complex64::new(v, 0.0));
        let j = a.len();
        for &lambda in eigenvalues(&companion(&a)).unwrap().iter() {
            let v = DVector::from_fn(j, |k, _| lambda.powi((j - 1 - k) as i32));
            let residual = &c * &v - &v * lambda;
            assert!(residual.norm() < 1e-9);

            let pf = participation_factor(lambda, j);
            assert_relative_eq!(pf.norm(), 1.0 / v.norm(), max_relative = 1e-10);
        }
    }

    #[test]
    fn test_participation_factor_inside_unit_circle_is_real() {
        let pf = participation_factor(Complex64::new(0.3, 0.4), 6);
        assert_eq!(pf.im, 0.0);
        assert!(pf.re > 0.0 && pf.re <= 1.0);
    }

    #[test]
    fn test_resolve_unknown_pole() {
        let result = SolverResult::from_poles(vec![vec![Complex64::new(-1.0, 10.0)]]);
        assert!(result.resolve(&[PoleRef::new(0, 0)]).is_ok());
        assert!(matches!(
            result.resolve(&[PoleRef::new(0, 1)]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(result.resolve(&[PoleRef::new(3, 0)]).is_err());
    }
}
