//! Pole selection from the per-order pole sets.
//!
//! Two modes are supported:
//! - picking the pole nearest to a (frequency, order index) coordinate, as a
//!   chart front end forwards user clicks
//! - matching approximate natural frequencies against the stable cells of a
//!   stabilization chart

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use modema_core::{ModalSelection, PoleRef, nearest_index};

use crate::error::{Error, Result};
use crate::lscf::SolverResult;
use crate::stabilization::{PoleClass, StabilizationChart, StabilizationTolerances};

/// Gauss-Newton iteration limit for [`refine_frequency`].
const REFINE_MAX_ITER: usize = 50;

/// Relative step size at which [`refine_frequency`] stops.
const REFINE_TOL: f64 = 1e-12;

/// Settings for approximate-frequency matching.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Initial search window (Hz).
    pub search_window: f64,
    /// Tolerances used to build the stabilization chart.
    pub tolerances: StabilizationTolerances,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            search_window: 50.0,
            tolerances: StabilizationTolerances::default(),
        }
    }
}

/// A pole chosen by approximate-frequency matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedPole {
    /// Resolved pole.
    pub pole: PoleRef,
    /// Natural frequency (Hz) of the matched chart cell.
    pub frequency: f64,
    /// Damping ratio of the matched chart cell.
    pub damping: f64,
}

/// Find the pole nearest to a chart coordinate.
///
/// The order index is the integer nearest to `order_index`; within that order
/// the pole with the nearest frequency is chosen.
pub fn nearest_pole(result: &SolverResult, frequency: f64, order_index: f64) -> Result<PoleRef> {
    if !frequency.is_finite() || !order_index.is_finite() {
        return Err(Error::InvalidArgument(format!(
            "pick coordinate must be finite, got ({frequency}, {order_index})"
        )));
    }

    let indices: Vec<f64> = (0..result.num_orders()).map(|k| k as f64).collect();
    let order = nearest_index(&indices, order_index)
        .ok_or_else(|| Error::InvalidArgument("no pole orders available".to_string()))?;

    let freqs = result.pole_frequencies(order).unwrap_or(&[]);
    let pole_index = nearest_index(freqs, frequency).ok_or_else(|| {
        Error::InvalidArgument(format!("order index {order} has no poles"))
    })?;

    Ok(PoleRef::new(order, pole_index))
}

/// Pick the pole nearest to a chart coordinate and append it to `selection`.
pub fn select_pole_near(
    result: &SolverResult,
    selection: &mut ModalSelection,
    frequency: f64,
    order_index: f64,
) -> Result<PoleRef> {
    let pole = nearest_pole(result, frequency, order_index)?;
    selection.push(pole);
    debug!(
        "picked pole {} of order index {} near {} Hz",
        pole.pole_index, pole.order_index, frequency
    );
    Ok(pole)
}

/// Shrinking half-widths used to refine an approximate frequency.
///
/// `floor(window / k)` for `k = 2, 3, ..., 99` while the quotient exceeds 3,
/// always followed by a final window of 2 Hz.
pub fn search_windows(window: f64) -> Vec<f64> {
    let mut windows: Vec<f64> = (2..100)
        .map(|k| (window / k as f64).floor())
        .filter(|&w| w > 3.0)
        .collect();
    windows.push(2.0);
    windows
}

/// Least-squares estimate of the frequency closest to all `values` inside the
/// open window `(estimate - half_width, estimate + half_width)`.
///
/// Minimises `sum (f_i - x)^2` with Gauss-Newton iterations. An empty window
/// leaves the estimate unchanged.
pub fn refine_frequency(values: &[f64], estimate: f64, half_width: f64) -> f64 {
    let in_window: Vec<f64> = values
        .iter()
        .copied()
        .filter(|&f| f > estimate - half_width && f < estimate + half_width)
        .collect();
    if in_window.is_empty() {
        return estimate;
    }

    let m = in_window.len() as f64;
    let mut x = estimate;
    for _ in 0..REFINE_MAX_ITER {
        // Residuals f_i - x have unit Jacobian magnitude
        let step = in_window.iter().map(|f| f - x).sum::<f64>() / m;
        x += step;
        if step.abs() <= REFINE_TOL * (1.0 + x.abs()) {
            break;
        }
    }
    x
}

/// Build the stabilization chart and match `targets` against its stable cells.
pub fn match_approximate_frequencies(
    result: &SolverResult,
    targets: &[f64],
    config: &MatchConfig,
) -> Result<Vec<MatchedPole>> {
    let chart = StabilizationChart::classify(result, &config.tolerances)?;
    match_on_chart(result, &chart, targets, config.search_window)
}

/// Match approximate natural frequencies against a precomputed chart.
///
/// Each target is refined through [`search_windows`], snapped to the nearest
/// stable cell (first in row-major order on ties) and resolved to the pole of
/// the order list indexed by the cell's column with the nearest frequency.
pub fn match_on_chart(
    result: &SolverResult,
    chart: &StabilizationChart,
    targets: &[f64],
    search_window: f64,
) -> Result<Vec<MatchedPole>> {
    if !search_window.is_finite() || search_window <= 0.0 {
        return Err(Error::InvalidArgument(format!(
            "search window must be positive and finite, got {search_window}"
        )));
    }

    let stable = chart.points(PoleClass::Stable);
    let stable_freqs: Vec<f64> = stable.iter().map(|p| p.frequency).collect();
    let windows = search_windows(search_window);

    let mut matched = Vec::with_capacity(targets.len());
    for &target in targets {
        if !target.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "target frequency must be finite, got {target}"
            )));
        }

        if let Some(&first) = windows.first() {
            if !stable_freqs.iter().any(|&f| (f - target).abs() < first) {
                warn!("no stable pole within {} Hz of target {} Hz", first, target);
            }
        }

        let mut fr = target;
        for &w in &windows {
            fr = refine_frequency(&stable_freqs, fr, w);
        }

        let cell = nearest_index(&stable_freqs, fr)
            .map(|i| stable[i])
            .ok_or(Error::NoStablePole { target })?;

        // The pole is looked up in the order list indexed by the chart column
        let order_index = cell.column;
        let freqs = result.pole_frequencies(order_index).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "chart column {} has no matching pole order",
                cell.column
            ))
        })?;
        let pole_index = nearest_index(freqs, fr).ok_or_else(|| {
            Error::InvalidArgument(format!("order index {order_index} has no poles"))
        })?;

        debug!(
            "target {} Hz -> {} Hz (xi = {:.4}), order index {}",
            target, cell.frequency, cell.damping, order_index
        );

        matched.push(MatchedPole {
            pole: PoleRef::new(order_index, pole_index),
            frequency: cell.frequency,
            damping: cell.damping,
        });
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;
    use std::f64::consts::PI;

    fn pole_from(fr: f64, xi: f64) -> Complex64 {
        let w = 2.0 * PI * fr;
        Complex64::new(-xi * w, w * (1.0 - xi * xi).sqrt())
    }

    fn order(pairs: &[(f64, f64)]) -> Vec<Complex64> {
        pairs
            .iter()
            .flat_map(|&(f, x)| {
                let p = pole_from(f, x);
                [p, p.conj()]
            })
            .collect()
    }

    /// A 100 Hz mode present at every order plus an order-dependent spurious pole.
    fn stable_mode_result() -> SolverResult {
        SolverResult::from_poles(
            (0..5)
                .map(|k| order(&[(100.0, 0.02), (210.0 + 37.0 * k as f64, 0.3)]))
                .collect(),
        )
    }

    #[test]
    fn test_search_windows() {
        assert_eq!(
            search_windows(50.0),
            vec![25.0, 16.0, 12.0, 10.0, 8.0, 7.0, 6.0, 5.0, 5.0, 4.0, 4.0, 2.0]
        );
        assert_eq!(search_windows(6.0), vec![2.0]);
    }

    #[test]
    fn test_refine_frequency_is_window_mean() {
        let values = [98.0, 99.0, 103.0, 140.0];
        let x = refine_frequency(&values, 100.0, 10.0);
        assert!((x - 100.0).abs() < 1e-12);

        let x = refine_frequency(&values, 95.0, 5.0);
        assert!((x - 98.5).abs() < 1e-12);
    }

    #[test]
    fn test_refine_frequency_empty_window() {
        assert_eq!(refine_frequency(&[10.0, 20.0], 100.0, 5.0), 100.0);
    }

    #[test]
    fn test_nearest_pole() {
        let result = stable_mode_result();
        let pole = nearest_pole(&result, 251.0, 1.2).unwrap();
        assert_eq!(pole, PoleRef::new(1, 2));

        // Negative frequencies belong to the conjugates
        let pole = nearest_pole(&result, -99.0, 3.0).unwrap();
        assert_eq!(pole, PoleRef::new(3, 1));

        // Beyond the last order clamps to it
        let pole = nearest_pole(&result, 100.0, 40.0).unwrap();
        assert_eq!(pole.order_index, 4);
    }

    #[test]
    fn test_nearest_pole_rejects_nan() {
        let result = stable_mode_result();
        assert!(nearest_pole(&result, f64::NAN, 1.0).is_err());
        assert!(nearest_pole(&SolverResult::default(), 10.0, 1.0).is_err());
    }

    #[test]
    fn test_select_and_remove() {
        let result = stable_mode_result();
        let mut selection = ModalSelection::new();

        select_pole_near(&result, &mut selection, 101.0, 2.0).unwrap();
        select_pole_near(&result, &mut selection, 284.0, 2.0).unwrap();
        assert_eq!(selection.as_slice(), &[PoleRef::new(2, 0), PoleRef::new(2, 2)]);

        assert_eq!(selection.remove_last(), Some(PoleRef::new(2, 2)));
        assert_eq!(selection.remove_last(), Some(PoleRef::new(2, 0)));
        assert_eq!(selection.remove_last(), None);
    }

    #[test]
    fn test_match_approximate_frequency() {
        let result = stable_mode_result();
        let matched =
            match_approximate_frequencies(&result, &[96.0], &MatchConfig::default()).unwrap();

        assert_eq!(matched.len(), 1);
        let m = matched[0];
        assert!((m.frequency - 100.0).abs() < 1e-9);
        assert!((m.damping - 0.02).abs() < 1e-12);
        // First stable cell in row-major order sits in column 1
        assert_eq!(m.pole, PoleRef::new(1, 0));

        let (f, xi) = result.frequency_and_damping(m.pole).unwrap();
        assert!((f - 100.0).abs() < 1e-9);
        assert!((xi - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_match_without_stable_poles() {
        let result = SolverResult::from_poles(
            (0..4)
                .map(|k| order(&[(100.0 + 20.0 * k as f64, 0.02)]))
                .collect(),
        );
        let err = match_approximate_frequencies(&result, &[100.0], &MatchConfig::default());
        assert!(matches!(err, Err(Error::NoStablePole { .. })));

        let empty = match_approximate_frequencies(&result, &[], &MatchConfig::default()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_match_rejects_bad_window() {
        let result = stable_mode_result();
        let config = MatchConfig {
            search_window: -1.0,
            ..MatchConfig::default()
        };
        assert!(match_approximate_frequencies(&result, &[100.0], &config).is_err());
    }
}
