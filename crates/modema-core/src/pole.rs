//! Pole references, modal selections and pole conversions.

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Reference to one pole of a per-order pole set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoleRef {
    /// Index of the polynomial order (order = 2 * (order_index + 1)).
    pub order_index: usize,
    /// Position of the pole within that order.
    pub pole_index: usize,
}

impl PoleRef {
    pub fn new(order_index: usize, pole_index: usize) -> Self {
        Self {
            order_index,
            pole_index,
        }
    }
}

/// Ordered set of selected poles.
///
/// Owned by the caller and built up incrementally during pole picking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalSelection {
    poles: Vec<PoleRef>,
}

impl ModalSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pole to the selection.
    pub fn push(&mut self, pole: PoleRef) {
        self.poles.push(pole);
    }

    /// Remove the most recent selection.
    ///
    /// Returns `None` and leaves the selection untouched when it is empty.
    pub fn remove_last(&mut self) -> Option<PoleRef> {
        self.poles.pop()
    }

    pub fn clear(&mut self) {
        self.poles.clear();
    }

    pub fn len(&self) -> usize {
        self.poles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poles.is_empty()
    }

    pub fn as_slice(&self) -> &[PoleRef] {
        &self.poles
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoleRef> {
        self.poles.iter()
    }
}

impl From<Vec<PoleRef>> for ModalSelection {
    fn from(poles: Vec<PoleRef>) -> Self {
        Self { poles }
    }
}

impl FromIterator<PoleRef> for ModalSelection {
    fn from_iter<I: IntoIterator<Item = PoleRef>>(iter: I) -> Self {
        Self {
            poles: iter.into_iter().collect(),
        }
    }
}

/// Convert a complex pole to natural frequency (Hz) and damping ratio.
///
/// The frequency carries the sign of the imaginary part, so a conjugate pair
/// maps to `(f, xi)` and `(-f, -xi)`. A purely real pole has frequency zero
/// and a non-finite damping ratio.
pub fn complex_freq_to_freq_and_damp(pole: Complex64) -> (f64, f64) {
    let fr = sign(pole.im) * pole.norm();
    let xi = -pole.re / fr;
    (fr / (2.0 * PI), xi)
}

/// Shift discrete-time poles by the frequency step `df` (Hz).
pub fn shift_poles(poles: &[Complex64], df: f64) -> Vec<Complex64> {
    poles
        .iter()
        .map(|p| {
            let (a, b) = (p.re, p.im);
            let mag2 = a * a + b * b;
            let mag = mag2.sqrt();
            let ak = (2.0 * a * df * PI) / mag;
            let bk =
                -b + sign(b) * ((b * b * (mag2 + 4.0 * df * PI * (mag + df * PI))) / mag2).sqrt();
            Complex64::new(a + ak, b + bk)
        })
        .collect()
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}
