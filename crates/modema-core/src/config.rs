//! Estimator configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Frequency band and model order for an LSCF estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LscfConfig {
    /// Lower limit for pole determination (Hz).
    pub lower: f64,
    /// Upper limit for pole determination (Hz). Bins above it are dropped.
    pub upper: f64,
    /// Highest polynomial order index. Orders 2, 4, ..., 2 * pol_order_high are solved.
    pub pol_order_high: usize,
    /// Sampling time (s). If None, derived from the Nyquist relation 1 / (2 * f_max).
    pub sampling_time: Option<f64>,
}

impl Default for LscfConfig {
    fn default() -> Self {
        Self {
            lower: 50.0,
            upper: 10_000.0,
            pol_order_high: 100,
            sampling_time: None,
        }
    }
}

impl LscfConfig {
    /// Create a configuration for the band `[lower, upper]` and the given order.
    pub fn new(lower: f64, upper: f64, pol_order_high: usize) -> Self {
        Self {
            lower,
            upper,
            pol_order_high,
            sampling_time: None,
        }
    }

    /// Use an explicit sampling time instead of the Nyquist-derived one.
    pub fn with_sampling_time(mut self, dt: f64) -> Self {
        self.sampling_time = Some(dt);
        self
    }

    /// Highest polynomial order that will be solved.
    pub fn max_polynomial_order(&self) -> usize {
        2 * self.pol_order_high
    }

    /// Check the bounds and order.
    pub fn validate(&self) -> Result<()> {
        if !self.lower.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "lower must be a finite number, got {}",
                self.lower
            )));
        }
        if self.lower < 0.0 {
            return Err(Error::InvalidArgument(
                "lower must be positive or equal to zero".to_string(),
            ));
        }
        if !self.upper.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "upper must be a finite number, got {}",
                self.upper
            )));
        }
        if self.upper <= self.lower {
            return Err(Error::InvalidArgument(format!(
                "upper ({}) must be greater than lower ({})",
                self.upper, self.lower
            )));
        }
        if self.pol_order_high == 0 {
            return Err(Error::InvalidArgument(
                "pol_order_high must be positive".to_string(),
            ));
        }
        if let Some(dt) = self.sampling_time {
            if !dt.is_finite() || dt <= 0.0 {
                return Err(Error::InvalidArgument(format!(
                    "sampling time must be positive and finite, got {dt}"
                )));
            }
        }
        Ok(())
    }
}
