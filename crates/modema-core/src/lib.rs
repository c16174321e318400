//! Core data structures for modema.
//!
//! This crate provides the measurement model and the small value types shared
//! by the estimation stages:
//! - [`FrfData`]: receptance FRF matrix and its frequency axis
//! - [`LscfConfig`]: estimator bounds and polynomial order
//! - [`PoleRef`] and [`ModalSelection`]: references into per-order pole sets
//! - Conversion of complex poles to natural frequency and damping ratio

pub mod config;
pub mod error;
pub mod frf;
pub mod pole;

pub use config::LscfConfig;
pub use error::{Error, Result};
pub use frf::{FrfData, nearest_index};
pub use pole::{ModalSelection, PoleRef, complex_freq_to_freq_and_damp, shift_poles};
