//! LSCF pole estimation and LSFD reconstruction for Modema.
//!
//! This crate provides:
//! - Toeplitz correlation matrices from band-limited inverse FFTs
//! - The LSCF polynomial solver producing poles for every even order
//! - Stabilization chart classification
//! - Pole selection by chart coordinate or approximate natural frequency
//! - LSFD modal constant estimation and FRF reconstruction

pub mod error;
pub mod linear;
pub mod lscf;
pub mod lsfd;
pub mod selection;
pub mod spectral;
pub mod stabilization;

pub use error::{Error, Result};
pub use lscf::{Lscf, OrderPoles, OrderProgress, SolverResult};
pub use lsfd::{LsfdOptions, ModalConstants, ReconstructTarget, Reconstruction};
pub use selection::{
    MatchConfig, MatchedPole, match_approximate_frequencies, match_on_chart, nearest_pole,
    select_pole_near,
};
pub use spectral::{CorrelationMatrices, irfft_adjusted_lower_limit};
pub use stabilization::{ChartPoint, PoleClass, StabilizationChart, StabilizationTolerances};
