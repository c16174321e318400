//! # Modema
//!
//! Experimental modal analysis in Rust.
//!
//! Modema identifies modal parameters from measured receptance frequency
//! response functions:
//! - LSCF (Least-Squares Complex Frequency) pole estimation over a range of
//!   polynomial orders
//! - Stabilization chart classification of the estimated poles
//! - Pole selection by chart coordinate or approximate natural frequency
//! - LSFD (Least-Squares Frequency-Domain) modal constants and FRF
//!   reconstruction
//!
//! ## Quick Start
//!
//! ```rust
//! use modema::prelude::*;
//!
//! let config = LscfConfig::new(10.0, 400.0, 20);
//! assert!(config.validate().is_ok());
//! assert_eq!(config.max_polynomial_order(), 40);
//! ```
//!
//! ## Identifying Modes
//!
//! ```rust,ignore
//! use modema::prelude::*;
//!
//! let lscf = Lscf::new(frf, freq, LscfConfig::new(10.0, 400.0, 20))?;
//! let poles = lscf.compute_poles()?;
//!
//! // Snap approximate natural frequencies to stable poles
//! let matched = match_approximate_frequencies(&poles, &[86.0, 240.0], &MatchConfig::default())?;
//! let selection: Vec<PoleRef> = matched.iter().map(|m| m.pole).collect();
//!
//! // Modal constants and the reconstructed FRF of every location
//! let fit = lscf.lsfd(&poles, &selection, &LsfdOptions::default(), ReconstructTarget::All)?;
//! ```

// Re-export core crates
pub use modema_core as core;
pub use modema_solver as solver;

// ============================================================================
// Convenient re-exports from modema_core
// ============================================================================

pub use modema_core::{
    // Errors
    Error as CoreError,
    // Measurement model
    FrfData,
    LscfConfig,
    // Pole references
    ModalSelection,
    PoleRef,
    complex_freq_to_freq_and_damp,
    shift_poles,
};

// ============================================================================
// Convenient re-exports from modema_solver
// ============================================================================

pub use modema_solver::{
    ChartPoint,
    // Errors
    Error as SolverError,
    // LSCF
    Lscf,
    // LSFD
    LsfdOptions,
    // Selection
    MatchConfig,
    MatchedPole,
    ModalConstants,
    OrderPoles,
    OrderProgress,
    // Stabilization
    PoleClass,
    ReconstructTarget,
    Reconstruction,
    SolverResult,
    StabilizationChart,
    StabilizationTolerances,
    match_approximate_frequencies,
    nearest_pole,
    select_pole_near,
};

// ============================================================================
// Re-export commonly used external types
// ============================================================================

/// Re-export of nalgebra's dynamic vector type.
pub use nalgebra::DVector;

/// Re-export of nalgebra's dynamic matrix type.
pub use nalgebra::DMatrix;

/// Re-export of the complex scalar used for FRFs and poles.
pub use num_complex::Complex64;

/// Prelude module for convenient imports.
///
/// ```rust
/// use modema::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ChartPoint, Complex64, DMatrix, DVector, FrfData, Lscf, LscfConfig, LsfdOptions,
        MatchConfig, MatchedPole, ModalConstants, ModalSelection, PoleClass, PoleRef,
        ReconstructTarget, Reconstruction, SolverResult, StabilizationChart,
        StabilizationTolerances, complex_freq_to_freq_and_damp, match_approximate_frequencies,
        nearest_pole, select_pole_near,
    };
}
