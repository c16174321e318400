//! Error types for modema-solver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] modema_core::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("singular matrix")]
    SingularMatrix,

    #[error("invalid matrix dimensions: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    #[error("no stable pole available to match {target} Hz")]
    NoStablePole { target: f64 },
}

pub type Result<T> = std::result::Result<T, Error>;
