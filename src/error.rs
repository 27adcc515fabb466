//! Error types for cvxqcp.
//!
//! Three families of failure are kept apart: structural errors (the model breaks the DCP or
//! DQCP rules, shapes disagree, parameters are unbound), search-control errors (bisection ran
//! out of iterations, the solver failed during bisection), and numerical errors at bind time.
//! Infeasibility and unboundedness are not errors; they come back as a [`SolveStatus`] on an
//! `Ok` solution.
//!
//! [`SolveStatus`]: crate::solver::SolveStatus

use thiserror::Error;

/// Error type for cvxqcp operations.
#[derive(Debug, Error)]
pub enum CvxError {
    /// Problem is not DCP-compliant.
    #[error("Problem is not DCP: {0}")]
    NotDcp(String),

    /// Problem is not DQCP-compliant.
    #[error("Problem is not DQCP: {0}")]
    NotDqcp(String),

    /// Bisection exhausted its iteration budget before the interval closed.
    #[error("Max iters hit during bisection.")]
    BisectionMaxIters {
        /// Number of narrowing steps that were performed.
        iters: usize,
        /// Lower end of the last interval.
        low: f64,
        /// Upper end of the last interval.
        high: f64,
    },

    /// Solver error.
    #[error("Solver error: {0}")]
    SolverError(String),

    /// Shape mismatch.
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// Invalid problem specification.
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// Numerical error.
    #[error("Numerical error: {0}")]
    NumericalError(String),
}

/// Result type for cvxqcp operations.
pub type Result<T> = std::result::Result<T, CvxError>;
