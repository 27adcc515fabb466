//! Solver interface for cvxqcp.
//!
//! This module provides:
//! - Matrix stuffing that binds a compiled cone program to parameter values
//! - Clarabel solver integration
//! - The user-facing [`Solution`]

pub mod clarabel;
pub mod solution;
pub mod stuffing;

pub use self::clarabel::{solve, RawSolution, Settings, SolveStatus};
pub use solution::Solution;
pub use stuffing::{bind, Binding, ConeDims, StuffedProblem, VariableMap};
