//! DCP and DQCP analysis.
//!
//! This module provides the core analysis functionality:
//! - Curvature tracking (convex, concave, affine, constant, and the quasi variants)
//! - Sign tracking (non-negative, non-positive, unknown)
//! - Composition rules, memoized per node by [`Analyzer`]

pub mod analyzer;
pub mod curvature;
pub mod sign;

pub use analyzer::{Analyzer, Facts, Monotonicity};
pub use curvature::{add_curvature, scalar_mul_curvature, Curvature};
pub use sign::{add_sign, mul_sign, Sign};
