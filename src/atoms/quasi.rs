//! Quasiconvex and quasiconcave atoms.
//!
//! None of these atoms is convex or concave, so they never pass plain DCP analysis when applied
//! to a variable. Problems using them are solved with bisection (`Problem::solve_qcp`).
//!
//! Products and ratios of two non-constant expressions are also quasi atoms; they are built
//! with the ordinary `*` and `/` operators.

use std::sync::Arc;

use crate::expr::{constant_vec, Expr};

/// Ceiling (elementwise).
///
/// Properties:
/// - Curvature: Quasilinear
/// - Monotonicity: Increasing
pub fn ceil(x: &Expr) -> Expr {
    Expr::Ceil(Arc::new(x.clone()))
}

/// Floor (elementwise).
///
/// Properties:
/// - Curvature: Quasilinear
/// - Monotonicity: Increasing
pub fn floor(x: &Expr) -> Expr {
    Expr::Floor(Arc::new(x.clone()))
}

/// Sign of a scalar expression, with `sign(0) = 0`.
///
/// Quasilinear only for scalar input. The sum of signs of a vector is not DQCP.
pub fn sign(x: &Expr) -> Expr {
    Expr::Sign(Arc::new(x.clone()))
}

/// Length of a vector: one plus the index of its last nonzero entry.
///
/// Properties:
/// - Curvature: Quasiconvex
/// - Sign: Non-negative
/// - Monotonicity: Increasing for x >= 0, decreasing for x <= 0
pub fn length(x: &Expr) -> Expr {
    Expr::Length(Arc::new(x.clone()))
}

/// Distance ratio `||x - a||_2 / ||x - b||_2` for constant points `a` and `b`.
///
/// Quasiconvex on the half-space where `||x - a|| <= ||x - b||`. `x` must be affine.
pub fn dist_ratio(x: &Expr, a: &[f64], b: &[f64]) -> Expr {
    Expr::DistRatio(
        Arc::new(x.clone()),
        Arc::new(constant_vec(a.to_vec())),
        Arc::new(constant_vec(b.to_vec())),
    )
}

/// Linear-fractional function `(A x + b) / (C x + d)` (elementwise).
///
/// Quasilinear when the denominator has known sign, e.g. when its parts are nonnegative.
pub fn lin_frac(numerator: &Expr, denominator: &Expr) -> Expr {
    Expr::Div(Arc::new(numerator.clone()), Arc::new(denominator.clone()))
}
