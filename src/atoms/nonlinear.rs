//! Nonlinear atoms for convex optimization.
//!
//! These atoms have specific curvature properties (convex or concave)
//! and require DCP composition rules to be applied correctly.

use std::sync::Arc;

use crate::expr::Expr;

// ============================================================================
// Element-wise atoms
// ============================================================================

/// Absolute value: |x| (element-wise).
///
/// Properties:
/// - Curvature: Convex
/// - Sign: Non-negative
/// - Monotonicity: Increasing for x >= 0, decreasing for x <= 0
pub fn abs(x: &Expr) -> Expr {
    Expr::Abs(Arc::new(x.clone()))
}

/// Positive part: max(x, 0) (element-wise).
///
/// Properties:
/// - Curvature: Convex
/// - Sign: Non-negative
/// - Monotonicity: Increasing
pub fn pos(x: &Expr) -> Expr {
    Expr::Pos(Arc::new(x.clone()))
}

/// Negative part: max(-x, 0) (element-wise).
///
/// Properties:
/// - Curvature: Convex
/// - Sign: Non-negative
/// - Monotonicity: Decreasing
pub fn neg_part(x: &Expr) -> Expr {
    Expr::NegPart(Arc::new(x.clone()))
}

// ============================================================================
// Maximum and minimum
// ============================================================================

/// Maximum of expressions (element-wise, scalars broadcast).
///
/// Properties:
/// - Curvature: Convex; quasiconvex when every argument is quasiconvex
/// - Sign: Non-negative if any argument is; non-positive if all are
/// - Monotonicity: Increasing in all arguments
pub fn maximum(mut exprs: Vec<Expr>) -> Expr {
    if exprs.len() == 1 {
        if let Some(only) = exprs.pop() {
            return only;
        }
    }
    Expr::Maximum(exprs.into_iter().map(Arc::new).collect())
}

/// Maximum of two expressions.
pub fn max2(a: &Expr, b: &Expr) -> Expr {
    maximum(vec![a.clone(), b.clone()])
}

/// Minimum of expressions (element-wise, scalars broadcast).
///
/// Properties:
/// - Curvature: Concave; quasiconcave when every argument is quasiconcave
/// - Monotonicity: Increasing in all arguments
pub fn minimum(mut exprs: Vec<Expr>) -> Expr {
    if exprs.len() == 1 {
        if let Some(only) = exprs.pop() {
            return only;
        }
    }
    Expr::Minimum(exprs.into_iter().map(Arc::new).collect())
}

/// Minimum of two expressions.
pub fn min2(a: &Expr, b: &Expr) -> Expr {
    minimum(vec![a.clone(), b.clone()])
}

/// Largest entry of an expression.
pub fn max_entries(x: &Expr) -> Expr {
    Expr::MaxEntries(Arc::new(x.clone()))
}

/// Smallest entry of an expression.
pub fn min_entries(x: &Expr) -> Expr {
    Expr::MinEntries(Arc::new(x.clone()))
}

// ============================================================================
// Norms and quadratic atoms
// ============================================================================

/// L2 norm: ||x||_2 = sqrt(sum(x_i^2)).
///
/// Properties:
/// - Curvature: Convex
/// - Sign: Non-negative
/// - Monotonicity: Increasing for x >= 0, decreasing for x <= 0
pub fn norm2(x: &Expr) -> Expr {
    Expr::Norm2(Arc::new(x.clone()))
}

/// Sum of squares: ||x||_2^2 = x' x.
///
/// Properties:
/// - Curvature: Convex
/// - Sign: Non-negative
/// - Monotonicity: Increasing for x >= 0, decreasing for x <= 0
pub fn sum_squares(x: &Expr) -> Expr {
    Expr::SumSquares(Arc::new(x.clone()))
}

// ============================================================================
// Exponential and power cone atoms
// ============================================================================

/// Exponential function (elementwise): exp(x). Convex and increasing.
pub fn exp(x: &Expr) -> Expr {
    Expr::Exp(Arc::new(x.clone()))
}

/// Natural logarithm (elementwise): log(x). Concave and increasing.
pub fn log(x: &Expr) -> Expr {
    Expr::Log(Arc::new(x.clone()))
}

/// Logistic function (elementwise): log(1 + exp(x)). Convex and increasing.
pub fn logistic(x: &Expr) -> Expr {
    Expr::Logistic(Arc::new(x.clone()))
}

/// Power function (elementwise): x^p
///
/// - 0 < p < 1: concave and increasing, x >= 0
/// - p > 1: convex, increasing for x >= 0
/// - p < 0: convex and decreasing, x > 0
/// - p = 1: the identity
pub fn power(x: &Expr, p: f64) -> Expr {
    Expr::Power(Arc::new(x.clone()), p)
}

/// Square root: sqrt(x) = x^0.5
pub fn sqrt(x: &Expr) -> Expr {
    power(x, 0.5)
}

/// Reciprocal of a positive expression: 1 / x = x^-1
pub fn inv_pos(x: &Expr) -> Expr {
    power(x, -1.0)
}
