//! Affine atoms and operator overloading.
//!
//! Affine atoms are both convex and concave. They include:
//! - Addition, subtraction, negation
//! - Multiplication and division where one side is constant
//! - Sum, index, dot and matrix products

use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use crate::expr::{constant, Expr, IndexSpec};

// ============================================================================
// Operator overloading for Expr
// ============================================================================

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Neg(Arc::new(self))
    }
}

impl Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Neg(Arc::new(self.clone()))
    }
}

fn sub_expr(a: Expr, b: Expr) -> Expr {
    Expr::Add(Arc::new(a), Arc::new(Expr::Neg(Arc::new(b))))
}

/// Implements a binary operator for every owned/borrowed pairing of `Expr` and `f64`.
macro_rules! impl_binop {
    ($trait:ident, $method:ident, $build:expr) => {
        impl $trait for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $build(self, rhs)
            }
        }

        impl $trait for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                $build(self.clone(), rhs.clone())
            }
        }

        impl $trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                $build(self, rhs.clone())
            }
        }

        impl $trait<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $build(self.clone(), rhs)
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                $build(self, constant(rhs))
            }
        }

        impl $trait<f64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                $build(self.clone(), constant(rhs))
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $build(constant(self), rhs)
            }
        }

        impl $trait<&Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                $build(constant(self), rhs.clone())
            }
        }
    };
}

impl_binop!(Add, add, |a, b| Expr::Add(Arc::new(a), Arc::new(b)));
impl_binop!(Sub, sub, sub_expr);
impl_binop!(Mul, mul, |a, b| Expr::Mul(Arc::new(a), Arc::new(b)));
impl_binop!(Div, div, |a, b| Expr::Div(Arc::new(a), Arc::new(b)));

// ============================================================================
// Affine atom functions
// ============================================================================

/// Sum of all elements.
pub fn sum(expr: &Expr) -> Expr {
    Expr::Sum(Arc::new(expr.clone()))
}

/// Matrix-vector or matrix-matrix multiplication.
///
/// The left operand must be constant (or parameter-free constant data) for the product to be
/// affine.
pub fn matmul(a: &Expr, b: &Expr) -> Expr {
    Expr::MatMul(Arc::new(a.clone()), Arc::new(b.clone()))
}

/// Dot product of two vectors, `sum(a * b)`.
pub fn dot(a: &Expr, b: &Expr) -> Expr {
    sum(&(a * b))
}

/// Index a single element of the column-major flattening.
pub fn index(expr: &Expr, idx: usize) -> Expr {
    Expr::Index(Arc::new(expr.clone()), IndexSpec::element(idx))
}

/// Slice `start..stop` from the column-major flattening.
pub fn slice(expr: &Expr, start: usize, stop: usize) -> Expr {
    Expr::Index(Arc::new(expr.clone()), IndexSpec::range(start, stop))
}
