//! Bound tightening for the bisection interval.

use crate::expr::Expr;

/// What is known about the range of the objective, used to snap bisection bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tightening {
    pub integer: bool,
    pub nonneg: bool,
    pub nonpos: bool,
}

impl Tightening {
    pub fn for_objective(expr: &Expr) -> Self {
        Tightening {
            integer: is_integer_valued(expr),
            nonneg: expr.is_nonneg(),
            nonpos: expr.is_nonpos(),
        }
    }

    /// Snap a lower bound up to the nearest attainable value.
    pub fn lower(&self, v: f64) -> f64 {
        let v = if self.integer { v.ceil() } else { v };
        if self.nonneg {
            v.max(0.0)
        } else {
            v
        }
    }

    /// Snap an upper bound down to the nearest attainable value.
    pub fn upper(&self, v: f64) -> f64 {
        let v = if self.integer { v.floor() } else { v };
        if self.nonpos {
            v.min(0.0)
        } else {
            v
        }
    }
}

fn is_integer_valued(expr: &Expr) -> bool {
    match expr {
        Expr::Ceil(_) | Expr::Floor(_) | Expr::Sign(_) | Expr::Length(_) => true,
        Expr::Constant(c) => c.value.as_slice().iter().all(|v| v.fract() == 0.0),
        Expr::Neg(a) | Expr::MaxEntries(a) | Expr::MinEntries(a) => is_integer_valued(a),
        Expr::Sum(a) => a.shape().is_scalar() && is_integer_valued(a),
        Expr::Add(a, b) => is_integer_valued(a) && is_integer_valued(b),
        Expr::Maximum(args) | Expr::Minimum(args) => args.iter().all(|a| is_integer_valued(a)),
        _ => false,
    }
}
