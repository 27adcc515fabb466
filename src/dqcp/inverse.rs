//! Inverses of monotone scalar atoms, applied to bisection thresholds.
//!
//! Pushing `f(g) <= s` through an increasing `f` gives `g <= f^-1(s)`. The inverse is kept
//! symbolic as an [`Expr::Inverse`](crate::expr::Expr::Inverse) node so the compiled problem
//! does not depend on the threshold value. Values outside the range of `f` map to `+inf` or
//! `-inf`, which the binder turns into a vacuous or an infeasible row.

use std::fmt;

/// Offset used to express strict inequalities from rounding atoms.
pub const STRICT_DELTA: f64 = 1e-6;

/// A scalar inverse function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InverseFn {
    /// `ceil(x) <= s` becomes `x <= floor(s)`.
    Floor,
    /// `ceil(x) >= s` becomes `x >= ceil(s) - 1 + delta`.
    CeilMinusOne,
    /// `floor(x) <= s` becomes `x <= floor(s) + 1 - delta`.
    FloorPlusOne,
    /// `floor(x) >= s` becomes `x >= ceil(s)`.
    Ceil,
    /// Inverse of `exp`.
    Log,
    /// Inverse of `log`.
    Exp,
    /// Inverse of `log(1 + exp(x))`.
    LogisticInv,
    /// Inverse of `x^p` on its monotone branch.
    Root(f64),
}

impl InverseFn {
    pub fn apply(self, v: f64) -> f64 {
        match self {
            InverseFn::Floor => v.floor(),
            InverseFn::CeilMinusOne => v.ceil() - 1.0 + STRICT_DELTA,
            InverseFn::FloorPlusOne => v.floor() + 1.0 - STRICT_DELTA,
            InverseFn::Ceil => v.ceil(),
            InverseFn::Log => {
                if v <= 0.0 {
                    f64::NEG_INFINITY
                } else {
                    v.ln()
                }
            }
            InverseFn::Exp => v.exp(),
            InverseFn::LogisticInv => {
                if v <= 0.0 {
                    f64::NEG_INFINITY
                } else {
                    v.exp_m1().ln()
                }
            }
            InverseFn::Root(p) => {
                if v < 0.0 {
                    // Below the range of x^p: the set x^p <= v is empty for p > 0 and
                    // the set x^p >= v is everything.
                    if p < 0.0 {
                        f64::INFINITY
                    } else {
                        f64::NEG_INFINITY
                    }
                } else {
                    v.powf(1.0 / p)
                }
            }
        }
    }
}

impl fmt::Display for InverseFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InverseFn::Floor => f.write_str("floor"),
            InverseFn::CeilMinusOne => f.write_str("ceil_minus_one"),
            InverseFn::FloorPlusOne => f.write_str("floor_plus_one"),
            InverseFn::Ceil => f.write_str("ceil"),
            InverseFn::Log => f.write_str("log"),
            InverseFn::Exp => f.write_str("exp"),
            InverseFn::LogisticInv => f.write_str("logistic_inv"),
            InverseFn::Root(p) => write!(f, "root({})", p),
        }
    }
}
