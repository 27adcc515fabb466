//! Constraint types for optimization problems.
//!
//! Constraints keep both sides as written so the analyzer can tell `quasiconvex <= constant`
//! apart from `constant <= quasiconcave`:
//! - Equal: lhs == rhs (zero cone once canonicalized)
//! - LessEq: lhs <= rhs (nonnegative orthant, or a sublevel/superlevel set for quasi atoms)
//! - SecondOrder: ||x||_2 <= t (second-order cone)

use std::sync::Arc;

use crate::dcp::Analyzer;
use crate::error::Result;
use crate::expr::{Expr, ExprId, ValueSource};

/// A constraint in an optimization problem.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Equality constraint: lhs == rhs.
    Equal { lhs: Arc<Expr>, rhs: Arc<Expr> },

    /// Inequality constraint: lhs <= rhs.
    LessEq { lhs: Arc<Expr>, rhs: Arc<Expr> },

    /// Second-order cone constraint: ||x||_2 <= t.
    /// The t argument must be scalar, x can be a vector.
    SecondOrder {
        /// The scalar upper bound.
        t: Arc<Expr>,
        /// The vector argument.
        x: Arc<Expr>,
    },
}

impl Constraint {
    /// Create an equality constraint: lhs == rhs.
    pub fn eq(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Constraint::Equal {
            lhs: Arc::new(lhs.into()),
            rhs: Arc::new(rhs.into()),
        }
    }

    /// Create an inequality constraint: lhs <= rhs.
    pub fn leq(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Constraint::LessEq {
            lhs: Arc::new(lhs.into()),
            rhs: Arc::new(rhs.into()),
        }
    }

    /// Create an inequality constraint: lhs >= rhs.
    pub fn geq(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Constraint::leq(rhs, lhs)
    }

    /// Create a SOC constraint: ||x||_2 <= t.
    pub fn soc(t: impl Into<Expr>, x: impl Into<Expr>) -> Self {
        Constraint::SecondOrder {
            t: Arc::new(t.into()),
            x: Arc::new(x.into()),
        }
    }

    /// Check if this constraint is DCP-compliant.
    ///
    /// - Equal: both sides affine
    /// - LessEq: convex <= concave
    /// - SecondOrder: both t and x affine
    pub fn is_dcp(&self) -> bool {
        self.is_dcp_with(&mut Analyzer::new())
    }

    /// [`is_dcp`](Self::is_dcp) with facts memoized in a caller's analyzer.
    pub fn is_dcp_with<'a>(&'a self, analyzer: &mut Analyzer<'a>) -> bool {
        match self {
            Constraint::Equal { lhs, rhs } => {
                analyzer.facts(lhs).is_affine() && analyzer.facts(rhs).is_affine()
            }
            Constraint::LessEq { lhs, rhs } => {
                analyzer.facts(lhs).is_convex() && analyzer.facts(rhs).is_concave()
            }
            Constraint::SecondOrder { t, x } => {
                analyzer.facts(t).is_affine() && analyzer.facts(x).is_affine()
            }
        }
    }

    /// Check if this constraint is DQCP-compliant.
    ///
    /// In addition to every DCP constraint, accepts `quasiconvex <= constant` and
    /// `constant <= quasiconcave`.
    pub fn is_dqcp(&self) -> bool {
        if self.is_dcp() {
            return true;
        }
        match self {
            Constraint::LessEq { lhs, rhs } => {
                let mut analyzer = Analyzer::new();
                let (l, r) = (analyzer.facts(lhs), analyzer.facts(rhs));
                (l.quasiconvex && r.is_constant()) || (l.is_constant() && r.quasiconcave)
            }
            _ => false,
        }
    }

    /// Get all expressions in this constraint.
    pub fn expressions(&self) -> Vec<&Arc<Expr>> {
        match self {
            Constraint::Equal { lhs, rhs } | Constraint::LessEq { lhs, rhs } => vec![lhs, rhs],
            Constraint::SecondOrder { t, x } => vec![t, x],
        }
    }

    /// Get all variable IDs in this constraint.
    pub fn variables(&self) -> Vec<ExprId> {
        let mut vars = Vec::new();
        for expr in self.expressions() {
            vars.extend(expr.variables());
        }
        vars.sort();
        vars.dedup();
        vars
    }

    /// Largest violation of the constraint at the point given by `env` (0 when satisfied).
    pub fn violation(&self, env: &dyn ValueSource) -> Result<f64> {
        let gap = |a: &Arc<Expr>, b: &Arc<Expr>| -> Result<Vec<f64>> {
            let (va, vb) = (a.evaluate(env)?, b.evaluate(env)?);
            let diff = if va.len() == 1 {
                vb.map(|v| va[(0, 0)] - v)
            } else if vb.len() == 1 {
                va.map(|v| v - vb[(0, 0)])
            } else {
                &va - &vb
            };
            Ok(diff.as_slice().to_vec())
        };
        let worst = |values: Vec<f64>, f: fn(f64) -> f64| {
            values.into_iter().map(f).fold(0.0_f64, f64::max)
        };
        match self {
            Constraint::Equal { lhs, rhs } => Ok(worst(gap(lhs, rhs)?, f64::abs)),
            Constraint::LessEq { lhs, rhs } => Ok(worst(gap(lhs, rhs)?, |v| v.max(0.0))),
            Constraint::SecondOrder { t, x } => {
                let norm = x.evaluate(env)?.norm();
                Ok((norm - t.evaluate_scalar(env)?).max(0.0))
            }
        }
    }
}

/// Extension trait for creating constraints from expressions.
pub trait ConstraintExt {
    /// Create equality constraint: self == rhs.
    fn equals(&self, rhs: impl Into<Expr>) -> Constraint;

    /// Create inequality constraint: self <= rhs.
    fn leq(&self, rhs: impl Into<Expr>) -> Constraint;

    /// Create inequality constraint: self >= rhs.
    fn geq(&self, rhs: impl Into<Expr>) -> Constraint;
}

impl ConstraintExt for Expr {
    fn equals(&self, rhs: impl Into<Expr>) -> Constraint {
        Constraint::eq(self.clone(), rhs)
    }

    fn leq(&self, rhs: impl Into<Expr>) -> Constraint {
        Constraint::leq(self.clone(), rhs)
    }

    fn geq(&self, rhs: impl Into<Expr>) -> Constraint {
        Constraint::geq(self.clone(), rhs)
    }
}

#[doc(hidden)]
pub fn side<T: Clone + Into<Expr>>(value: &T) -> Expr {
    value.clone().into()
}

/// Build a constraint with comparison syntax.
///
/// Each side must be a single token tree, so compound sides need parentheses:
/// `constraint!((x + 1.0) <= 2.0)`.
#[macro_export]
macro_rules! constraint {
    ($lhs:tt == $rhs:tt) => {
        $crate::constraints::Constraint::eq(
            $crate::constraints::constraint::side(&$lhs),
            $crate::constraints::constraint::side(&$rhs),
        )
    };
    ($lhs:tt <= $rhs:tt) => {
        $crate::constraints::Constraint::leq(
            $crate::constraints::constraint::side(&$lhs),
            $crate::constraints::constraint::side(&$rhs),
        )
    };
    ($lhs:tt >= $rhs:tt) => {
        $crate::constraints::Constraint::geq(
            $crate::constraints::constraint::side(&$lhs),
            $crate::constraints::constraint::side(&$rhs),
        )
    };
}
