//! Cone constraints in standard form and the tags attached to them.

use std::fmt;
use std::sync::Arc;

use super::param_affine::ParamAffine;
use crate::error::Result;
use crate::expr::{Expr, ValueSource};

/// A cone constraint in standard form: Ax + b in K.
#[derive(Debug, Clone)]
pub enum ConeConstraint {
    /// Zero cone: Ax + b = 0 (equality).
    Zero { a: ParamAffine },
    /// Nonnegative cone: Ax + b >= 0.
    NonNeg { a: ParamAffine },
    /// Second-order cone: ||x||_2 <= t, stacked as [t; x].
    SecondOrder { t: ParamAffine, x: ParamAffine },
    /// Exponential cone: y * exp(x / y) <= z with y > 0 (and its closure).
    ExpCone {
        x: ParamAffine,
        y: ParamAffine,
        z: ParamAffine,
    },
    /// Power cone: x^alpha * y^(1 - alpha) >= |z| with x, y >= 0 and alpha in (0, 1).
    PowerCone {
        x: ParamAffine,
        y: ParamAffine,
        z: ParamAffine,
        alpha: f64,
    },
}

impl ConeConstraint {
    /// Number of rows this cone occupies once stuffed.
    pub fn rows(&self) -> usize {
        match self {
            ConeConstraint::Zero { a } | ConeConstraint::NonNeg { a } => a.size(),
            ConeConstraint::SecondOrder { t, x } => t.size() + x.size(),
            ConeConstraint::ExpCone { .. } | ConeConstraint::PowerCone { .. } => 3,
        }
    }

    /// True if any coefficient is symbolic.
    pub fn is_parametric(&self) -> bool {
        self.parts().iter().any(|p| !p.is_fixed())
    }

    pub fn parts(&self) -> Vec<&ParamAffine> {
        match self {
            ConeConstraint::Zero { a } | ConeConstraint::NonNeg { a } => vec![a],
            ConeConstraint::SecondOrder { t, x } => vec![t, x],
            ConeConstraint::ExpCone { x, y, z } | ConeConstraint::PowerCone { x, y, z, .. } => {
                vec![x, y, z]
            }
        }
    }
}

/// Comparison used by a [`Guard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl GuardOp {
    fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            GuardOp::Lt => lhs < rhs,
            GuardOp::Le => lhs <= rhs,
            GuardOp::Gt => lhs > rhs,
            GuardOp::Ge => lhs >= rhs,
        }
    }
}

impl fmt::Display for GuardOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GuardOp::Lt => "<",
            GuardOp::Le => "<=",
            GuardOp::Gt => ">",
            GuardOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// Condition on a variable-free expression that decides whether a cone is emitted.
///
/// Sublevel sets of piecewise atoms (sign, length) are different programs for different
/// thresholds. Each piece is compiled once and switched on by its guard at bind time.
#[derive(Debug, Clone)]
pub struct Guard {
    pub value: Arc<Expr>,
    pub op: GuardOp,
    pub bound: f64,
}

impl Guard {
    pub fn new(value: Arc<Expr>, op: GuardOp, bound: f64) -> Self {
        Guard { value, op, bound }
    }

    /// Whether the guarded cone is part of the program for the values in `env`.
    pub fn active(&self, env: &dyn ValueSource) -> Result<bool> {
        let v = self.value.evaluate_scalar(env)?;
        Ok(self.op.holds(v, self.bound))
    }
}

/// Where a cone came from, used to route dual values back to user constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Objective,
    /// Index into the problem's constraint list.
    Constraint(usize),
    Auxiliary,
}

/// A cone together with its guards and origin.
#[derive(Debug, Clone)]
pub struct TaggedCone {
    pub cone: ConeConstraint,
    pub guards: Vec<Guard>,
    pub source: Source,
}

impl TaggedCone {
    /// True when every guard holds.
    pub fn is_active(&self, env: &dyn ValueSource) -> Result<bool> {
        for guard in &self.guards {
            if !guard.active(env)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{parameter, ParamBindings};

    #[test]
    fn test_guard_activity() {
        let s = parameter(());
        let guard = Guard::new(Arc::new(s.clone()), GuardOp::Lt, 1.0);
        let low = ParamBindings::new().with(&s, 0.5).unwrap();
        let high = ParamBindings::new().with(&s, 1.0).unwrap();
        assert!(guard.active(&low).unwrap());
        assert!(!guard.active(&high).unwrap());
    }

    #[test]
    fn test_tagged_cone_needs_all_guards() {
        let s = parameter(());
        let cone = TaggedCone {
            cone: ConeConstraint::NonNeg {
                a: ParamAffine::scalar(1.0),
            },
            guards: vec![
                Guard::new(Arc::new(s.clone()), GuardOp::Ge, -1.0),
                Guard::new(Arc::new(s.clone()), GuardOp::Lt, 1.0),
            ],
            source: Source::Constraint(0),
        };
        let inside = ParamBindings::new().with(&s, 0.0).unwrap();
        let outside = ParamBindings::new().with(&s, 2.0).unwrap();
        assert!(cone.is_active(&inside).unwrap());
        assert!(!cone.is_active(&outside).unwrap());
        assert_eq!(cone.cone.rows(), 1);
        assert!(!cone.cone.is_parametric());
    }

    #[test]
    fn test_guard_op_display() {
        assert_eq!(GuardOp::Le.to_string(), "<=");
    }
}
