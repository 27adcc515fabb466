//! Sublevel and superlevel sets of quasiconvex atoms that have no inverse.
//!
//! For a fixed threshold each set is convex. Sets that change shape with the threshold
//! (sign, length) are emitted piecewise, every piece behind guards on the threshold.

use std::sync::Arc;

use super::inverse::STRICT_DELTA;
use super::lower::{leq, neg, Lowering};
use crate::canon::canonicalizer::atom_name;
use crate::canon::{Guard, GuardOp};
use crate::constraints::Constraint;
use crate::error::{CvxError, Result};
use crate::expr::{constant, Expr, IndexSpec};

impl<'a> Lowering<'a> {
    /// Emit `{x : f(x) <= s}`.
    pub(super) fn sublevel(&mut self, f: &'a Arc<Expr>, s: Arc<Expr>) -> Result<()> {
        match f.as_ref() {
            Expr::Sign(g) => {
                // sign(0) = 0, so only thresholds below zero exclude the origin.
                let negative = vec![
                    Guard::new(s.clone(), GuardOp::Ge, -1.0),
                    Guard::new(s.clone(), GuardOp::Lt, 0.0),
                ];
                self.guarded(negative, |l| l.upper(g, constant_arc(-STRICT_DELTA)))?;
                let nonpositive = vec![
                    Guard::new(s.clone(), GuardOp::Ge, 0.0),
                    Guard::new(s.clone(), GuardOp::Lt, 1.0),
                ];
                self.guarded(nonpositive, |l| l.upper(g, constant_arc(0.0)))?;
                self.unsatisfiable(vec![Guard::new(s, GuardOp::Lt, -1.0)]);
                Ok(())
            }
            Expr::Length(x) => {
                let x = self.affine_arg(x)?;
                for i in 0..x.shape().size() {
                    let entry = Arc::new(Expr::Index(x.clone(), IndexSpec::element(i)));
                    let zero = Constraint::Equal {
                        lhs: entry,
                        rhs: constant_arc(0.0),
                    };
                    self.guarded(
                        vec![Guard::new(s.clone(), GuardOp::Lt, (i + 1) as f64)],
                        |l| {
                            l.emit(zero);
                            Ok(())
                        },
                    )?;
                }
                self.unsatisfiable(vec![Guard::new(s, GuardOp::Lt, 0.0)]);
                Ok(())
            }
            Expr::DistRatio(x, a, b) => {
                self.dist_ratio_sublevel(x, a, b, s.clone())?;
                self.unsatisfiable(vec![Guard::new(s, GuardOp::Lt, 0.0)]);
                Ok(())
            }
            Expr::Mul(x, y) => {
                let (sx, sy) = (self.facts(x).sign, self.facts(y).sign);
                let (x, y) = (self.affine_arg(x)?, self.affine_arg(y)?);
                // x * y <= s with x >= 0 >= y  <=>  y <= min(s, 0) / x
                let (p, q) = if sx.is_nonneg() && sy.is_nonpos() {
                    (x, y)
                } else if sx.is_nonpos() && sy.is_nonneg() {
                    (y, x)
                } else {
                    return Err(sign_error(f));
                };
                let bound = mul(neg(Arc::new(Expr::NegPart(s))), inv_pos(p));
                self.checked(leq(q, bound))
            }
            Expr::Div(x, y) => {
                let sy = self.facts(y).sign;
                let (x, y) = (self.affine_arg(x)?, self.affine_arg(y)?);
                let scaled = mul(s, y.clone());
                if sy.is_nonneg() {
                    self.checked(leq(x, scaled))
                } else if sy.is_nonpos() {
                    self.checked(leq(scaled, x))
                } else {
                    Err(sign_error(f))
                }
            }
            _ => Err(CvxError::NotDqcp(format!(
                "no sublevel set for {}",
                atom_name(f)
            ))),
        }
    }

    /// Emit `{x : f(x) >= s}`.
    pub(super) fn superlevel(&mut self, f: &'a Arc<Expr>, s: Arc<Expr>) -> Result<()> {
        match f.as_ref() {
            Expr::Sign(g) => {
                let nonnegative = vec![
                    Guard::new(s.clone(), GuardOp::Gt, -1.0),
                    Guard::new(s.clone(), GuardOp::Le, 0.0),
                ];
                self.guarded(nonnegative, |l| l.lower(g, constant_arc(0.0)))?;
                let positive = vec![
                    Guard::new(s.clone(), GuardOp::Gt, 0.0),
                    Guard::new(s.clone(), GuardOp::Le, 1.0),
                ];
                self.guarded(positive, |l| l.lower(g, constant_arc(STRICT_DELTA)))?;
                self.unsatisfiable(vec![Guard::new(s, GuardOp::Gt, 1.0)]);
                Ok(())
            }
            Expr::Mul(x, y) => {
                let (sx, sy) = (self.facts(x).sign, self.facts(y).sign);
                let (x, y) = (self.affine_arg(x)?, self.affine_arg(y)?);
                // x * y >= s with x, y of one sign  <=>  max(s, 0) / |y| <= |x|
                let (x, y) = if sx.is_nonneg() && sy.is_nonneg() {
                    (x, y)
                } else if sx.is_nonpos() && sy.is_nonpos() {
                    (neg(x), neg(y))
                } else {
                    return Err(sign_error(f));
                };
                let bound = mul(Arc::new(Expr::Pos(s)), inv_pos(y));
                self.checked(leq(bound, x))
            }
            Expr::Div(x, y) => {
                let sy = self.facts(y).sign;
                let (x, y) = (self.affine_arg(x)?, self.affine_arg(y)?);
                let scaled = mul(s, y.clone());
                if sy.is_nonneg() {
                    self.checked(leq(scaled, x))
                } else if sy.is_nonpos() {
                    self.checked(leq(x, scaled))
                } else {
                    Err(sign_error(f))
                }
            }
            _ => Err(CvxError::NotDqcp(format!(
                "no superlevel set for {}",
                atom_name(f)
            ))),
        }
    }

    /// `||x - a|| <= s ||x - b||`, squared and expanded. Convex for `s <= 1`, so the threshold
    /// is clipped to `[0, 1]`.
    fn dist_ratio_sublevel(
        &mut self,
        x: &'a Arc<Expr>,
        a: &Arc<Expr>,
        b: &Arc<Expr>,
        s: Arc<Expr>,
    ) -> Result<()> {
        let squared_norm = |e: &Arc<Expr>| -> Result<f64> {
            e.constant_value()
                .map(|v| v.as_slice().iter().map(|c| c * c).sum())
                .ok_or_else(|| CvxError::InvalidProblem("dist_ratio points must be constant".into()))
        };
        let (na, nb) = (squared_norm(a)?, squared_norm(b)?);

        let clipped = Arc::new(Expr::Minimum(vec![
            Arc::new(Expr::Pos(s)),
            constant_arc(1.0),
        ]));
        let s2 = mul(clipped.clone(), clipped);
        let quad = mul(
            Arc::new(Expr::Pos(add(constant_arc(1.0), neg(s2.clone())))),
            Arc::new(Expr::SumSquares(x.clone())),
        );
        let cross = add(
            mul(constant_arc(-2.0), dot(a, x)),
            mul(mul(constant_arc(2.0), s2.clone()), dot(b, x)),
        );
        let offset = add(constant_arc(na), neg(mul(s2, constant_arc(nb))));
        let lhs = add(add(quad, cross), offset);
        self.checked(leq(lhs, constant_arc(0.0)))
    }

    fn checked(&mut self, constraint: Constraint) -> Result<()> {
        if !constraint.is_dcp() {
            return Err(CvxError::NotDqcp(
                "level set of a quasi atom is not DCP for these arguments".into(),
            ));
        }
        self.emit(constraint);
        Ok(())
    }
}

fn sign_error(f: &Expr) -> CvxError {
    CvxError::NotDqcp(format!(
        "level sets of {} need arguments of known sign",
        atom_name(f)
    ))
}

fn constant_arc(value: f64) -> Arc<Expr> {
    Arc::new(constant(value))
}

fn add(a: Arc<Expr>, b: Arc<Expr>) -> Arc<Expr> {
    Arc::new(Expr::Add(a, b))
}

fn mul(a: Arc<Expr>, b: Arc<Expr>) -> Arc<Expr> {
    Arc::new(Expr::Mul(a, b))
}

fn inv_pos(e: Arc<Expr>) -> Arc<Expr> {
    Arc::new(Expr::Power(e, -1.0))
}

fn dot(a: &Arc<Expr>, x: &Arc<Expr>) -> Arc<Expr> {
    Arc::new(Expr::Sum(mul(a.clone(), x.clone())))
}
