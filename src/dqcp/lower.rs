//! Lowering of DQCP constraints into DCP constraints over a threshold.
//!
//! A quasiconvex `f <= s` is pushed down the expression: monotone invertible atoms move the
//! bound through their inverse, `max`-type atoms bound every argument, and anything else is
//! replaced by the atom's sublevel set (see [`sets`](super::sets)). `s <= f` for a
//! quasiconcave `f` is the mirror image. Every constraint this produces is DCP.

use std::sync::Arc;

use tracing::trace;

use super::inverse::InverseFn;
use crate::canon::canonicalizer::atom_name;
use crate::canon::{Guard, Source};
use crate::constraints::Constraint;
use crate::dcp::{Analyzer, Facts};
use crate::error::{CvxError, Result};
use crate::expr::{constant, Expr, VariableBuilder};

/// A DCP constraint produced by lowering, with its activation guards and origin.
#[derive(Debug, Clone)]
pub struct LoweredConstraint {
    pub constraint: Constraint,
    pub guards: Vec<Guard>,
    pub source: Source,
}

/// Collects the lowered constraints of one problem.
///
/// One analyzer is shared by every constraint and the objective, so each node of the
/// problem is classified once however deep the lowering recurses.
#[derive(Debug)]
pub struct Lowering<'a> {
    analyzer: Analyzer<'a>,
    out: Vec<LoweredConstraint>,
    source: Source,
    guards: Vec<Guard>,
}

impl Default for Lowering<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Lowering<'a> {
    pub fn new() -> Self {
        Lowering {
            analyzer: Analyzer::new(),
            out: Vec::new(),
            source: Source::Objective,
            guards: Vec::new(),
        }
    }

    /// Lower one problem constraint.
    pub fn lower_constraint(&mut self, constraint: &'a Constraint, source: Source) -> Result<()> {
        self.source = source;
        self.guards.clear();
        if constraint.is_dcp_with(&mut self.analyzer) {
            self.emit(constraint.clone());
            return Ok(());
        }
        match constraint {
            Constraint::LessEq { lhs, rhs } => {
                let (l, r) = (self.facts(lhs), self.facts(rhs));
                if l.quasiconvex && r.is_constant() {
                    self.upper(lhs, rhs.clone())
                } else if l.is_constant() && r.quasiconcave {
                    self.lower(rhs, lhs.clone())
                } else {
                    Err(CvxError::NotDqcp(format!(
                        "constraint {} is neither DCP nor a quasiconvex sublevel set",
                        source_label(source)
                    )))
                }
            }
            _ => Err(CvxError::NotDqcp(format!(
                "constraint {} must be DCP",
                source_label(source)
            ))),
        }
    }

    /// Lower the objective `f` of a minimization into `f <= t`.
    pub fn lower_objective(&mut self, objective: &'a Arc<Expr>, threshold: Arc<Expr>) -> Result<()> {
        self.source = Source::Objective;
        self.guards.clear();
        self.upper(objective, threshold)
    }

    pub fn finish(self) -> Vec<LoweredConstraint> {
        self.out
    }

    /// Facts for a node of the problem being lowered.
    pub fn facts(&mut self, expr: &'a Expr) -> Facts {
        self.analyzer.facts(expr)
    }

    /// Number of distinct problem nodes classified so far.
    pub fn analyzed(&self) -> usize {
        self.analyzer.len()
    }

    fn is_constant(&mut self, expr: &'a Expr) -> bool {
        self.facts(expr).is_constant()
    }

    fn is_nonneg(&mut self, expr: &'a Expr) -> bool {
        self.facts(expr).sign.is_nonneg()
    }

    fn is_nonpos(&mut self, expr: &'a Expr) -> bool {
        self.facts(expr).sign.is_nonpos()
    }

    pub(super) fn emit(&mut self, constraint: Constraint) {
        self.out.push(LoweredConstraint {
            constraint,
            guards: self.guards.clone(),
            source: self.source,
        });
    }

    /// Run `f` with `guards` added to every constraint it emits.
    pub(super) fn guarded<F>(&mut self, guards: Vec<Guard>, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let depth = self.guards.len();
        self.guards.extend(guards);
        let result = f(self);
        self.guards.truncate(depth);
        result
    }

    /// Emit `1 <= 0`, switched on by `guards`.
    pub(super) fn unsatisfiable(&mut self, guards: Vec<Guard>) {
        let row = Constraint::leq(constant(1.0), constant(0.0));
        let depth = self.guards.len();
        self.guards.extend(guards);
        self.emit(row);
        self.guards.truncate(depth);
    }

    /// Replace a non-affine argument by an auxiliary variable bounding it.
    pub(super) fn affine_arg(&mut self, arg: &'a Arc<Expr>) -> Result<Arc<Expr>> {
        let facts = self.facts(arg);
        if facts.is_affine() {
            return Ok(arg.clone());
        }
        let mut builder = VariableBuilder::new(arg.shape());
        if facts.sign.is_nonneg() {
            builder = builder.nonneg();
        } else if facts.sign.is_nonpos() {
            builder = builder.nonpos();
        }
        let aux = Arc::new(builder.build());
        if facts.is_convex() {
            self.emit(leq(arg.clone(), aux.clone()));
        } else if facts.is_concave() {
            self.emit(leq(aux.clone(), arg.clone()));
        } else {
            return Err(CvxError::NotDqcp(format!(
                "argument of {} must be convex or concave",
                atom_name(arg)
            )));
        }
        Ok(aux)
    }

    /// Lower `f <= s` for quasiconvex `f`.
    pub(super) fn upper(&mut self, f: &'a Arc<Expr>, s: Arc<Expr>) -> Result<()> {
        if self.facts(f).is_convex() {
            self.emit(leq(f.clone(), s));
            return Ok(());
        }
        trace!(atom = atom_name(f), "lowering sublevel constraint");
        match f.as_ref() {
            Expr::Neg(g) => self.lower(g, neg(s)),
            Expr::Add(a, b) if self.is_constant(a) => self.upper(b, sub(s, a.clone())),
            Expr::Add(a, b) if self.is_constant(b) => self.upper(a, sub(s, b.clone())),
            Expr::Mul(c, g) | Expr::Mul(g, c) if self.is_constant(c) => {
                let bound = Arc::new(Expr::Div(s, c.clone()));
                match self.known_sign(c)? {
                    Positivity::Nonneg => self.upper(g, bound),
                    Positivity::Nonpos => self.lower(g, bound),
                }
            }
            Expr::Div(g, c) if self.is_constant(c) => {
                let bound = Arc::new(Expr::Mul(s, c.clone()));
                match self.known_sign(c)? {
                    Positivity::Nonneg => self.upper(g, bound),
                    Positivity::Nonpos => self.lower(g, bound),
                }
            }
            Expr::Sum(g) if g.shape().is_scalar() => self.upper(g, s),
            Expr::Ceil(g) => self.upper(g, inverse(InverseFn::Floor, s)),
            Expr::Floor(g) => self.upper(g, inverse(InverseFn::FloorPlusOne, s)),
            Expr::Exp(g) => self.upper(g, inverse(InverseFn::Log, s)),
            Expr::Log(g) => self.upper(g, inverse(InverseFn::Exp, s)),
            Expr::Logistic(g) => self.upper(g, inverse(InverseFn::LogisticInv, s)),
            Expr::Power(g, p) => {
                let root = inverse(InverseFn::Root(*p), s);
                if *p < 0.0 {
                    self.lower(g, root)
                } else if *p < 1.0 || self.is_nonneg(g) {
                    self.upper(g, root)
                } else if self.is_nonpos(g) {
                    self.lower(g, neg(root))
                } else {
                    Err(not_invertible(f))
                }
            }
            Expr::Abs(g) | Expr::Norm2(g) if self.is_nonneg(g) => self.upper(g, s),
            Expr::Abs(g) | Expr::Norm2(g) if self.is_nonpos(g) => self.lower(g, neg(s)),
            Expr::Maximum(args) => {
                for arg in args {
                    self.upper(arg, s.clone())?;
                }
                Ok(())
            }
            Expr::MaxEntries(g) => self.upper(g, s),
            Expr::Sign(_) | Expr::Length(_) | Expr::DistRatio(..) | Expr::Mul(..) | Expr::Div(..) => {
                self.sublevel(f, s)
            }
            _ => Err(not_invertible(f)),
        }
    }

    /// Lower `s <= f` for quasiconcave `f`.
    pub(super) fn lower(&mut self, f: &'a Arc<Expr>, s: Arc<Expr>) -> Result<()> {
        if self.facts(f).is_concave() {
            self.emit(leq(s, f.clone()));
            return Ok(());
        }
        trace!(atom = atom_name(f), "lowering superlevel constraint");
        match f.as_ref() {
            Expr::Neg(g) => self.upper(g, neg(s)),
            Expr::Add(a, b) if self.is_constant(a) => self.lower(b, sub(s, a.clone())),
            Expr::Add(a, b) if self.is_constant(b) => self.lower(a, sub(s, b.clone())),
            Expr::Mul(c, g) | Expr::Mul(g, c) if self.is_constant(c) => {
                let bound = Arc::new(Expr::Div(s, c.clone()));
                match self.known_sign(c)? {
                    Positivity::Nonneg => self.lower(g, bound),
                    Positivity::Nonpos => self.upper(g, bound),
                }
            }
            Expr::Div(g, c) if self.is_constant(c) => {
                let bound = Arc::new(Expr::Mul(s, c.clone()));
                match self.known_sign(c)? {
                    Positivity::Nonneg => self.lower(g, bound),
                    Positivity::Nonpos => self.upper(g, bound),
                }
            }
            Expr::Sum(g) if g.shape().is_scalar() => self.lower(g, s),
            Expr::Ceil(g) => self.lower(g, inverse(InverseFn::CeilMinusOne, s)),
            Expr::Floor(g) => self.lower(g, inverse(InverseFn::Ceil, s)),
            Expr::Exp(g) => self.lower(g, inverse(InverseFn::Log, s)),
            Expr::Log(g) => self.lower(g, inverse(InverseFn::Exp, s)),
            Expr::Logistic(g) => self.lower(g, inverse(InverseFn::LogisticInv, s)),
            Expr::Power(g, p) => {
                let root = inverse(InverseFn::Root(*p), s);
                if *p < 0.0 {
                    self.upper(g, root)
                } else if *p < 1.0 || self.is_nonneg(g) {
                    self.lower(g, root)
                } else if self.is_nonpos(g) {
                    self.upper(g, neg(root))
                } else {
                    Err(not_invertible(f))
                }
            }
            Expr::Abs(g) | Expr::Norm2(g) if self.is_nonneg(g) => self.lower(g, s),
            Expr::Abs(g) | Expr::Norm2(g) if self.is_nonpos(g) => self.upper(g, neg(s)),
            Expr::Minimum(args) => {
                for arg in args {
                    self.lower(arg, s.clone())?;
                }
                Ok(())
            }
            Expr::MinEntries(g) => self.lower(g, s),
            Expr::Sign(_) | Expr::Mul(..) | Expr::Div(..) => self.superlevel(f, s),
            _ => Err(not_invertible(f)),
        }
    }
}

enum Positivity {
    Nonneg,
    Nonpos,
}

impl<'a> Lowering<'a> {
    fn known_sign(&mut self, c: &'a Expr) -> Result<Positivity> {
        if self.is_nonneg(c) {
            Ok(Positivity::Nonneg)
        } else if self.is_nonpos(c) {
            Ok(Positivity::Nonpos)
        } else {
            Err(CvxError::NotDqcp(
                "scaling a quasi atom needs a constant of known sign".into(),
            ))
        }
    }
}


fn not_invertible(f: &Expr) -> CvxError {
    CvxError::NotDqcp(format!("cannot lower a bound on {}", atom_name(f)))
}

fn source_label(source: Source) -> String {
    match source {
        Source::Constraint(i) => i.to_string(),
        Source::Objective => "objective".into(),
        Source::Auxiliary => "auxiliary".into(),
    }
}

pub(super) fn leq(lhs: Arc<Expr>, rhs: Arc<Expr>) -> Constraint {
    Constraint::LessEq { lhs, rhs }
}

pub(super) fn neg(e: Arc<Expr>) -> Arc<Expr> {
    Arc::new(Expr::Neg(e))
}

fn sub(a: Arc<Expr>, b: Arc<Expr>) -> Arc<Expr> {
    Arc::new(Expr::Add(a, neg(b)))
}

fn inverse(f: InverseFn, s: Arc<Expr>) -> Arc<Expr> {
    Arc::new(Expr::Inverse(f, s))
}
