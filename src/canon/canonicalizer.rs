//! Expression canonicalization.
//!
//! Canonicalization transforms DCP expressions into standard form:
//! - Affine expressions become `ParamAffine` (a `LinExpr` plus symbolic parameter terms)
//! - Quadratic objectives without parameters become `QuadExpr` (native QP)
//! - Nonlinear atoms are reformulated as affine + cone constraints
//!
//! Every cone is tagged with the guards and source that are current in the context when it
//! is emitted, so the lowering of a sublevel set can switch whole pieces on and off.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use super::cone::{ConeConstraint, Guard, Source, TaggedCone};
use super::lin_expr::{LinExpr, QuadExpr};
use super::param_affine::ParamAffine;
use crate::constraints::Constraint;
use crate::error::{CvxError, Result};
use crate::expr::{Expr, ExprId, IndexSpec, ParamBindings, Shape, VariableData};
use crate::sparse::{dense_to_csc, kron_identity_left, kron_identity_right};

/// The type of canonicalized expression.
#[derive(Debug, Clone)]
pub enum CanonExpr {
    /// Affine expression, possibly with parameter-dependent coefficients.
    Linear(ParamAffine),
    /// Quadratic expression (parameter-free objectives only).
    Quadratic(QuadExpr),
}

/// Collects the cones and auxiliary variables produced while canonicalizing one problem.
#[derive(Debug)]
pub struct CanonContext {
    pub cones: Vec<TaggedCone>,
    pub aux_vars: Vec<VariableData>,
    guards: Vec<Guard>,
    source: Source,
    memo: HashMap<*const Expr, ParamAffine>,
}

impl Default for CanonContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CanonContext {
    pub fn new() -> Self {
        CanonContext {
            cones: Vec::new(),
            aux_vars: Vec::new(),
            guards: Vec::new(),
            source: Source::Objective,
            memo: HashMap::new(),
        }
    }

    /// Tag every cone emitted from now on with `source` and `guards`.
    pub fn set_scope(&mut self, source: Source, guards: Vec<Guard>) {
        self.source = source;
        self.guards = guards;
        self.memo.clear();
    }

    fn push(&mut self, cone: ConeConstraint) {
        self.cones.push(TaggedCone {
            cone,
            guards: self.guards.clone(),
            source: self.source,
        });
    }

    fn new_aux_var(&mut self, shape: Shape, nonneg: bool) -> LinExpr {
        let id = ExprId::new();
        self.aux_vars.push(VariableData {
            id,
            shape: shape.clone(),
            name: None,
            nonneg,
            nonpos: false,
        });
        LinExpr::variable(id, shape)
    }

    /// Add a DCP constraint.
    pub fn add_constraint(&mut self, constraint: &Constraint) -> Result<()> {
        match constraint {
            Constraint::Equal { lhs, rhs } => {
                let a = self.canonicalize(lhs)?.sub(&self.canonicalize(rhs)?);
                self.push(ConeConstraint::Zero { a });
            }
            Constraint::LessEq { lhs, rhs } => {
                let l = self.canonicalize(lhs)?;
                let a = self.canonicalize(rhs)?.sub(&l);
                self.push(ConeConstraint::NonNeg { a });
            }
            Constraint::SecondOrder { t, x } => {
                let t = self.canonicalize(t)?;
                let x = self.canonicalize(x)?;
                self.push(ConeConstraint::SecondOrder { t, x });
            }
        }
        Ok(())
    }

    /// Canonicalize an objective. Quadratic terms are kept when `allow_quadratic` is set.
    pub fn canonicalize_objective(&mut self, expr: &Expr, allow_quadratic: bool) -> Result<CanonExpr> {
        if allow_quadratic {
            if let Some(q) = self.quadratic(expr)? {
                return Ok(CanonExpr::Quadratic(q));
            }
        }
        Ok(CanonExpr::Linear(self.canonicalize(expr)?))
    }

    /// Native QP form of `expr`, when it is a nonnegative combination of sums of squares.
    fn quadratic(&mut self, expr: &Expr) -> Result<Option<QuadExpr>> {
        let squared = match expr {
            Expr::SumSquares(x) => Some(x),
            Expr::Power(x, p) if *p == 2.0 && x.shape().is_scalar() => Some(x),
            Expr::Sum(inner) => match inner.as_ref() {
                Expr::Power(x, p) if *p == 2.0 => Some(x),
                _ => None,
            },
            _ => None,
        };
        if let Some(x) = squared {
            let cx = self.canonicalize(x)?;
            if cx.is_fixed() {
                return Ok(Some(QuadExpr::sum_squares(&cx.base)));
            }
            return Ok(None);
        }

        match expr {
            Expr::Add(a, b) => {
                let qa = self.quadratic(a)?;
                let qb = self.quadratic(b)?;
                if qa.is_none() && qb.is_none() {
                    return Ok(None);
                }
                let qa = match qa {
                    Some(q) => q,
                    None => self.linear_as_quadratic(a)?,
                };
                let qb = match qb {
                    Some(q) => q,
                    None => self.linear_as_quadratic(b)?,
                };
                Ok(Some(qa.add(&qb)))
            }
            Expr::Mul(c, x) | Expr::Mul(x, c) if c.is_variable_free() && !c.has_parameters() => {
                let value = c.evaluate(&ParamBindings::new())?;
                match value.len() {
                    1 if value[(0, 0)] >= 0.0 => {
                        Ok(self.quadratic(x)?.map(|q| q.scale(value[(0, 0)])))
                    }
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    fn linear_as_quadratic(&mut self, expr: &Expr) -> Result<QuadExpr> {
        let lin = self.canonicalize(expr)?;
        if !lin.is_fixed() {
            return Err(CvxError::InvalidProblem(
                "parametric term in a quadratic objective".into(),
            ));
        }
        Ok(QuadExpr::from_linear(lin.base))
    }

    /// Canonicalize an expression to affine form, emitting cones for nonlinear atoms.
    pub fn canonicalize(&mut self, expr: &Expr) -> Result<ParamAffine> {
        let key = expr as *const Expr;
        if let Some(done) = self.memo.get(&key) {
            return Ok(done.clone());
        }
        let result = self.canonicalize_node(expr)?;
        self.memo.insert(key, result.clone());
        Ok(result)
    }

    fn canonicalize_node(&mut self, expr: &Expr) -> Result<ParamAffine> {
        if expr.is_variable_free() {
            return self.canonicalize_variable_free(expr);
        }
        match expr {
            Expr::Variable(v) => Ok(LinExpr::variable(v.id, v.shape.clone()).into()),
            Expr::Add(a, b) => Ok(self.canonicalize(a)?.add(&self.canonicalize(b)?)),
            Expr::Neg(a) => Ok(self.canonicalize(a)?.neg()),
            Expr::Mul(a, b) => self.canonicalize_mul(a, b, &expr.shape()),
            Expr::Div(a, b) => self.canonicalize_div(a, b, &expr.shape()),
            Expr::Sum(a) => Ok(self.canonicalize(a)?.sum()),
            Expr::Index(a, spec) => {
                let shape = match spec {
                    IndexSpec::Element(_) => Shape::scalar(),
                    IndexSpec::Range { .. } => Shape::vector(spec.positions().len()),
                };
                Ok(self.canonicalize(a)?.select(spec.positions(), shape))
            }
            Expr::MatMul(a, b) => self.canonicalize_matmul(a, b, expr.shape()),

            Expr::Abs(x) => self.canonicalize_abs(x),
            Expr::Pos(x) => {
                let cx = self.canonicalize(x)?;
                Ok(self.positive_part(cx))
            }
            Expr::NegPart(x) => {
                let cx = self.canonicalize(x)?;
                Ok(self.positive_part(cx.neg()))
            }
            Expr::Maximum(args) => self.canonicalize_extremum(args, expr.shape(), true),
            Expr::Minimum(args) => self.canonicalize_extremum(args, expr.shape(), false),
            Expr::MaxEntries(x) => self.canonicalize_entries(x, true),
            Expr::MinEntries(x) => self.canonicalize_entries(x, false),
            Expr::Norm2(x) => {
                let cx = self.canonicalize(x)?;
                let t: ParamAffine = self.new_aux_var(Shape::scalar(), true).into();
                self.push(ConeConstraint::SecondOrder { t: t.clone(), x: cx });
                Ok(t)
            }
            Expr::SumSquares(x) => {
                let cx = self.canonicalize(x)?;
                Ok(self.squared_norm(&cx))
            }
            Expr::Exp(x) => self.canonicalize_exp(x),
            Expr::Log(x) => self.canonicalize_log(x),
            Expr::Logistic(x) => self.canonicalize_logistic(x),
            Expr::Power(x, p) => self.canonicalize_power(x, *p),

            Expr::Ceil(_)
            | Expr::Floor(_)
            | Expr::Sign(_)
            | Expr::Length(_)
            | Expr::DistRatio(..)
            | Expr::Inverse(..) => Err(CvxError::NotDcp(format!(
                "{} has no conic form; solve the problem with bisection",
                atom_name(expr)
            ))),

            Expr::Constant(_) | Expr::Parameter(_) => self.canonicalize_variable_free(expr),
        }
    }

    /// Constant subtrees fold to numbers; parametric subtrees stay symbolic.
    fn canonicalize_variable_free(&mut self, expr: &Expr) -> Result<ParamAffine> {
        let shape = expr.shape();
        if expr.has_parameters() {
            return Ok(ParamAffine::parametric(Arc::new(expr.clone()), shape));
        }
        let value = expr.evaluate(&ParamBindings::new())?;
        Ok(LinExpr::constant(&value, shape).into())
    }

    fn canonicalize_mul(&mut self, a: &Arc<Expr>, b: &Arc<Expr>, shape: &Shape) -> Result<ParamAffine> {
        let (coeff, x) = if a.is_variable_free() {
            (a, b)
        } else if b.is_variable_free() {
            (b, a)
        } else {
            return Err(CvxError::NotDcp(
                "product of two non-constant expressions".into(),
            ));
        };
        let cx = self.canonicalize(x)?;
        if coeff.has_parameters() {
            return Ok(cx.scale_by_entries(coeff, shape));
        }
        let value = coeff.evaluate(&ParamBindings::new())?;
        let d = DVector::from_column_slice(value.as_slice());
        Ok(cx.scale_elementwise(&d, shape))
    }

    fn canonicalize_div(&mut self, a: &Arc<Expr>, b: &Arc<Expr>, shape: &Shape) -> Result<ParamAffine> {
        if !b.is_variable_free() {
            return Err(CvxError::NotDcp(
                "division by a non-constant expression".into(),
            ));
        }
        let ca = self.canonicalize(a)?;
        if b.has_parameters() {
            return Ok(ca.divide_by_entries(b, shape));
        }
        let value = b.evaluate(&ParamBindings::new())?;
        let d = DVector::from_iterator(value.len(), value.iter().map(|v| 1.0 / v));
        Ok(ca.scale_elementwise(&d, shape))
    }

    fn canonicalize_matmul(&mut self, a: &Arc<Expr>, b: &Arc<Expr>, shape: Shape) -> Result<ParamAffine> {
        let both_vectors = a.shape().is_vector() && b.shape().is_vector();
        if a.is_variable_free() {
            let lhs = fixed_matrix(a)?;
            let cb = self.canonicalize(b)?;
            let map = if both_vectors {
                dense_to_csc(&lhs.transpose())
            } else {
                kron_identity_left(b.shape().cols(), &lhs)
            };
            return Ok(cb.apply(&map, shape));
        }
        if b.is_variable_free() {
            let rhs = fixed_matrix(b)?;
            let ca = self.canonicalize(a)?;
            let map = if both_vectors {
                dense_to_csc(&rhs.transpose())
            } else {
                kron_identity_right(&rhs.transpose(), a.shape().rows())
            };
            return Ok(ca.apply(&map, shape));
        }
        Err(CvxError::NotDcp(
            "matrix product of two non-constant expressions".into(),
        ))
    }

    // ========================================================================
    // Nonlinear atom canonicalizers
    // ========================================================================

    fn canonicalize_abs(&mut self, x: &Expr) -> Result<ParamAffine> {
        // |x| <= t  <=>  t - x >= 0, t + x >= 0
        let cx = self.canonicalize(x)?;
        let t: ParamAffine = self.new_aux_var(cx.shape().clone(), true).into();
        self.push(ConeConstraint::NonNeg { a: t.sub(&cx) });
        self.push(ConeConstraint::NonNeg { a: t.add(&cx) });
        Ok(t)
    }

    fn positive_part(&mut self, cx: ParamAffine) -> ParamAffine {
        let t: ParamAffine = self.new_aux_var(cx.shape().clone(), true).into();
        self.push(ConeConstraint::NonNeg { a: t.sub(&cx) });
        t
    }

    fn canonicalize_extremum(&mut self, args: &[Arc<Expr>], shape: Shape, upper: bool) -> Result<ParamAffine> {
        let t: ParamAffine = self.new_aux_var(shape, false).into();
        for arg in args {
            let ca = self.canonicalize(arg)?;
            let a = if upper { t.sub(&ca) } else { ca.sub(&t) };
            self.push(ConeConstraint::NonNeg { a });
        }
        Ok(t)
    }

    fn canonicalize_entries(&mut self, x: &Expr, upper: bool) -> Result<ParamAffine> {
        let cx = self.canonicalize(x)?;
        let t: ParamAffine = self.new_aux_var(Shape::scalar(), false).into();
        let a = if upper { t.sub(&cx) } else { cx.sub(&t) };
        self.push(ConeConstraint::NonNeg { a });
        Ok(t)
    }

    /// Epigraph of `||x||^2` as a rotated cone: `||(2x, t - 1)|| <= t + 1`.
    fn squared_norm(&mut self, cx: &ParamAffine) -> ParamAffine {
        let t: ParamAffine = self.new_aux_var(Shape::scalar(), true).into();
        let one = ParamAffine::scalar(1.0);
        let stacked = ParamAffine::vstack(&[&cx.scale(2.0), &t.sub(&one)]);
        self.push(ConeConstraint::SecondOrder {
            t: t.add(&one),
            x: stacked,
        });
        t
    }

    fn canonicalize_exp(&mut self, x: &Expr) -> Result<ParamAffine> {
        // (x_i, 1, t_i) in K_exp  <=>  exp(x_i) <= t_i
        let cx = self.canonicalize(x)?;
        let t: ParamAffine = self.new_aux_var(cx.shape().clone(), true).into();
        for i in 0..cx.size() {
            self.push(ConeConstraint::ExpCone {
                x: cx.entry(i),
                y: ParamAffine::scalar(1.0),
                z: t.entry(i),
            });
        }
        Ok(t)
    }

    fn canonicalize_log(&mut self, x: &Expr) -> Result<ParamAffine> {
        // (t_i, 1, x_i) in K_exp  <=>  t_i <= log(x_i)
        let cx = self.canonicalize(x)?;
        let t: ParamAffine = self.new_aux_var(cx.shape().clone(), false).into();
        for i in 0..cx.size() {
            self.push(ConeConstraint::ExpCone {
                x: t.entry(i),
                y: ParamAffine::scalar(1.0),
                z: cx.entry(i),
            });
        }
        Ok(t)
    }

    fn canonicalize_logistic(&mut self, x: &Expr) -> Result<ParamAffine> {
        // exp(x - t) + exp(-t) <= 1  <=>  log(1 + exp(x)) <= t
        let cx = self.canonicalize(x)?;
        let shape = cx.shape().clone();
        let t: ParamAffine = self.new_aux_var(shape.clone(), false).into();
        let u: ParamAffine = self.new_aux_var(shape.clone(), false).into();
        let v: ParamAffine = self.new_aux_var(shape, false).into();
        for i in 0..cx.size() {
            let ti = t.entry(i);
            self.push(ConeConstraint::ExpCone {
                x: cx.entry(i).sub(&ti),
                y: ParamAffine::scalar(1.0),
                z: u.entry(i),
            });
            self.push(ConeConstraint::ExpCone {
                x: ti.neg(),
                y: ParamAffine::scalar(1.0),
                z: v.entry(i),
            });
        }
        let slack = ParamAffine::scalar(1.0).sub(&u).sub(&v);
        self.push(ConeConstraint::NonNeg { a: slack });
        Ok(t)
    }

    fn canonicalize_power(&mut self, x: &Expr, p: f64) -> Result<ParamAffine> {
        let cx = self.canonicalize(x)?;
        let shape = cx.shape().clone();
        if p == 1.0 {
            return Ok(cx);
        }
        if p == 0.0 {
            return Ok(LinExpr::constant(&DMatrix::from_element(shape.size(), 1, 1.0), shape).into());
        }

        let concave = p > 0.0 && p < 1.0;
        let t: ParamAffine = self.new_aux_var(shape, !concave).into();
        let one = ParamAffine::scalar(1.0);
        for i in 0..cx.size() {
            let (xi, ti) = (cx.entry(i), t.entry(i));
            if p == 2.0 {
                let stacked = ParamAffine::vstack(&[&xi.scale(2.0), &ti.sub(&one)]);
                self.push(ConeConstraint::SecondOrder {
                    t: ti.add(&one),
                    x: stacked,
                });
            } else if concave {
                // t <= x^p
                self.push(ConeConstraint::PowerCone {
                    x: xi,
                    y: one.clone(),
                    z: ti,
                    alpha: p,
                });
            } else if p > 1.0 {
                // |x|^p <= t
                self.push(ConeConstraint::PowerCone {
                    x: ti,
                    y: one.clone(),
                    z: xi,
                    alpha: 1.0 / p,
                });
            } else {
                // t^(1/(1-p)) x^(-p/(1-p)) >= 1  <=>  x^p <= t
                self.push(ConeConstraint::PowerCone {
                    x: ti,
                    y: xi,
                    z: one.clone(),
                    alpha: 1.0 / (1.0 - p),
                });
            }
        }
        Ok(t)
    }
}

/// Value of a parameter-free constant operand as a matrix.
fn fixed_matrix(expr: &Expr) -> Result<DMatrix<f64>> {
    if expr.has_parameters() {
        return Err(CvxError::InvalidProblem(
            "matrix products with parameters are not supported; use elementwise products".into(),
        ));
    }
    expr.evaluate(&ParamBindings::new())
}

pub(crate) fn atom_name(expr: &Expr) -> &'static str {
    match expr {
        Expr::Variable(_) => "variable",
        Expr::Constant(_) => "constant",
        Expr::Parameter(_) => "parameter",
        Expr::Add(..) => "add",
        Expr::Neg(_) => "neg",
        Expr::Mul(..) => "multiply",
        Expr::Div(..) => "divide",
        Expr::Sum(_) => "sum",
        Expr::Index(..) => "index",
        Expr::MatMul(..) => "matmul",
        Expr::Abs(_) => "abs",
        Expr::Pos(_) => "pos",
        Expr::NegPart(_) => "neg_part",
        Expr::Maximum(_) => "maximum",
        Expr::Minimum(_) => "minimum",
        Expr::MaxEntries(_) => "max_entries",
        Expr::MinEntries(_) => "min_entries",
        Expr::Norm2(_) => "norm2",
        Expr::SumSquares(_) => "sum_squares",
        Expr::Exp(_) => "exp",
        Expr::Log(_) => "log",
        Expr::Logistic(_) => "logistic",
        Expr::Power(..) => "power",
        Expr::Ceil(_) => "ceil",
        Expr::Floor(_) => "floor",
        Expr::Sign(_) => "sign",
        Expr::Length(_) => "length",
        Expr::DistRatio(..) => "dist_ratio",
        Expr::Inverse(..) => "inverse",
    }
}
