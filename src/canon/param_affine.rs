//! Affine expressions whose coefficients may depend on parameters.
//!
//! A `ParamAffine` is `base + sum_k c_k * L_k` where each `c_k` is a scalar, variable-free
//! expression (typically involving a parameter or the bisection threshold) and each `L_k`
//! is an ordinary [`LinExpr`]. The coefficients stay symbolic in the compiled problem and
//! are evaluated when the problem is bound to concrete values.

use std::ops::Range;
use std::sync::Arc;

use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;

use super::lin_expr::LinExpr;
use crate::error::Result;
use crate::expr::{constant, Expr, ExprId, IndexSpec, Shape, ValueSource};

/// `base + sum_k coeff_k * term_k`.
#[derive(Debug, Clone)]
pub struct ParamAffine {
    pub base: LinExpr,
    pub terms: Vec<(Arc<Expr>, LinExpr)>,
}

impl From<LinExpr> for ParamAffine {
    fn from(base: LinExpr) -> Self {
        ParamAffine {
            base,
            terms: Vec::new(),
        }
    }
}

impl ParamAffine {
    pub fn scalar(value: f64) -> Self {
        LinExpr::scalar(value).into()
    }

    /// A variable-free parametric expression, split into one scalar coefficient per entry.
    pub fn parametric(expr: Arc<Expr>, shape: Shape) -> Self {
        let size = shape.size();
        let terms = if size == 1 {
            vec![(expr, LinExpr::scalar(1.0).broadcast_to(&shape))]
        } else {
            (0..size)
                .map(|i| {
                    let entry = Arc::new(Expr::Index(expr.clone(), IndexSpec::element(i)));
                    (entry, LinExpr::unit(i, shape.clone()))
                })
                .collect()
        };
        ParamAffine {
            base: LinExpr::zeros(shape),
            terms,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.base.shape
    }

    pub fn size(&self) -> usize {
        self.base.size()
    }

    /// True if no coefficient depends on a parameter.
    pub fn is_fixed(&self) -> bool {
        self.terms.is_empty()
    }

    /// True if no variable appears in the base or any term.
    pub fn is_constant(&self) -> bool {
        self.base.is_constant() && self.terms.iter().all(|(_, t)| t.is_constant())
    }

    pub fn variables(&self) -> Vec<ExprId> {
        let mut vars = self.base.variables();
        for (_, term) in &self.terms {
            vars.extend(term.variables());
        }
        vars.sort();
        vars.dedup();
        vars
    }

    fn map(&self, f: impl Fn(&LinExpr) -> LinExpr) -> ParamAffine {
        ParamAffine {
            base: f(&self.base),
            terms: self
                .terms
                .iter()
                .map(|(c, t)| (c.clone(), f(t)))
                .collect(),
        }
    }

    pub fn broadcast_to(&self, shape: &Shape) -> ParamAffine {
        self.map(|e| e.broadcast_to(shape))
    }

    pub fn add(&self, other: &ParamAffine) -> ParamAffine {
        let shape = if self.size() >= other.size() {
            self.shape().clone()
        } else {
            other.shape().clone()
        };
        let (a, b) = (self.broadcast_to(&shape), other.broadcast_to(&shape));
        ParamAffine {
            base: a.base.add(&b.base),
            terms: a.terms.into_iter().chain(b.terms).collect(),
        }
    }

    pub fn neg(&self) -> ParamAffine {
        self.map(LinExpr::neg)
    }

    pub fn sub(&self, other: &ParamAffine) -> ParamAffine {
        self.add(&other.neg())
    }

    pub fn scale(&self, scalar: f64) -> ParamAffine {
        self.map(|e| e.scale(scalar))
    }

    /// Elementwise product with a fixed vector.
    pub fn scale_elementwise(&self, d: &DVector<f64>, shape: &Shape) -> ParamAffine {
        self.map(|e| e.scale_elementwise(d, shape))
    }

    /// Multiply by a scalar variable-free expression `coeff`.
    pub fn scale_by(&self, coeff: &Arc<Expr>) -> ParamAffine {
        let mut terms = Vec::with_capacity(self.terms.len() + 1);
        if !self.base.is_constant() || self.base.constant.iter().any(|v| *v != 0.0) {
            terms.push((coeff.clone(), self.base.clone()));
        }
        for (c, t) in &self.terms {
            terms.push((Arc::new(Expr::Mul(coeff.clone(), c.clone())), t.clone()));
        }
        ParamAffine {
            base: LinExpr::zeros(self.shape().clone()),
            terms,
        }
    }

    /// Elementwise product with a variable-free parametric expression of `shape`.
    pub fn scale_by_entries(&self, coeffs: &Arc<Expr>, shape: &Shape) -> ParamAffine {
        let coeff_size = coeffs.shape().size();
        if coeff_size == 1 {
            return self.broadcast_to(shape).scale_by(coeffs);
        }
        let full = self.broadcast_to(shape);
        let mut out = ParamAffine::from(LinExpr::zeros(shape.clone()));
        for i in 0..coeff_size {
            let mut mask = DVector::zeros(coeff_size);
            mask[i] = 1.0;
            let entry = Arc::new(Expr::Index(coeffs.clone(), IndexSpec::element(i)));
            let row = full.scale_elementwise(&mask, shape).scale_by(&entry);
            out = out.add(&row);
        }
        out
    }

    /// Multiply by `1 / divisor` for a variable-free parametric `divisor`.
    pub fn divide_by_entries(&self, divisor: &Arc<Expr>, shape: &Shape) -> ParamAffine {
        let reciprocal = Arc::new(Expr::Div(Arc::new(constant(1.0)), divisor.clone()));
        self.scale_by_entries(&reciprocal, shape)
    }

    pub fn apply(&self, m: &CscMatrix<f64>, shape: Shape) -> ParamAffine {
        self.map(|e| e.apply(m, shape.clone()))
    }

    pub fn sum(&self) -> ParamAffine {
        self.map(LinExpr::sum)
    }

    pub fn select(&self, positions: Range<usize>, shape: Shape) -> ParamAffine {
        self.map(|e| e.select(positions.clone(), shape.clone()))
    }

    pub fn entry(&self, i: usize) -> ParamAffine {
        self.map(|e| e.entry(i))
    }

    pub fn vstack(parts: &[&ParamAffine]) -> ParamAffine {
        let bases: Vec<&LinExpr> = parts.iter().map(|p| &p.base).collect();
        let base = LinExpr::vstack(&bases);

        // Each term is padded with zeros outside its own block.
        let mut terms = Vec::new();
        for (k, part) in parts.iter().enumerate() {
            for (c, t) in &part.terms {
                let pads: Vec<LinExpr> = parts
                    .iter()
                    .map(|p| LinExpr::zeros(p.shape().clone()))
                    .collect();
                let blocks: Vec<&LinExpr> = pads
                    .iter()
                    .enumerate()
                    .map(|(j, pad)| if j == k { t } else { pad })
                    .collect();
                terms.push((c.clone(), LinExpr::vstack(&blocks)));
            }
        }
        ParamAffine { base, terms }
    }

    /// Evaluate every coefficient and collapse to a plain linear expression.
    ///
    /// Only nonzero entries are scaled, so an infinite coefficient never turns a
    /// structural zero into NaN.
    pub fn bind(&self, env: &dyn ValueSource) -> Result<LinExpr> {
        let mut out = self.base.clone();
        for (coeff, term) in &self.terms {
            let value = coeff.evaluate_scalar(env)?;
            out = out.add(&term.scale_nonzeros(value));
        }
        Ok(out)
    }
}
