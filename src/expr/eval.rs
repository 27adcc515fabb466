//! Numeric evaluation of expressions.
//!
//! Used to fold variable-free subexpressions at bind time (parameter coefficients, threshold
//! inverses, guards) and to evaluate expressions at a solution point.

use nalgebra::DMatrix;

use super::expression::{Expr, IndexSpec};
use super::parameter::ValueSource;
use crate::error::{CvxError, Result};

fn elementwise(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    f: impl Fn(f64, f64) -> f64,
) -> Result<DMatrix<f64>> {
    if a.len() == 1 {
        let s = a[(0, 0)];
        Ok(b.map(|v| f(s, v)))
    } else if b.len() == 1 {
        let s = b[(0, 0)];
        Ok(a.map(|v| f(v, s)))
    } else if a.shape() == b.shape() {
        Ok(a.zip_map(b, f))
    } else {
        Err(CvxError::ShapeMismatch {
            expected: format!("{:?}", a.shape()),
            got: format!("{:?}", b.shape()),
        })
    }
}

fn scalar(v: f64) -> DMatrix<f64> {
    DMatrix::from_element(1, 1, v)
}

/// Sign with `sign(0) == 0`.
pub(crate) fn sign_of(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn logistic(v: f64) -> f64 {
    if v > 0.0 {
        v + (-v).exp().ln_1p()
    } else {
        v.exp().ln_1p()
    }
}

impl Expr {
    /// Evaluate the expression with leaf values taken from `env`.
    ///
    /// The result is a `rows x cols` matrix in the expression's shape (scalars are `1 x 1`,
    /// vectors a single column).
    pub fn evaluate(&self, env: &dyn ValueSource) -> Result<DMatrix<f64>> {
        match self {
            Expr::Variable(v) => env.value_of(v.id).ok_or_else(|| {
                CvxError::InvalidProblem(format!(
                    "variable {} has no value",
                    v.name.clone().unwrap_or_else(|| format!("var{}", v.id.raw()))
                ))
            }),
            Expr::Parameter(p) => env.value_of(p.id).ok_or_else(|| {
                CvxError::InvalidProblem(format!(
                    "parameter {} has no value",
                    super::parameter::param_label(p)
                ))
            }),
            Expr::Constant(c) => Ok(c.value.to_matrix()),

            Expr::Add(a, b) => elementwise(&a.evaluate(env)?, &b.evaluate(env)?, |x, y| x + y),
            Expr::Neg(a) => Ok(-a.evaluate(env)?),
            Expr::Mul(a, b) => elementwise(&a.evaluate(env)?, &b.evaluate(env)?, |x, y| x * y),
            Expr::Div(a, b) => elementwise(&a.evaluate(env)?, &b.evaluate(env)?, |x, y| x / y),
            Expr::Sum(a) => Ok(scalar(a.evaluate(env)?.sum())),
            Expr::Index(a, spec) => {
                let value = a.evaluate(env)?;
                let flat = value.as_slice();
                let range = spec.positions();
                if range.end > flat.len() {
                    return Err(CvxError::InvalidProblem(format!(
                        "index {:?} out of bounds for {} elements",
                        spec,
                        flat.len()
                    )));
                }
                let picked = &flat[range];
                Ok(match spec {
                    IndexSpec::Element(_) => scalar(picked[0]),
                    IndexSpec::Range { .. } => {
                        DMatrix::from_column_slice(picked.len(), 1, picked)
                    }
                })
            }
            Expr::MatMul(a, b) => {
                let (va, vb) = (a.evaluate(env)?, b.evaluate(env)?);
                if a.shape().is_vector() && b.shape().is_vector() {
                    Ok(scalar(va.dot(&vb)))
                } else if va.ncols() == vb.nrows() {
                    Ok(va * vb)
                } else {
                    Err(CvxError::ShapeMismatch {
                        expected: format!("{} columns", va.ncols()),
                        got: format!("{} rows", vb.nrows()),
                    })
                }
            }

            Expr::Abs(a) => Ok(a.evaluate(env)?.map(f64::abs)),
            Expr::Pos(a) => Ok(a.evaluate(env)?.map(|v| v.max(0.0))),
            Expr::NegPart(a) => Ok(a.evaluate(env)?.map(|v| (-v).max(0.0))),
            Expr::Maximum(args) | Expr::Minimum(args) => {
                let pick_max = matches!(self, Expr::Maximum(_));
                let mut acc: Option<DMatrix<f64>> = None;
                for arg in args {
                    let v = arg.evaluate(env)?;
                    acc = Some(match acc {
                        None => v,
                        Some(prev) if pick_max => elementwise(&prev, &v, f64::max)?,
                        Some(prev) => elementwise(&prev, &v, f64::min)?,
                    });
                }
                acc.ok_or_else(|| CvxError::InvalidProblem("empty maximum/minimum".into()))
            }
            Expr::MaxEntries(a) => Ok(scalar(a.evaluate(env)?.max())),
            Expr::MinEntries(a) => Ok(scalar(a.evaluate(env)?.min())),
            Expr::Norm2(a) => Ok(scalar(a.evaluate(env)?.norm())),
            Expr::SumSquares(a) => Ok(scalar(a.evaluate(env)?.norm_squared())),
            Expr::Exp(a) => Ok(a.evaluate(env)?.map(f64::exp)),
            Expr::Log(a) => Ok(a.evaluate(env)?.map(f64::ln)),
            Expr::Logistic(a) => Ok(a.evaluate(env)?.map(logistic)),
            Expr::Power(a, p) => {
                let p = *p;
                Ok(a.evaluate(env)?.map(|v| v.powf(p)))
            }

            Expr::Ceil(a) => Ok(a.evaluate(env)?.map(f64::ceil)),
            Expr::Floor(a) => Ok(a.evaluate(env)?.map(f64::floor)),
            Expr::Sign(a) => Ok(a.evaluate(env)?.map(sign_of)),
            Expr::Length(a) => {
                let value = a.evaluate(env)?;
                let len = value
                    .as_slice()
                    .iter()
                    .rposition(|v| *v != 0.0)
                    .map_or(0, |i| i + 1);
                Ok(scalar(len as f64))
            }
            Expr::DistRatio(x, a, b) => {
                let vx = x.evaluate(env)?;
                let (va, vb) = (a.evaluate(env)?, b.evaluate(env)?);
                let num = elementwise(&vx, &va, |p, q| p - q)?.norm();
                let den = elementwise(&vx, &vb, |p, q| p - q)?.norm();
                Ok(scalar(num / den))
            }
            Expr::Inverse(f, a) => {
                let f = *f;
                Ok(a.evaluate(env)?.map(|v| f.apply(v)))
            }
        }
    }

    /// Evaluate an expression that must hold a single value.
    pub fn evaluate_scalar(&self, env: &dyn ValueSource) -> Result<f64> {
        let value = self.evaluate(env)?;
        if value.len() != 1 {
            return Err(CvxError::ShapeMismatch {
                expected: "()".into(),
                got: self.shape().to_string(),
            });
        }
        Ok(value[(0, 0)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::*;
    use crate::expr::{constant, constant_vec, parameter, variable, ParamBindings};
    use approx::assert_relative_eq;

    #[test]
    fn test_quasi_atoms() {
        let env = ParamBindings::new();
        let v = constant_vec(vec![1.2, -0.5, 0.0, 3.0, 0.0]);
        assert_eq!(ceil(&v).evaluate(&env).unwrap().as_slice(), &[2.0, -0.0, 0.0, 3.0, 0.0]);
        assert_eq!(length(&v).evaluate_scalar(&env).unwrap(), 4.0);
        assert_eq!(sign(&constant(0.0)).evaluate_scalar(&env).unwrap(), 0.0);
        assert_eq!(sign(&constant(-3.0)).evaluate_scalar(&env).unwrap(), -1.0);
    }

    #[test]
    fn test_dist_ratio_value() {
        let env = ParamBindings::new();
        let x = constant_vec(vec![0.8, 0.8]);
        let r = dist_ratio(&x, &[1.0, 1.0], &[0.0, 0.0]);
        assert_relative_eq!(r.evaluate_scalar(&env).unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_parameter_lookup() {
        let p = parameter(());
        let e = 2.0 * &p + 1.0;
        let env = ParamBindings::new().with(&p, 3.0).unwrap();
        assert_eq!(e.evaluate_scalar(&env).unwrap(), 7.0);
        assert!(e.evaluate(&ParamBindings::new()).is_err());
    }

    #[test]
    fn test_unbound_variable_is_error() {
        let x = variable(());
        assert!(x.evaluate(&ParamBindings::new()).is_err());
    }

    #[test]
    fn test_logistic_is_stable() {
        let env = ParamBindings::new();
        let big = logistic_atom_value(&env, 800.0);
        assert_relative_eq!(big, 800.0, epsilon = 1e-9);
        let small = logistic_atom_value(&env, -800.0);
        assert!(small >= 0.0 && small < 1e-300);
    }

    fn logistic_atom_value(env: &ParamBindings, v: f64) -> f64 {
        crate::atoms::logistic(&constant(v))
            .evaluate_scalar(env)
            .unwrap()
    }
}
