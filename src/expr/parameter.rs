//! Parameters and per-solve parameter bindings.
//!
//! A parameter is a placeholder that takes part in structure (and therefore in the compiled
//! problem) but not in its numbers. Values live in a [`ParamBindings`] map that is handed to
//! each solve explicitly, so rebinding never touches the expression graph or the cache.

use std::collections::HashMap;

use nalgebra::DMatrix;

use super::expression::{Array, Expr, ExprId, ParameterData};
use super::shape::Shape;
use crate::error::{CvxError, Result};

/// Builder for parameters.
#[derive(Default)]
pub struct ParameterBuilder {
    shape: Shape,
    name: Option<String>,
    nonneg: bool,
    nonpos: bool,
}

impl ParameterBuilder {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn nonneg(mut self) -> Self {
        self.nonneg = true;
        self.nonpos = false;
        self
    }

    pub fn nonpos(mut self) -> Self {
        self.nonpos = true;
        self.nonneg = false;
        self
    }

    pub fn build(self) -> Expr {
        Expr::Parameter(ParameterData {
            id: ExprId::new(),
            shape: self.shape,
            name: self.name,
            nonneg: self.nonneg,
            nonpos: self.nonpos,
        })
    }
}

/// Create a parameter with the given shape.
pub fn parameter(shape: impl Into<Shape>) -> Expr {
    ParameterBuilder::new(shape).build()
}

/// Lookup of numeric values by leaf id, used by the evaluator.
pub trait ValueSource {
    /// Value of the variable or parameter `id` as a column-major `rows x cols` matrix.
    fn value_of(&self, id: ExprId) -> Option<DMatrix<f64>>;
}

/// Values for parameters, supplied per solve.
#[derive(Debug, Clone, Default)]
pub struct ParamBindings {
    values: HashMap<ExprId, DMatrix<f64>>,
}

impl ParamBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` to `param`, consuming and returning the bindings.
    pub fn with(mut self, param: &Expr, value: impl Into<Array>) -> Result<Self> {
        self.set(param, value)?;
        Ok(self)
    }

    /// Bind `value` to `param`.
    ///
    /// The value must match the parameter's shape and respect its sign attribute.
    pub fn set(&mut self, param: &Expr, value: impl Into<Array>) -> Result<()> {
        let data = match param {
            Expr::Parameter(p) => p,
            _ => {
                return Err(CvxError::InvalidProblem(
                    "only parameters can be bound".into(),
                ))
            }
        };
        let value = value.into();
        if value.size() != data.shape.size() {
            return Err(CvxError::ShapeMismatch {
                expected: data.shape.to_string(),
                got: value.shape().to_string(),
            });
        }
        if data.nonneg && !value.is_nonneg() {
            return Err(CvxError::InvalidProblem(format!(
                "parameter {} must be nonnegative",
                param_label(data)
            )));
        }
        if data.nonpos && !value.is_nonpos() {
            return Err(CvxError::InvalidProblem(format!(
                "parameter {} must be nonpositive",
                param_label(data)
            )));
        }
        self.set_raw(data.id, value.to_matrix());
        Ok(())
    }

    /// Bind a value by id without validation. Used for internal threshold parameters.
    pub(crate) fn set_raw(&mut self, id: ExprId, value: DMatrix<f64>) {
        self.values.insert(id, value);
    }

    pub fn get(&self, id: ExprId) -> Option<&DMatrix<f64>> {
        self.values.get(&id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ValueSource for ParamBindings {
    fn value_of(&self, id: ExprId) -> Option<DMatrix<f64>> {
        self.values.get(&id).cloned()
    }
}

pub(crate) fn param_label(data: &ParameterData) -> String {
    data.name
        .clone()
        .unwrap_or_else(|| format!("param{}", data.id.raw()))
}
