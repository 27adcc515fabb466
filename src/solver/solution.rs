//! Solutions returned to callers.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};

use super::clarabel::SolveStatus;
use crate::error::{CvxError, Result};
use crate::expr::{Array, Expr, ExprId, ParamBindings, ValueSource};

/// Solution of a problem, in terms of the user's own variables and constraints.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution status.
    pub status: SolveStatus,
    /// Optimal value (if solved). `+inf` when infeasible, `-inf` when unbounded, in the sense of
    /// a minimization.
    pub value: Option<f64>,
    /// Primal variable values (if solved).
    pub primal: Option<HashMap<ExprId, Array>>,
    /// Dual values per user constraint, `None` per entry when a constraint has none.
    pub duals: Option<Vec<Option<Vec<f64>>>>,
    /// Violation of every user constraint at the returned point.
    pub residuals: Option<Vec<f64>>,
    /// Solve time in seconds, summed over all solver calls.
    pub solve_time: f64,
    /// Interior-point iterations, summed over all solver calls.
    pub iterations: u32,
    /// Narrowing steps taken by bisection, for DQCP solves.
    pub bisection_iterations: Option<usize>,
    pub(crate) bindings: ParamBindings,
}

impl Solution {
    pub(crate) fn without_point(status: SolveStatus, value: Option<f64>) -> Self {
        Solution {
            status,
            value,
            primal: None,
            duals: None,
            residuals: None,
            solve_time: 0.0,
            iterations: 0,
            bisection_iterations: None,
            bindings: ParamBindings::new(),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal()
    }

    /// Get the value of a variable.
    pub fn get_value(&self, var_id: ExprId) -> Option<&Array> {
        self.primal.as_ref().and_then(|p| p.get(&var_id))
    }

    /// Get the value of a scalar variable.
    ///
    /// # Example
    ///
    /// ```
    /// use cvxqcp::prelude::*;
    ///
    /// let x = variable(());
    /// let solution = Problem::minimize(x.clone())
    ///     .subject_to([x.geq(1.0)])
    ///     .solve()
    ///     .unwrap();
    ///
    /// let x_val = solution.try_value(&x).unwrap();
    /// assert!((x_val - 1.0).abs() < 1e-6);
    /// ```
    pub fn try_value(&self, var: &Expr) -> Result<f64> {
        let arr = self.lookup(var)?;
        arr.as_scalar().ok_or_else(|| {
            CvxError::InvalidProblem("variable is not scalar; use vector() instead".into())
        })
    }

    /// Values of a vector (or matrix) variable, column-major.
    pub fn vector(&self, var: &Expr) -> Result<DVector<f64>> {
        let arr = self.lookup(var)?;
        Ok(DVector::from_column_slice(arr.as_slice()))
    }

    /// Evaluate any expression at the solution point, with the parameter values of the solve.
    pub fn eval(&self, expr: &Expr) -> Result<DMatrix<f64>> {
        let primal = self.primal.as_ref().ok_or_else(no_point)?;
        expr.evaluate(&PointValues {
            primal,
            bindings: &self.bindings,
        })
    }

    pub fn eval_scalar(&self, expr: &Expr) -> Result<f64> {
        let primal = self.primal.as_ref().ok_or_else(no_point)?;
        expr.evaluate_scalar(&PointValues {
            primal,
            bindings: &self.bindings,
        })
    }

    /// Dual values of user constraint `idx`, if the solve produced them.
    pub fn constraint_dual(&self, idx: usize) -> Option<&[f64]> {
        self.duals
            .as_ref()
            .and_then(|d| d.get(idx))
            .and_then(|d| d.as_deref())
    }

    fn lookup(&self, var: &Expr) -> Result<&Array> {
        let var_id = var
            .variable_id()
            .ok_or_else(|| CvxError::InvalidProblem("expression is not a variable".into()))?;
        self.get_value(var_id)
            .ok_or_else(|| CvxError::InvalidProblem("variable not in solution".into()))
    }
}

fn no_point() -> CvxError {
    CvxError::InvalidProblem("solution has no primal point".into())
}

/// Variable values from a solution together with parameter values.
pub(crate) struct PointValues<'a> {
    pub primal: &'a HashMap<ExprId, Array>,
    pub bindings: &'a ParamBindings,
}

impl ValueSource for PointValues<'_> {
    fn value_of(&self, id: ExprId) -> Option<DMatrix<f64>> {
        self.primal
            .get(&id)
            .map(Array::to_matrix)
            .or_else(|| self.bindings.value_of(id))
    }
}
