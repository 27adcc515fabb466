//! Mapping solver output back through the inverse-data stack.

use std::collections::{HashMap, HashSet};

use nalgebra::DMatrix;

use super::{InverseData, ProgramSolution};
use crate::error::{CvxError, Result};
use crate::expr::{Array, ExprId};
use crate::solver::SolveStatus;

/// A solution expressed in the user's variables and constraints.
#[derive(Debug, Clone, Default)]
pub struct Recovered {
    pub value: Option<f64>,
    pub primal: Option<HashMap<ExprId, Array>>,
    pub duals: Option<Vec<Option<Vec<f64>>>>,
}

/// Apply `stack` in reverse to one solved program.
///
/// `midpoint` is the final bisection midpoint; the DQCP entry reports it as the objective value.
pub fn unpack(stack: &[InverseData], solved: &ProgramSolution, midpoint: Option<f64>) -> Result<Recovered> {
    let mut out = Recovered::default();

    for entry in stack.iter().rev() {
        match entry {
            InverseData::ConeStuffing {
                var_map,
                variables,
                primary_cones,
            } => {
                let raw = &solved.raw;
                out.value = match raw.status {
                    SolveStatus::Optimal => raw.objective,
                    SolveStatus::Infeasible | SolveStatus::InfeasibleInaccurate => Some(f64::INFINITY),
                    SolveStatus::Unbounded => Some(f64::NEG_INFINITY),
                    SolveStatus::Error => None,
                };
                if !raw.status.is_optimal() {
                    continue;
                }

                let mut primal = HashMap::with_capacity(variables.len());
                for var in variables {
                    let (start, size) = var_map.get(var.id).ok_or_else(|| {
                        CvxError::InvalidProblem(format!("variable {} has no columns", var.id.raw()))
                    })?;
                    let values = raw.x.get(start..start + size).ok_or_else(|| {
                        CvxError::SolverError(format!(
                            "solver returned {} values for {} columns",
                            raw.x.len(),
                            var_map.total_vars
                        ))
                    })?;
                    let m = DMatrix::from_column_slice(var.shape.rows(), var.shape.cols(), values);
                    primal.insert(var.id, Array::from_matrix(&m, &var.shape));
                }
                out.primal = Some(primal);

                let duals = primary_cones
                    .iter()
                    .map(|cone| {
                        let rows = solved.cone_rows.get((*cone)?)?;
                        if rows.is_empty() {
                            return None;
                        }
                        rows.iter().map(|&r| raw.z.get(r).copied()).collect()
                    })
                    .collect();
                out.duals = Some(duals);
            }
            InverseData::Dqcp2Dcp {
                threshold,
                variables,
            } => {
                if threshold.is_some() && solved.raw.status.is_optimal() {
                    out.value = midpoint;
                }
                if let Some(primal) = out.primal.as_mut() {
                    let keep: HashSet<&ExprId> = variables.iter().collect();
                    primal.retain(|id, _| keep.contains(id));
                }
                out.duals = None;
            }
            InverseData::FlipObjective => {
                out.value = out.value.map(|v| -v);
            }
        }
    }
    Ok(out)
}
