//! Matrix stuffing: binds a compiled cone program to values and builds solver matrices.
//!
//! This module builds the matrices (P, q, A, b) and cone specifications required by Clarabel
//! from a [`ConeProgram`]. Parametric coefficients are evaluated against the bindings, guarded
//! cones are switched on or off, and rows whose right-hand side came out infinite are either
//! dropped (vacuous) or reported as an infeasible program.

use std::collections::HashMap;

use nalgebra_sparse::CscMatrix;
use tracing::trace;

use crate::canon::{CanonExpr, ConeConstraint, LinExpr, QuadExpr, Source};
use crate::error::{CvxError, Result};
use crate::expr::{ExprId, Shape, ValueSource, VariableData};
use crate::reductions::ConeProgram;
use crate::sparse::{csc_from_triplets, csc_scale};

/// Cone dimensions for Clarabel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConeDims {
    /// Number of zero cone (equality) rows.
    pub zero: usize,
    /// Number of nonnegative cone rows.
    pub nonneg: usize,
    /// Second-order cone dimensions (each entry is the cone dimension).
    pub soc: Vec<usize>,
    /// Number of exponential cones (each is 3D).
    pub exp: usize,
    /// Power cone alpha values (each cone is 3D with its own alpha).
    pub power: Vec<f64>,
}

impl ConeDims {
    /// Total number of constraint rows.
    pub fn total(&self) -> usize {
        self.zero + self.nonneg + self.soc.iter().sum::<usize>() + (self.exp * 3) + (self.power.len() * 3)
    }
}

/// Mapping from variable IDs to column indices in the optimization variable.
#[derive(Debug, Clone, Default)]
pub struct VariableMap {
    /// Map from variable ID to (start_col, size).
    pub id_to_col: HashMap<ExprId, (usize, usize)>,
    /// Total number of optimization variables.
    pub total_vars: usize,
}

impl VariableMap {
    /// Create from a list of (variable_id, shape) pairs.
    pub fn from_vars(vars: &[(ExprId, Shape)]) -> Self {
        let mut id_to_col = HashMap::new();
        let mut offset = 0;

        for (var_id, shape) in vars {
            let size = shape.size();
            id_to_col.insert(*var_id, (offset, size));
            offset += size;
        }

        VariableMap {
            id_to_col,
            total_vars: offset,
        }
    }

    pub fn from_data(vars: &[VariableData]) -> Self {
        let pairs: Vec<(ExprId, Shape)> = vars.iter().map(|v| (v.id, v.shape.clone())).collect();
        Self::from_vars(&pairs)
    }

    /// Get the column range for a variable.
    pub fn get(&self, var_id: ExprId) -> Option<(usize, usize)> {
        self.id_to_col.get(&var_id).copied()
    }
}

/// Stuffed problem ready for Clarabel.
#[derive(Debug, Clone)]
pub struct StuffedProblem {
    /// Quadratic cost matrix P (n x n, upper triangle).
    pub p: CscMatrix<f64>,
    /// Linear cost vector q (n).
    pub q: Vec<f64>,
    /// Constraint matrix A (m x n).
    pub a: CscMatrix<f64>,
    /// Constraint vector b (m).
    pub b: Vec<f64>,
    /// Cone dimensions.
    pub cone_dims: ConeDims,
    /// Variable mapping for solution recovery.
    pub var_map: VariableMap,
    /// Constant offset in objective.
    pub objective_offset: f64,
    /// Rows of A occupied by each cone of the program, empty for cones left out.
    pub cone_rows: Vec<Vec<usize>>,
}

impl StuffedProblem {
    pub fn num_vars(&self) -> usize {
        self.var_map.total_vars
    }

    pub fn num_rows(&self) -> usize {
        self.b.len()
    }
}

/// Result of binding a program to concrete values.
#[derive(Debug, Clone)]
pub enum Binding {
    Ready(StuffedProblem),
    /// A row with no variables (or an infinite bound) can never hold.
    Infeasible(String),
}

/// One row of `A x + s = b`.
#[derive(Debug, Clone, Default)]
struct Row {
    entries: Vec<(usize, f64)>,
    b: f64,
    cone: Option<usize>,
}

#[derive(Debug, Default)]
struct Blocks {
    zero: Vec<Row>,
    nonneg: Vec<Row>,
    soc: Vec<Vec<Row>>,
    exp: Vec<Vec<Row>>,
    power: Vec<(Vec<Row>, f64)>,
}

/// Bind `program` to the values in `env` and build the solver matrices.
///
/// Cones sourced from the objective are left out when `objective_rows` is false, which turns a
/// lowered DQCP program into a plain feasibility problem over its constraints.
pub fn bind(program: &ConeProgram, env: &dyn ValueSource, objective_rows: bool) -> Result<Binding> {
    let var_map = &program.var_map;
    let mut blocks = Blocks::default();

    for (k, tagged) in program.cones.iter().enumerate() {
        if !objective_rows && tagged.source == Source::Objective {
            continue;
        }
        if !tagged.is_active(env)? {
            trace!(cone = k, "guard inactive, cone skipped");
            continue;
        }
        match &tagged.cone {
            ConeConstraint::Zero { a } => {
                let a = a.bind(env)?;
                for row in linear_rows(&a, var_map, false, k)? {
                    if row.entries.is_empty() {
                        if row.b != 0.0 {
                            return Ok(Binding::Infeasible(format!(
                                "equality row of cone {} reduces to {} = 0",
                                k, -row.b
                            )));
                        }
                    } else if !row.b.is_finite() {
                        return Ok(Binding::Infeasible(format!(
                            "equality row of cone {} has a non-finite right-hand side",
                            k
                        )));
                    } else {
                        blocks.zero.push(row);
                    }
                }
            }
            ConeConstraint::NonNeg { a } => {
                let a = a.bind(env)?;
                for row in linear_rows(&a, var_map, true, k)? {
                    // Row reads `-a x <= b`.
                    if row.b.is_nan() || row.b == f64::NEG_INFINITY {
                        return Ok(Binding::Infeasible(format!(
                            "inequality row of cone {} has bound {}",
                            k, row.b
                        )));
                    }
                    if row.b == f64::INFINITY {
                        continue;
                    }
                    if row.entries.is_empty() {
                        if row.b < 0.0 {
                            return Ok(Binding::Infeasible(format!(
                                "inequality row of cone {} reduces to {} >= 0",
                                k, row.b
                            )));
                        }
                        continue;
                    }
                    blocks.nonneg.push(row);
                }
            }
            ConeConstraint::SecondOrder { t, x } => {
                let mut rows = linear_rows(&t.bind(env)?, var_map, true, k)?;
                rows.extend(linear_rows(&x.bind(env)?, var_map, true, k)?);
                blocks.soc.push(finite(rows, k)?);
            }
            ConeConstraint::ExpCone { x, y, z } => {
                let mut rows = Vec::with_capacity(3);
                for part in [x, y, z] {
                    rows.extend(linear_rows(&part.bind(env)?, var_map, true, k)?);
                }
                blocks.exp.push(finite(rows, k)?);
            }
            ConeConstraint::PowerCone { x, y, z, alpha } => {
                let mut rows = Vec::with_capacity(3);
                for part in [x, y, z] {
                    rows.extend(linear_rows(&part.bind(env)?, var_map, true, k)?);
                }
                blocks.power.push((finite(rows, k)?, *alpha));
            }
        }
    }

    // Sign attributes become plain inequality rows.
    for var in &program.variables {
        if !var.nonneg && !var.nonpos {
            continue;
        }
        let (start, size) = var_map.get(var.id).ok_or_else(|| missing_column(var.id))?;
        let coeff = if var.nonneg { -1.0 } else { 1.0 };
        for i in 0..size {
            blocks.nonneg.push(Row {
                entries: vec![(start + i, coeff)],
                b: 0.0,
                cone: None,
            });
        }
    }

    let (p, q, objective_offset) = stuff_objective(&program.objective, env, var_map)?;
    Ok(Binding::Ready(assemble(
        blocks,
        p,
        q,
        objective_offset,
        var_map.clone(),
        program.cones.len(),
    )))
}

/// Expand a bound linear expression into rows.
///
/// The Zero cone reads `a x + c = 0`, i.e. `A = a, b = -c`. Every other cone reads
/// `a x + c in K`, i.e. `s = -A x + b` with `A = -a, b = c`.
fn linear_rows(expr: &LinExpr, var_map: &VariableMap, negate: bool, cone: usize) -> Result<Vec<Row>> {
    let sign = if negate { -1.0 } else { 1.0 };
    let mut rows: Vec<Row> = expr
        .constant
        .iter()
        .map(|c| Row {
            entries: Vec::new(),
            b: if negate { *c } else { -*c },
            cone: Some(cone),
        })
        .collect();

    for (var_id, coeff) in &expr.coeffs {
        let (col_start, _) = var_map.get(*var_id).ok_or_else(|| missing_column(*var_id))?;
        for (row, col, val) in coeff.triplet_iter() {
            if *val == 0.0 {
                continue;
            }
            if !val.is_finite() {
                return Err(CvxError::NumericalError(format!(
                    "coefficient {} in cone {}",
                    val, cone
                )));
            }
            rows[row].entries.push((col_start + col, *val * sign));
        }
    }
    Ok(rows)
}

fn finite(rows: Vec<Row>, cone: usize) -> Result<Vec<Row>> {
    if rows.iter().any(|r| !r.b.is_finite()) {
        return Err(CvxError::NumericalError(format!(
            "non-finite offset in conic constraint {}",
            cone
        )));
    }
    Ok(rows)
}

fn missing_column(id: ExprId) -> CvxError {
    CvxError::InvalidProblem(format!("variable {} is not part of the program", id.raw()))
}

/// Stuff the objective into P, q and a constant offset.
fn stuff_objective(
    objective: &CanonExpr,
    env: &dyn ValueSource,
    var_map: &VariableMap,
) -> Result<(CscMatrix<f64>, Vec<f64>, f64)> {
    let bound;
    let quad = match objective {
        CanonExpr::Quadratic(q) => q,
        CanonExpr::Linear(a) => {
            bound = QuadExpr::from_linear(a.bind(env)?);
            &bound
        }
    };
    let n = var_map.total_vars;

    // A scalar objective has a (1 x var_size) coefficient per variable.
    let mut q = vec![0.0; n];
    for (var_id, coeff) in &quad.linear.coeffs {
        let (start, size) = var_map.get(*var_id).ok_or_else(|| missing_column(*var_id))?;
        for (_row, col, val) in coeff.triplet_iter() {
            if col < size {
                q[start + col] += *val;
            }
        }
    }

    let mut p_rows = Vec::new();
    let mut p_cols = Vec::new();
    let mut p_vals = Vec::new();
    for ((var_i, var_j), coeff) in &quad.quad_coeffs {
        let (start_i, _) = var_map.get(*var_i).ok_or_else(|| missing_column(*var_i))?;
        let (start_j, _) = var_map.get(*var_j).ok_or_else(|| missing_column(*var_j))?;
        for (row, col, val) in coeff.triplet_iter() {
            let global_row = start_i + row;
            let global_col = start_j + col;
            // Clarabel takes the upper triangle of a symmetric P.
            if global_row <= global_col {
                p_rows.push(global_row);
                p_cols.push(global_col);
                p_vals.push(*val);
            }
        }
    }

    let offset = quad.constant;
    if !offset.is_finite() || q.iter().chain(p_vals.iter()).any(|v| !v.is_finite()) {
        return Err(CvxError::NumericalError("non-finite objective".into()));
    }

    // Clarabel minimizes (1/2) x' P x + q' x.
    let p = csc_scale(&csc_from_triplets(n, n, p_rows, p_cols, p_vals), 2.0);
    Ok((p, q, offset))
}

fn assemble(
    blocks: Blocks,
    p: CscMatrix<f64>,
    q: Vec<f64>,
    objective_offset: f64,
    var_map: VariableMap,
    num_cones: usize,
) -> StuffedProblem {
    let mut cone_dims = ConeDims {
        zero: blocks.zero.len(),
        nonneg: blocks.nonneg.len(),
        soc: blocks.soc.iter().map(Vec::len).collect(),
        exp: blocks.exp.len(),
        power: blocks.power.iter().map(|(_, alpha)| *alpha).collect(),
    };

    // Cone order: zero, nonneg, soc, exp, power.
    let mut ordered: Vec<Row> = Vec::with_capacity(cone_dims.total());
    ordered.extend(blocks.zero);
    ordered.extend(blocks.nonneg);
    ordered.extend(blocks.soc.into_iter().flatten());
    ordered.extend(blocks.exp.into_iter().flatten());
    ordered.extend(blocks.power.into_iter().flat_map(|(rows, _)| rows));

    if ordered.is_empty() {
        // Clarabel wants at least one row: 0 <= 1.
        ordered.push(Row {
            entries: Vec::new(),
            b: 1.0,
            cone: None,
        });
        cone_dims.nonneg = 1;
    }

    let n = var_map.total_vars;
    let mut a_rows = Vec::new();
    let mut a_cols = Vec::new();
    let mut a_vals = Vec::new();
    let mut b = Vec::with_capacity(ordered.len());
    let mut cone_rows = vec![Vec::new(); num_cones];

    for (i, row) in ordered.iter().enumerate() {
        for &(col, val) in &row.entries {
            a_rows.push(i);
            a_cols.push(col);
            a_vals.push(val);
        }
        b.push(row.b);
        if let Some(k) = row.cone {
            cone_rows[k].push(i);
        }
    }
    trace!(
        rows = b.len(),
        cols = n,
        cones = cone_rows.iter().filter(|r| !r.is_empty()).count(),
        "stuffed cone program"
    );

    let a = csc_from_triplets(b.len(), n, a_rows, a_cols, a_vals);
    StuffedProblem {
        p,
        q,
        a,
        b,
        cone_dims,
        var_map,
        objective_offset,
        cone_rows,
    }
}
