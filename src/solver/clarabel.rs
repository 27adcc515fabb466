//! Clarabel solver integration.
//!
//! This module provides the interface to the Clarabel conic solver.

use clarabel::algebra::CscMatrix as ClarabelCsc;
use clarabel::solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT};
use tracing::debug;

use super::stuffing::{ConeDims, StuffedProblem};
use crate::error::{CvxError, Result};

/// Solution status reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveStatus {
    /// Optimal solution found.
    Optimal,
    /// Problem is infeasible.
    Infeasible,
    /// The solver found infeasibility only to reduced accuracy.
    InfeasibleInaccurate,
    /// Problem is unbounded.
    Unbounded,
    /// Iteration or time limits, numerical trouble, or any other failure.
    Error,
}

impl SolveStatus {
    pub fn is_optimal(self) -> bool {
        self == SolveStatus::Optimal
    }

    pub fn is_infeasible(self) -> bool {
        matches!(self, SolveStatus::Infeasible | SolveStatus::InfeasibleInaccurate)
    }
}

impl From<SolverStatus> for SolveStatus {
    fn from(status: SolverStatus) -> Self {
        match status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => SolveStatus::Optimal,
            SolverStatus::PrimalInfeasible => SolveStatus::Infeasible,
            SolverStatus::AlmostPrimalInfeasible => SolveStatus::InfeasibleInaccurate,
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                SolveStatus::Unbounded
            }
            _ => SolveStatus::Error,
        }
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::InfeasibleInaccurate => "infeasible_inaccurate",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Solver settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Print solver output.
    pub verbose: bool,
    /// Maximum iterations.
    pub max_iter: u32,
    /// Time limit in seconds.
    pub time_limit: f64,
    /// Absolute tolerance.
    pub tol_gap_abs: f64,
    /// Relative tolerance.
    pub tol_gap_rel: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            verbose: false,
            max_iter: 100,
            time_limit: f64::INFINITY,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
        }
    }
}

/// Output of one solver call, before it is mapped back to user variables.
#[derive(Debug, Clone)]
pub struct RawSolution {
    pub status: SolveStatus,
    /// Primal point over all program columns.
    pub x: Vec<f64>,
    /// Dual values, one per row of A.
    pub z: Vec<f64>,
    /// Objective value including the constant offset, when optimal.
    pub objective: Option<f64>,
    /// The solver's own status, for messages.
    pub solver_status: String,
    pub solve_time: f64,
    pub iterations: u32,
}

/// Solve the stuffed problem using Clarabel.
pub fn solve(problem: &StuffedProblem, settings: &Settings) -> Result<RawSolution> {
    if problem.num_vars() == 0 {
        return Ok(RawSolution {
            status: SolveStatus::Optimal,
            x: Vec::new(),
            z: vec![0.0; problem.num_rows()],
            objective: Some(problem.objective_offset),
            solver_status: "Trivial".into(),
            solve_time: 0.0,
            iterations: 0,
        });
    }

    let p = to_clarabel_csc(&problem.p);
    let a = to_clarabel_csc(&problem.a);
    let cones = to_clarabel_cones(&problem.cone_dims);

    let clarabel_settings = DefaultSettingsBuilder::default()
        .verbose(settings.verbose)
        .max_iter(settings.max_iter)
        .time_limit(settings.time_limit)
        .tol_gap_abs(settings.tol_gap_abs)
        .tol_gap_rel(settings.tol_gap_rel)
        .build()
        .map_err(|e| CvxError::SolverError(format!("invalid settings: {}", e)))?;

    let mut solver = DefaultSolver::new(&p, &problem.q, &a, &problem.b, &cones, clarabel_settings);
    solver.solve();

    let raw_status = solver.solution.status;
    let status: SolveStatus = raw_status.into();
    let objective = if status.is_optimal() {
        Some(compute_objective(&solver.solution.x, &problem.p, &problem.q) + problem.objective_offset)
    } else {
        None
    };
    debug!(
        ?raw_status,
        %status,
        iterations = solver.info.iterations,
        rows = problem.num_rows(),
        cols = problem.num_vars(),
        "clarabel finished"
    );

    Ok(RawSolution {
        status,
        x: solver.solution.x.clone(),
        z: solver.solution.z.clone(),
        objective,
        solver_status: format!("{:?}", raw_status),
        solve_time: solver.solution.solve_time,
        iterations: solver.info.iterations,
    })
}

/// Convert nalgebra CSC to Clarabel CSC.
fn to_clarabel_csc(m: &nalgebra_sparse::CscMatrix<f64>) -> ClarabelCsc<f64> {
    ClarabelCsc::new(
        m.nrows(),
        m.ncols(),
        m.col_offsets().to_vec(),
        m.row_indices().to_vec(),
        m.values().to_vec(),
    )
}

/// Convert cone dimensions to Clarabel cones.
fn to_clarabel_cones(dims: &ConeDims) -> Vec<SupportedConeT<f64>> {
    let mut cones = Vec::new();

    if dims.zero > 0 {
        cones.push(SupportedConeT::ZeroConeT(dims.zero));
    }
    if dims.nonneg > 0 {
        cones.push(SupportedConeT::NonnegativeConeT(dims.nonneg));
    }
    for &soc_dim in &dims.soc {
        cones.push(SupportedConeT::SecondOrderConeT(soc_dim));
    }
    for _ in 0..dims.exp {
        cones.push(SupportedConeT::ExponentialConeT());
    }
    for &alpha in &dims.power {
        cones.push(SupportedConeT::PowerConeT(alpha));
    }

    cones
}

/// Compute objective value: (1/2) x' P x + q' x.
fn compute_objective(x: &[f64], p: &nalgebra_sparse::CscMatrix<f64>, q: &[f64]) -> f64 {
    let linear: f64 = q.iter().zip(x.iter()).map(|(qi, xi)| qi * xi).sum();

    let mut quadratic = 0.0;
    for (row, col, val) in p.triplet_iter() {
        if row == col {
            quadratic += 0.5 * *val * x[row] * x[col];
        } else {
            // Off-diagonal, stored once in the upper triangle.
            quadratic += *val * x[row] * x[col];
        }
    }

    linear + quadratic
}
