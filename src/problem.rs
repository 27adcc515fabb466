//! Problem definition and solving API.
//!
//! The `Problem` struct represents an optimization problem with:
//! - An objective (minimize or maximize)
//! - A set of constraints
//! - A cache of compiled programs, one per compile mode
//!
//! Use the builder pattern to construct problems:
//! ```ignore
//! let solution = Problem::minimize(objective)
//!     .subject_to([constraint1, constraint2])
//!     .solve()?;
//! ```
//!
//! Quasiconvex problems are solved by bisection with [`Problem::solve_qcp`] or
//! [`SolveOptions::qcp`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::constraints::Constraint;
use crate::dqcp::{bisect, BisectionOutcome, BisectionSettings, FeasibilityOracle, Interval};
use crate::error::{CvxError, Result};
use crate::expr::parameter::param_label;
use crate::expr::{Expr, ExprId, ParamBindings, ParameterData};
use crate::reductions::{
    self, compile, unpack, CompileMode, CompiledProblem, Fingerprint, ProgramSolution, Recovered,
};
use crate::solver::solution::PointValues;
use crate::solver::{Binding, Settings, Solution, SolveStatus};

/// Objective type for optimization problems.
#[derive(Debug, Clone)]
pub enum Objective {
    /// Minimize the expression.
    Minimize(Arc<Expr>),
    /// Maximize the expression (internally converted to minimization).
    Maximize(Arc<Expr>),
}

impl Objective {
    /// Get the expression being optimized.
    pub fn expr(&self) -> &Arc<Expr> {
        match self {
            Objective::Minimize(e) | Objective::Maximize(e) => e,
        }
    }

    /// Check if this is a minimization.
    pub fn is_minimize(&self) -> bool {
        matches!(self, Objective::Minimize(_))
    }
}

/// Compile and cache-hit counts of one problem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub compiles: usize,
    pub hits: usize,
}

/// Options for a single solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOptions {
    /// Solve a DQCP problem by bisection.
    pub qcp: bool,
    /// Lower bound on the optimal value, if known.
    pub low: Option<f64>,
    /// Upper bound on the optimal value, if known.
    pub high: Option<f64>,
    /// Narrowing steps allowed before bisection gives up.
    pub max_iters: usize,
    pub settings: Settings,
    pub bisection: BisectionSettings,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            qcp: false,
            low: None,
            high: None,
            max_iters: 100,
            settings: Settings::default(),
            bisection: BisectionSettings::default(),
        }
    }
}

impl SolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn qcp(mut self, qcp: bool) -> Self {
        self.qcp = qcp;
        self
    }

    pub fn low(mut self, low: f64) -> Self {
        self.low = Some(low);
        self
    }

    pub fn high(mut self, high: f64) -> Self {
        self.high = Some(high);
        self
    }

    pub fn max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn bisection(mut self, bisection: BisectionSettings) -> Self {
        self.bisection = bisection;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.settings.verbose = verbose;
        self
    }
}

/// An optimization problem.
#[derive(Debug, Clone)]
pub struct Problem {
    objective: Objective,
    constraints: Vec<Constraint>,
    cache: HashMap<CompileMode, Arc<CompiledProblem>>,
    stats: CacheStats,
}

impl Problem {
    pub fn new(objective: Objective, constraints: Vec<Constraint>) -> Self {
        Problem {
            objective,
            constraints,
            cache: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Create a minimization problem.
    pub fn minimize(expr: Expr) -> ProblemBuilder {
        ProblemBuilder {
            objective: Objective::Minimize(Arc::new(expr)),
            constraints: Vec::new(),
        }
    }

    /// Create a maximization problem.
    pub fn maximize(expr: Expr) -> ProblemBuilder {
        ProblemBuilder {
            objective: Objective::Maximize(Arc::new(expr)),
            constraints: Vec::new(),
        }
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn set_objective(&mut self, objective: Objective) {
        self.objective = objective;
        self.cache.clear();
    }

    /// Append a constraint and return its index.
    pub fn add_constraint(&mut self, constraint: Constraint) -> usize {
        self.constraints.push(constraint);
        self.cache.clear();
        self.constraints.len() - 1
    }

    pub fn remove_constraint(&mut self, idx: usize) -> Result<Constraint> {
        if idx >= self.constraints.len() {
            return Err(CvxError::InvalidProblem(format!(
                "constraint {} does not exist ({} constraints)",
                idx,
                self.constraints.len()
            )));
        }
        self.cache.clear();
        Ok(self.constraints.remove(idx))
    }

    pub fn clear_constraints(&mut self) {
        self.constraints.clear();
        self.cache.clear();
    }

    /// Check if this problem is DCP-compliant.
    ///
    /// A problem is DCP if:
    /// - Minimize: objective is convex
    /// - Maximize: objective is concave
    /// - All constraints are DCP
    pub fn is_dcp(&self) -> bool {
        reductions::is_dcp(&self.objective, &self.constraints)
    }

    /// Check if this problem is DQCP-compliant: a quasiconvex objective to minimize (or a
    /// quasiconcave one to maximize) and DQCP constraints.
    pub fn is_dqcp(&self) -> bool {
        reductions::is_dqcp(&self.objective, &self.constraints)
    }

    /// Get all variable IDs in this problem.
    pub fn variables(&self) -> Vec<ExprId> {
        let mut vars = self.objective.expr().variables();
        for c in &self.constraints {
            vars.extend(c.variables());
        }
        vars.sort();
        vars.dedup();
        vars
    }

    /// All parameters of the problem, ordered by id.
    pub fn parameters(&self) -> Vec<ParameterData> {
        let mut found = BTreeMap::new();
        let exprs = std::iter::once(self.objective.expr())
            .chain(self.constraints.iter().flat_map(|c| c.expressions()));
        for e in exprs {
            for p in e.parameters() {
                found.entry(p.id).or_insert(p);
            }
        }
        found.into_values().collect()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        reductions::fingerprint(&self.objective, &self.constraints)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.stats
    }

    /// The compiled program for `mode`, reused while the structure is unchanged.
    pub fn compile(&mut self, mode: CompileMode) -> Result<Arc<CompiledProblem>> {
        let fingerprint = self.fingerprint();
        if let Some(compiled) = self.cache.get(&mode) {
            if compiled.fingerprint == fingerprint {
                self.stats.hits += 1;
                debug!(fingerprint = %fingerprint.short(), ?mode, "compile cache hit");
                return Ok(compiled.clone());
            }
        }
        debug!(fingerprint = %fingerprint.short(), ?mode, "compile cache miss");
        let compiled = Arc::new(compile(&self.objective, &self.constraints, mode)?);
        self.stats.compiles += 1;
        self.cache.insert(mode, compiled.clone());
        Ok(compiled)
    }

    /// Solve the problem as DCP with default settings.
    pub fn solve(&mut self) -> Result<Solution> {
        self.solve_with(SolveOptions::default())
    }

    /// Solve a DQCP problem by bisection with default settings.
    pub fn solve_qcp(&mut self) -> Result<Solution> {
        self.solve_with(SolveOptions::default().qcp(true))
    }

    /// Solve the problem with custom options.
    pub fn solve_with(&mut self, options: SolveOptions) -> Result<Solution> {
        self.solve_with_params(&ParamBindings::new(), &options)
    }

    /// Solve with values for the problem's parameters.
    pub fn solve_with_params(&mut self, bindings: &ParamBindings, options: &SolveOptions) -> Result<Solution> {
        self.check_bindings(bindings)?;
        let mode = if options.qcp && !self.is_dcp() {
            CompileMode::Dqcp
        } else {
            CompileMode::Dcp
        };
        let compiled = self.compile(mode)?;
        if compiled.bisection.is_some() {
            self.solve_bisection(&compiled, bindings, options)
        } else {
            self.solve_once(&compiled, bindings, options)
        }
    }

    /// Bound solver data for inspection.
    ///
    /// DQCP problems are bound as their feasibility program, without the threshold rows.
    pub fn problem_data(&mut self, bindings: &ParamBindings) -> Result<Binding> {
        self.check_bindings(bindings)?;
        let mode = if self.is_dcp() {
            CompileMode::Dcp
        } else {
            CompileMode::Dqcp
        };
        let compiled = self.compile(mode)?;
        compiled.bind(bindings, compiled.bisection.is_none())
    }

    fn check_bindings(&self, bindings: &ParamBindings) -> Result<()> {
        for p in self.parameters() {
            if bindings.get(p.id).is_none() {
                return Err(CvxError::InvalidProblem(format!(
                    "parameter {} has no value",
                    param_label(&p)
                )));
            }
        }
        Ok(())
    }

    fn solve_once(
        &self,
        compiled: &CompiledProblem,
        bindings: &ParamBindings,
        options: &SolveOptions,
    ) -> Result<Solution> {
        let solved = compiled.solve_with_params(bindings, &options.settings)?;
        let raw = &solved.raw;
        if raw.status == SolveStatus::Error {
            return Err(CvxError::SolverError(format!(
                "Solver failed with status {}",
                raw.solver_status
            )));
        }
        let recovered = unpack(&compiled.inverse_stack, &solved, None)?;
        let mut solution = self.finish(recovered, raw.status, bindings)?;
        solution.solve_time = raw.solve_time;
        solution.iterations = raw.iterations;
        Ok(solution)
    }

    fn solve_bisection(
        &self,
        compiled: &CompiledProblem,
        bindings: &ParamBindings,
        options: &SolveOptions,
    ) -> Result<Solution> {
        let data = compiled
            .bisection
            .ok_or_else(|| CvxError::InvalidProblem("problem has no bisection threshold".into()))?;
        let flip = !self.objective.is_minimize();
        // The compiled objective is minimized; caller bounds refer to the original one.
        let interval = if flip {
            Interval::new(options.high.map(|h| -h), options.low.map(|l| -l))
        } else {
            Interval::new(options.low, options.high)
        };

        let mut oracle = ThresholdOracle {
            compiled,
            env: bindings.clone(),
            threshold: data.threshold,
            settings: &options.settings,
            solve_time: 0.0,
            iterations: 0,
        };
        let outcome = bisect(
            &mut oracle,
            interval,
            &data.tightening,
            options.max_iters,
            &options.bisection,
        )?;
        let (solve_time, iterations) = (oracle.solve_time, oracle.iterations);

        let sense = if flip { -1.0 } else { 1.0 };
        let mut solution = match outcome {
            BisectionOutcome::Converged {
                low,
                high,
                point,
                iterations,
            } => {
                let midpoint = (low + high) / 2.0;
                debug!(low, high, iterations, "bisection converged");
                let recovered = unpack(&compiled.inverse_stack, &point, Some(midpoint))?;
                let mut solution = self.finish(recovered, SolveStatus::Optimal, &oracle.env)?;
                solution.bisection_iterations = Some(iterations);
                solution
            }
            BisectionOutcome::Infeasible => {
                Solution::without_point(SolveStatus::Infeasible, Some(sense * f64::INFINITY))
            }
            BisectionOutcome::Unbounded => {
                Solution::without_point(SolveStatus::Unbounded, Some(-sense * f64::INFINITY))
            }
        };
        solution.solve_time = solve_time;
        solution.iterations = iterations;
        Ok(solution)
    }

    /// Attach residuals and parameter values to a recovered solution.
    fn finish(&self, recovered: Recovered, status: SolveStatus, bindings: &ParamBindings) -> Result<Solution> {
        let residuals = match &recovered.primal {
            Some(primal) => {
                let env = PointValues { primal, bindings };
                let values = self
                    .constraints
                    .iter()
                    .map(|c| c.violation(&env))
                    .collect::<Result<Vec<_>>>()?;
                Some(values)
            }
            None => None,
        };
        let mut solution = Solution::without_point(status, recovered.value);
        solution.primal = recovered.primal;
        solution.duals = recovered.duals;
        solution.residuals = residuals;
        solution.bindings = bindings.clone();
        Ok(solution)
    }
}

/// Feasibility of the lowered program at a threshold, one Clarabel solve per threshold.
struct ThresholdOracle<'a> {
    compiled: &'a CompiledProblem,
    env: ParamBindings,
    threshold: ExprId,
    settings: &'a Settings,
    solve_time: f64,
    iterations: u32,
}

impl ThresholdOracle<'_> {
    fn record(&mut self, solved: &ProgramSolution) {
        self.solve_time += solved.raw.solve_time;
        self.iterations += solved.raw.iterations;
    }

    fn classify(&mut self, solved: ProgramSolution) -> Result<Option<ProgramSolution>> {
        self.record(&solved);
        match solved.raw.status {
            SolveStatus::Optimal => Ok(Some(solved)),
            SolveStatus::Infeasible | SolveStatus::InfeasibleInaccurate => Ok(None),
            status => Err(CvxError::SolverError(format!(
                "Solver returned {} ({}) during bisection",
                status, solved.raw.solver_status
            ))),
        }
    }
}

impl FeasibilityOracle for ThresholdOracle<'_> {
    type Point = ProgramSolution;

    fn precheck(&mut self) -> Result<bool> {
        let solved = self.compiled.solve_bound(&self.env, self.settings, false)?;
        Ok(self.classify(solved)?.is_some())
    }

    fn solve_at(&mut self, t: f64) -> Result<Option<ProgramSolution>> {
        self.env.set_raw(self.threshold, DMatrix::from_element(1, 1, t));
        let solved = self.compiled.solve_bound(&self.env, self.settings, true)?;
        // Near the optimal threshold the feasible set can collapse to a point and Clarabel
        // stalls without a certificate. Feasibility is unproven there, so the threshold is
        // treated as infeasible and the best point found so far is kept.
        if solved.raw.status == SolveStatus::Error {
            self.record(&solved);
            warn!(
                threshold = t,
                solver_status = %solved.raw.solver_status,
                "inconclusive threshold treated as infeasible"
            );
            return Ok(None);
        }
        self.classify(solved)
    }
}

/// Builder for constructing problems.
#[derive(Debug, Clone)]
pub struct ProblemBuilder {
    objective: Objective,
    constraints: Vec<Constraint>,
}

impl ProblemBuilder {
    /// Add constraints to the problem.
    pub fn subject_to(mut self, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    /// Add a single constraint.
    pub fn constraint(mut self, c: Constraint) -> Self {
        self.constraints.push(c);
        self
    }

    /// Build the problem.
    pub fn build(self) -> Problem {
        Problem::new(self.objective, self.constraints)
    }

    /// Build and solve the problem with default settings.
    pub fn solve(self) -> Result<Solution> {
        self.build().solve()
    }

    /// Build and solve a DQCP problem by bisection.
    pub fn solve_qcp(self) -> Result<Solution> {
        self.build().solve_qcp()
    }

    /// Build and solve the problem with custom options.
    pub fn solve_with(self, options: SolveOptions) -> Result<Solution> {
        self.build().solve_with(options)
    }
}
