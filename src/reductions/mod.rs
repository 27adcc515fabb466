//! The reduction chain from a user problem to a bound cone program.
//!
//! A problem is compiled once per [`CompileMode`]:
//!
//! 1. `FlipObjective` turns a maximization into a minimization of the negated objective
//! 2. `Dqcp2Dcp` (DQCP mode only) lowers quasi atoms into DCP constraints over a threshold
//!    parameter
//! 3. `ConeStuffing` canonicalizes every DCP constraint into tagged cones
//!
//! Each applied reduction leaves an [`InverseData`] entry; [`unpack`] walks them in reverse to
//! map a solver result back to the user's variables. The compiled problem keeps parameters
//! symbolic, so solving again with new values only rebinds numbers.

pub mod fingerprint;
pub mod unpack;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::canon::{CanonContext, CanonExpr, ParamAffine, Source, TaggedCone};
use crate::constraints::Constraint;
use crate::dqcp::{Lowering, Tightening};
use crate::error::{CvxError, Result};
use crate::expr::{Expr, ExprId, ParameterBuilder, ValueSource, VariableData};
use crate::problem::Objective;
use crate::solver::{self, Binding, RawSolution, Settings, SolveStatus, VariableMap};

pub use fingerprint::{fingerprint, Fingerprint};
pub use unpack::{unpack, Recovered};

/// How a problem is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileMode {
    /// Solved by one conic solve.
    Dcp,
    /// Lowered over a threshold and solved by bisection.
    Dqcp,
}

/// One step of the reduction chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    FlipObjective,
    Dqcp2Dcp,
    ConeStuffing,
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reduction::FlipObjective => "FlipObjective",
            Reduction::Dqcp2Dcp => "Dqcp2Dcp",
            Reduction::ConeStuffing => "ConeStuffing",
        };
        f.write_str(s)
    }
}

/// What a reduction needs to map a solution back.
#[derive(Debug, Clone)]
pub enum InverseData {
    /// Negate the objective value.
    FlipObjective,
    /// Report the bisection midpoint and keep only the user's variables.
    Dqcp2Dcp {
        threshold: Option<ExprId>,
        variables: Vec<ExprId>,
    },
    /// Slice the solver vector per variable and route duals to user constraints.
    ConeStuffing {
        var_map: VariableMap,
        variables: Vec<VariableData>,
        /// Index of the cone holding each user constraint's own rows.
        primary_cones: Vec<Option<usize>>,
    },
}

/// A canonicalized program whose parameters are still symbolic.
#[derive(Debug, Clone)]
pub struct ConeProgram {
    pub objective: CanonExpr,
    pub cones: Vec<TaggedCone>,
    /// User variables first, then auxiliary variables, in column order.
    pub variables: Vec<VariableData>,
    pub var_map: VariableMap,
}

/// The threshold parameter of a lowered DQCP program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BisectionData {
    pub threshold: ExprId,
    pub tightening: Tightening,
}

/// Result of one bind-and-solve of a compiled program.
#[derive(Debug, Clone)]
pub struct ProgramSolution {
    pub raw: RawSolution,
    /// Rows of the stuffed program per cone, empty when nothing was stuffed.
    pub cone_rows: Vec<Vec<usize>>,
}

/// A problem compiled for one mode.
#[derive(Debug, Clone)]
pub struct CompiledProblem {
    pub mode: CompileMode,
    pub fingerprint: Fingerprint,
    pub chain: Vec<Reduction>,
    pub program: ConeProgram,
    pub inverse_stack: Vec<InverseData>,
    /// Present when the objective is lowered over a threshold.
    pub bisection: Option<BisectionData>,
}

impl CompiledProblem {
    /// Bind parameter values and stuff the program.
    pub fn bind(&self, env: &dyn ValueSource, objective_rows: bool) -> Result<Binding> {
        solver::bind(&self.program, env, objective_rows)
    }

    /// Bind parameter values, then solve. Infeasible constant rows short-circuit the solver.
    pub fn solve_with_params(&self, env: &dyn ValueSource, settings: &Settings) -> Result<ProgramSolution> {
        self.solve_bound(env, settings, true)
    }

    pub(crate) fn solve_bound(
        &self,
        env: &dyn ValueSource,
        settings: &Settings,
        objective_rows: bool,
    ) -> Result<ProgramSolution> {
        match self.bind(env, objective_rows)? {
            Binding::Ready(stuffed) => {
                let raw = solver::solve(&stuffed, settings)?;
                Ok(ProgramSolution {
                    raw,
                    cone_rows: stuffed.cone_rows,
                })
            }
            Binding::Infeasible(reason) => {
                debug!(%reason, "bound program is infeasible");
                Ok(ProgramSolution {
                    raw: RawSolution {
                        status: SolveStatus::Infeasible,
                        x: Vec::new(),
                        z: Vec::new(),
                        objective: None,
                        solver_status: reason,
                        solve_time: 0.0,
                        iterations: 0,
                    },
                    cone_rows: Vec::new(),
                })
            }
        }
    }
}

/// Whether the objective and every constraint follow the DCP rules.
pub fn is_dcp(objective: &Objective, constraints: &[Constraint]) -> bool {
    let objective_ok = match objective {
        Objective::Minimize(e) => e.is_convex(),
        Objective::Maximize(e) => e.is_concave(),
    };
    objective_ok && constraints.iter().all(Constraint::is_dcp)
}

/// Whether the objective and every constraint follow the DQCP rules.
pub fn is_dqcp(objective: &Objective, constraints: &[Constraint]) -> bool {
    let objective_ok = match objective {
        Objective::Minimize(e) => e.is_quasiconvex(),
        Objective::Maximize(e) => e.is_quasiconcave(),
    };
    objective_ok && constraints.iter().all(Constraint::is_dqcp)
}

/// Run the reduction chain for `mode`.
pub fn compile(objective: &Objective, constraints: &[Constraint], mode: CompileMode) -> Result<CompiledProblem> {
    let fingerprint = fingerprint(objective, constraints);
    check_shapes(objective, constraints)?;

    match mode {
        CompileMode::Dcp if !is_dcp(objective, constraints) => {
            let mut message = dcp_violation_message(objective, constraints);
            if is_dqcp(objective, constraints) {
                message.push_str(
                    ". However, the problem does follow DQCP rules; solve it with qcp enabled",
                );
            }
            return Err(CvxError::NotDcp(message));
        }
        CompileMode::Dqcp if !is_dqcp(objective, constraints) => {
            return Err(CvxError::NotDqcp(dqcp_violation_message(objective, constraints)));
        }
        _ => {}
    }

    let mut chain = Vec::new();
    let mut inverse_stack = Vec::new();

    let f = match objective {
        Objective::Minimize(e) => e.clone(),
        Objective::Maximize(e) => {
            chain.push(Reduction::FlipObjective);
            inverse_stack.push(InverseData::FlipObjective);
            Arc::new(Expr::Neg(e.clone()))
        }
    };

    let mut user_vars = Vec::new();
    let mut seen = HashSet::new();
    collect_variables(&f, &mut seen, &mut user_vars);
    for c in constraints {
        for e in c.expressions() {
            collect_variables(e, &mut seen, &mut user_vars);
        }
    }

    let mut ctx = CanonContext::new();
    let mut primary_cones = vec![None; constraints.len()];
    let mut lowered_vars = Vec::new();
    let mut bisection = None;

    let canon_objective = match mode {
        CompileMode::Dcp => {
            for (i, c) in constraints.iter().enumerate() {
                ctx.set_scope(Source::Constraint(i), Vec::new());
                ctx.add_constraint(c)?;
                primary_cones[i] = ctx.cones.len().checked_sub(1);
            }
            ctx.set_scope(Source::Objective, Vec::new());
            ctx.canonicalize_objective(&f, true)?
        }
        CompileMode::Dqcp => {
            chain.push(Reduction::Dqcp2Dcp);
            let mut lowering = Lowering::new();
            for (i, c) in constraints.iter().enumerate() {
                lowering.lower_constraint(c, Source::Constraint(i))?;
            }

            // A variable-free objective needs no threshold: the lowered problem is solved once.
            let threshold = if lowering.facts(&f).is_constant() {
                None
            } else {
                let tightening = Tightening::for_objective(&f);
                let mut builder = ParameterBuilder::new(()).name("dqcp_threshold");
                if tightening.nonneg {
                    builder = builder.nonneg();
                } else if tightening.nonpos {
                    builder = builder.nonpos();
                }
                let t = Arc::new(builder.build());
                lowering.lower_objective(&f, t.clone())?;
                let id = t.parameter_id();
                if let Some(threshold) = id {
                    bisection = Some(BisectionData {
                        threshold,
                        tightening,
                    });
                }
                id
            };
            inverse_stack.push(InverseData::Dqcp2Dcp {
                threshold,
                variables: user_vars.iter().map(|v: &VariableData| v.id).collect(),
            });

            let lowered = lowering.finish();
            debug!(constraints = lowered.len(), "lowered quasi atoms");
            for l in &lowered {
                for e in l.constraint.expressions() {
                    collect_variables(e, &mut seen, &mut lowered_vars);
                }
                ctx.set_scope(l.source, l.guards.clone());
                ctx.add_constraint(&l.constraint)?;
                if let Source::Constraint(i) = l.source {
                    primary_cones[i] = ctx.cones.len().checked_sub(1);
                }
            }

            if threshold.is_some() {
                CanonExpr::Linear(ParamAffine::scalar(0.0))
            } else {
                ctx.set_scope(Source::Objective, Vec::new());
                ctx.canonicalize_objective(&f, true)?
            }
        }
    };

    chain.push(Reduction::ConeStuffing);
    let mut variables = user_vars;
    variables.extend(lowered_vars);
    variables.extend(ctx.aux_vars.iter().cloned());
    let var_map = VariableMap::from_data(&variables);
    inverse_stack.push(InverseData::ConeStuffing {
        var_map: var_map.clone(),
        variables: variables.clone(),
        primary_cones,
    });

    debug!(
        fingerprint = %fingerprint.short(),
        ?mode,
        chain = ?chain,
        cones = ctx.cones.len(),
        columns = var_map.total_vars,
        "compiled problem"
    );

    Ok(CompiledProblem {
        mode,
        fingerprint,
        chain,
        program: ConeProgram {
            objective: canon_objective,
            cones: ctx.cones,
            variables,
            var_map,
        },
        inverse_stack,
        bisection,
    })
}

fn collect_variables(expr: &Expr, seen: &mut HashSet<ExprId>, out: &mut Vec<VariableData>) {
    for v in expr.variable_data() {
        if seen.insert(v.id) {
            out.push(v);
        }
    }
}

fn check_shapes(objective: &Objective, constraints: &[Constraint]) -> Result<()> {
    let f = objective.expr();
    f.check_shapes()?;
    if !f.shape().is_scalar() {
        return Err(CvxError::ShapeMismatch {
            expected: "scalar objective".into(),
            got: f.shape().to_string(),
        });
    }
    for c in constraints {
        for e in c.expressions() {
            e.check_shapes()?;
        }
    }
    Ok(())
}

fn dcp_violation_message(objective: &Objective, constraints: &[Constraint]) -> String {
    let mut violations = Vec::new();

    match objective {
        Objective::Minimize(e) if !e.is_convex() => {
            violations.push(format!(
                "Objective has curvature {:?} but must be convex for minimization",
                e.curvature()
            ));
        }
        Objective::Maximize(e) if !e.is_concave() => {
            violations.push(format!(
                "Objective has curvature {:?} but must be concave for maximization",
                e.curvature()
            ));
        }
        _ => {}
    }

    for (i, c) in constraints.iter().enumerate() {
        if !c.is_dcp() {
            violations.push(format!("Constraint {} is not DCP", i));
        }
    }

    if violations.is_empty() {
        "Unknown DCP violation".into()
    } else {
        violations.join("; ")
    }
}

fn dqcp_violation_message(objective: &Objective, constraints: &[Constraint]) -> String {
    let mut violations = Vec::new();

    match objective {
        Objective::Minimize(e) if !e.is_quasiconvex() => {
            violations.push(format!(
                "Objective has curvature {:?} but must be quasiconvex for minimization",
                e.curvature()
            ));
        }
        Objective::Maximize(e) if !e.is_quasiconcave() => {
            violations.push(format!(
                "Objective has curvature {:?} but must be quasiconcave for maximization",
                e.curvature()
            ));
        }
        _ => {}
    }

    for (i, c) in constraints.iter().enumerate() {
        if !c.is_dqcp() {
            violations.push(format!("Constraint {} is not DQCP", i));
        }
    }

    if violations.is_empty() {
        "Unknown DQCP violation".into()
    } else {
        violations.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::*;
    use crate::constraints::ConstraintExt;
    use crate::expr::{nonneg_variable, variable, ParamBindings};

    fn minimize(e: Expr) -> Objective {
        Objective::Minimize(Arc::new(e))
    }

    #[test]
    fn test_dcp_chain() {
        let x = variable(3);
        let compiled = compile(&minimize(norm2(&x)), &[x.geq(1.0)], CompileMode::Dcp).unwrap();
        assert_eq!(compiled.chain, vec![Reduction::ConeStuffing]);
        assert!(compiled.bisection.is_none());
        // x plus the epigraph variable of the norm.
        assert_eq!(compiled.program.var_map.total_vars, 4);
        match compiled.inverse_stack.last() {
            Some(InverseData::ConeStuffing { primary_cones, .. }) => {
                assert_eq!(primary_cones, &vec![Some(0)]);
            }
            other => panic!("unexpected inverse data {:?}", other),
        }
    }

    #[test]
    fn test_dqcp_chain_with_flip() {
        let x = nonneg_variable(());
        let y = nonneg_variable(());
        let objective = Objective::Maximize(Arc::new(sqrt(&x) * sqrt(&y)));
        let constraints = [x.leq(4.0), y.leq(9.0)];
        let compiled = compile(&objective, &constraints, CompileMode::Dqcp).unwrap();
        assert_eq!(
            compiled.chain,
            vec![Reduction::FlipObjective, Reduction::Dqcp2Dcp, Reduction::ConeStuffing]
        );
        let data = compiled.bisection.unwrap();
        assert!(!data.tightening.integer);
        assert!(compiled
            .program
            .cones
            .iter()
            .any(|c| c.source == Source::Objective));
    }

    #[test]
    fn test_not_dcp_suggests_qcp() {
        let x = variable(());
        let err = compile(&minimize(ceil(&x)), &[x.geq(12.0)], CompileMode::Dcp).unwrap_err();
        match err {
            CvxError::NotDcp(message) => assert!(message.contains("DQCP")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_not_dqcp() {
        let x = variable(3);
        let err = compile(&minimize(sum(&sign(&x))), &[], CompileMode::Dqcp);
        assert!(matches!(err, Err(CvxError::NotDqcp(_))));
    }

    #[test]
    fn test_vector_objective_rejected() {
        let x = variable(3);
        let err = compile(&minimize(x.clone()), &[], CompileMode::Dcp);
        assert!(matches!(err, Err(CvxError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_constant_objective_has_no_threshold() {
        let x = variable(());
        let compiled = compile(&minimize(Expr::from(1.0)), &[ceil(&x).leq(2.0)], CompileMode::Dqcp).unwrap();
        assert!(compiled.bisection.is_none());
        let solved = compiled
            .solve_with_params(&ParamBindings::new(), &Settings::default())
            .unwrap();
        assert_eq!(solved.raw.status, SolveStatus::Optimal);
    }

    #[test]
    fn test_infeasible_binding_skips_solver() {
        let x = variable(());
        let compiled = compile(
            &minimize(x.clone()),
            &[Expr::from(1.0).leq(0.0), x.geq(0.0)],
            CompileMode::Dcp,
        )
        .unwrap();
        let solved = compiled
            .solve_with_params(&ParamBindings::new(), &Settings::default())
            .unwrap();
        assert_eq!(solved.raw.status, SolveStatus::Infeasible);
        assert_eq!(solved.raw.iterations, 0);
    }
}
