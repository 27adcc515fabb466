//! # cvxqcp
//!
//! Disciplined convex and quasiconvex programming in Rust.
//!
//! cvxqcp builds optimization problems as expression graphs, checks them against the DCP and
//! DQCP rulesets, compiles them into conic programs and solves them with Clarabel. Quasiconvex
//! problems are solved by bisection over a threshold on the objective, reusing one compiled
//! program for every threshold.
//!
//! ## Quick Start
//!
//! ```
//! use cvxqcp::prelude::*;
//!
//! let x = variable(());
//! let mut problem = Problem::minimize(ceil(&x))
//!     .subject_to([x.geq(12.0), x.leq(17.0)])
//!     .build();
//!
//! assert!(!problem.is_dcp());
//! assert!(problem.is_dqcp());
//!
//! let solution = problem.solve_qcp().unwrap();
//! assert!((solution.value.unwrap() - 12.0).abs() < 1e-6);
//! ```
//!
//! ## Rules
//!
//! - **Minimization** requires a **convex** objective (DCP) or a **quasiconvex** one (DQCP)
//! - **Maximization** requires a **concave** objective (DCP) or a **quasiconcave** one (DQCP)
//! - **Equality constraints** require **affine** expressions
//! - **Inequality constraints** `f <= g` require convex `f` and concave `g`; under DQCP also a
//!   quasiconvex `f` against a constant, or a constant against a quasiconcave `g`
//!
//! ## Supported Atoms
//!
//! ### Affine
//! - Arithmetic: `+`, `-`, `*` and `/` by constants or parameters
//! - Aggregation and indexing: `sum`, `index`, `slice`
//! - Linear algebra: `matmul`, `dot`
//!
//! ### Convex and concave
//! - `abs`, `pos`, `neg_part`, `norm2`, `sum_squares`, `exp`, `logistic`, `inv_pos`
//! - `maximum`, `max2`, `max_entries` (convex); `minimum`, `min2`, `min_entries` (concave)
//! - `log`, `sqrt`, and `power` with exponent in `(0, 1)` (concave)
//!
//! ### Quasi
//! - `ceil`, `floor`, `sign` (quasilinear)
//! - `length`, `dist_ratio` (quasiconvex)
//! - Products and ratios of non-constant expressions, `lin_frac`
//!
//! ## Architecture
//!
//! - **Expression graphs** built using the `Expr` enum with `Arc` sharing
//! - **Curvature analysis** memoized per node, including quasiconvexity
//! - **Reduction chain** `FlipObjective`, `Dqcp2Dcp`, `ConeStuffing` with an inverse stack
//! - **Compiled-problem cache** keyed by a SHA-256 structural fingerprint
//! - **Bisection** over the threshold parameter, one Clarabel solve per threshold

pub mod atoms;
pub mod canon;
pub mod constraints;
pub mod dcp;
pub mod dqcp;
pub mod error;
pub mod expr;
pub mod problem;
pub mod reductions;
pub mod solver;
pub mod sparse;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use cvxqcp::prelude::*;
/// ```
pub mod prelude {
    // Expression types
    pub use crate::expr::{
        constant, constant_dmatrix, constant_matrix, constant_vec, eye, nonneg_variable,
        nonpos_variable, ones, parameter, variable, zeros, Array, Expr, ExprId, IntoConstant,
        ParamBindings, ParameterBuilder, Shape, VariableBuilder, VariableExt,
    };

    // Atoms
    pub use crate::atoms::{
        abs, ceil, dist_ratio, dot, exp, floor, index, inv_pos, length, lin_frac, log, logistic,
        matmul, max2, max_entries, maximum, min2, min_entries, minimum, neg_part, norm2, pos,
        power, sign, slice, sqrt, sum, sum_squares,
    };

    // Constraints
    pub use crate::constraint;
    pub use crate::constraints::{Constraint, ConstraintExt};

    // Analysis
    pub use crate::dcp::{Curvature, Sign};

    // Problem
    pub use crate::dqcp::BisectionSettings;
    pub use crate::problem::{CacheStats, Objective, Problem, ProblemBuilder, SolveOptions};

    // Solver
    pub use crate::solver::{Settings, Solution, SolveStatus};

    // Errors
    pub use crate::error::{CvxError, Result};
}

// Re-export main types at crate root
pub use error::{CvxError, Result};
pub use problem::{Problem, SolveOptions};
pub use solver::{Solution, SolveStatus};
