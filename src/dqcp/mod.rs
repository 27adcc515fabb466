//! Disciplined quasiconvex programming.
//!
//! A DQCP problem minimizes a quasiconvex objective over DCP and quasiconvex constraints. It is
//! solved by lowering every quasi atom into convex constraints over a threshold `t` and
//! bisecting on `t`:
//!
//! - [`Lowering`] rewrites `f(x) <= t` into DCP constraints, inverting monotone atoms and
//!   emitting sublevel sets for the rest
//! - [`bisect`] drives the search for the smallest feasible `t`
//! - [`Tightening`] snaps bisection bounds when the objective is integer-valued or signed

pub mod bisection;
pub mod inverse;
pub mod lower;
mod sets;
pub mod tighten;

pub use bisection::{bisect, BisectionOutcome, BisectionSettings, FeasibilityOracle, Interval, Phase};
pub use inverse::{InverseFn, STRICT_DELTA};
pub use lower::{LoweredConstraint, Lowering};
pub use tighten::Tightening;
