//! Constraints and their DCP/DQCP classification.

pub mod constraint;

pub use constraint::{Constraint, ConstraintExt};
