//! Canonicalization transforms expressions into standard form.
//!
//! This module converts DCP expressions into:
//! - Parametric affine expressions (ParamAffine) for affine parts
//! - Quadratic expressions (QuadExpr) for QP objectives
//! - Tagged cone constraints (TaggedCone) for nonlinear atoms

pub mod canonicalizer;
pub mod cone;
pub mod lin_expr;
pub mod param_affine;

pub use canonicalizer::{CanonContext, CanonExpr};
pub use cone::{ConeConstraint, Guard, GuardOp, Source, TaggedCone};
pub use lin_expr::{LinExpr, QuadExpr};
pub use param_affine::ParamAffine;
