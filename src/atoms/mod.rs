//! Atom functions for building expressions.
//!
//! Atoms are the building blocks of optimization problems. They include:
//!
//! - **Affine atoms**: Operations that preserve linearity (add, mul, sum, index, etc.)
//! - **Nonlinear atoms**: Operations with specific curvature (norms, exp, powers, etc.)
//! - **Quasi atoms**: Quasiconvex/quasiconcave operations (ceil, floor, sign, length, ratios)

pub mod affine;
pub mod nonlinear;
pub mod quasi;

pub use affine::{dot, index, matmul, slice, sum};

pub use nonlinear::{
    abs, exp, inv_pos, log, logistic, max2, max_entries, maximum, min2, min_entries, minimum,
    neg_part, norm2, pos, power, sqrt, sum_squares,
};

pub use quasi::{ceil, dist_ratio, floor, length, lin_frac, sign};
