//! Expression types and creation utilities.
//!
//! This module provides the core expression types for building optimization problems:
//! - `Expr` - The main expression enum representing all expressions
//! - `Shape` - Shape information for expressions
//! - Variable creation via `variable()` and `VariableBuilder`
//! - Parameter creation via `parameter()` and values via `ParamBindings`
//! - Constant creation via `constant()` and related functions
//! - Numeric evaluation via `Expr::evaluate`

pub mod constant;
pub mod eval;
pub mod expression;
pub mod parameter;
pub mod shape;
pub mod variable;

pub use constant::{
    constant, constant_dmatrix, constant_matrix, constant_vec, eye, ones, zeros, IntoConstant,
};
pub use expression::{Array, ConstantData, Expr, ExprId, IndexSpec, ParameterData, VariableData};
pub use parameter::{parameter, ParamBindings, ParameterBuilder, ValueSource};
pub use shape::Shape;
pub use variable::{nonneg_variable, nonpos_variable, variable, VariableBuilder, VariableExt};
