//! Constant expression creation.

use nalgebra::{DMatrix, DVector};

use super::expression::{Array, ConstantData, Expr, ExprId};
use super::shape::Shape;

fn from_array(value: Array) -> Expr {
    Expr::Constant(ConstantData {
        id: ExprId::new(),
        value,
    })
}

/// Create a constant expression from a scalar.
pub fn constant(value: f64) -> Expr {
    from_array(Array::Scalar(value))
}

/// Create a constant vector expression.
pub fn constant_vec(values: Vec<f64>) -> Expr {
    from_array(Array::Vector(DVector::from_vec(values)))
}

/// Create a constant matrix from row-major values.
pub fn constant_matrix(values: &[f64], rows: usize, cols: usize) -> Expr {
    from_array(Array::Matrix(DMatrix::from_row_slice(rows, cols, values)))
}

/// Create a constant expression from a nalgebra DMatrix.
pub fn constant_dmatrix(matrix: DMatrix<f64>) -> Expr {
    from_array(Array::Matrix(matrix))
}

fn filled(shape: Shape, value: f64) -> Expr {
    let array = match shape.ndim() {
        0 => Array::Scalar(value),
        1 => Array::Vector(DVector::from_element(shape.rows(), value)),
        _ => Array::Matrix(DMatrix::from_element(shape.rows(), shape.cols(), value)),
    };
    from_array(array)
}

/// Create a zero constant with the given shape.
pub fn zeros(shape: impl Into<Shape>) -> Expr {
    filled(shape.into(), 0.0)
}

/// Create a ones constant with the given shape.
pub fn ones(shape: impl Into<Shape>) -> Expr {
    filled(shape.into(), 1.0)
}

/// Create an identity matrix constant.
pub fn eye(n: usize) -> Expr {
    from_array(Array::Matrix(DMatrix::identity(n, n)))
}

/// Conversion of plain numeric data into constant expressions.
pub trait IntoConstant {
    fn into_constant(self) -> Expr;
}

impl IntoConstant for f64 {
    fn into_constant(self) -> Expr {
        constant(self)
    }
}

impl IntoConstant for Vec<f64> {
    fn into_constant(self) -> Expr {
        constant_vec(self)
    }
}

impl IntoConstant for &[f64] {
    fn into_constant(self) -> Expr {
        constant_vec(self.to_vec())
    }
}

impl IntoConstant for DMatrix<f64> {
    fn into_constant(self) -> Expr {
        constant_dmatrix(self)
    }
}

impl IntoConstant for Array {
    fn into_constant(self) -> Expr {
        from_array(self)
    }
}
