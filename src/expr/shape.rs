//! Shape representation for expressions.
//!
//! Shapes follow NumPy conventions:
//! - `()` is a scalar
//! - `(n,)` is a vector of length n
//! - `(m, n)` is an m x n matrix
//!
//! Values are flattened in column-major order everywhere in the crate.

use std::fmt;

/// Shape of an expression.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Create a scalar shape.
    pub fn scalar() -> Self {
        Shape(vec![])
    }

    /// Create a vector shape.
    pub fn vector(n: usize) -> Self {
        Shape(vec![n])
    }

    /// Create a matrix shape.
    pub fn matrix(m: usize, n: usize) -> Self {
        Shape(vec![m, n])
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.0.iter().product::<usize>()
    }

    /// Number of dimensions (0 for scalar, 1 for vector, 2 for matrix).
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// A scalar, or any shape holding exactly one element.
    pub fn is_scalar(&self) -> bool {
        self.size() == 1
    }

    pub fn is_vector(&self) -> bool {
        self.0.len() == 1
    }

    /// Number of rows (1 for scalar, n for vector, m for matrix).
    pub fn rows(&self) -> usize {
        self.0.first().copied().unwrap_or(1)
    }

    /// Number of columns (1 for scalar and vector).
    pub fn cols(&self) -> usize {
        self.0.get(1).copied().unwrap_or(1)
    }

    /// Result shape of an elementwise operation.
    ///
    /// Only scalar broadcasting is supported: equal shapes combine, and a single-element
    /// operand stretches to the other operand.
    pub fn broadcast(&self, other: &Shape) -> Option<Shape> {
        if self == other {
            Some(self.clone())
        } else if self.is_scalar() {
            Some(other.clone())
        } else if other.is_scalar() {
            Some(self.clone())
        } else {
            None
        }
    }

    /// Result shape of `self @ other`.
    pub fn matmul(&self, other: &Shape) -> Option<Shape> {
        match (self.ndim(), other.ndim()) {
            (2, 2) if self.cols() == other.rows() => {
                Some(Shape::matrix(self.rows(), other.cols()))
            }
            (2, 1) if self.cols() == other.rows() => Some(Shape::vector(self.rows())),
            (1, 1) if self.rows() == other.rows() => Some(Shape::scalar()),
            _ => None,
        }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({:?})", self.0)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "()"),
            [n] => write!(f, "({},)", n),
            dims => {
                let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Shape::scalar()
    }
}

impl From<usize> for Shape {
    fn from(n: usize) -> Self {
        Shape::vector(n)
    }
}

impl From<(usize, usize)> for Shape {
    fn from((m, n): (usize, usize)) -> Self {
        Shape::matrix(m, n)
    }
}
