//! Variable creation with builder pattern.

use super::expression::{Expr, ExprId, VariableData};
use super::shape::Shape;

/// Builder for creating variables with various attributes.
#[derive(Default)]
pub struct VariableBuilder {
    shape: Shape,
    name: Option<String>,
    nonneg: bool,
    nonpos: bool,
}

impl VariableBuilder {
    /// Create a new variable builder with the given shape.
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            ..Default::default()
        }
    }

    /// Create a scalar variable builder.
    pub fn scalar() -> Self {
        Self::new(Shape::scalar())
    }

    /// Create a vector variable builder.
    pub fn vector(n: usize) -> Self {
        Self::new(Shape::vector(n))
    }

    /// Set the name of the variable.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Constrain the variable to be non-negative (x >= 0).
    pub fn nonneg(mut self) -> Self {
        self.nonneg = true;
        self.nonpos = false;
        self
    }

    /// Constrain the variable to be non-positive (x <= 0).
    pub fn nonpos(mut self) -> Self {
        self.nonpos = true;
        self.nonneg = false;
        self
    }

    /// Build the variable expression.
    pub fn build(self) -> Expr {
        Expr::Variable(VariableData {
            id: ExprId::new(),
            shape: self.shape,
            name: self.name,
            nonneg: self.nonneg,
            nonpos: self.nonpos,
        })
    }
}

/// Create a variable with the given shape.
///
/// # Examples
///
/// ```
/// use cvxqcp::expr::variable;
///
/// let x = variable(());      // scalar
/// let y = variable(5);       // vector
/// let z = variable((3, 4));  // matrix
/// ```
pub fn variable(shape: impl Into<Shape>) -> Expr {
    VariableBuilder::new(shape).build()
}

/// Create a non-negative variable with the given shape.
pub fn nonneg_variable(shape: impl Into<Shape>) -> Expr {
    VariableBuilder::new(shape).nonneg().build()
}

/// Create a non-positive variable with the given shape.
pub fn nonpos_variable(shape: impl Into<Shape>) -> Expr {
    VariableBuilder::new(shape).nonpos().build()
}

/// Attach sign attributes and names to leaves after construction.
///
/// Applies to variables and parameters; any other expression is returned unchanged.
pub trait VariableExt {
    /// Mark the leaf as non-negative.
    fn nonneg(self) -> Expr;

    /// Mark the leaf as non-positive.
    fn nonpos(self) -> Expr;

    /// Give the leaf a display name.
    fn named(self, name: impl Into<String>) -> Expr;
}

impl VariableExt for Expr {
    fn nonneg(self) -> Expr {
        match self {
            Expr::Variable(mut v) => {
                v.nonneg = true;
                v.nonpos = false;
                Expr::Variable(v)
            }
            Expr::Parameter(mut p) => {
                p.nonneg = true;
                p.nonpos = false;
                Expr::Parameter(p)
            }
            other => other,
        }
    }

    fn nonpos(self) -> Expr {
        match self {
            Expr::Variable(mut v) => {
                v.nonpos = true;
                v.nonneg = false;
                Expr::Variable(v)
            }
            Expr::Parameter(mut p) => {
                p.nonpos = true;
                p.nonneg = false;
                Expr::Parameter(p)
            }
            other => other,
        }
    }

    fn named(self, name: impl Into<String>) -> Expr {
        match self {
            Expr::Variable(mut v) => {
                v.name = Some(name.into());
                Expr::Variable(v)
            }
            Expr::Parameter(mut p) => {
                p.name = Some(name.into());
                Expr::Parameter(p)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parameter;

    #[test]
    fn test_variable_builder() {
        let x = VariableBuilder::vector(5).name("x").nonneg().build();

        if let Expr::Variable(v) = &x {
            assert_eq!(v.shape, Shape::vector(5));
            assert_eq!(v.name.as_deref(), Some("x"));
            assert!(v.nonneg);
            assert!(!v.nonpos);
        } else {
            panic!("Expected Variable");
        }
    }

    #[test]
    fn test_nonpos_overrides_nonneg() {
        let x = VariableBuilder::scalar().nonneg().nonpos().build();
        if let Expr::Variable(v) = &x {
            assert!(v.nonpos);
            assert!(!v.nonneg);
        } else {
            panic!("Expected Variable");
        }
    }

    #[test]
    fn test_ext_on_parameter() {
        let p = parameter(()).nonneg().named("gamma");
        if let Expr::Parameter(p) = &p {
            assert!(p.nonneg);
            assert_eq!(p.name.as_deref(), Some("gamma"));
        } else {
            panic!("Expected Parameter");
        }
    }
}
