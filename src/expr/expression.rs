//! Core expression types for cvxqcp.
//!
//! The `Expr` enum represents all possible expressions. Expressions form an immutable DAG
//! using `Arc` for sharing: a subexpression may be referenced by many parents and is never
//! deep-copied by analysis or canonicalization.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use super::shape::Shape;
use crate::dqcp::InverseFn;
use crate::error::{CvxError, Result};

/// Unique identifier for variables, parameters and constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u64);

impl ExprId {
    /// Generate a new unique ID.
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        ExprId(NEXT_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ExprId {
    fn default() -> Self {
        Self::new()
    }
}

/// Dense numeric value of a constant, parameter binding or solution entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Scalar(f64),
    Vector(DVector<f64>),
    Matrix(DMatrix<f64>),
}

impl Array {
    /// Get the shape of the array.
    pub fn shape(&self) -> Shape {
        match self {
            Array::Scalar(_) => Shape::scalar(),
            Array::Vector(v) => Shape::vector(v.len()),
            Array::Matrix(m) => Shape::matrix(m.nrows(), m.ncols()),
        }
    }

    /// Get the total number of elements.
    pub fn size(&self) -> usize {
        match self {
            Array::Scalar(_) => 1,
            Array::Vector(v) => v.len(),
            Array::Matrix(m) => m.len(),
        }
    }

    /// The value if the array holds exactly one element.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Array::Scalar(v) => Some(*v),
            Array::Vector(v) if v.len() == 1 => Some(v[0]),
            Array::Matrix(m) if m.len() == 1 => Some(m[(0, 0)]),
            _ => None,
        }
    }

    /// Column-major elements.
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Array::Scalar(v) => std::slice::from_ref(v),
            Array::Vector(v) => v.as_slice(),
            Array::Matrix(m) => m.as_slice(),
        }
    }

    /// Check if all elements are non-negative.
    pub fn is_nonneg(&self) -> bool {
        self.as_slice().iter().all(|&v| v >= 0.0)
    }

    /// Check if all elements are non-positive.
    pub fn is_nonpos(&self) -> bool {
        self.as_slice().iter().all(|&v| v <= 0.0)
    }

    /// The value as a `rows x cols` matrix (vectors become a single column).
    pub fn to_matrix(&self) -> DMatrix<f64> {
        match self {
            Array::Scalar(v) => DMatrix::from_element(1, 1, *v),
            Array::Vector(v) => DMatrix::from_column_slice(v.len(), 1, v.as_slice()),
            Array::Matrix(m) => m.clone(),
        }
    }

    /// Rebuild an array of `shape` from a column-major matrix of the same size.
    pub fn from_matrix(values: &DMatrix<f64>, shape: &Shape) -> Self {
        match shape.ndim() {
            0 => Array::Scalar(values.as_slice().first().copied().unwrap_or(0.0)),
            1 => Array::Vector(DVector::from_column_slice(values.as_slice())),
            _ => Array::Matrix(DMatrix::from_column_slice(
                shape.rows(),
                shape.cols(),
                values.as_slice(),
            )),
        }
    }
}

impl From<f64> for Array {
    fn from(v: f64) -> Self {
        Array::Scalar(v)
    }
}

impl From<Vec<f64>> for Array {
    fn from(v: Vec<f64>) -> Self {
        Array::Vector(DVector::from_vec(v))
    }
}

impl From<DVector<f64>> for Array {
    fn from(v: DVector<f64>) -> Self {
        Array::Vector(v)
    }
}

impl From<DMatrix<f64>> for Array {
    fn from(m: DMatrix<f64>) -> Self {
        Array::Matrix(m)
    }
}

/// Data for a variable expression.
#[derive(Debug, Clone)]
pub struct VariableData {
    /// Unique identifier.
    pub id: ExprId,
    /// Shape of the variable.
    pub shape: Shape,
    /// Optional name for display.
    pub name: Option<String>,
    /// Variable is constrained to be non-negative.
    pub nonneg: bool,
    /// Variable is constrained to be non-positive.
    pub nonpos: bool,
}

/// Data for a parameter expression.
///
/// A parameter has no value of its own. Values are supplied per solve through
/// [`ParamBindings`](super::ParamBindings).
#[derive(Debug, Clone)]
pub struct ParameterData {
    pub id: ExprId,
    pub shape: Shape,
    pub name: Option<String>,
    /// Every bound value must be non-negative.
    pub nonneg: bool,
    /// Every bound value must be non-positive.
    pub nonpos: bool,
}

/// Data for a constant expression.
#[derive(Debug, Clone)]
pub struct ConstantData {
    /// Unique identifier.
    pub id: ExprId,
    /// The constant value.
    pub value: Array,
}

impl ConstantData {
    /// Get the shape of the constant.
    pub fn shape(&self) -> Shape {
        self.value.shape()
    }
}

/// Indexing into the column-major flattening of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexSpec {
    /// A single element; the result is a scalar.
    Element(usize),
    /// Elements `start..stop`; the result is a vector.
    Range { start: usize, stop: usize },
}

impl IndexSpec {
    pub fn element(i: usize) -> Self {
        IndexSpec::Element(i)
    }

    pub fn range(start: usize, stop: usize) -> Self {
        IndexSpec::Range { start, stop }
    }

    /// Flat positions selected by this index.
    pub fn positions(&self) -> std::ops::Range<usize> {
        match *self {
            IndexSpec::Element(i) => i..i + 1,
            IndexSpec::Range { start, stop } => start..stop.max(start),
        }
    }
}

/// The core expression type - an algebraic data type.
///
/// All expressions are immutable and use `Arc` for efficient sharing.
#[derive(Debug, Clone)]
pub enum Expr {
    // ========== Leaf nodes ==========
    /// A decision variable.
    Variable(VariableData),
    /// A constant value.
    Constant(ConstantData),
    /// A parameter whose value is bound at solve time.
    Parameter(ParameterData),

    // ========== Affine atoms ==========
    /// Addition: a + b
    Add(Arc<Expr>, Arc<Expr>),
    /// Negation: -a
    Neg(Arc<Expr>),
    /// Elementwise product: a * b. Affine when one side is constant.
    Mul(Arc<Expr>, Arc<Expr>),
    /// Elementwise ratio: a / b. Affine when the denominator is constant.
    Div(Arc<Expr>, Arc<Expr>),
    /// Sum of all entries.
    Sum(Arc<Expr>),
    /// Indexing/slicing.
    Index(Arc<Expr>, IndexSpec),
    /// Matrix-vector or matrix-matrix multiplication.
    MatMul(Arc<Expr>, Arc<Expr>),

    // ========== Convex and concave atoms ==========
    /// Absolute value (elementwise).
    Abs(Arc<Expr>),
    /// Positive part: max(x, 0) (elementwise).
    Pos(Arc<Expr>),
    /// Negative part: max(-x, 0) (elementwise).
    NegPart(Arc<Expr>),
    /// Elementwise maximum of expressions.
    Maximum(Vec<Arc<Expr>>),
    /// Elementwise minimum of expressions.
    Minimum(Vec<Arc<Expr>>),
    /// Largest entry.
    MaxEntries(Arc<Expr>),
    /// Smallest entry.
    MinEntries(Arc<Expr>),
    /// L2 norm: ||x||_2
    Norm2(Arc<Expr>),
    /// Sum of squares: ||x||_2^2
    SumSquares(Arc<Expr>),
    /// Exponential: exp(x) (elementwise).
    Exp(Arc<Expr>),
    /// Natural logarithm: log(x) (elementwise).
    Log(Arc<Expr>),
    /// Logistic: log(1 + exp(x)) (elementwise).
    Logistic(Arc<Expr>),
    /// Power: x^p (elementwise).
    Power(Arc<Expr>, f64),

    // ========== Quasi atoms ==========
    /// Ceiling (elementwise).
    Ceil(Arc<Expr>),
    /// Floor (elementwise).
    Floor(Arc<Expr>),
    /// Sign of a scalar.
    Sign(Arc<Expr>),
    /// One plus the index of the last nonzero entry of a vector.
    Length(Arc<Expr>),
    /// ||x - a||_2 / ||x - b||_2 with constant a and b.
    DistRatio(Arc<Expr>, Arc<Expr>, Arc<Expr>),

    /// Inverse of a monotone scalar atom applied to a threshold; produced by DQCP lowering.
    Inverse(InverseFn, Arc<Expr>),
}

impl Expr {
    /// Get the shape of the expression.
    pub fn shape(&self) -> Shape {
        match self {
            Expr::Variable(v) => v.shape.clone(),
            Expr::Constant(c) => c.shape(),
            Expr::Parameter(p) => p.shape.clone(),

            Expr::Add(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => a
                .shape()
                .broadcast(&b.shape())
                .unwrap_or_else(Shape::scalar),
            Expr::Neg(a) => a.shape(),
            Expr::Sum(_) => Shape::scalar(),
            Expr::Index(_, spec) => match spec {
                IndexSpec::Element(_) => Shape::scalar(),
                IndexSpec::Range { .. } => Shape::vector(spec.positions().len()),
            },
            Expr::MatMul(a, b) => a.shape().matmul(&b.shape()).unwrap_or_else(Shape::scalar),

            Expr::Abs(a) | Expr::Pos(a) | Expr::NegPart(a) => a.shape(),
            Expr::Maximum(exprs) | Expr::Minimum(exprs) => exprs
                .iter()
                .map(|e| e.shape())
                .reduce(|acc, s| acc.broadcast(&s).unwrap_or(acc))
                .unwrap_or_else(Shape::scalar),
            Expr::MaxEntries(_)
            | Expr::MinEntries(_)
            | Expr::Norm2(_)
            | Expr::SumSquares(_)
            | Expr::Length(_)
            | Expr::DistRatio(..) => Shape::scalar(),
            Expr::Exp(a)
            | Expr::Log(a)
            | Expr::Logistic(a)
            | Expr::Power(a, _)
            | Expr::Ceil(a)
            | Expr::Floor(a)
            | Expr::Sign(a)
            | Expr::Inverse(_, a) => a.shape(),
        }
    }

    /// Direct children in argument order.
    pub fn children(&self) -> Vec<&Arc<Expr>> {
        match self {
            Expr::Variable(_) | Expr::Constant(_) | Expr::Parameter(_) => vec![],
            Expr::Add(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) | Expr::MatMul(a, b) => {
                vec![a, b]
            }
            Expr::Maximum(exprs) | Expr::Minimum(exprs) => exprs.iter().collect(),
            Expr::DistRatio(x, a, b) => vec![x, a, b],
            Expr::Neg(a)
            | Expr::Sum(a)
            | Expr::Index(a, _)
            | Expr::Abs(a)
            | Expr::Pos(a)
            | Expr::NegPart(a)
            | Expr::MaxEntries(a)
            | Expr::MinEntries(a)
            | Expr::Norm2(a)
            | Expr::SumSquares(a)
            | Expr::Exp(a)
            | Expr::Log(a)
            | Expr::Logistic(a)
            | Expr::Power(a, _)
            | Expr::Ceil(a)
            | Expr::Floor(a)
            | Expr::Sign(a)
            | Expr::Length(a)
            | Expr::Inverse(_, a) => vec![a],
        }
    }

    /// Get the unique ID if this is a variable.
    pub fn variable_id(&self) -> Option<ExprId> {
        match self {
            Expr::Variable(v) => Some(v.id),
            _ => None,
        }
    }

    /// Get the unique ID if this is a parameter.
    pub fn parameter_id(&self) -> Option<ExprId> {
        match self {
            Expr::Parameter(p) => Some(p.id),
            _ => None,
        }
    }

    /// Check if this expression is a constant leaf.
    pub fn is_constant(&self) -> bool {
        matches!(self, Expr::Constant(_))
    }

    /// Check if this expression is a variable.
    pub fn is_variable(&self) -> bool {
        matches!(self, Expr::Variable(_))
    }

    /// Get the constant value if this is a constant expression.
    pub fn constant_value(&self) -> Option<&Array> {
        match self {
            Expr::Constant(c) => Some(&c.value),
            _ => None,
        }
    }

    /// True if no variable appears anywhere below this node.
    pub fn is_variable_free(&self) -> bool {
        match self {
            Expr::Variable(_) => false,
            Expr::Constant(_) | Expr::Parameter(_) => true,
            _ => self.children().iter().all(|c| c.is_variable_free()),
        }
    }

    /// True if a parameter appears anywhere below this node.
    pub fn has_parameters(&self) -> bool {
        match self {
            Expr::Parameter(_) => true,
            Expr::Variable(_) | Expr::Constant(_) => false,
            _ => self.children().iter().any(|c| c.has_parameters()),
        }
    }

    /// Collect all variable ids in this expression, sorted.
    pub fn variables(&self) -> Vec<ExprId> {
        self.variable_data().into_iter().map(|v| v.id).collect()
    }

    /// Collect every distinct variable in this expression, ordered by id.
    pub fn variable_data(&self) -> Vec<VariableData> {
        let mut found = BTreeMap::new();
        let mut seen = HashSet::new();
        self.collect_leaves(&mut seen, &mut |e| {
            if let Expr::Variable(v) = e {
                found.entry(v.id).or_insert_with(|| v.clone());
            }
        });
        found.into_values().collect()
    }

    /// Collect every distinct parameter in this expression, ordered by id.
    pub fn parameters(&self) -> Vec<ParameterData> {
        let mut found = BTreeMap::new();
        let mut seen = HashSet::new();
        self.collect_leaves(&mut seen, &mut |e| {
            if let Expr::Parameter(p) = e {
                found.entry(p.id).or_insert_with(|| p.clone());
            }
        });
        found.into_values().collect()
    }

    fn collect_leaves(&self, seen: &mut HashSet<*const Expr>, visit: &mut dyn FnMut(&Expr)) {
        if !seen.insert(self as *const Expr) {
            return;
        }
        visit(self);
        for child in self.children() {
            child.collect_leaves(seen, visit);
        }
    }

    /// Check that every elementwise operation and matrix product has compatible shapes.
    pub fn check_shapes(&self) -> Result<()> {
        let mut seen = HashSet::new();
        self.check_shapes_inner(&mut seen)
    }

    fn check_shapes_inner(&self, seen: &mut HashSet<*const Expr>) -> Result<()> {
        if !seen.insert(self as *const Expr) {
            return Ok(());
        }
        for child in self.children() {
            child.check_shapes_inner(seen)?;
        }
        let mismatch = |a: &Shape, b: &Shape| CvxError::ShapeMismatch {
            expected: a.to_string(),
            got: b.to_string(),
        };
        match self {
            Expr::Add(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                let (sa, sb) = (a.shape(), b.shape());
                sa.broadcast(&sb).map(|_| ()).ok_or_else(|| mismatch(&sa, &sb))
            }
            Expr::Maximum(args) | Expr::Minimum(args) => {
                let mut acc = Shape::scalar();
                for arg in args {
                    let s = arg.shape();
                    acc = acc.broadcast(&s).ok_or_else(|| mismatch(&acc, &s))?;
                }
                Ok(())
            }
            Expr::MatMul(a, b) => {
                let (sa, sb) = (a.shape(), b.shape());
                sa.matmul(&sb).map(|_| ()).ok_or_else(|| mismatch(&sa, &sb))
            }
            Expr::Index(a, spec) => {
                let size = a.shape().size();
                if spec.positions().end > size {
                    Err(CvxError::InvalidProblem(format!(
                        "index {:?} out of bounds for {} elements",
                        spec, size
                    )))
                } else {
                    Ok(())
                }
            }
            Expr::DistRatio(x, a, b) => {
                let sx = x.shape();
                for s in [a.shape(), b.shape()] {
                    if s.size() != sx.size() {
                        return Err(mismatch(&sx, &s));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        crate::expr::constant(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        crate::expr::constant(value as f64)
    }
}

impl From<&Expr> for Expr {
    fn from(expr: &Expr) -> Self {
        expr.clone()
    }
}
