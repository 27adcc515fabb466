//! Linear and quadratic expression representations for canonicalization.
//!
//! After canonicalization, expressions are represented in standard form:
//! - Linear: sum_i(A_i * x_i) + b, over the column-major flattening of the output
//! - Quadratic: x' Q x + q' x + r

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

use crate::expr::{ExprId, Shape};
use crate::sparse::{
    csc_add, csc_from_triplets, csc_map, csc_matmul, csc_mul_vec, csc_repeat_rows, csc_scale,
    csc_scale_rows, csc_selector, csc_transpose, csc_vstack,
};

/// A linear expression in standard form: sum_i(A_i * x_i) + b
///
/// Each term is a sparse coefficient matrix multiplied by a variable.
/// The constant term `b` is a dense vector over the flattened output.
#[derive(Debug, Clone)]
pub struct LinExpr {
    /// Coefficient matrices for each variable: var_id -> coefficient matrix.
    /// The coefficient matrix A_i has shape (output_size, var_size).
    pub coeffs: HashMap<ExprId, CscMatrix<f64>>,
    /// Constant term (offset), column-major.
    pub constant: DVector<f64>,
    /// Output shape of this expression.
    pub shape: Shape,
}

impl LinExpr {
    /// Create a zero linear expression with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        LinExpr {
            coeffs: HashMap::new(),
            constant: DVector::zeros(shape.size()),
            shape,
        }
    }

    /// Create a linear expression for a single variable (identity coefficient).
    pub fn variable(var_id: ExprId, shape: Shape) -> Self {
        let size = shape.size();
        let mut coeffs = HashMap::new();
        coeffs.insert(var_id, CscMatrix::identity(size));
        LinExpr {
            coeffs,
            constant: DVector::zeros(size),
            shape,
        }
    }

    /// Create a constant linear expression from a value in `shape`.
    pub fn constant(value: &DMatrix<f64>, shape: Shape) -> Self {
        LinExpr {
            coeffs: HashMap::new(),
            constant: DVector::from_column_slice(value.as_slice()),
            shape,
        }
    }

    /// Create a scalar constant.
    pub fn scalar(value: f64) -> Self {
        LinExpr {
            coeffs: HashMap::new(),
            constant: DVector::from_element(1, value),
            shape: Shape::scalar(),
        }
    }

    /// The unit vector `e_i` of length `n` as a constant.
    pub fn unit(i: usize, shape: Shape) -> Self {
        let mut constant = DVector::zeros(shape.size());
        constant[i] = 1.0;
        LinExpr {
            coeffs: HashMap::new(),
            constant,
            shape,
        }
    }

    /// Check if this is a constant (no variables).
    pub fn is_constant(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Get the output size (flattened).
    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// Repeat a scalar expression to `shape`. Other expressions are returned unchanged.
    pub fn broadcast_to(&self, shape: &Shape) -> LinExpr {
        if self.size() != 1 || shape.size() == 1 {
            return self.clone();
        }
        let n = shape.size();
        LinExpr {
            coeffs: self
                .coeffs
                .iter()
                .map(|(k, v)| (*k, csc_repeat_rows(v, n)))
                .collect(),
            constant: DVector::from_element(n, self.constant[0]),
            shape: shape.clone(),
        }
    }

    /// Add two linear expressions, broadcasting a scalar side.
    pub fn add(&self, other: &LinExpr) -> LinExpr {
        let shape = if self.size() >= other.size() {
            self.shape.clone()
        } else {
            other.shape.clone()
        };
        let (a, b) = (self.broadcast_to(&shape), other.broadcast_to(&shape));

        let mut coeffs = a.coeffs;
        for (var_id, coeff) in b.coeffs {
            match coeffs.get_mut(&var_id) {
                Some(existing) => *existing = csc_add(existing, &coeff),
                None => {
                    coeffs.insert(var_id, coeff);
                }
            }
        }

        LinExpr {
            coeffs,
            constant: a.constant + b.constant,
            shape,
        }
    }

    /// Negate a linear expression.
    pub fn neg(&self) -> LinExpr {
        self.scale(-1.0)
    }

    /// Subtract: self - other.
    pub fn sub(&self, other: &LinExpr) -> LinExpr {
        self.add(&other.neg())
    }

    /// Scale by a scalar.
    pub fn scale(&self, scalar: f64) -> LinExpr {
        LinExpr {
            coeffs: self
                .coeffs
                .iter()
                .map(|(k, v)| (*k, csc_scale(v, scalar)))
                .collect(),
            constant: &self.constant * scalar,
            shape: self.shape.clone(),
        }
    }

    /// Scale by a possibly non-finite scalar, touching only nonzero entries.
    ///
    /// `inf * 0` stays `0`, so an infinite threshold only reaches rows it actually affects.
    pub fn scale_nonzeros(&self, scalar: f64) -> LinExpr {
        let mul = |v: f64| if v == 0.0 { 0.0 } else { v * scalar };
        LinExpr {
            coeffs: self
                .coeffs
                .iter()
                .map(|(k, v)| (*k, csc_map(v, mul)))
                .collect(),
            constant: self.constant.map(mul),
            shape: self.shape.clone(),
        }
    }

    /// Elementwise product with a constant vector `d` (broadcasting either side).
    pub fn scale_elementwise(&self, d: &DVector<f64>, shape: &Shape) -> LinExpr {
        let base = self.broadcast_to(shape);
        let d = if d.len() == 1 && base.size() > 1 {
            DVector::from_element(base.size(), d[0])
        } else {
            d.clone()
        };
        LinExpr {
            coeffs: base
                .coeffs
                .iter()
                .map(|(k, v)| (*k, csc_scale_rows(v, &d)))
                .collect(),
            constant: base.constant.component_mul(&d),
            shape: base.shape.clone(),
        }
    }

    /// Apply a linear map `m` (rows = new size) to the flattened expression.
    pub fn apply(&self, m: &CscMatrix<f64>, shape: Shape) -> LinExpr {
        LinExpr {
            coeffs: self
                .coeffs
                .iter()
                .map(|(k, v)| (*k, csc_matmul(m, v)))
                .collect(),
            constant: csc_mul_vec(m, &self.constant),
            shape,
        }
    }

    /// Sum of all entries.
    pub fn sum(&self) -> LinExpr {
        let n = self.size();
        let ones = csc_from_triplets(1, n, vec![0; n], (0..n).collect(), vec![1.0; n]);
        self.apply(&ones, Shape::scalar())
    }

    /// Entries at flat `positions`.
    pub fn select(&self, positions: std::ops::Range<usize>, shape: Shape) -> LinExpr {
        let sel = csc_selector(positions, self.size());
        self.apply(&sel, shape)
    }

    /// Flat entry `i` as a scalar.
    pub fn entry(&self, i: usize) -> LinExpr {
        self.select(i..i + 1, Shape::scalar())
    }

    /// Stack expressions vertically into one vector.
    pub fn vstack(parts: &[&LinExpr]) -> LinExpr {
        let total: usize = parts.iter().map(|p| p.size()).sum();
        let mut ids: Vec<ExprId> = parts.iter().flat_map(|p| p.coeffs.keys().copied()).collect();
        ids.sort();
        ids.dedup();

        let mut coeffs = HashMap::new();
        for id in ids {
            let width = parts
                .iter()
                .find_map(|p| p.coeffs.get(&id).map(|c| c.ncols()))
                .unwrap_or(0);
            let zeros: Vec<CscMatrix<f64>> = parts
                .iter()
                .map(|p| CscMatrix::zeros(p.size(), width))
                .collect();
            let blocks: Vec<&CscMatrix<f64>> = parts
                .iter()
                .zip(&zeros)
                .map(|(p, z)| p.coeffs.get(&id).unwrap_or(z))
                .collect();
            coeffs.insert(id, csc_vstack(&blocks));
        }

        let mut constant = DVector::zeros(total);
        let mut offset = 0;
        for p in parts {
            constant.rows_mut(offset, p.size()).copy_from(&p.constant);
            offset += p.size();
        }

        LinExpr {
            coeffs,
            constant,
            shape: Shape::vector(total),
        }
    }

    /// Get all variable IDs in this expression.
    pub fn variables(&self) -> Vec<ExprId> {
        let mut vars: Vec<_> = self.coeffs.keys().copied().collect();
        vars.sort();
        vars
    }
}

/// A quadratic expression: x' Q x + q' x + r
///
/// Used for quadratic objectives in QP problems.
#[derive(Debug, Clone)]
pub struct QuadExpr {
    /// Quadratic term: (var_i, var_j) -> block Q_ij of the full symmetric Q.
    pub quad_coeffs: HashMap<(ExprId, ExprId), CscMatrix<f64>>,
    /// Linear term: q' x (scalar LinExpr without constant).
    pub linear: LinExpr,
    /// Constant term: r
    pub constant: f64,
}

impl QuadExpr {
    /// Create a quadratic expression from a scalar linear expression.
    pub fn from_linear(linear: LinExpr) -> Self {
        let linear = linear.sum();
        let constant = linear.constant[0];
        QuadExpr {
            quad_coeffs: HashMap::new(),
            linear: LinExpr {
                coeffs: linear.coeffs,
                constant: DVector::zeros(1),
                shape: Shape::scalar(),
            },
            constant,
        }
    }

    /// `||x||_2^2` for an affine `x = sum_i A_i v_i + c`.
    pub fn sum_squares(x: &LinExpr) -> Self {
        let mut quad_coeffs = HashMap::new();
        for (vi, ai) in &x.coeffs {
            let ai_t = csc_transpose(ai);
            for (vj, aj) in &x.coeffs {
                quad_coeffs.insert((*vi, *vj), csc_matmul(&ai_t, aj));
            }
        }

        // 2 c' A_j as a row per variable.
        let c_row = csc_from_triplets(
            1,
            x.size(),
            vec![0; x.size()],
            (0..x.size()).collect(),
            x.constant.iter().map(|v| 2.0 * v).collect(),
        );
        let linear = LinExpr {
            coeffs: x
                .coeffs
                .iter()
                .map(|(k, a)| (*k, csc_matmul(&c_row, a)))
                .collect(),
            constant: DVector::zeros(1),
            shape: Shape::scalar(),
        };

        QuadExpr {
            quad_coeffs,
            linear,
            constant: x.constant.norm_squared(),
        }
    }

    /// Add two quadratic expressions.
    pub fn add(&self, other: &QuadExpr) -> QuadExpr {
        let mut quad_coeffs = self.quad_coeffs.clone();
        for (key, coeff) in &other.quad_coeffs {
            match quad_coeffs.get_mut(key) {
                Some(existing) => *existing = csc_add(existing, coeff),
                None => {
                    quad_coeffs.insert(*key, coeff.clone());
                }
            }
        }
        QuadExpr {
            quad_coeffs,
            linear: self.linear.add(&other.linear),
            constant: self.constant + other.constant,
        }
    }

    /// Scale by a scalar.
    pub fn scale(&self, scalar: f64) -> QuadExpr {
        QuadExpr {
            quad_coeffs: self
                .quad_coeffs
                .iter()
                .map(|(k, v)| (*k, csc_scale(v, scalar)))
                .collect(),
            linear: self.linear.scale(scalar),
            constant: self.constant * scalar,
        }
    }

    /// Get all variable IDs in this expression.
    pub fn variables(&self) -> Vec<ExprId> {
        let mut vars: Vec<_> = self.linear.variables();
        for (v1, v2) in self.quad_coeffs.keys() {
            vars.push(*v1);
            vars.push(*v2);
        }
        vars.sort();
        vars.dedup();
        vars
    }
}
