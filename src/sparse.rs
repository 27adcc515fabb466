//! Sparse matrix utilities.
//!
//! Helper functions for working with nalgebra-sparse matrices.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Create a CSC matrix from triplets (row, col, value).
///
/// Duplicates are summed together.
pub fn csc_from_triplets(
    nrows: usize,
    ncols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<f64>,
) -> CscMatrix<f64> {
    if rows.is_empty() {
        return CscMatrix::zeros(nrows, ncols);
    }

    let mut coo = CooMatrix::new(nrows, ncols);
    for ((row, col), val) in rows.into_iter().zip(cols).zip(vals) {
        if row < nrows && col < ncols {
            coo.push(row, col, val);
        }
    }

    CscMatrix::from(&coo)
}

/// Convert a dense matrix to CSC format.
pub fn dense_to_csc(dense: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut vals = Vec::new();

    for j in 0..dense.ncols() {
        for i in 0..dense.nrows() {
            let v = dense[(i, j)];
            if v != 0.0 {
                rows.push(i);
                cols.push(j);
                vals.push(v);
            }
        }
    }

    csc_from_triplets(dense.nrows(), dense.ncols(), rows, cols, vals)
}

/// Convert CSC to dense matrix.
pub fn csc_to_dense(sparse: &CscMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(sparse.nrows(), sparse.ncols());
    for (row, col, val) in sparse.triplet_iter() {
        dense[(row, col)] += *val;
    }
    dense
}

/// Stack CSC matrices vertically. Column counts may differ; the widest wins.
pub fn csc_vstack(blocks: &[&CscMatrix<f64>]) -> CscMatrix<f64> {
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut vals = Vec::new();
    let mut offset = 0;
    let mut ncols = 0;

    for block in blocks {
        for (r, c, v) in block.triplet_iter() {
            rows.push(r + offset);
            cols.push(c);
            vals.push(*v);
        }
        offset += block.nrows();
        ncols = ncols.max(block.ncols());
    }

    csc_from_triplets(offset, ncols, rows, cols, vals)
}

/// Add two CSC matrices of the same shape.
pub fn csc_add(a: &CscMatrix<f64>, b: &CscMatrix<f64>) -> CscMatrix<f64> {
    let (mut rows, mut cols, mut vals) = (Vec::new(), Vec::new(), Vec::new());
    for (r, c, v) in a.triplet_iter().chain(b.triplet_iter()) {
        rows.push(r);
        cols.push(c);
        vals.push(*v);
    }
    csc_from_triplets(a.nrows(), a.ncols(), rows, cols, vals)
}

/// Apply `f` to every stored value, keeping the sparsity pattern.
pub fn csc_map(a: &CscMatrix<f64>, f: impl Fn(f64) -> f64) -> CscMatrix<f64> {
    let values: Vec<f64> = a.values().iter().map(|v| f(*v)).collect();
    CscMatrix::try_from_csc_data(
        a.nrows(),
        a.ncols(),
        a.col_offsets().to_vec(),
        a.row_indices().to_vec(),
        values,
    )
    .unwrap_or_else(|_| CscMatrix::zeros(a.nrows(), a.ncols()))
}

/// Scale a CSC matrix.
pub fn csc_scale(a: &CscMatrix<f64>, scalar: f64) -> CscMatrix<f64> {
    csc_map(a, |v| v * scalar)
}

/// Multiply row `i` by `d[i]`.
pub fn csc_scale_rows(a: &CscMatrix<f64>, d: &DVector<f64>) -> CscMatrix<f64> {
    let (mut rows, mut cols, mut vals) = (Vec::new(), Vec::new(), Vec::new());
    for (r, c, v) in a.triplet_iter() {
        rows.push(r);
        cols.push(c);
        vals.push(*v * d[r]);
    }
    csc_from_triplets(a.nrows(), a.ncols(), rows, cols, vals)
}

/// Repeat a single-row matrix `times` times.
pub fn csc_repeat_rows(m: &CscMatrix<f64>, times: usize) -> CscMatrix<f64> {
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut vals = Vec::new();

    for (r, c, v) in m.triplet_iter() {
        for t in 0..times {
            rows.push(t * m.nrows() + r);
            cols.push(c);
            vals.push(*v);
        }
    }

    csc_from_triplets(m.nrows() * times, m.ncols(), rows, cols, vals)
}

/// Sparse product `a * b`.
pub fn csc_matmul(a: &CscMatrix<f64>, b: &CscMatrix<f64>) -> CscMatrix<f64> {
    let (mut rows, mut cols, mut vals) = (Vec::new(), Vec::new(), Vec::new());
    for j in 0..b.ncols() {
        let mut acc: BTreeMap<usize, f64> = BTreeMap::new();
        let b_col = b.col(j);
        for (&k, &bv) in b_col.row_indices().iter().zip(b_col.values()) {
            let a_col = a.col(k);
            for (&i, &av) in a_col.row_indices().iter().zip(a_col.values()) {
                *acc.entry(i).or_insert(0.0) += av * bv;
            }
        }
        for (i, v) in acc {
            rows.push(i);
            cols.push(j);
            vals.push(v);
        }
    }
    csc_from_triplets(a.nrows(), b.ncols(), rows, cols, vals)
}

/// Sparse matrix-vector product `a * v`.
pub fn csc_mul_vec(a: &CscMatrix<f64>, v: &DVector<f64>) -> DVector<f64> {
    let mut out = DVector::zeros(a.nrows());
    for (r, c, val) in a.triplet_iter() {
        out[r] += *val * v[c];
    }
    out
}

/// Transpose of a CSC matrix.
pub fn csc_transpose(a: &CscMatrix<f64>) -> CscMatrix<f64> {
    let (mut rows, mut cols, mut vals) = (Vec::new(), Vec::new(), Vec::new());
    for (r, c, v) in a.triplet_iter() {
        rows.push(c);
        cols.push(r);
        vals.push(*v);
    }
    csc_from_triplets(a.ncols(), a.nrows(), rows, cols, vals)
}

/// Selection matrix picking `positions` out of `n` entries.
pub fn csc_selector(positions: std::ops::Range<usize>, n: usize) -> CscMatrix<f64> {
    let rows: Vec<usize> = (0..positions.len()).collect();
    let cols: Vec<usize> = positions.collect();
    let vals = vec![1.0; rows.len()];
    csc_from_triplets(rows.len(), n, rows, cols, vals)
}

/// Kronecker product `kron(I_k, m)`.
pub fn kron_identity_left(k: usize, m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (mut rows, mut cols, mut vals) = (Vec::new(), Vec::new(), Vec::new());
    for block in 0..k {
        for j in 0..m.ncols() {
            for i in 0..m.nrows() {
                let v = m[(i, j)];
                if v != 0.0 {
                    rows.push(block * m.nrows() + i);
                    cols.push(block * m.ncols() + j);
                    vals.push(v);
                }
            }
        }
    }
    csc_from_triplets(k * m.nrows(), k * m.ncols(), rows, cols, vals)
}

/// Kronecker product `kron(m, I_k)`.
pub fn kron_identity_right(m: &DMatrix<f64>, k: usize) -> CscMatrix<f64> {
    let (mut rows, mut cols, mut vals) = (Vec::new(), Vec::new(), Vec::new());
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            let v = m[(i, j)];
            if v != 0.0 {
                for d in 0..k {
                    rows.push(i * k + d);
                    cols.push(j * k + d);
                    vals.push(v);
                }
            }
        }
    }
    csc_from_triplets(m.nrows() * k, m.ncols() * k, rows, cols, vals)
}
