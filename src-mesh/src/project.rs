//! Projection of points onto linearly constrained regions.
//!
//! Used to pull infeasible candidates back onto the surface of a feasible
//! region described by `Ax <= b`.  Dense inverses and solves go through
//! `nalgebra`; callers keep their data in plain slices.

use nalgebra::{DMatrix, DVector};

use crate::MeshError;

const VIOLATION_EPS: f64 = 1e-10;

/// Orthogonal projection of `x0` onto the affine subspace `Ax = b`, the
/// intersection of the hyperplanes formed by the rows of `a` with shifts in
/// `b`:
///
/// ```text
/// proj = [I - A^T (A A^T)^-1 A] x0 + A^T (A A^T)^-1 b
/// ```
///
/// `a` is `m x n` with `m <= n`.  When `m == n` the subspace is a single
/// point and the solution to `Ax = b` is returned; `x0` is ignored.
pub fn ortho_proj(x0: &[f64], a: &DMatrix<f64>, b: &DVector<f64>) -> Result<Vec<f64>, MeshError> {
    let (m, n) = a.shape();
    if n != x0.len() {
        return Err(MeshError::Shape {
            expected: n,
            got: x0.len(),
        });
    }
    if m != b.len() {
        return Err(MeshError::Shape {
            expected: m,
            got: b.len(),
        });
    }

    if m == n {
        let solved = a
            .clone()
            .lu()
            .solve(b)
            .ok_or_else(|| MeshError::Singular("constraint system Ax = b is singular".into()))?;
        return Ok(solved.iter().copied().collect());
    }

    let at = a.transpose();
    let aat_inv = (a * &at)
        .try_inverse()
        .ok_or_else(|| MeshError::Singular("A*A^T is not invertible".into()))?;

    // B = A^T (A A^T)^-1
    let bmat = &at * aat_inv;

    let x = DVector::from_column_slice(x0);
    let proj = (DMatrix::identity(n, n) - &bmat * a) * x + bmat * b;
    Ok(proj.iter().copied().collect())
}

/// Returns the point nearest `x0` that violates none of the constraints in
/// `Ax <= b`.
///
/// Repeatedly finds the most violated constraint, stacks it into an active
/// set, and projects `x0` onto the active set's equality surface.  The loop
/// ends when no constraint is violated beyond tolerance, or when the active
/// set becomes square and pins down a single point.
pub fn nearest_feasible(
    x0: &[f64],
    a: &DMatrix<f64>,
    b: &DVector<f64>,
) -> Result<Vec<f64>, MeshError> {
    let n = a.ncols();
    if n != x0.len() {
        return Err(MeshError::Shape {
            expected: n,
            got: x0.len(),
        });
    }

    let mut proj = x0.to_vec();
    let mut active_rows: Vec<usize> = Vec::new();

    loop {
        let row = match most_violated(&proj, a, b) {
            None => return Ok(proj),
            Some(r) => r,
        };
        if !active_rows.contains(&row) {
            active_rows.push(row);
        }

        let active = DMatrix::from_fn(active_rows.len(), n, |i, j| a[(active_rows[i], j)]);
        let active_b = DVector::from_fn(active_rows.len(), |i, _| b[active_rows[i]]);
        proj = ortho_proj(x0, &active, &active_b)?;

        if active_rows.len() == n {
            // active set is square; the projection isolated a single point
            return Ok(proj);
        }
    }
}

/// Index of the most violated row of `Ax <= b` at `x`, or `None` when every
/// constraint holds within tolerance.
fn most_violated(x: &[f64], a: &DMatrix<f64>, b: &DVector<f64>) -> Option<usize> {
    let ax = a * DVector::from_column_slice(x);
    let mut worst = VIOLATION_EPS;
    let mut worst_row = None;
    for i in 0..ax.len() {
        let diff = ax[i] - b[i];
        if diff > worst {
            worst = diff;
            worst_row = Some(i);
        }
    }
    worst_row
}
