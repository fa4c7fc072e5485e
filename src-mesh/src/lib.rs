//! Meshes for projecting arbitrary-dimensional points onto a (potentially
//! discrete) grid.
//!
//! A mesh is defined by an origin, a step size, and optionally a basis whose
//! row vectors give the direction of each grid axis.  Three variants are
//! provided:
//!
//! - [`Infinite`]: a grid extending without bounds in every dimension; a step
//!   of zero turns it into continuous space (identity projection)
//! - [`Bounded`]: clips each coordinate into `[low, up]` before delegating to
//!   an inner mesh
//! - [`Integer`]: delegates to an inner mesh and rounds every output
//!   coordinate to the nearest integer

use ndarray::{Array1, Array2};
use std::sync::OnceLock;

pub mod project;

pub use project::{nearest_feasible, ortho_proj};

/// Errors produced by mesh projections.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MeshError {
    /// A point, bound vector, or matrix has the wrong number of dimensions.
    #[error("mesh dimension mismatch: expected {expected}, got {got}")]
    Shape {
        /// Dimension the mesh was configured with.
        expected: usize,
        /// Dimension of the offending input.
        got: usize,
    },
    /// A basis or constraint system could not be inverted or solved.
    #[error("singular matrix: {0}")]
    Singular(String),
}

/// A projection from continuous space onto grid points.
///
/// `nearest` is idempotent up to floating point as long as `step` and
/// `origin` are unchanged between calls.
pub trait Mesh {
    /// Current grid spacing.  Zero means continuous space.
    fn step(&self) -> f64;
    /// Change the grid spacing.  Steps never go negative.
    fn set_step(&mut self, step: f64);
    /// Copy of the grid origin.
    fn origin(&self) -> Vec<f64>;
    /// Re-center the grid on `origin`.
    fn set_origin(&mut self, origin: Vec<f64>);
    /// Project `p` onto the nearest grid point.
    fn nearest(&self, p: &[f64]) -> Result<Vec<f64>, MeshError>;
}

impl<M: Mesh + ?Sized> Mesh for Box<M> {
    fn step(&self) -> f64 {
        (**self).step()
    }
    fn set_step(&mut self, step: f64) {
        (**self).set_step(step)
    }
    fn origin(&self) -> Vec<f64> {
        (**self).origin()
    }
    fn set_origin(&mut self, origin: Vec<f64>) {
        (**self).set_origin(origin)
    }
    fn nearest(&self, p: &[f64]) -> Result<Vec<f64>, MeshError> {
        (**self).nearest(p)
    }
}

/// A grid-based, linear-axis mesh that extends in all dimensions without
/// bounds.
///
/// An empty origin stands for the zero vector of whatever dimension the
/// projected points have.  If no basis is set, the identity basis is used.
/// With `step == 0` the mesh represents continuous space and `nearest`
/// returns its input unchanged.
#[derive(Debug, Default)]
pub struct Infinite {
    origin: Vec<f64>,
    step: f64,
    basis: Option<Array2<f64>>,
    inverse: OnceLock<Array2<f64>>,
}

impl Infinite {
    /// A unit-basis mesh centered on `origin` with grid spacing `step`.
    pub fn new(origin: Vec<f64>, step: f64) -> Self {
        Infinite {
            origin,
            step: step.max(0.0),
            basis: None,
            inverse: OnceLock::new(),
        }
    }

    /// A continuous (identity) mesh.
    pub fn continuous() -> Self {
        Infinite::new(Vec::new(), 0.0)
    }

    /// Replace the mesh basis.  `basis` rows are the grid axis directions;
    /// it must be square and non-singular.
    pub fn with_basis(mut self, basis: Array2<f64>) -> Self {
        self.basis = Some(basis);
        self.inverse = OnceLock::new();
        self
    }

    fn inverse(&self) -> Result<Option<&Array2<f64>>, MeshError> {
        let basis = match &self.basis {
            None => return Ok(None),
            Some(b) => b,
        };
        if self.inverse.get().is_none() {
            let (rows, cols) = basis.dim();
            if rows != cols {
                return Err(MeshError::Shape {
                    expected: rows,
                    got: cols,
                });
            }
            let dm = nalgebra::DMatrix::from_row_iterator(rows, cols, basis.iter().copied());
            let inv = dm
                .try_inverse()
                .ok_or_else(|| MeshError::Singular("mesh basis is not invertible".into()))?;
            let arr = Array2::from_shape_fn((rows, cols), |(i, j)| inv[(i, j)]);
            let _ = self.inverse.set(arr);
        }
        Ok(self.inverse.get())
    }
}

impl Mesh for Infinite {
    fn step(&self) -> f64 {
        self.step
    }

    fn set_step(&mut self, step: f64) {
        self.step = step.max(0.0);
    }

    fn origin(&self) -> Vec<f64> {
        self.origin.clone()
    }

    fn set_origin(&mut self, origin: Vec<f64>) {
        self.origin = origin;
    }

    /// Projects `p` by rounding each coordinate to the nearest grid point.
    /// If the basis is not the identity, `p` is transformed into basis
    /// coordinates before rounding and transformed back afterwards.  Halfway
    /// points round up.
    fn nearest(&self, p: &[f64]) -> Result<Vec<f64>, MeshError> {
        if self.step == 0.0 {
            return Ok(p.to_vec());
        }
        if !self.origin.is_empty() && self.origin.len() != p.len() {
            return Err(MeshError::Shape {
                expected: self.origin.len(),
                got: p.len(),
            });
        }

        // translate onto the origin, then into basis coordinates
        let mut q = Array1::from_iter(
            p.iter()
                .enumerate()
                .map(|(i, &x)| x - self.origin.get(i).copied().unwrap_or(0.0)),
        );
        if let Some(inv) = self.inverse()? {
            if inv.ncols() != q.len() {
                return Err(MeshError::Shape {
                    expected: inv.ncols(),
                    got: q.len(),
                });
            }
            q = inv.dot(&q);
        }

        let mut snapped = q.mapv(|x| {
            let ratio = x / self.step;
            let mut n = ratio.floor();
            if ratio - n >= 0.5 {
                n += 1.0;
            }
            n * self.step
        });

        // back to standard coordinates, then undo the origin translation
        if let Some(basis) = &self.basis {
            snapped = basis.dot(&snapped);
        }
        Ok(snapped
            .iter()
            .enumerate()
            .map(|(i, &x)| x + self.origin.get(i).copied().unwrap_or(0.0))
            .collect())
    }
}

/// Composes an inner mesh with per-dimension bounds.  Coordinates are
/// clipped into `[low, up]` before the inner projection runs, so the result
/// lies inside the box whenever the inner mesh respects it (the identity and
/// on-grid cases).
#[derive(Debug)]
pub struct Bounded<M> {
    low: Vec<f64>,
    up: Vec<f64>,
    inner: M,
}

impl<M: Mesh> Bounded<M> {
    /// Wraps `inner` with the box `[low, up]`.  Fails when the bound vectors
    /// disagree on length.
    pub fn new(inner: M, low: Vec<f64>, up: Vec<f64>) -> Result<Self, MeshError> {
        if low.len() != up.len() {
            return Err(MeshError::Shape {
                expected: low.len(),
                got: up.len(),
            });
        }
        Ok(Bounded { low, up, inner })
    }
}

impl<M: Mesh> Mesh for Bounded<M> {
    fn step(&self) -> f64 {
        self.inner.step()
    }
    fn set_step(&mut self, step: f64) {
        self.inner.set_step(step)
    }
    fn origin(&self) -> Vec<f64> {
        self.inner.origin()
    }
    fn set_origin(&mut self, origin: Vec<f64>) {
        self.inner.set_origin(origin)
    }

    fn nearest(&self, p: &[f64]) -> Result<Vec<f64>, MeshError> {
        if p.len() != self.low.len() {
            return Err(MeshError::Shape {
                expected: self.low.len(),
                got: p.len(),
            });
        }
        let clipped: Vec<f64> = p
            .iter()
            .enumerate()
            .map(|(i, &x)| x.clamp(self.low[i], self.up[i]))
            .collect();
        self.inner.nearest(&clipped)
    }
}

/// Composes an inner mesh and rounds every output coordinate to the nearest
/// integer.
#[derive(Debug)]
pub struct Integer<M> {
    inner: M,
}

impl<M: Mesh> Integer<M> {
    /// Wraps `inner` with integer rounding at the output.
    pub fn new(inner: M) -> Self {
        Integer { inner }
    }
}

impl<M: Mesh> Mesh for Integer<M> {
    fn step(&self) -> f64 {
        self.inner.step()
    }
    fn set_step(&mut self, step: f64) {
        self.inner.set_step(step)
    }
    fn origin(&self) -> Vec<f64> {
        self.inner.origin()
    }
    fn set_origin(&mut self, origin: Vec<f64>) {
        self.inner.set_origin(origin)
    }

    fn nearest(&self, p: &[f64]) -> Result<Vec<f64>, MeshError> {
        let snapped = self.inner.nearest(p)?;
        Ok(snapped.into_iter().map(|x| x.round()).collect())
    }
}
