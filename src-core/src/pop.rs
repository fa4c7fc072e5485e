//! Random population seeding, with and without linear constraints.

use ndarray::{Array1, Array2};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::constraints::stack_constr;
use crate::{rng, Error, Point};

/// Generates `n` uniformly random unevaluated points inside the box
/// `[low, up]`.  The dimensionality equals `low.len()`.
pub fn rand_pop(n: usize, low: &[f64], up: &[f64]) -> Result<Vec<Point>, Error> {
    if low.len() != up.len() {
        return Err(Error::Shape {
            expected: low.len(),
            got: up.len(),
        });
    }
    let ndim = low.len();
    let mut points = Vec::with_capacity(n);
    for _ in 0..n {
        let pos: Vec<f64> = (0..ndim).map(|j| rng::uniform(low[j], up[j])).collect();
        points.push(Point::unevaluated(&pos));
    }
    Ok(points)
}

/// An infeasible candidate ranked by normalized constraint violation.
struct Violator {
    howbad: f64,
    point: Point,
}

impl PartialEq for Violator {
    fn eq(&self, other: &Self) -> bool {
        self.howbad == other.howbad
    }
}
impl Eq for Violator {}
impl PartialOrd for Violator {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Violator {
    fn cmp(&self, other: &Self) -> Ordering {
        self.howbad.total_cmp(&other.howbad)
    }
}

/// Tries to generate `n` random points inside the box `[lb, ub]` that also
/// satisfy the linear constraints `low <= Ax <= up`.
///
/// Random candidates are drawn until `n` feasible points are found or
/// `maxiter` candidates have been tried.  The least unfavorable infeasible
/// candidates are queued up and used to fill any shortfall.  Returns the
/// points, the number of infeasible fills, and the number of candidates
/// drawn.
pub fn rand_pop_constr(
    n: usize,
    maxiter: usize,
    lb: &[f64],
    ub: &[f64],
    low: &Array1<f64>,
    a: &Array2<f64>,
    up: &Array1<f64>,
) -> Result<(Vec<Point>, usize, usize), Error> {
    if lb.len() != ub.len() {
        return Err(Error::Shape {
            expected: lb.len(),
            got: ub.len(),
        });
    }
    if a.ncols() != lb.len() {
        return Err(Error::Shape {
            expected: a.ncols(),
            got: lb.len(),
        });
    }
    let (stack_a, b, ranges) = stack_constr(low, a, up)?;
    let ndim = lb.len();

    // max-heap: the worst violator sits on top and is evicted first
    let mut violators: BinaryHeap<Violator> = BinaryHeap::new();
    let mut points: Vec<Point> = Vec::with_capacity(n);

    for iter in 0..maxiter {
        let pos: Vec<f64> = (0..ndim).map(|j| rng::uniform(lb[j], ub[j])).collect();
        let p = Point::unevaluated(&pos);

        let ax = stack_a.dot(&Array1::from_iter(pos.iter().copied()));
        let mut howbad = 0.0;
        for i in 0..ax.len() {
            let diff = ax[i] - b[i];
            if diff > 0.0 {
                howbad += diff / ranges[i];
            }
        }

        if howbad == 0.0 {
            points.push(p);
            if points.len() == n {
                return Ok((points, 0, iter + 1));
            }
        } else {
            violators.push(Violator { howbad, point: p });
            while violators.len() > n - points.len() {
                violators.pop();
            }
        }
    }

    let nbad = n - points.len();
    let mut kept: Vec<Violator> = violators.into_vec();
    kept.sort_by(|x, y| x.howbad.total_cmp(&y.howbad));
    for v in kept.into_iter().take(nbad) {
        points.push(v.point);
    }

    Ok((points, nbad, maxiter))
}
