//! Batch evaluation of candidate points: serial, parallel, and cached.
//!
//! All evaluators share three guarantees: results come back in input order,
//! duplicate inputs cost at most one objective call, and the found-better
//! signal from opportunistic polling is reported as a status of its own
//! rather than as a failure.

use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::{Error, Objective, Point, PointKey};

/// How a batch ended.
#[derive(Debug, Clone)]
pub enum BatchStatus {
    /// Every requested point was evaluated.
    Complete,
    /// The batch was abandoned because an evaluation beat the early-stop
    /// threshold.  A successful outcome for opportunistic polling.
    FoundBetter,
    /// The objective reported a real failure.  The points evaluated before
    /// (and, for the parallel evaluator, around) the failure are returned.
    Failed(Error),
}

impl BatchStatus {
    /// The error held by a `Failed` status.
    pub fn err(&self) -> Option<&Error> {
        match self {
            BatchStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Outcome of one `eval` call.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Evaluated points in input order.  May be a prefix of the request if
    /// the batch stopped early.
    pub points: Vec<Point>,
    /// Number of actual objective calls made (duplicates and cache hits
    /// excluded).
    pub nfev: usize,
    /// How the batch ended.
    pub status: BatchStatus,
}

/// Evaluates batches of points against an objective.
pub trait Evaler {
    /// Evaluate `points`, returning values in input order.
    fn eval(&self, obj: &dyn Objective, points: Vec<Point>) -> BatchResult;
}

impl<E: Evaler + ?Sized> Evaler for Box<E> {
    fn eval(&self, obj: &dyn Objective, points: Vec<Point>) -> BatchResult {
        (**self).eval(obj, points)
    }
}

// Shared handles evaluate too, so one cache can back several methods in a
// hybrid composition.
impl<E: Evaler + ?Sized> Evaler for std::sync::Arc<E> {
    fn eval(&self, obj: &dyn Objective, points: Vec<Point>) -> BatchResult {
        (**self).eval(obj, points)
    }
}

/// Maps each batch index to the index of the first point with the same
/// position.  An entry equal to its own index marks a canonical point;
/// later duplicates reuse the canonical result.
pub fn unique_of(points: &[Point]) -> Vec<usize> {
    let mut first: HashMap<PointKey, usize> = HashMap::with_capacity(points.len());
    points
        .iter()
        .enumerate()
        .map(|(i, p)| *first.entry(p.key()).or_insert(i))
        .collect()
}

/// Copies each canonical value onto its duplicates.
pub fn fill_from_unique(indexes: &[usize], points: &mut [Point]) {
    for i in 0..points.len() {
        let canon = indexes[i];
        if canon != i {
            points[i].val = points[canon].val;
        }
    }
}

/// Evaluates points one at a time, in order.
///
/// On an objective error the prefix evaluated so far (including the errored
/// point) is returned and the batch stops, unless `continue_on_err` is set.
/// The found-better signal always stops the batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialEvaler {
    /// Keep evaluating after an objective failure; the first error is still
    /// reported in the final status.
    pub continue_on_err: bool,
}

impl Evaler for SerialEvaler {
    fn eval(&self, obj: &dyn Objective, points: Vec<Point>) -> BatchResult {
        let uniq = unique_of(&points);
        let mut out: Vec<Point> = Vec::with_capacity(points.len());
        let mut nfev = 0;
        let mut first_err: Option<Error> = None;

        for (i, p) in points.iter().enumerate() {
            let (val, err) = if uniq[i] != i {
                (out[uniq[i]].val, None)
            } else {
                nfev += 1;
                obj.objective(p.coords())
            };
            out.push(p.with_val(val));

            if let Some(e) = err {
                if matches!(e, Error::FoundBetter) {
                    return BatchResult {
                        points: out,
                        nfev,
                        status: BatchStatus::FoundBetter,
                    };
                }
                if self.continue_on_err {
                    first_err.get_or_insert(e);
                } else {
                    return BatchResult {
                        points: out,
                        nfev,
                        status: BatchStatus::Failed(e),
                    };
                }
            }
        }

        let status = match first_err {
            Some(e) => BatchStatus::Failed(e),
            None => BatchStatus::Complete,
        };
        BatchResult {
            points: out,
            nfev,
            status,
        }
    }
}

/// Evaluates every unique point of a batch concurrently on the rayon pool
/// and joins before returning.
///
/// Best-effort on failure: every point is still evaluated and the first
/// error (by batch position) is surfaced.  Result order matches input
/// order.  One fan-out per call; workers never outlive `eval`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParallelEvaler;

impl Evaler for ParallelEvaler {
    fn eval(&self, obj: &dyn Objective, points: Vec<Point>) -> BatchResult {
        let uniq = unique_of(&points);
        let work: Vec<usize> = (0..points.len()).filter(|&i| uniq[i] == i).collect();

        let results: Vec<(f64, Option<Error>)> = work
            .par_iter()
            .map(|&i| obj.objective(points[i].coords()))
            .collect();

        let mut vals = vec![f64::INFINITY; points.len()];
        let mut first_err: Option<Error> = None;
        let mut found_better = false;
        for (&i, (val, err)) in work.iter().zip(results.into_iter()) {
            vals[i] = val;
            match err {
                Some(Error::FoundBetter) => found_better = true,
                Some(e) => {
                    first_err.get_or_insert(e);
                }
                None => {}
            }
        }

        let out: Vec<Point> = points
            .iter()
            .enumerate()
            .map(|(i, p)| p.with_val(vals[uniq[i]]))
            .collect();

        let status = match first_err {
            Some(e) => BatchStatus::Failed(e),
            None if found_better => BatchStatus::FoundBetter,
            None => BatchStatus::Complete,
        };
        BatchResult {
            points: out,
            nfev: work.len(),
            status,
        }
    }
}

/// Remembers every value an inner evaluator has produced, keyed by position
/// bit pattern, and never asks twice.
///
/// Cache entries are never invalidated during a run; access is serialized
/// behind a lock.
pub struct CacheEvaler<E> {
    inner: E,
    cache: Mutex<HashMap<PointKey, f64>>,
}

impl<E: Evaler> CacheEvaler<E> {
    /// Wrap `inner` with a fresh cache.
    pub fn new(inner: E) -> Self {
        CacheEvaler {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct positions remembered.
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// True before anything has been evaluated.
    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }
}

impl<E: Evaler> Evaler for CacheEvaler<E> {
    fn eval(&self, obj: &dyn Objective, points: Vec<Point>) -> BatchResult {
        // Partition into hits and misses under one short-lived lock.
        let mut hit: Vec<Option<f64>> = Vec::with_capacity(points.len());
        let mut misses: Vec<Point> = Vec::new();
        {
            let cache = self.cache.lock().unwrap();
            for p in &points {
                match cache.get(&p.key()) {
                    Some(&v) => hit.push(Some(v)),
                    None => {
                        hit.push(None);
                        misses.push(p.clone());
                    }
                }
            }
        }

        let inner = if misses.is_empty() {
            BatchResult {
                points: Vec::new(),
                nfev: 0,
                status: BatchStatus::Complete,
            }
        } else {
            self.inner.eval(obj, misses)
        };

        {
            let mut cache = self.cache.lock().unwrap();
            for p in &inner.points {
                cache.insert(p.key(), p.val);
            }
        }

        // Merge hits and fresh results back into input order.  If the inner
        // evaluator stopped early, the merged output truncates at the first
        // missing point.
        let mut fresh = inner.points.into_iter();
        let mut out: Vec<Point> = Vec::with_capacity(points.len());
        for (p, cached) in points.iter().zip(hit.into_iter()) {
            match cached {
                Some(v) => out.push(p.with_val(v)),
                None => match fresh.next() {
                    Some(fp) => out.push(fp),
                    None => break,
                },
            }
        }

        BatchResult {
            points: out,
            nfev: inner.nfev,
            status: inner.status,
        }
    }
}
