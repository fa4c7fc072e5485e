//! The iteration driver: runs a method until a stopping rule fires.

use dfoptim_mesh::Mesh;

use crate::{Error, Iteration, Method, Objective, Point};

/// Read-only view of the driver state handed to user stop predicates.
pub struct Progress<'a> {
    /// Best point observed so far.
    pub best: &'a Point,
    /// Iterations completed.
    pub niter: usize,
    /// Objective evaluations accumulated.
    pub neval: usize,
    /// Current mesh step.
    pub step: f64,
}

/// Builds a [`Solver`] from a method, an objective, and a mesh, with
/// optional stopping rules.  All `max_*` limits default to unbounded
/// (zero); `min_step` defaults to disabled (negative), which suits methods
/// whose natural mesh step is zero.
pub struct SolverBuilder {
    solver: Solver,
}

impl SolverBuilder {
    /// Start from the three mandatory collaborators.
    pub fn new(
        method: Box<dyn Method>,
        objective: Box<dyn Objective>,
        mesh: Box<dyn Mesh>,
    ) -> Self {
        SolverBuilder {
            solver: Solver {
                method,
                objective,
                mesh,
                max_iter: 0,
                max_eval: 0,
                max_no_improve: 0,
                min_step: -1.0,
                stop: None,
                disp: false,
                best: Point::new(&[], f64::INFINITY),
                niter: 0,
                neval: 0,
                no_improve: 0,
                err: None,
            },
        }
    }

    /// Stop after `n` iterations; zero means unbounded.
    pub fn max_iter(mut self, n: usize) -> Self {
        self.solver.max_iter = n;
        self
    }

    /// Stop once `n` objective evaluations have accumulated; zero means
    /// unbounded.
    pub fn max_eval(mut self, n: usize) -> Self {
        self.solver.max_eval = n;
        self
    }

    /// Stop after `n` successive iterations without improvement; zero means
    /// unbounded.
    pub fn max_no_improve(mut self, n: usize) -> Self {
        self.solver.max_no_improve = n;
        self
    }

    /// Stop once the mesh step falls below `step`.  Negative disables the
    /// rule.
    pub fn min_step(mut self, step: f64) -> Self {
        self.solver.min_step = step;
        self
    }

    /// Custom stop predicate, consulted after every iteration.
    pub fn stop(mut self, pred: impl FnMut(&Progress) -> bool + 'static) -> Self {
        self.solver.stop = Some(Box::new(pred));
        self
    }

    /// Print a progress line per iteration.
    pub fn disp(mut self, on: bool) -> Self {
        self.solver.disp = on;
        self
    }

    /// Finish the configuration.
    pub fn build(self) -> Solver {
        self.solver
    }
}

/// Drives a method one iteration at a time, tracking the best point seen,
/// iteration and evaluation counts, and the first error raised.
pub struct Solver {
    method: Box<dyn Method>,
    objective: Box<dyn Objective>,
    mesh: Box<dyn Mesh>,
    max_iter: usize,
    max_eval: usize,
    max_no_improve: usize,
    min_step: f64,
    stop: Option<Box<dyn FnMut(&Progress) -> bool>>,
    disp: bool,
    best: Point,
    niter: usize,
    neval: usize,
    no_improve: usize,
    err: Option<Error>,
}

impl Solver {
    /// Run one iteration.  Returns `true` while every active stopping rule
    /// allows continuation.
    pub fn step(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }

        let it: Iteration = self
            .method
            .iterate(self.objective.as_ref(), self.mesh.as_mut());
        self.niter += 1;
        self.neval += it.nfev;

        if it.best.val < self.best.val {
            self.best = it.best;
            self.no_improve = 0;
        } else {
            self.no_improve += 1;
        }

        if self.disp {
            eprintln!(
                "iter {:5}  neval {:7}  best {:.6e}  step {:.3e}",
                self.niter,
                self.neval,
                self.best.val,
                self.mesh.step()
            );
        }

        if let Some(e) = it.err {
            log::debug!("solver stopping on iteration error: {}", e);
            self.err = Some(e);
            return false;
        }

        if self.max_iter > 0 && self.niter >= self.max_iter {
            return false;
        }
        if self.max_eval > 0 && self.neval >= self.max_eval {
            return false;
        }
        if self.max_no_improve > 0 && self.no_improve >= self.max_no_improve {
            return false;
        }
        if self.mesh.step() < self.min_step {
            return false;
        }
        if let Some(pred) = self.stop.as_mut() {
            let progress = Progress {
                best: &self.best,
                niter: self.niter,
                neval: self.neval,
                step: self.mesh.step(),
            };
            if pred(&progress) {
                return false;
            }
        }
        true
    }

    /// Iterate until a stopping rule fires.  Returns the first error the
    /// method surfaced, if any; the best point stays accessible either way.
    pub fn run(&mut self) -> Result<(), Error> {
        while self.step() {}
        match &self.err {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Best point observed so far.
    pub fn best(&self) -> &Point {
        &self.best
    }

    /// Iterations completed.
    pub fn niter(&self) -> usize {
        self.niter
    }

    /// Objective evaluations accumulated.
    pub fn neval(&self) -> usize {
        self.neval
    }

    /// First error surfaced by the method, if any.
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// The mesh being driven.
    pub fn mesh(&self) -> &dyn Mesh {
        self.mesh.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfoptim_mesh::Infinite;

    /// Improves by one each iteration until `fail_at`, then errors.
    struct FakeMethod {
        val: f64,
        fail_at: Option<usize>,
        count: usize,
    }

    impl Method for FakeMethod {
        fn iterate(&mut self, _obj: &dyn Objective, _mesh: &mut dyn Mesh) -> Iteration {
            self.count += 1;
            self.val -= 1.0;
            let err = match self.fail_at {
                Some(n) if self.count >= n => Some(Error::Objective("boom".into())),
                _ => None,
            };
            Iteration {
                best: Point::new(&[self.val], self.val),
                nfev: 3,
                err,
            }
        }

        fn add_point(&mut self, _p: Point) {}
    }

    fn build(fake: FakeMethod) -> SolverBuilder {
        let obj = |_x: &[f64]| 0.0;
        SolverBuilder::new(
            Box::new(fake),
            Box::new(obj),
            Box::new(Infinite::continuous()),
        )
    }

    #[test]
    fn max_iter_bounds_the_loop() {
        let mut solver = build(FakeMethod {
            val: 100.0,
            fail_at: None,
            count: 0,
        })
        .max_iter(7)
        .build();
        solver.run().unwrap();
        assert_eq!(solver.niter(), 7);
        assert_eq!(solver.neval(), 21);
        assert_eq!(solver.best().val, 92.0);
    }

    #[test]
    fn max_eval_bounds_the_loop() {
        let mut solver = build(FakeMethod {
            val: 100.0,
            fail_at: None,
            count: 0,
        })
        .max_eval(10)
        .build();
        solver.run().unwrap();
        // 3 evals per iteration; the limit trips at 12
        assert_eq!(solver.niter(), 4);
        assert_eq!(solver.neval(), 12);
    }

    #[test]
    fn error_stops_and_preserves_partial_results() {
        let mut solver = build(FakeMethod {
            val: 100.0,
            fail_at: Some(3),
            count: 0,
        })
        .build();
        let err = solver.run().unwrap_err();
        assert!(matches!(err, Error::Objective(_)));
        assert_eq!(solver.niter(), 3);
        assert_eq!(solver.neval(), 9);
        assert_eq!(solver.best().val, 97.0, "partial best remains observable");
        assert!(solver.err().is_some());
    }

    #[test]
    fn no_improve_counter_stops_stagnation() {
        // FakeMethod always improves, so force stagnation through the user
        // predicate instead and check max_no_improve separately below
        struct Flat;
        impl Method for Flat {
            fn iterate(&mut self, _o: &dyn Objective, _m: &mut dyn Mesh) -> Iteration {
                Iteration {
                    best: Point::new(&[0.0], 5.0),
                    nfev: 1,
                    err: None,
                }
            }
            fn add_point(&mut self, _p: Point) {}
        }
        let obj = |_x: &[f64]| 0.0;
        let mut solver = SolverBuilder::new(
            Box::new(Flat),
            Box::new(obj),
            Box::new(Infinite::continuous()),
        )
        .max_no_improve(4)
        .build();
        solver.run().unwrap();
        // first iteration improves (inf -> 5), then four flat ones
        assert_eq!(solver.niter(), 5);
    }

    #[test]
    fn user_predicate_stops_the_loop() {
        let mut solver = build(FakeMethod {
            val: 100.0,
            fail_at: None,
            count: 0,
        })
        .stop(|p| p.best.val < 90.0)
        .build();
        solver.run().unwrap();
        assert_eq!(solver.best().val, 89.0);
    }

    #[test]
    fn min_step_checks_the_mesh() {
        let obj = |_x: &[f64]| 0.0;
        let mut solver = SolverBuilder::new(
            Box::new(FakeMethod {
                val: 100.0,
                fail_at: None,
                count: 0,
            }),
            Box::new(obj),
            Box::new(Infinite::new(vec![0.0], 0.5)),
        )
        .min_step(1.0)
        .build();
        solver.run().unwrap();
        assert_eq!(solver.niter(), 1, "step 0.5 is already below min_step 1.0");
    }
}
