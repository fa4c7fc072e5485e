//! Mesh-adaptive pattern search.
//!
//! The method holds an incumbent on a contracting and expanding mesh.  Each
//! iteration optionally runs a search step (any other method wrapped as a
//! [`Searcher`]), then polls neighbors of the incumbent along a span of
//! directions.  A successful poll may grow the mesh after enough successive
//! wins; a failed poll halves it, and a step contracted to nothing stops
//! the run.

#![warn(missing_docs)]

use std::sync::Arc;

use dfoptim_core::{Error, Evaler, Iteration, Method, Objective, Point, Recorder, SerialEvaler};
use dfoptim_mesh::Mesh;

mod poller;
mod searcher;

pub use poller::{Direction, PollOutcome, Poller, Span};
pub use searcher::{NullSearcher, SearchResult, Searcher, WrapSearcher};

const TBL_POLLS: &str = "patternpolls";
const TBL_INFO: &str = "patterninfo";

/// Configures and builds a [`Pattern`].
pub struct PatternBuilder {
    pattern: Pattern,
}

impl PatternBuilder {
    /// Start the search from `start` (typically unevaluated).
    pub fn new(start: Point) -> Self {
        let ndim = start.len();
        PatternBuilder {
            pattern: Pattern {
                curr: start,
                evaler: Box::new(SerialEvaler::default()),
                poller: Poller::new(ndim),
                searcher: Box::new(NullSearcher),
                discrete_search: false,
                n_success_grow: None,
                nsuccess: 0,
                recorder: None,
                count: 0,
            },
        }
    }

    /// Replace the evaluator (serial by default).
    pub fn evaler(mut self, ev: impl Evaler + 'static) -> Self {
        self.pattern.evaler = Box::new(ev);
        self
    }

    /// Run `method` as the search step, optionally sharing the incumbent
    /// with it before every search.
    pub fn search_method(mut self, method: Box<dyn Method>, share: bool) -> Self {
        self.pattern.searcher = Box::new(WrapSearcher::new(method, share));
        self
    }

    /// Use a custom searcher.
    pub fn searcher(mut self, s: impl Searcher + 'static) -> Self {
        self.pattern.searcher = Box::new(s);
        self
    }

    /// Project search-step points onto the poll mesh instead of letting the
    /// search operate in continuous space.
    pub fn discrete_search(mut self) -> Self {
        self.pattern.discrete_search = true;
        self
    }

    /// Double the mesh step after `n` successive successful polls.
    pub fn grow_after(mut self, n: usize) -> Self {
        self.pattern.n_success_grow = Some(n);
        self
    }

    /// Poll span (compass 2N by default).
    pub fn span(mut self, span: Span) -> Self {
        self.pattern.poller = self.pattern.poller.with_span(span);
        self
    }

    /// Candidates closer than `eps` to the incumbent are skipped.
    pub fn skip_eps(mut self, eps: f64) -> Self {
        self.pattern.poller.skip_eps = eps;
        self
    }

    /// Number of good directions remembered between polls.
    pub fn n_keep(mut self, n: usize) -> Self {
        self.pattern.poller.n_keep = n;
        self
    }

    /// Record per-poll candidates and per-iteration state to `recorder`.
    pub fn recorder(mut self, recorder: Arc<Recorder>) -> Self {
        let coords = Recorder::coord_columns(self.pattern.curr.len());
        let mut poll_cols = vec!["iter".to_string(), "val".to_string()];
        poll_cols.extend(coords.iter().cloned());
        let mut info_cols = vec![
            "iter".to_string(),
            "step".to_string(),
            "nsearch".to_string(),
            "npoll".to_string(),
            "val".to_string(),
        ];
        info_cols.extend(coords);
        recorder.table(TBL_POLLS, &poll_cols);
        recorder.table(TBL_INFO, &info_cols);
        self.pattern.recorder = Some(recorder);
        self
    }

    /// Finish the configuration.
    pub fn build(self) -> Pattern {
        self.pattern
    }
}

/// The pattern-search method.
pub struct Pattern {
    curr: Point,
    evaler: Box<dyn Evaler>,
    poller: Poller,
    searcher: Box<dyn Searcher>,
    discrete_search: bool,
    n_success_grow: Option<usize>,
    nsuccess: usize,
    recorder: Option<Arc<Recorder>>,
    count: usize,
}

impl Pattern {
    /// The incumbent.
    pub fn best(&self) -> &Point {
        &self.curr
    }

    fn record(&self, nsearch: usize, npoll: usize, step: f64) {
        let rec = match &self.recorder {
            Some(r) => r,
            None => return,
        };
        if npoll > 0 {
            for p in self.poller.points() {
                let mut row = vec![self.count as f64, p.val];
                row.extend(p.pos());
                rec.append(TBL_POLLS, row);
            }
        }
        let mut row = vec![
            self.count as f64,
            step,
            nsearch as f64,
            npoll as f64,
            self.curr.val,
        ];
        row.extend(self.curr.pos());
        rec.append(TBL_INFO, row);
        rec.commit();
    }
}

/// True once `step` can no longer displace `at` in any dimension: every
/// poll candidate would collapse onto the incumbent, so the step has
/// effectively contracted to zero.
fn step_vanished(step: f64, at: &Point) -> bool {
    if step == 0.0 {
        return true;
    }
    (0..at.len()).all(|i| at.at(i) + step == at.at(i))
}

impl Method for Pattern {
    /// One pattern iteration: search step, mesh recentering, poll, and the
    /// grow-or-halve mesh update.
    fn iterate(&mut self, obj: &dyn Objective, mesh: &mut dyn Mesh) -> Iteration {
        self.count += 1;

        let sr = if self.discrete_search {
            self.searcher.search(obj, mesh, &self.curr)
        } else {
            // continuous search: hand the searcher an identity mesh by
            // zeroing the step for the duration of the call
            let saved = mesh.step();
            mesh.set_step(0.0);
            let sr = self.searcher.search(obj, mesh, &self.curr);
            mesh.set_step(saved);
            sr
        };
        let nsearch = sr.nfev;

        if let Some(e) = sr.err {
            self.record(nsearch, 0, mesh.step());
            return Iteration::failed(self.curr.clone(), nsearch, e);
        }
        if sr.success {
            self.curr = sr.best;
            mesh.set_origin(self.curr.pos());
            self.record(nsearch, 0, mesh.step());
            return Iteration::ok(self.curr.clone(), nsearch);
        }

        // recenter before polling; the search may have been operating off
        // the current grid
        mesh.set_origin(self.curr.pos());

        let pr = self
            .poller
            .poll(obj, self.evaler.as_ref(), mesh, &self.curr);
        let npoll = pr.nfev;
        let nfev = nsearch + npoll;

        if let Some(e) = pr.err {
            self.record(nsearch, npoll, mesh.step());
            return Iteration::failed(self.curr.clone(), nfev, e);
        }

        if pr.success {
            self.curr = pr.best;
            self.nsuccess += 1;
            if Some(self.nsuccess) == self.n_success_grow {
                mesh.set_step(mesh.step() * 2.0);
                self.nsuccess = 0;
            }
            // the mesh may have been resized, so the new incumbent need not
            // lie on the previous grid; recenter on it
            mesh.set_origin(self.curr.pos());
            self.record(nsearch, npoll, mesh.step());
            Iteration::ok(self.curr.clone(), nfev)
        } else {
            self.nsuccess = 0;
            mesh.set_step(mesh.step() * 0.5);
            let err = if step_vanished(mesh.step(), &self.curr) {
                log::debug!("pattern: poll step contracted to zero after {} iterations", self.count);
                Some(Error::ZeroStep)
            } else {
                None
            };
            self.record(nsearch, npoll, mesh.step());
            Iteration {
                best: self.curr.clone(),
                nfev,
                err,
            }
        }
    }

    fn add_point(&mut self, p: Point) {
        if p.val < self.curr.val {
            self.curr = p;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfoptim_mesh::Infinite;

    fn linear(x: &[f64]) -> f64 {
        x[0]
    }

    #[test]
    fn successful_polls_adopt_the_best_neighbor() {
        let mut pattern = PatternBuilder::new(Point::unevaluated(&[0.0, 0.0])).build();
        let mut mesh = Infinite::new(vec![0.0, 0.0], 1.0);

        let it = pattern.iterate(&linear, &mut mesh);
        assert!(it.err.is_none());
        assert!(it.best.val <= 0.0);
        // mesh recentered on the new incumbent
        assert_eq!(mesh.origin(), pattern.best().pos());
    }

    #[test]
    fn mesh_doubles_after_enough_successes() {
        let mut pattern = PatternBuilder::new(Point::unevaluated(&[0.0, 0.0]))
            .grow_after(2)
            .build();
        let mut mesh = Infinite::new(vec![0.0, 0.0], 1.0);

        // descending objective: every poll succeeds
        pattern.iterate(&linear, &mut mesh);
        assert_eq!(mesh.step(), 1.0);
        pattern.iterate(&linear, &mut mesh);
        assert_eq!(mesh.step(), 2.0, "two successive successes double the step");
        pattern.iterate(&linear, &mut mesh);
        assert_eq!(mesh.step(), 2.0, "counter was reset by the resize");
        pattern.iterate(&linear, &mut mesh);
        assert_eq!(mesh.step(), 4.0);
    }

    #[test]
    fn failed_poll_halves_the_step() {
        let flat = |_x: &[f64]| 1.0;
        let mut pattern = PatternBuilder::new(Point::unevaluated(&[5.0, 5.0])).build();
        let mut mesh = Infinite::new(vec![5.0, 5.0], 1.0);

        // first iteration improves (inf -> 1), later ones cannot
        let it = pattern.iterate(&flat, &mut mesh);
        assert!(it.err.is_none());
        assert_eq!(mesh.step(), 1.0);

        let it = pattern.iterate(&flat, &mut mesh);
        assert!(it.err.is_none());
        assert!(!pattern.best().val.is_infinite());
        assert_eq!(mesh.step(), 0.5);

        let it = pattern.iterate(&flat, &mut mesh);
        assert!(it.err.is_none());
        assert_eq!(mesh.step(), 0.25);
    }

    #[test]
    fn vanished_step_raises_zero_step() {
        let flat = |_x: &[f64]| 0.0;
        let mut pattern = PatternBuilder::new(Point::unevaluated(&[3.0, -2.0])).build();
        let mut mesh = Infinite::new(vec![3.0, -2.0], 1e-15);

        let mut saw_zero_step = false;
        for _ in 0..20 {
            let it = pattern.iterate(&flat, &mut mesh);
            if let Some(Error::ZeroStep) = it.err {
                saw_zero_step = true;
                break;
            }
        }
        assert!(saw_zero_step, "step never vanished; step = {}", mesh.step());
    }

    #[test]
    fn search_success_preempts_the_poll() {
        struct Teleport;
        impl Searcher for Teleport {
            fn search(
                &mut self,
                _obj: &dyn Objective,
                _mesh: &mut dyn Mesh,
                _curr: &Point,
            ) -> SearchResult {
                SearchResult {
                    success: true,
                    best: Point::new(&[-100.0, 0.0], -100.0),
                    nfev: 1,
                    err: None,
                }
            }
        }

        let mut pattern = PatternBuilder::new(Point::new(&[0.0, 0.0], 0.0))
            .searcher(Teleport)
            .build();
        let mut mesh = Infinite::new(vec![0.0, 0.0], 1.0);

        let it = pattern.iterate(&linear, &mut mesh);
        assert!(it.err.is_none());
        assert_eq!(it.nfev, 1, "no polling after a successful search");
        assert_eq!(it.best.val, -100.0);
        assert_eq!(mesh.origin(), vec![-100.0, 0.0]);
    }

    #[test]
    fn continuous_search_sees_a_zero_step_mesh() {
        use std::sync::{Arc, Mutex};

        struct StepProbe {
            seen: Arc<Mutex<Vec<f64>>>,
        }
        impl Searcher for StepProbe {
            fn search(
                &mut self,
                _obj: &dyn Objective,
                mesh: &mut dyn Mesh,
                curr: &Point,
            ) -> SearchResult {
                self.seen.lock().unwrap().push(mesh.step());
                SearchResult {
                    success: false,
                    best: curr.clone(),
                    nfev: 0,
                    err: None,
                }
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut pattern = PatternBuilder::new(Point::unevaluated(&[0.0, 0.0]))
            .searcher(StepProbe { seen: seen.clone() })
            .build();
        let mut mesh = Infinite::new(vec![0.0, 0.0], 2.0);
        pattern.iterate(&linear, &mut mesh);
        assert_eq!(*seen.lock().unwrap(), vec![0.0], "search ran on a zero step");
        assert_eq!(mesh.step(), 2.0, "step restored after the search");
    }

    #[test]
    fn add_point_lowers_the_incumbent() {
        let mut pattern = PatternBuilder::new(Point::new(&[0.0], 10.0)).build();
        pattern.add_point(Point::new(&[1.0], 3.0));
        assert_eq!(pattern.best().val, 3.0);
        pattern.add_point(Point::new(&[2.0], 7.0));
        assert_eq!(pattern.best().val, 3.0);
    }
}
