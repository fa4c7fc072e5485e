//! The optional search step run before polling.

use dfoptim_core::{Error, Method, Objective, Point};
use dfoptim_mesh::Mesh;

/// What one search step produced.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// True iff the search found a point strictly better than the incumbent.
    pub success: bool,
    /// The improving point on success; the incumbent otherwise.
    pub best: Point,
    /// Objective evaluations spent.
    pub nfev: usize,
    /// Error that aborted the search, if any.
    pub err: Option<Error>,
}

/// Proposes a candidate ahead of the poll, possibly far from the incumbent.
pub trait Searcher {
    /// Run one search against `obj` on `mesh` from `curr`.
    fn search(&mut self, obj: &dyn Objective, mesh: &mut dyn Mesh, curr: &Point) -> SearchResult;
}

/// A searcher that never proposes anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSearcher;

impl Searcher for NullSearcher {
    fn search(&mut self, _obj: &dyn Objective, _mesh: &mut dyn Mesh, curr: &Point) -> SearchResult {
        SearchResult {
            success: false,
            best: curr.clone(),
            nfev: 0,
            err: None,
        }
    }
}

/// Adapts any [`Method`] as a search step.
///
/// The inner method is owned by the searcher, and the searcher by the
/// pattern method, so hybrid compositions never form a reference cycle.
pub struct WrapSearcher {
    method: Box<dyn Method>,
    /// Hand the incumbent to the inner method before searching, letting it
    /// lower its own best.
    pub share: bool,
}

impl WrapSearcher {
    /// Search by running one iteration of `method`.
    pub fn new(method: Box<dyn Method>, share: bool) -> Self {
        WrapSearcher { method, share }
    }
}

impl Searcher for WrapSearcher {
    fn search(&mut self, obj: &dyn Objective, mesh: &mut dyn Mesh, curr: &Point) -> SearchResult {
        if self.share {
            self.method.add_point(curr.clone());
        }
        let it = self.method.iterate(obj, mesh);
        if let Some(e) = it.err {
            return SearchResult {
                success: false,
                best: Point::new(&[], f64::INFINITY),
                nfev: it.nfev,
                err: Some(e),
            };
        }
        if it.best.val < curr.val {
            SearchResult {
                success: true,
                best: it.best,
                nfev: it.nfev,
                err: None,
            }
        } else {
            // the incumbent, not the inner method's best, so a failed search
            // never degrades the pattern state
            SearchResult {
                success: false,
                best: curr.clone(),
                nfev: it.nfev,
                err: None,
            }
        }
    }
}
