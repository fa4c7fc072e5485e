//! Poll-direction spans and the stateful poller.

use dfoptim_core::{rng, BatchStatus, EarlyStop, Error, Evaler, Objective, Point, PointKey};
use dfoptim_mesh::Mesh;

/// A poll displacement in units of the current mesh step, remembered with
/// the objective value it last produced.
#[derive(Debug, Clone)]
pub struct Direction {
    /// Integer coordinates, one per dimension.
    pub dir: Vec<i64>,
    /// Objective value observed at the point this direction yielded.
    pub val: f64,
}

/// A family of poll-direction sets.
#[derive(Debug, Clone, Copy)]
pub enum Span {
    /// `+e_i` and `-e_i` for every dimension, in a randomly permuted order.
    Compass2N,
    /// One direction per dimension with random polarity, plus the negation
    /// of all of them.  The all-negated diagonal is polled first.
    CompassNp1,
    /// `n` random `(d, -d)` pairs with between 2 and `ndim` nonzero
    /// coordinates, excluding the zero vector and the compass axes.
    RandomN(usize),
}

impl Span {
    /// Generate the directions of this span for `ndim` dimensions.
    pub fn directions(&self, ndim: usize) -> Vec<Vec<i64>> {
        match *self {
            Span::Compass2N => compass_2n(ndim),
            Span::CompassNp1 => compass_np1(ndim),
            Span::RandomN(n) => random_n(n, ndim),
        }
    }
}

fn compass_2n(ndim: usize) -> Vec<Vec<i64>> {
    let mut dirs = vec![vec![0i64; ndim]; 2 * ndim];
    let perms = rng::perm(ndim);
    for i in 0..ndim {
        dirs[perms[i]][i] = 1;
        dirs[ndim + perms[i]][i] = -1;
    }
    dirs
}

fn compass_np1(ndim: usize) -> Vec<Vec<i64>> {
    let mut dirs = Vec::with_capacity(ndim + 1);
    let mut diagonal = vec![0i64; ndim];
    for i in 0..ndim {
        let mut d = vec![0i64; ndim];
        if rng::below(2) == 0 {
            d[i] = -1;
            diagonal[i] = 1;
        } else {
            d[i] = 1;
            diagonal[i] = -1;
        }
        dirs.push(d);
    }
    dirs.push(diagonal);
    // poll the diagonal direction first
    let end = dirs.len() - 1;
    dirs.swap(0, end);
    dirs
}

fn random_n(n: usize, ndim: usize) -> Vec<Vec<i64>> {
    let mut dirs = Vec::with_capacity(n);
    if ndim == 1 {
        // the compass directions already cover everything
        return dirs;
    }
    while dirs.len() < n {
        let mut d1 = vec![0i64; ndim];
        let mut d2 = vec![0i64; ndim];

        let n_nonzero = if ndim == 2 { 2 } else { rng::below(2) + 2 };
        let perms = rng::perm(ndim);
        for &axis in perms.iter().take(n_nonzero) {
            if rng::below(2) == 0 {
                d1[axis] = 1;
                d2[axis] = -1;
            } else {
                d1[axis] = -1;
                d2[axis] = 1;
            }
        }
        dirs.push(d1);
        dirs.push(d2);
    }
    dirs
}

/// What one poll produced.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    /// True iff a strictly better point than the poll center was found.
    pub success: bool,
    /// The improving point on success; the poll center otherwise.
    pub best: Point,
    /// Objective evaluations spent.
    pub nfev: usize,
    /// Error that aborted the poll, if any.
    pub err: Option<Error>,
}

impl PollOutcome {
    fn failed(best: Point, nfev: usize, err: Error) -> Self {
        PollOutcome {
            success: false,
            best,
            nfev,
            err: Some(err),
        }
    }
}

/// Generates, filters, and opportunistically evaluates poll candidates
/// around an incumbent, remembering the directions that paid off.
pub struct Poller {
    /// Number of previously successful directions reused on the next poll.
    pub n_keep: usize,
    /// Candidates closer than this to the poll center are discarded; such
    /// points arise when the mesh clips a candidate back onto the center.
    pub skip_eps: f64,
    span: Span,
    keep: Vec<Direction>,
    points: Vec<Point>,
    prev_center: Option<PointKey>,
    prev_step: f64,
}

impl Poller {
    /// A compass poller keeping up to `ndim` good directions.
    pub fn new(ndim: usize) -> Self {
        Poller {
            n_keep: ndim,
            skip_eps: 1e-10,
            span: Span::Compass2N,
            keep: Vec::new(),
            points: Vec::new(),
            prev_center: None,
            prev_step: 0.0,
        }
    }

    /// Replace the direction span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The candidates of the most recent poll, with their evaluated values.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The remembered good directions, best first.
    pub fn kept(&self) -> &[Direction] {
        &self.keep
    }

    /// Poll on `mesh` centered on `from`.
    ///
    /// Candidates are the remembered good directions (polled first), then
    /// the configured span.  Polling the same center at the same step twice
    /// substitutes a fresh random span so repeated polls do not re-evaluate
    /// the identical compass set; this fires when a mesh cannot contract
    /// below a minimum step.  The batch runs under an early-stop wrapper at
    /// the incumbent value, so an opportunistic find ends the poll early
    /// and still counts as success.
    pub fn poll(
        &mut self,
        obj: &dyn Objective,
        ev: &dyn Evaler,
        mesh: &mut dyn Mesh,
        from: &Point,
    ) -> PollOutcome {
        let ndim = from.len();
        let step = mesh.step();
        let mut candidates: Vec<Point> = Vec::new();

        // good directions from the last poll go in front so opportunistic
        // termination can fire before the full span is spent
        for d in &self.keep {
            match point_from_direction(from, &d.dir, mesh) {
                Ok(p) => candidates.push(p),
                Err(e) => return PollOutcome::failed(from.clone(), 0, e),
            }
        }

        let center = from.key();
        let same_spot = self.prev_center.as_ref() == Some(&center) && self.prev_step == step;
        let span_dirs = if same_spot {
            Span::RandomN(2 * ndim).directions(ndim)
        } else {
            let mut dirs = self.span.directions(ndim);
            dirs.extend(Span::RandomN(ndim).directions(ndim));
            self.prev_center = Some(center);
            dirs
        };
        self.prev_step = step;

        for d in &span_dirs {
            match point_from_direction(from, d, mesh) {
                Ok(p) => candidates.push(p),
                Err(e) => return PollOutcome::failed(from.clone(), 0, e),
            }
        }

        self.points = if self.skip_eps == 0.0 {
            candidates
        } else {
            candidates
                .into_iter()
                .filter(|p| {
                    from.l2_dist(p).map_or(true, |d| d > self.skip_eps)
                })
                .collect()
        };

        let stopper = EarlyStop::new(obj, from.val);
        let result = ev.eval(&stopper, self.points.clone());
        if let BatchStatus::Failed(e) = result.status {
            return PollOutcome::failed(from.clone(), result.nfev, e);
        }

        // every strict improver feeds the direction memory before the best
        // is chosen
        let mut best = from.clone();
        for p in &result.points {
            if p.val < from.val {
                if let Some(dir) = direction_between(from, p, step) {
                    self.keep.push(Direction {
                        dir,
                        val: p.val,
                    });
                }
                if p.val < best.val {
                    best = p.clone();
                }
            }
        }
        self.keep.sort_by(|a, b| a.val.total_cmp(&b.val));
        self.keep.truncate(self.n_keep);
        self.points = result.points;

        let success = best.val < from.val;
        PollOutcome {
            success,
            best: if success { best } else { from.clone() },
            nfev: result.nfev,
            err: None,
        }
    }
}

/// `from + dir * step`, projected onto the mesh, as an unevaluated point.
fn point_from_direction(
    from: &Point,
    dir: &[i64],
    mesh: &dyn Mesh,
) -> Result<Point, Error> {
    let step = mesh.step();
    let pos: Vec<f64> = (0..from.len())
        .map(|i| from.at(i) + dir[i] as f64 * step)
        .collect();
    Ok(Point::unevaluated(&mesh.nearest(&pos)?))
}

/// The integer displacement from `from` to `to` in units of `step`.
fn direction_between(from: &Point, to: &Point, step: f64) -> Option<Vec<i64>> {
    if step == 0.0 {
        return None;
    }
    Some(
        (0..from.len())
            .map(|i| ((to.at(i) - from.at(i)) / step).round() as i64)
            .collect(),
    )
}
