//! Particle-swarm optimization.
//!
//! A population of particles moves under inertia plus cognitive and social
//! accelerations toward personal and global bests.  The method evaluates the
//! whole population as one batch per iteration (optionally projected onto a
//! mesh first) and relies entirely on the driver's stopping rules.

#![warn(missing_docs)]

use std::sync::Arc;

use dfoptim_core::{
    BatchStatus, Evaler, Iteration, Method, Objective, Point, Recorder, SerialEvaler,
};
use dfoptim_mesh::Mesh;

mod population;

pub use population::{Particle, Population};

/// Cognition acceleration from Clerc's constriction analysis: a `c1` of 2.05
/// multiplied by the corresponding constriction coefficient.
///
/// Clerc, M. "The swarm and the queen: towards a deterministic and adaptive
/// particle swarm optimization", Proc. 1999 Congress on Evolutionary
/// Computation, pp. 1951-1957.
pub const DEFAULT_COGNITION: f64 = 1.496179765663133;
/// Social acceleration; see [`DEFAULT_COGNITION`].
pub const DEFAULT_SOCIAL: f64 = 1.496179765663133;
/// Constriction coefficient for `c1 = c2 = 2.05`, used as the inertia when
/// the accelerations have it multiplied through.
pub const DEFAULT_INERTIA: f64 = 0.7298437881283576;

const TBL_PARTICLES: &str = "swarmparticles";
const TBL_BEST: &str = "swarmbest";

/// The constriction coefficient for the velocity equation
///
/// ```text
/// v' = k * (v + c1*r1*(p_personal - x) + c2*r2*(p_global - x))
/// ```
///
/// `c1 + c2` should be greater than (but close to) 4 for the trajectories
/// to converge.
pub fn constriction(c1: f64, c2: f64) -> f64 {
    let phi = c1 + c2;
    2.0 / (2.0 - phi - (phi * phi - 4.0 * phi).sqrt()).abs()
}

/// Configures and builds a [`Swarm`].
pub struct SwarmBuilder {
    swarm: Swarm,
}

impl SwarmBuilder {
    /// Start from an initial population.
    pub fn new(pop: Population) -> Self {
        let ndim = pop.particles().first().map_or(0, |p| p.point.len());
        let best = pop
            .best()
            .map(|p| p.best.clone())
            .unwrap_or_else(|| Point::new(&[], f64::INFINITY));
        SwarmBuilder {
            swarm: Swarm {
                pop,
                evaler: Box::new(SerialEvaler::default()),
                cognition: DEFAULT_COGNITION,
                social: DEFAULT_SOCIAL,
                inertia: Box::new(|_| DEFAULT_INERTIA),
                vmax: vec![f64::INFINITY; ndim],
                x_tol: 0.0,
                v_tol: 0.0,
                recorder: None,
                count: 0,
                best,
            },
        }
    }

    /// Replace the evaluator (serial by default).
    pub fn evaler(mut self, ev: impl Evaler + 'static) -> Self {
        self.swarm.evaler = Box::new(ev);
        self
    }

    /// Cognitive and social acceleration coefficients.
    pub fn accelerations(mut self, cognition: f64, social: f64) -> Self {
        self.swarm.cognition = cognition;
        self.swarm.social = social;
        self
    }

    /// Constant inertia.
    pub fn fixed_inertia(mut self, w: f64) -> Self {
        self.swarm.inertia = Box::new(move |_| w);
        self
    }

    /// Inertia decaying linearly from `start` to `end` over `maxiter`
    /// iterations.  Common values are 0.9 down to 0.4.
    ///
    /// Eberhart, R.C.; Shi, Y. "Particle swarm optimization: developments,
    /// applications and resources", Proc. 2001 Congress on Evolutionary
    /// Computation.
    pub fn lin_inertia(mut self, start: f64, end: f64, maxiter: usize) -> Self {
        self.swarm.inertia =
            Box::new(move |iter| start - (start - end) * iter as f64 / maxiter as f64);
        self
    }

    /// Per-dimension speed limits.
    pub fn vmax(mut self, vmax: Vec<f64>) -> Self {
        self.swarm.vmax = vmax;
        self
    }

    /// Speed limits equal to the bounded range of each dimension, the rule
    /// of thumb from Eberhart and Shi.
    pub fn vmax_bounds(mut self, low: &[f64], up: &[f64]) -> Self {
        self.swarm.vmax = low.iter().zip(up.iter()).map(|(l, u)| u - l).collect();
        self
    }

    /// Kill particles that sit within `x_tol` of the incumbent while moving
    /// slower than `v_tol`.  Both default to zero, which disables killing.
    pub fn kill_tolerance(mut self, x_tol: f64, v_tol: f64) -> Self {
        self.swarm.x_tol = x_tol;
        self.swarm.v_tol = v_tol;
        self
    }

    /// Record per-particle and per-iteration state to `recorder`.
    pub fn recorder(mut self, recorder: Arc<Recorder>) -> Self {
        let ndim = self
            .swarm
            .pop
            .particles()
            .first()
            .map_or(0, |p| p.point.len());
        let coords = Recorder::coord_columns(ndim);
        let mut particle_cols = vec!["particle".to_string(), "iter".to_string(), "val".to_string()];
        particle_cols.extend(coords.iter().cloned());
        let mut best_cols = vec!["iter".to_string(), "val".to_string()];
        best_cols.extend(coords);
        recorder.table(TBL_PARTICLES, &particle_cols);
        recorder.table(TBL_BEST, &best_cols);
        self.swarm.recorder = Some(recorder);
        self
    }

    /// Finish the configuration.
    pub fn build(self) -> Swarm {
        self.swarm
    }
}

/// The particle-swarm method.
pub struct Swarm {
    pop: Population,
    evaler: Box<dyn Evaler>,
    cognition: f64,
    social: f64,
    inertia: Box<dyn Fn(usize) -> f64>,
    vmax: Vec<f64>,
    x_tol: f64,
    v_tol: f64,
    recorder: Option<Arc<Recorder>>,
    count: usize,
    best: Point,
}

impl Swarm {
    /// The live population.
    pub fn population(&self) -> &Population {
        &self.pop
    }

    /// The incumbent: best point observed across the population and any
    /// externally contributed points.
    pub fn best(&self) -> &Point {
        &self.best
    }

    fn record(&self) {
        let rec = match &self.recorder {
            Some(r) => r,
            None => return,
        };
        for p in self.pop.particles() {
            let mut row = vec![p.id as f64, self.count as f64, p.point.val];
            row.extend(p.point.pos());
            rec.append(TBL_PARTICLES, row);
        }
        let mut row = vec![self.count as f64, self.best.val];
        row.extend(self.best.pos());
        rec.append(TBL_BEST, row);
        rec.commit();
    }
}

impl Method for Swarm {
    /// One swarm generation: evaluate the (mesh-projected) population,
    /// update personal bests, move every particle, adopt the best personal
    /// best as the incumbent, and optionally kill converged particles.
    fn iterate(&mut self, obj: &dyn Objective, mesh: &mut dyn Mesh) -> Iteration {
        self.count += 1;

        // project current positions for evaluation; the particles keep
        // their continuous positions
        let mut batch = Vec::with_capacity(self.pop.len());
        for p in self.pop.particles() {
            match mesh.nearest(p.point.coords()) {
                Ok(pos) => batch.push(Point::unevaluated(&pos)),
                Err(e) => {
                    return Iteration::failed(self.best.with_val(f64::INFINITY), 0, e.into())
                }
            }
        }

        let result = self.evaler.eval(obj, batch);
        if let BatchStatus::Failed(e) = result.status {
            return Iteration::failed(self.best.with_val(f64::INFINITY), result.nfev, e);
        }

        for (particle, evaluated) in self
            .pop
            .particles_mut()
            .iter_mut()
            .zip(result.points.into_iter())
        {
            particle.update(evaluated);
        }

        self.record();

        // moving draws against the incumbent of the previous generation;
        // the incumbent itself updates afterwards
        let inertia = (self.inertia)(self.count);
        let incumbent = self.best.clone();
        for particle in self.pop.particles_mut() {
            particle.advance(&incumbent, &self.vmax, inertia, self.cognition, self.social);
        }

        if let Some(p) = self.pop.best() {
            if p.best.val < self.best.val {
                self.best = p.best.clone();
            }
        }

        if self.x_tol > 0.0 && self.v_tol > 0.0 {
            let killed = self.pop.kill(&self.best, self.x_tol, self.v_tol);
            if killed > 0 {
                log::debug!("swarm: killed {} converged particles", killed);
            }
        }

        Iteration::ok(self.best.clone(), result.nfev)
    }

    fn add_point(&mut self, p: Point) {
        if p.val < self.best.val {
            self.best = p;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfoptim_core::Error;
    use dfoptim_mesh::Infinite;

    fn sphere(x: &[f64]) -> f64 {
        x.iter().map(|v| v * v).sum()
    }

    #[test]
    fn constriction_matches_clerc_constants() {
        let k = constriction(2.05, 2.05);
        assert!((k - DEFAULT_INERTIA).abs() < 1e-12);
        assert!((k * 2.05 - DEFAULT_COGNITION).abs() < 1e-12);
    }

    #[test]
    fn incumbent_never_increases() {
        let pop = Population::new_rand(20, &[-5.0, -5.0], &[5.0, 5.0]).unwrap();
        let mut swarm = SwarmBuilder::new(pop)
            .vmax_bounds(&[-5.0, -5.0], &[5.0, 5.0])
            .build();
        let mut mesh = Infinite::continuous();

        let mut last = f64::INFINITY;
        for _ in 0..50 {
            let it = swarm.iterate(&sphere, &mut mesh);
            assert!(it.err.is_none());
            assert!(it.best.val <= last, "incumbent went backwards");
            last = it.best.val;
        }
    }

    #[test]
    fn iteration_counts_population_evaluations() {
        let pop = Population::new_rand(17, &[-1.0], &[1.0]).unwrap();
        let mut swarm = SwarmBuilder::new(pop).build();
        let mut mesh = Infinite::continuous();
        let it = swarm.iterate(&sphere, &mut mesh);
        assert_eq!(it.nfev, 17);
    }

    #[test]
    fn mesh_projection_reaches_the_objective() {
        // a unit-step integer-like grid: every evaluated position must sit
        // on whole numbers even though particles roam continuously
        let pop = Population::new_rand(10, &[-3.0, -3.0], &[3.0, 3.0]).unwrap();
        let mut swarm = SwarmBuilder::new(pop).build();
        let mut mesh = Infinite::new(vec![0.0, 0.0], 1.0);

        let on_grid = |x: &[f64]| -> f64 {
            for v in x {
                assert!(
                    (v - v.round()).abs() < 1e-9,
                    "evaluated off-grid position {}",
                    v
                );
            }
            sphere(x)
        };
        let it = swarm.iterate(&on_grid, &mut mesh);
        assert!(it.err.is_none());
    }

    #[test]
    fn objective_failure_reports_infinite_best() {
        let pop = Population::new_rand(5, &[-1.0], &[1.0]).unwrap();
        let mut swarm = SwarmBuilder::new(pop).build();
        let mut mesh = Infinite::continuous();

        struct Failing;
        impl Objective for Failing {
            fn objective(&self, _x: &[f64]) -> (f64, Option<Error>) {
                (f64::INFINITY, Some(Error::Objective("broken".into())))
            }
        }
        let it = swarm.iterate(&Failing, &mut mesh);
        assert!(it.err.is_some());
        assert!(it.best.val.is_infinite());
    }

    #[test]
    fn add_point_lowers_incumbent_without_touching_particles() {
        let pop = Population::new_rand(5, &[-1.0, -1.0], &[1.0, 1.0]).unwrap();
        let mut swarm = SwarmBuilder::new(pop).build();
        let before: Vec<Vec<f64>> = swarm
            .population()
            .particles()
            .iter()
            .map(|p| p.point.pos())
            .collect();

        swarm.add_point(Point::new(&[0.5, 0.5], -10.0));
        assert_eq!(swarm.best().val, -10.0);

        let after: Vec<Vec<f64>> = swarm
            .population()
            .particles()
            .iter()
            .map(|p| p.point.pos())
            .collect();
        assert_eq!(before, after);

        // a worse point is ignored
        swarm.add_point(Point::new(&[0.0, 0.0], 5.0));
        assert_eq!(swarm.best().val, -10.0);
    }
}
