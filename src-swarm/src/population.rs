//! Particles and the ordered population that carries them.

use dfoptim_core::{pop, rng, Error, Point};

/// One moving point of the swarm.
#[derive(Debug, Clone)]
pub struct Particle {
    /// Stable identifier, assigned at population construction.
    pub id: usize,
    /// Current (continuous) position and its last evaluated value.
    pub point: Point,
    /// Current velocity; same dimension as the position.
    pub vel: Vec<f64>,
    /// Best evaluated point this particle has ever occupied.  Its value
    /// never increases over the particle's lifetime.
    pub best: Point,
}

impl Particle {
    /// Record the evaluation of this particle's position.
    ///
    /// `evaluated` may carry a mesh-projected position; the personal best
    /// adopts that evaluated point, but the particle's own stored position
    /// is left untouched so the trajectory stays continuous.
    pub fn update(&mut self, evaluated: Point) {
        self.point.val = evaluated.val;
        if evaluated.val < self.best.val {
            self.best = evaluated;
        }
    }

    /// Euclidean norm of the velocity.
    pub fn speed(&self) -> f64 {
        self.vel.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// One velocity-and-position update toward `global` and the personal
    /// best.  Fresh random accelerations are drawn for every dimension and
    /// each velocity component is clamped into `[-vmax_i, vmax_i]`.
    pub(crate) fn advance(
        &mut self,
        global: &Point,
        vmax: &[f64],
        inertia: f64,
        cognition: f64,
        social: f64,
    ) {
        let mut pos = self.point.pos();
        for i in 0..self.vel.len() {
            let r1 = rng::random_f64();
            let r2 = rng::random_f64();
            self.vel[i] = inertia * self.vel[i]
                + cognition * r1 * (self.best.at(i) - pos[i])
                + social * r2 * (global.at(i) - pos[i]);
            self.vel[i] = self.vel[i].clamp(-vmax[i], vmax[i]);
        }
        for i in 0..pos.len() {
            pos[i] += self.vel[i];
        }
        self.point = Point::unevaluated(&pos);
    }
}

/// An ordered sequence of particles.  Indexes are stable until a kill
/// removes an entry.
#[derive(Debug, Default)]
pub struct Population {
    particles: Vec<Particle>,
}

impl Population {
    /// Builds a population from starting points, with per-dimension initial
    /// velocities drawn uniformly from `[minv_i, maxv_i]`.
    pub fn new(points: Vec<Point>, minv: &[f64], maxv: &[f64]) -> Result<Self, Error> {
        if minv.len() != maxv.len() {
            return Err(Error::Shape {
                expected: minv.len(),
                got: maxv.len(),
            });
        }
        let mut particles = Vec::with_capacity(points.len());
        for (id, p) in points.into_iter().enumerate() {
            if p.len() != minv.len() {
                return Err(Error::Shape {
                    expected: minv.len(),
                    got: p.len(),
                });
            }
            let vel: Vec<f64> = (0..minv.len())
                .map(|j| rng::uniform(minv[j], maxv[j]))
                .collect();
            let best = Point::unevaluated(&p.pos());
            particles.push(Particle {
                id,
                point: p,
                vel,
                best,
            });
        }
        Ok(Population { particles })
    }

    /// `n` uniformly random particles inside `[low, up]` with velocity
    /// magnitudes derived from the bound ranges.
    pub fn new_rand(n: usize, low: &[f64], up: &[f64]) -> Result<Self, Error> {
        let maxv: Vec<f64> = low.iter().zip(up.iter()).map(|(l, u)| u - l).collect();
        let minv = vec![0.0; maxv.len()];
        let points = pop::rand_pop(n, low, up)?;
        Population::new(points, &minv, &maxv)
    }

    /// Number of live particles.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// True once every particle has been killed.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// The particles, in order.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub(crate) fn particles_mut(&mut self) -> &mut Vec<Particle> {
        &mut self.particles
    }

    /// The particle holding the best personal best.  The comparison key is
    /// the personal best value, never the current value.
    pub fn best(&self) -> Option<&Particle> {
        self.particles
            .iter()
            .min_by(|a, b| a.best.val.total_cmp(&b.best.val))
    }

    /// Removes every particle closer than `x_tol` to `incumbent` and slower
    /// than `v_tol`, preserving the order of the survivors.  Returns how
    /// many were removed.
    pub(crate) fn kill(&mut self, incumbent: &Point, x_tol: f64, v_tol: f64) -> usize {
        let before = self.particles.len();
        self.particles.retain(|p| {
            let close = match p.point.l2_dist(incumbent) {
                Ok(d) => d < x_tol,
                Err(_) => false,
            };
            !(close && p.speed() < v_tol)
        });
        before - self.particles.len()
    }
}
