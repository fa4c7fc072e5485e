//! dfoptim - derivative-free optimization of black-box objectives.
//!
//! This crate is the facade over the dfoptim workspace:
//! - a mesh-adaptive pattern search ([`pattern`])
//! - a particle swarm ([`swarm`]), usable standalone or as the pattern
//!   method's search step
//! - grid meshes and feasible-region projection ([`mesh`])
//! - the shared evaluation layer and the [`Solver`] driver (re-exported
//!   from `dfoptim_core`)
//!
//! # Example
//!
//! ```no_run
//! use dfoptim::mesh::Infinite;
//! use dfoptim::swarm::{Population, SwarmBuilder};
//! use dfoptim::{rng, SolverBuilder};
//!
//! rng::seed(1);
//! let pop = Population::new_rand(30, &[-5.0, -5.0], &[5.0, 5.0]).unwrap();
//! let swarm = SwarmBuilder::new(pop)
//!     .vmax_bounds(&[-5.0, -5.0], &[5.0, 5.0])
//!     .build();
//! let sphere = |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>();
//! let mut solver = SolverBuilder::new(
//!     Box::new(swarm),
//!     Box::new(sphere),
//!     Box::new(Infinite::continuous()),
//! )
//! .max_eval(10_000)
//! .build();
//! solver.run().unwrap();
//! println!("best {} at {:?}", solver.best().val, solver.best().pos());
//! ```

#![warn(missing_docs)]

pub use dfoptim_core::{
    constraints, eval, pop, recorder, rng, BatchResult, BatchStatus, CacheEvaler, EarlyStop,
    Error, Evaler, Iteration, Method, Objective, ObjectivePrinter, ParallelEvaler, Penalty,
    Point, PointKey, Progress, Recorder, SerialEvaler, Solver, SolverBuilder,
};

/// Grid meshes and projection onto constrained regions.
pub use dfoptim_mesh as mesh;
/// The mesh-adaptive pattern-search method.
pub use dfoptim_pattern as pattern;
/// The particle-swarm method.
pub use dfoptim_swarm as swarm;
