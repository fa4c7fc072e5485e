//! Runs one optimization method against a benchmark function and prints a
//! short report.
//!
//! ```text
//! dfoptim-bench --function holder_table --method hybrid --seed 2
//! dfoptim-bench --function rosenbrock_2d --method pattern --max-eval 20000
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use dfoptim::mesh::{Infinite, Mesh};
use dfoptim::pattern::PatternBuilder;
use dfoptim::swarm::{Population, SwarmBuilder};
use dfoptim::{
    pop, rng, CacheEvaler, Method, ParallelEvaler, Recorder, SerialEvaler, SolverBuilder,
};
use dfoptim_testfunctions::{all_funcs, FuncSpec};

#[derive(Parser, Debug)]
#[command(author, about = "Benchmark dfoptim methods on standard test functions")]
struct Args {
    /// Benchmark function name (see --list).
    #[arg(short, long, default_value = "ackley")]
    function: String,

    /// Search method: swarm, pattern, or hybrid.
    #[arg(short, long, default_value = "swarm")]
    method: String,

    /// Seed for the process-wide random source.
    #[arg(short, long, default_value_t = 1)]
    seed: u64,

    /// Evaluation budget.
    #[arg(long, default_value_t = 50_000)]
    max_eval: usize,

    /// Iteration budget (0 = unbounded).
    #[arg(long, default_value_t = 0)]
    max_iter: usize,

    /// Population size for the swarm (0 = scale with dimension).
    #[arg(long, default_value_t = 0)]
    pop: usize,

    /// Evaluate batches on the rayon pool instead of serially.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Write per-iteration CSV tables into this directory.
    #[arg(long)]
    record_dir: Option<String>,

    /// Print a progress line per iteration.
    #[arg(long, default_value_t = false)]
    disp: bool,

    /// List the available functions and exit.
    #[arg(long, default_value_t = false)]
    list: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.list {
        for spec in all_funcs() {
            println!(
                "{:<20} {:>3}D  [{}, {}]  optimum {}",
                spec.name, spec.ndim, spec.low, spec.up, spec.optimum
            );
        }
        return ExitCode::SUCCESS;
    }

    let spec = match dfoptim_testfunctions::func_spec(&args.function) {
        Some(s) => s,
        None => {
            eprintln!(
                "unknown function {:?}; run with --list to see the choices",
                args.function
            );
            return ExitCode::FAILURE;
        }
    };

    rng::seed(args.seed);

    let recorder = args.record_dir.as_ref().map(|d| Arc::new(Recorder::new(d)));
    let (method, mesh) = match args.method.as_str() {
        "swarm" => build_swarm(&args, &spec, recorder),
        "pattern" => build_pattern(&args, &spec, recorder),
        "hybrid" => build_hybrid(&args, &spec, recorder),
        other => {
            eprintln!("unknown method {:?}; use swarm, pattern, or hybrid", other);
            return ExitCode::FAILURE;
        }
    };

    let objective = move |x: &[f64]| spec.eval_slice(x);
    let mut solver = SolverBuilder::new(method, Box::new(objective), mesh)
        .max_eval(args.max_eval)
        .max_iter(args.max_iter)
        .disp(args.disp)
        .build();

    let outcome = solver.run();

    println!(
        "{} / {}: best {:.6e} (optimum {:.6e}, solved below {:.6e})",
        spec.name, args.method, solver.best().val, spec.optimum, spec.tol
    );
    println!(
        "  {} evaluations, {} iterations, seed {}",
        solver.neval(),
        solver.niter(),
        args.seed
    );
    let best_pos: Vec<String> = solver
        .best()
        .pos()
        .iter()
        .map(|v| format!("{:.6}", v))
        .collect();
    println!("  at [{}]", best_pos.join(", "));
    if let Err(e) = outcome {
        println!("  stopped on: {}", e);
    }

    if solver.best().val < spec.tol {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn pop_size(args: &Args, ndim: usize) -> usize {
    if args.pop > 0 {
        args.pop
    } else {
        10 + 7 * ndim
    }
}

fn swarm_method(
    args: &Args,
    spec: &FuncSpec,
    recorder: Option<Arc<Recorder>>,
) -> dfoptim::swarm::Swarm {
    let (low, up) = spec.bounds();
    let n = pop_size(args, spec.ndim);
    let pop = Population::new_rand(n, &low, &up).expect("bounds are well formed");
    let mut builder = SwarmBuilder::new(pop).vmax_bounds(&low, &up);
    if args.parallel {
        builder = builder.evaler(ParallelEvaler);
    }
    if let Some(rec) = recorder {
        builder = builder.recorder(rec);
    }
    builder.build()
}

fn build_swarm(
    args: &Args,
    spec: &FuncSpec,
    recorder: Option<Arc<Recorder>>,
) -> (Box<dyn Method>, Box<dyn Mesh>) {
    let method = swarm_method(args, spec, recorder);
    (Box::new(method), Box::new(Infinite::continuous()))
}

fn build_pattern(
    args: &Args,
    spec: &FuncSpec,
    recorder: Option<Arc<Recorder>>,
) -> (Box<dyn Method>, Box<dyn Mesh>) {
    let (low, up) = spec.bounds();
    let start = pop::rand_pop(1, &low, &up)
        .expect("bounds are well formed")
        .remove(0);
    let mut builder = PatternBuilder::new(start.clone());
    if args.parallel {
        builder = builder.evaler(ParallelEvaler);
    }
    if let Some(rec) = recorder {
        builder = builder.recorder(rec);
    }
    let step = (spec.up - spec.low) / 10.0;
    (
        Box::new(builder.build()),
        Box::new(Infinite::new(start.pos(), step)),
    )
}

fn build_hybrid(
    args: &Args,
    spec: &FuncSpec,
    recorder: Option<Arc<Recorder>>,
) -> (Box<dyn Method>, Box<dyn Mesh>) {
    let (low, up) = spec.bounds();
    let cache = Arc::new(CacheEvaler::new(SerialEvaler::default()));

    let n = pop_size(args, spec.ndim);
    let minv: Vec<f64> = low
        .iter()
        .zip(up.iter())
        .map(|(l, u)| (u - l) / 20.0)
        .collect();
    let maxv: Vec<f64> = minv.iter().map(|v| v * 4.0).collect();
    let points = pop::rand_pop(n, &low, &up).expect("bounds are well formed");
    let swarm_pop = Population::new(points, &minv, &maxv).expect("dimensions agree");
    let mut swarm_builder = SwarmBuilder::new(swarm_pop)
        .evaler(cache.clone())
        .lin_inertia(0.9, 0.4, args.max_eval / n.max(1))
        .vmax(maxv);
    if let Some(rec) = recorder.clone() {
        swarm_builder = swarm_builder.recorder(rec);
    }
    let swarm = swarm_builder.build();

    let start = pop::rand_pop(1, &low, &up)
        .expect("bounds are well formed")
        .remove(0);
    let mut pattern_builder = PatternBuilder::new(start.clone())
        .evaler(cache)
        .search_method(Box::new(swarm), true);
    if let Some(rec) = recorder {
        pattern_builder = pattern_builder.recorder(rec);
    }
    let step = (spec.up - spec.low) / 10.0;
    (
        Box::new(pattern_builder.build()),
        Box::new(Infinite::new(start.pos(), step)),
    )
}
