//! Benchmark optimization functions.
//!
//! The classic test set from
//! <https://en.wikipedia.org/wiki/Test_functions_for_optimization>, in the
//! dimensions and bounds the dfoptim test suite exercises.  Every function
//! returns `+inf` outside its canonical bounds, which lets unbounded
//! searches (a pattern poll stepping past the box) treat the boundary as
//! infeasible rather than wander off.

use ndarray::Array1;

fn inside(x: &Array1<f64>, low: f64, up: f64) -> bool {
    x.iter().all(|&v| (low..=up).contains(&v))
}

/// Sum of squares; global minimum 0 at the origin.  Any dimension.
pub fn sphere(x: &Array1<f64>) -> f64 {
    x.iter().map(|v| v * v).sum()
}

/// 2-D Ackley function on `[-5, 5]^2`; global minimum 0 at the origin.
pub fn ackley(x: &Array1<f64>) -> f64 {
    if !inside(x, -5.0, 5.0) {
        return f64::INFINITY;
    }
    let (a, b) = (x[0], x[1]);
    -20.0 * (-0.2 * (0.5 * (a * a + b * b)).sqrt()).exp()
        - (0.5 * ((2.0 * std::f64::consts::PI * a).cos() + (2.0 * std::f64::consts::PI * b).cos()))
            .exp()
        + 20.0
        + std::f64::consts::E
}

/// N-D Rosenbrock valley on `[-30, 30]^n`; global minimum 0 at `(1, ..., 1)`.
pub fn rosenbrock(x: &Array1<f64>) -> f64 {
    if !inside(x, -30.0, 30.0) {
        return f64::INFINITY;
    }
    let mut tot1 = 0.0;
    let mut tot2 = 0.0;
    for i in 0..x.len() - 1 {
        tot1 += (x[i + 1] - x[i] * x[i]).powi(2);
        tot2 += (x[i] - 1.0).powi(2);
    }
    100.0 * tot1 + tot2
}

/// 2-D Holder table on `[-10, 10]^2`; four global minima of -19.2085.
pub fn holder_table(x: &Array1<f64>) -> f64 {
    if !inside(x, -10.0, 10.0) {
        return f64::INFINITY;
    }
    let (a, b) = (x[0], x[1]);
    -(a.sin() * b.cos() * (1.0 - (a * a + b * b).sqrt() / std::f64::consts::PI).abs().exp()).abs()
}

/// 2-D Eggholder on `[-512, 512]^2`; global minimum -959.6407 at
/// `(512, 404.2319)`.
pub fn eggholder(x: &Array1<f64>) -> f64 {
    if !inside(x, -512.0, 512.0) {
        return f64::INFINITY;
    }
    let (a, b) = (x[0], x[1]);
    -(b + 47.0) * (b + a / 2.0 + 47.0).abs().sqrt().sin()
        - a * (a - (b + 47.0)).abs().sqrt().sin()
}

/// 2-D cross-in-tray on `[-10, 10]^2`; four global minima of -2.06261.
pub fn cross_in_tray(x: &Array1<f64>) -> f64 {
    if !inside(x, -10.0, 10.0) {
        return f64::INFINITY;
    }
    let (a, b) = (x[0], x[1]);
    let inner = (a.sin()
        * b.sin()
        * (100.0 - (a * a + b * b).sqrt() / std::f64::consts::PI).abs().exp())
    .abs();
    -0.0001 * (inner + 1.0).powf(0.1)
}

/// 2-D Schaffer N.2 on `[-100, 100]^2`; global minimum 0 at the origin.
pub fn schaffer2(x: &Array1<f64>) -> f64 {
    if !inside(x, -100.0, 100.0) {
        return f64::INFINITY;
    }
    let (a, b) = (x[0], x[1]);
    0.5 + ((a * a - b * b).sin().powi(2) - 0.5) / (1.0 + 0.0001 * (a * a + b * b)).powi(2)
}

/// N-D Styblinski-Tang on `[-5, 5]^n`; global minimum -39.16599 per
/// dimension at `x_i = -2.903534`.
pub fn styblinski_tang(x: &Array1<f64>) -> f64 {
    if !inside(x, -5.0, 5.0) {
        return f64::INFINITY;
    }
    x.iter()
        .map(|&v| v.powi(4) - 16.0 * v * v + 5.0 * v)
        .sum::<f64>()
        / 2.0
}

/// A benchmark function with its bounds, optimum, and solve tolerance.
#[derive(Debug, Clone, Copy)]
pub struct FuncSpec {
    /// Function name, also the recorder table prefix in the demos.
    pub name: &'static str,
    /// The function itself.
    pub f: fn(&Array1<f64>) -> f64,
    /// Dimensionality the spec describes.
    pub ndim: usize,
    /// Lower bound, identical in every dimension.
    pub low: f64,
    /// Upper bound, identical in every dimension.
    pub up: f64,
    /// Global optimum value.
    pub optimum: f64,
    /// A run is considered solved once its best value drops below this.
    pub tol: f64,
}

impl FuncSpec {
    /// Per-dimension bound vectors.
    pub fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![self.low; self.ndim], vec![self.up; self.ndim])
    }

    /// Evaluate from a plain slice, the objective-contract shape.
    pub fn eval_slice(&self, x: &[f64]) -> f64 {
        (self.f)(&Array1::from_iter(x.iter().copied()))
    }
}

fn one_percent_tol(optimum: f64) -> f64 {
    optimum + (optimum * 0.01).abs()
}

/// A spec for every function above, at its customary dimension.
pub fn all_funcs() -> Vec<FuncSpec> {
    vec![
        FuncSpec {
            name: "ackley",
            f: ackley,
            ndim: 2,
            low: -5.0,
            up: 5.0,
            optimum: 0.0,
            tol: 0.01,
        },
        FuncSpec {
            name: "cross_in_tray",
            f: cross_in_tray,
            ndim: 2,
            low: -10.0,
            up: 10.0,
            optimum: -2.06261,
            tol: one_percent_tol(-2.06261),
        },
        FuncSpec {
            name: "eggholder",
            f: eggholder,
            ndim: 2,
            low: -512.0,
            up: 512.0,
            optimum: -959.6407,
            tol: one_percent_tol(-959.6407),
        },
        FuncSpec {
            name: "holder_table",
            f: holder_table,
            ndim: 2,
            low: -10.0,
            up: 10.0,
            optimum: -19.2085,
            tol: one_percent_tol(-19.2085),
        },
        FuncSpec {
            name: "schaffer2",
            f: schaffer2,
            ndim: 2,
            low: -100.0,
            up: 100.0,
            optimum: 0.0,
            tol: 0.01,
        },
        FuncSpec {
            name: "styblinski_tang_2d",
            f: styblinski_tang,
            ndim: 2,
            low: -5.0,
            up: 5.0,
            optimum: -39.16599 * 2.0,
            tol: one_percent_tol(-39.16599 * 2.0),
        },
        FuncSpec {
            name: "rosenbrock_2d",
            f: rosenbrock,
            ndim: 2,
            low: -30.0,
            up: 30.0,
            optimum: 0.0,
            tol: 2.0,
        },
        FuncSpec {
            name: "rosenbrock_30d",
            f: rosenbrock,
            ndim: 30,
            low: -30.0,
            up: 30.0,
            optimum: 0.0,
            tol: 30.0,
        },
    ]
}

/// The spec for `name`, if it exists.
pub fn func_spec(name: &str) -> Option<FuncSpec> {
    all_funcs().into_iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn known_optima_evaluate_correctly() {
        assert!(ackley(&array![0.0, 0.0]) < 1e-12);
        assert!(sphere(&array![0.0, 0.0, 0.0]) == 0.0);
        assert!(rosenbrock(&array![1.0, 1.0]) == 0.0);
        assert!((holder_table(&array![8.05502, 9.66459]) - (-19.2085)).abs() < 1e-4);
        assert!((eggholder(&array![512.0, 404.2319]) - (-959.6407)).abs() < 1e-3);
        assert!((cross_in_tray(&array![1.34941, 1.34941]) - (-2.06261)).abs() < 1e-4);
        assert!(schaffer2(&array![0.0, 0.0]) < 1e-12);
        let st = styblinski_tang(&array![-2.903534, -2.903534]);
        assert!((st - (-39.16599 * 2.0)).abs() < 1e-3);
    }

    #[test]
    fn out_of_bounds_is_infeasible() {
        assert!(ackley(&array![6.0, 0.0]).is_infinite());
        assert!(rosenbrock(&array![31.0, 0.0]).is_infinite());
        assert!(holder_table(&array![0.0, -11.0]).is_infinite());
    }

    #[test]
    fn specs_are_self_consistent() {
        for spec in all_funcs() {
            let (low, up) = spec.bounds();
            assert_eq!(low.len(), spec.ndim);
            assert_eq!(up.len(), spec.ndim);
            assert!(
                spec.tol > spec.optimum,
                "{}: tol must sit above optimum",
                spec.name
            );
            // the optimum region is feasible: the center evaluates finite
            let mid: Vec<f64> = low
                .iter()
                .zip(up.iter())
                .map(|(l, u)| (l + u) / 2.0)
                .collect();
            assert!(spec.eval_slice(&mid).is_finite(), "{}", spec.name);
        }
    }
}
