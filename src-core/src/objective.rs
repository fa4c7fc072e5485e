//! Objective functions and their composable wrappers.

use ndarray::{Array1, Array2};
use std::io::Write;
use std::sync::{Mutex, OnceLock};

use crate::constraints::stack_constr;
use crate::Error;

/// A black-box objective over real vectors.  Lower is better; `+inf`
/// conventionally denotes an infeasible or failed evaluation.  An error may
/// accompany a finite value, in which case the value is still recorded
/// before the error propagates.
///
/// Implementations must be `Sync`: the parallel evaluator shares one
/// objective across worker threads.  Objectives with interior state guard
/// it themselves or stay with the serial evaluator.
pub trait Objective: Sync {
    /// Evaluate at `x`.
    fn objective(&self, x: &[f64]) -> (f64, Option<Error>);
}

impl<F> Objective for F
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    fn objective(&self, x: &[f64]) -> (f64, Option<Error>) {
        (self(x), None)
    }
}

/// Scales an inner objective by a normalized measure of linear-constraint
/// violation.
///
/// The constraints `low <= Ax <= up` are stacked once, lazily, into
/// `A'x <= b` with per-row normalization ranges; the evaluated value is then
/// multiplied by `1 + weight * sum(max(0, (A'x)_i - b_i) / range_i)`.  A
/// weight of zero short-circuits to the raw value.
pub struct Penalty<O> {
    inner: O,
    low: Array1<f64>,
    a: Array2<f64>,
    up: Array1<f64>,
    weight: f64,
    stacked: OnceLock<(Array2<f64>, Array1<f64>, Vec<f64>)>,
}

impl<O: Objective> Penalty<O> {
    /// Wrap `inner` with the constraints `low <= a.x <= up` weighted by
    /// `weight`.
    pub fn new(inner: O, low: Array1<f64>, a: Array2<f64>, up: Array1<f64>, weight: f64) -> Self {
        Penalty {
            inner,
            low,
            a,
            up,
            weight,
            stacked: OnceLock::new(),
        }
    }

    fn violation(&self, x: &[f64]) -> Result<f64, Error> {
        let (stack_a, b, ranges) = match self.stacked.get() {
            Some(s) => s,
            None => {
                let s = stack_constr(&self.low, &self.a, &self.up)?;
                let _ = self.stacked.set(s);
                self.stacked.get().unwrap()
            }
        };
        if stack_a.ncols() != x.len() {
            return Err(Error::Shape {
                expected: stack_a.ncols(),
                got: x.len(),
            });
        }
        let ax = stack_a.dot(&Array1::from_iter(x.iter().copied()));
        let mut tot = 0.0;
        for i in 0..ax.len() {
            let over = ax[i] - b[i];
            if over > 0.0 {
                tot += over / ranges[i];
            }
        }
        Ok(tot)
    }
}

impl<O: Objective> Objective for Penalty<O> {
    fn objective(&self, x: &[f64]) -> (f64, Option<Error>) {
        let (val, err) = self.inner.objective(x);
        if self.weight == 0.0 {
            return (val, err);
        }
        match self.violation(x) {
            Ok(tot) => (val * (1.0 + tot * self.weight), err),
            Err(e) => (f64::INFINITY, Some(e)),
        }
    }
}

/// Forwards to an inner objective and writes a text record of every call to
/// a sink.  Safe to use with the parallel evaluator; the sink and call
/// counter sit behind one lock.
pub struct ObjectivePrinter<O, W> {
    inner: O,
    sink: Mutex<(W, usize)>,
}

impl<O: Objective, W: Write + Send> ObjectivePrinter<O, W> {
    /// Log every `(count, x, value)` triple of `inner` to `sink`.
    pub fn new(inner: O, sink: W) -> Self {
        ObjectivePrinter {
            inner,
            sink: Mutex::new((sink, 0)),
        }
    }

    /// Number of calls made so far.
    pub fn count(&self) -> usize {
        self.sink.lock().unwrap().1
    }
}

impl<O: Objective, W: Write + Send> Objective for ObjectivePrinter<O, W> {
    fn objective(&self, x: &[f64]) -> (f64, Option<Error>) {
        let (val, err) = self.inner.objective(x);
        let mut guard = self.sink.lock().unwrap();
        guard.1 += 1;
        let count = guard.1;
        let mut line = format!("{}", count);
        for v in x {
            line.push_str(&format!(" {}", v));
        }
        line.push_str(&format!("     {}", val));
        if writeln!(guard.0, "{}", line).is_err() {
            log::warn!("objective log write failed at call {}", count);
        }
        (val, err)
    }
}

/// Raises the found-better signal as soon as an evaluation drops below a
/// threshold.  The value is returned together with the signal so the caller
/// still learns how good the new point is.  Backbone of opportunistic
/// polling; never used outside the pattern method.
pub struct EarlyStop<'a> {
    inner: &'a dyn Objective,
    best: f64,
}

impl<'a> EarlyStop<'a> {
    /// Signal once a value beats `best`.
    pub fn new(inner: &'a dyn Objective, best: f64) -> Self {
        EarlyStop { inner, best }
    }
}

impl Objective for EarlyStop<'_> {
    fn objective(&self, x: &[f64]) -> (f64, Option<Error>) {
        let (val, err) = self.inner.objective(x);
        if err.is_some() {
            return (val, err);
        }
        if val < self.best {
            (val, Some(Error::FoundBetter))
        } else {
            (val, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sum_obj(x: &[f64]) -> f64 {
        x.iter().sum()
    }

    #[test]
    fn closures_are_objectives() {
        let (val, err) = sum_obj.objective(&[1.0, 2.0, 3.0]);
        assert_eq!(val, 6.0);
        assert!(err.is_none());
    }

    #[test]
    fn penalty_zero_weight_short_circuits() {
        let p = Penalty::new(
            sum_obj,
            array![0.0],
            array![[1.0, 1.0]],
            array![1.0],
            0.0,
        );
        let (val, err) = p.objective(&[5.0, 5.0]);
        assert_eq!(val, 10.0);
        assert!(err.is_none());
    }

    #[test]
    fn penalty_scales_violations() {
        // constraint: 0 <= x0 + x1 <= 1, range 1
        let p = Penalty::new(
            sum_obj,
            array![0.0],
            array![[1.0, 1.0]],
            array![1.0],
            1.0,
        );
        // feasible: untouched
        let (val, _) = p.objective(&[0.25, 0.25]);
        assert_eq!(val, 0.5);
        // x0 + x1 = 3 violates the upper half by 2
        let (val, _) = p.objective(&[1.5, 1.5]);
        assert_eq!(val, 3.0 * (1.0 + 2.0));
    }

    #[test]
    fn printer_records_every_call() {
        let printer = ObjectivePrinter::new(sum_obj, Vec::new());
        printer.objective(&[1.0, 2.0]);
        printer.objective(&[3.0, 4.0]);
        assert_eq!(printer.count(), 2);
    }

    #[test]
    fn early_stop_signals_below_threshold() {
        let stopper = EarlyStop::new(&sum_obj, 5.0);
        let (val, err) = stopper.objective(&[10.0, 10.0]);
        assert_eq!(val, 20.0);
        assert!(err.is_none());

        let (val, err) = stopper.objective(&[1.0, 1.0]);
        assert_eq!(val, 2.0);
        assert!(matches!(err, Some(Error::FoundBetter)));
    }
}
