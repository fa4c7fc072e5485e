//! Stacking of two-sided linear constraints into one-sided form.

use ndarray::{s, Array1, Array2};

use crate::Error;

/// Stacks `low <= Ax <= up` into the one-sided system `A'x <= b` with
/// `A' = [A; -A]` and `b = [up; -low]`.
///
/// Also returns per-row normalization ranges for penalty magnitudes:
/// `range_i = up_i - low_i`, falling back to `1` when both bounds are zero
/// and to `|up_i|` when the bounds coincide at a nonzero value.  The ranges
/// are doubled to cover both stacked halves.
pub fn stack_constr(
    low: &Array1<f64>,
    a: &Array2<f64>,
    up: &Array1<f64>,
) -> Result<(Array2<f64>, Array1<f64>, Vec<f64>), Error> {
    let (m, n) = a.dim();
    if low.len() != m {
        return Err(Error::Shape {
            expected: m,
            got: low.len(),
        });
    }
    if up.len() != m {
        return Err(Error::Shape {
            expected: m,
            got: up.len(),
        });
    }

    let mut stacked = Array2::<f64>::zeros((2 * m, n));
    stacked.slice_mut(s![..m, ..]).assign(a);
    stacked.slice_mut(s![m.., ..]).assign(&a.mapv(|v| -v));

    let mut b = Array1::<f64>::zeros(2 * m);
    b.slice_mut(s![..m]).assign(up);
    b.slice_mut(s![m..]).assign(&low.mapv(|v| -v));

    let mut ranges = Vec::with_capacity(2 * m);
    for i in 0..m {
        let span = up[i] - low[i];
        let range = if span != 0.0 {
            span
        } else if up[i] == 0.0 {
            1.0
        } else {
            up[i].abs()
        };
        ranges.push(range);
    }
    let doubled = ranges.clone();
    ranges.extend(doubled);

    Ok((stacked, b, ranges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn stacks_both_halves() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let low = array![-1.0, 0.0];
        let up = array![1.0, 5.0];
        let (stacked, b, ranges) = stack_constr(&low, &a, &up).unwrap();

        assert_eq!(stacked.dim(), (4, 2));
        assert_eq!(stacked.row(0).to_vec(), vec![1.0, 2.0]);
        assert_eq!(stacked.row(2).to_vec(), vec![-1.0, -2.0]);
        assert_eq!(b.to_vec(), vec![1.0, 5.0, 1.0, -0.0]);
        assert_eq!(ranges, vec![2.0, 5.0, 2.0, 5.0]);
    }

    #[test]
    fn degenerate_ranges_fall_back() {
        let a = array![[1.0], [1.0]];
        // first row: up == low == 0 -> range 1; second: up == low == 3 -> range 3
        let low = array![0.0, 3.0];
        let up = array![0.0, 3.0];
        let (_, _, ranges) = stack_constr(&low, &a, &up).unwrap();
        assert_eq!(ranges, vec![1.0, 3.0, 1.0, 3.0]);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let a = array![[1.0, 2.0]];
        let low = array![0.0, 0.0];
        let up = array![1.0];
        assert!(matches!(
            stack_constr(&low, &a, &up),
            Err(Error::Shape { .. })
        ));
    }
}
