//! Isotonic (monotone non-decreasing) least-squares regression.

use crate::error::{LearnError, Result};
use ndarray::{Array1, ArrayView1};

/// Fit a non-decreasing function of `x` to `y` and return the fitted values
/// in the order of the inputs.
///
/// Entries sharing the same `x` are pooled to their mean before the pool
/// adjacent violators pass, so tied inputs always receive the same output.
pub fn isotonic_regression(x: &ArrayView1<f64>, y: &ArrayView1<f64>) -> Result<Array1<f64>> {
    if x.len() != y.len() {
        return Err(LearnError::InvalidInput(format!(
            "x and y must have the same length: got {} and {}",
            x.len(),
            y.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(LearnError::InvalidInput(
            "Input contains NaN or infinity".to_string(),
        ));
    }
    let n = x.len();
    if n == 0 {
        return Ok(Array1::zeros(0));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| x[a].total_cmp(&x[b]));

    // Pool ties in x: (value, weight, first index into `order`, count)
    let mut blocks: Vec<(f64, f64, usize, usize)> = Vec::new();
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && x[order[end]] == x[order[start]] {
            end += 1;
        }
        let sum: f64 = order[start..end].iter().map(|&i| y[i]).sum();
        let weight = (end - start) as f64;
        blocks.push((sum / weight, weight, start, end - start));
        start = end;
    }

    // Pool adjacent violators
    let mut stack: Vec<(f64, f64, usize, usize)> = Vec::with_capacity(blocks.len());
    for block in blocks {
        stack.push(block);
        while stack.len() >= 2 {
            let last = stack[stack.len() - 1];
            let prev = stack[stack.len() - 2];
            if prev.0 <= last.0 {
                break;
            }
            stack.truncate(stack.len() - 2);
            let weight = prev.1 + last.1;
            let value = (prev.0 * prev.1 + last.0 * last.1) / weight;
            stack.push((value, weight, prev.2, prev.3 + last.3));
        }
    }

    let mut fitted = Array1::zeros(n);
    for (value, _, first, count) in stack {
        for &i in &order[first..first + count] {
            fitted[i] = value;
        }
    }
    Ok(fitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_already_monotone_is_unchanged() {
        let x = array![1.0, 2.0, 3.0];
        let y = array![1.0, 2.0, 5.0];
        let fit = isotonic_regression(&x.view(), &y.view()).unwrap();
        assert_relative_eq!(fit, y);
    }

    #[test]
    fn test_violators_are_pooled() {
        let x = array![1.0, 2.0, 3.0, 4.0];
        let y = array![1.0, 3.0, 2.0, 4.0];
        let fit = isotonic_regression(&x.view(), &y.view()).unwrap();
        assert_relative_eq!(fit, array![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn test_unsorted_input_keeps_original_order() {
        let x = array![3.0, 1.0, 2.0];
        let y = array![0.0, 2.0, 1.0];
        // Sorted by x, y is decreasing: everything pools to the mean.
        let fit = isotonic_regression(&x.view(), &y.view()).unwrap();
        assert_relative_eq!(fit, array![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_ties_share_a_value() {
        let x = array![1.0, 1.0, 2.0];
        let y = array![0.0, 2.0, 5.0];
        let fit = isotonic_regression(&x.view(), &y.view()).unwrap();
        assert_relative_eq!(fit, array![1.0, 1.0, 5.0]);
    }

    #[test]
    fn test_length_mismatch() {
        let x = array![1.0, 2.0];
        let y = array![1.0];
        assert!(isotonic_regression(&x.view(), &y.view()).is_err());
    }
}
