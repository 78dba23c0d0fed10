//! Pairwise distance helpers built on top of [`DistanceMetric`].

use super::dist_metrics::{DistanceMetric, MetricParams};
use crate::error::{LearnError, Result};
use crate::types::MissingValues;
use crate::utils::shape_str;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

/// Distance matrix between `x` and `y` (or `x` and itself) under a named metric.
pub fn pairwise_distances(
    x: &ArrayView2<f64>,
    y: Option<&ArrayView2<f64>>,
    metric: &str,
    params: MetricParams,
) -> Result<Array2<f64>> {
    DistanceMetric::get_metric(metric, params)?.pairwise(x, y)
}

/// Euclidean distance between two vectors that may contain missing entries.
///
/// Coordinates missing in either vector are ignored and the squared distance
/// is scaled by `n_features / n_present`. Returns NaN when the vectors share
/// no observed coordinate.
///
/// Both vectors must have the same length.
pub fn nan_euclidean(a: &ArrayView1<f64>, b: &ArrayView1<f64>, missing: MissingValues) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "nan_euclidean on vectors of different lengths");
    let n_features = a.len();
    let mut present = 0usize;
    let mut sq = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        if missing.is_missing(x) || missing.is_missing(y) {
            continue;
        }
        present += 1;
        sq += (x - y) * (x - y);
    }
    if present == 0 {
        return f64::NAN;
    }
    (sq * n_features as f64 / present as f64).sqrt()
}

/// Pairwise [`nan_euclidean`] distances between the rows of `x` and `y`.
pub fn nan_euclidean_distances<'a>(
    x: &ArrayView2<'a, f64>,
    y: Option<&ArrayView2<'a, f64>>,
    missing: MissingValues,
) -> Result<Array2<f64>> {
    let y = y.unwrap_or(x);
    if x.ncols() != y.ncols() {
        return Err(LearnError::ShapeMismatch {
            expected_shape: format!("Y with {} features", x.ncols()),
            actual_shape: shape_str(y.dim()),
        });
    }
    let (n, m) = (x.nrows(), y.nrows());
    let flat: Vec<f64> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let row = x.row(i);
            (0..m).map(move |j| nan_euclidean(&row, &y.row(j), missing))
        })
        .collect();
    Ok(Array2::from_shape_vec((n, m), flat)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_nan_euclidean_scales_by_present_fraction() {
        let x = array![[3.0, f64::NAN, f64::NAN, 6.0], [1.0, f64::NAN, f64::NAN, 5.0]];
        let d = nan_euclidean_distances(&x.view(), None, MissingValues::Nan).unwrap();
        // Two shared coordinates out of four: sqrt(4/2 * (4 + 1))
        assert_relative_eq!(d[[0, 1]], (2.0f64 * 5.0).sqrt(), epsilon = 1e-12);
        assert_eq!(d[[0, 0]], 0.0);
    }

    #[test]
    fn test_nan_euclidean_no_shared_coordinates() {
        let a = array![1.0, f64::NAN];
        let b = array![f64::NAN, 2.0];
        assert!(nan_euclidean(&a.view(), &b.view(), MissingValues::Nan).is_nan());
    }

    #[test]
    fn test_nan_euclidean_with_marker() {
        let x = array![[-1.0, 2.0], [0.0, 4.0]];
        let d = nan_euclidean_distances(&x.view(), None, MissingValues::Value(-1.0)).unwrap();
        assert_relative_eq!(d[[0, 1]], (2.0f64 * 4.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_nan_euclidean_distances_between_two_sets() {
        let x = array![[0.0, f64::NAN], [3.0, 4.0]];
        let y = array![[0.0, 0.0]];
        let d = nan_euclidean_distances(&x.view(), Some(&y.view()), MissingValues::Nan).unwrap();
        assert_eq!(d.dim(), (2, 1));
        assert_relative_eq!(d[[0, 0]], 0.0);
        assert_relative_eq!(d[[1, 0]], 5.0);

        let z = array![[1.0, 2.0, 3.0]];
        assert!(nan_euclidean_distances(&x.view(), Some(&z.view()), MissingValues::Nan).is_err());
    }

    #[test]
    #[should_panic(expected = "different lengths")]
    #[cfg(debug_assertions)]
    fn test_nan_euclidean_length_mismatch() {
        let a = array![1.0, 2.0, 3.0];
        let b = array![1.0, 2.0];
        nan_euclidean(&a.view(), &b.view(), MissingValues::Nan);
    }

    #[test]
    fn test_pairwise_distances_by_name() {
        let x = array![[0.0, 0.0], [3.0, 4.0]];
        let d = pairwise_distances(&x.view(), None, "l1", MetricParams::new()).unwrap();
        assert_relative_eq!(d[[0, 1]], 7.0);
    }
}
