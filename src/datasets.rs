//! Small synthetic datasets for tests, demos and the benchmark binary.

use crate::error::{LearnError, Result};
use ndarray::{Array2, array, s};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Gaussian blobs around fixed centres shifted away from the origin.
///
/// At most 4 clusters and 4 features are available. Rows are grouped by
/// cluster, `n_samples_per_cluster` at a time.
pub fn generate_clustered_data(
    seed: u64,
    n_clusters: usize,
    n_features: usize,
    n_samples_per_cluster: usize,
    std: f64,
) -> Result<Array2<f64>> {
    let means = array![
        [1.0, 1.0, 1.0, 0.0],
        [-1.0, -1.0, 0.0, 1.0],
        [1.0, -1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0, 0.0],
    ] + 10.0;
    if n_clusters > means.nrows() || n_features > means.ncols() {
        return Err(LearnError::InvalidParameter(format!(
            "at most {} clusters and {} features are supported, got {} and {}",
            means.nrows(),
            means.ncols(),
            n_clusters,
            n_features
        )));
    }
    if !(std.is_finite() && std >= 0.0) {
        return Err(LearnError::InvalidParameter(format!(
            "std must be finite and non-negative, got {}",
            std
        )));
    }
    let normal = Normal::new(0.0, std)
        .map_err(|e| LearnError::InvalidParameter(format!("invalid std {}: {}", std, e)))?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut x = Array2::<f64>::zeros((n_clusters * n_samples_per_cluster, n_features));
    for c in 0..n_clusters {
        let centre = means.slice(s![c, ..n_features]);
        let start = c * n_samples_per_cluster;
        let mut block = x.slice_mut(s![start..start + n_samples_per_cluster, ..]);
        for mut row in block.rows_mut() {
            for (v, m) in row.iter_mut().zip(centre.iter()) {
                *v = m + normal.sample(&mut rng);
            }
        }
    }
    Ok(x)
}

/// Copy of `x` with roughly `rate` of its entries replaced by NaN.
pub fn mask_missing(x: &Array2<f64>, rate: f64, seed: u64) -> Result<Array2<f64>> {
    if !(0.0..1.0).contains(&rate) {
        return Err(LearnError::InvalidParameter(format!(
            "missing rate must be in [0, 1), got {}",
            rate
        )));
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Ok(x.mapv(|v| if rng.random::<f64>() < rate { f64::NAN } else { v }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Axis;

    #[test]
    fn test_clustered_data_shape_and_centres() {
        let x = generate_clustered_data(0, 3, 2, 50, 0.1).unwrap();
        assert_eq!(x.dim(), (150, 2));
        let first = x.slice(s![..50, ..]).mean_axis(Axis(0)).unwrap();
        assert!((first[0] - 11.0).abs() < 0.1);
        assert!((first[1] - 11.0).abs() < 0.1);
    }

    #[test]
    fn test_clustered_data_is_seeded() {
        let a = generate_clustered_data(7, 2, 4, 10, 0.4).unwrap();
        let b = generate_clustered_data(7, 2, 4, 10, 0.4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_clustered_data_limits() {
        assert!(generate_clustered_data(0, 5, 2, 10, 0.4).is_err());
        assert!(generate_clustered_data(0, 2, 5, 10, 0.4).is_err());
        assert!(generate_clustered_data(0, 2, 2, 10, -1.0).is_err());
        assert!(generate_clustered_data(0, 2, 2, 10, f64::NAN).is_err());
        assert!(generate_clustered_data(0, 2, 2, 10, f64::INFINITY).is_err());
    }

    #[test]
    fn test_clustered_data_zero_std_is_the_centres() {
        let x = generate_clustered_data(0, 2, 2, 3, 0.0).unwrap();
        assert!(x.slice(s![..3, ..]).iter().all(|v| *v == 11.0));
        assert!(x.slice(s![3.., ..]).iter().all(|v| *v == 9.0));
    }

    #[test]
    fn test_mask_missing_rate() {
        let x = Array2::<f64>::ones((200, 5));
        let masked = mask_missing(&x, 0.2, 1).unwrap();
        let frac = masked.iter().filter(|v| v.is_nan()).count() as f64 / 1000.0;
        assert!(frac > 0.1 && frac < 0.3);
        assert!(mask_missing(&x, 1.0, 1).is_err());
    }
}
