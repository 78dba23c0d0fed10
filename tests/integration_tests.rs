//! Integration tests for learnkit.

use approx::assert_relative_eq;
use learnkit::datasets::{generate_clustered_data, mask_missing};
use learnkit::prelude::*;
use ndarray::{Array2, array, s};

const NAN: f64 = f64::NAN;

fn marker_value(missing: MissingValues) -> f64 {
    match missing {
        MissingValues::Nan => NAN,
        MissingValues::Value(v) => v,
    }
}

fn make_imputer(kind: &str, missing: MissingValues, add_indicator: bool) -> Box<dyn Imputer> {
    match kind {
        "simple" => Box::new(
            SimpleImputer::default()
                .with_missing_values(missing)
                .with_add_indicator(add_indicator),
        ),
        "knn" => Box::new(
            KNNImputer::default()
                .with_missing_values(missing)
                .with_add_indicator(add_indicator),
        ),
        "iterative" => Box::new(
            IterativeImputer::default()
                .with_missing_values(missing)
                .with_add_indicator(add_indicator)
                .with_random_state(0),
        ),
        other => panic!("unknown imputer {}", other),
    }
}

const IMPUTERS: [&str; 3] = ["simple", "knn", "iterative"];

#[test]
fn test_imputers_add_indicator() {
    let markers = [
        MissingValues::Nan,
        MissingValues::Value(-1.0),
        MissingValues::Value(0.0),
    ];
    let expected_indicator = array![
        [1.0, 0.0, 0.0, 1.0],
        [0.0, 1.0, 0.0, 1.0],
        [0.0, 0.0, 1.0, 1.0],
        [0.0, 0.0, 0.0, 1.0],
    ];

    for missing in markers {
        let m = marker_value(missing);
        let x = array![
            [m, 1.0, 5.0, m, 1.0],
            [2.0, m, 1.0, m, 2.0],
            [6.0, 3.0, m, m, 3.0],
            [1.0, 2.0, 9.0, m, 4.0],
        ];
        for kind in IMPUTERS {
            let mut with_ind = make_imputer(kind, missing, true);
            let out = with_ind.fit_transform(&x.view()).unwrap();
            // Column 3 is entirely missing and dropped; the indicator still reports it.
            assert_eq!(out.dim(), (4, 8), "{} with {:?}", kind, missing);

            let indicator = with_ind.indicator().unwrap();
            assert_eq!(indicator.features_().unwrap(), &[0, 1, 2, 3]);
            assert_eq!(out.slice(s![.., 4..]), expected_indicator);

            let mut plain = make_imputer(kind, missing, false);
            let imputed = plain.fit_transform(&x.view()).unwrap();
            assert_relative_eq!(out.slice(s![.., ..4]), imputed, epsilon = 1e-10);
            assert!(imputed.iter().all(|v| v.is_finite() && *v != m));
        }
    }
}

#[test]
fn test_simple_imputer_add_indicator_values() {
    let x = array![
        [NAN, 1.0, 5.0, NAN, 1.0],
        [2.0, NAN, 1.0, NAN, 2.0],
        [6.0, 3.0, NAN, NAN, 3.0],
        [1.0, 2.0, 9.0, NAN, 4.0],
    ];
    let expected = array![
        [3.0, 1.0, 5.0, 1.0, 1.0, 0.0, 0.0, 1.0],
        [2.0, 2.0, 1.0, 2.0, 0.0, 1.0, 0.0, 1.0],
        [6.0, 3.0, 5.0, 3.0, 0.0, 0.0, 1.0, 1.0],
        [1.0, 2.0, 9.0, 4.0, 0.0, 0.0, 0.0, 1.0],
    ];
    let mut imputer = SimpleImputer::default().with_add_indicator(true);
    let out = imputer.fit_transform(&x.view()).unwrap();
    assert_relative_eq!(out, expected);
}

#[test]
fn test_imputers_handle_missing_only_in_test_data() {
    let train = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]];
    let test = array![[NAN, 3.0], [2.0, NAN]];

    for kind in IMPUTERS {
        for add_indicator in [false, true] {
            let mut imputer = make_imputer(kind, MissingValues::Nan, add_indicator);
            imputer.fit(&train.view()).unwrap();
            let out = imputer.transform(&test.view()).unwrap();
            // No feature was missing during fit, so no indicator columns are added.
            assert_eq!(out.dim(), (2, 2), "{}", kind);
            assert!(out.iter().all(|v| v.is_finite()), "{}", kind);
        }
    }
}

#[test]
fn test_imputers_feature_names_out() {
    let names: Vec<String> = ["a", "b", "c", "d", "e", "f"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let x = array![
        [NAN, 1.0, 5.0, 1.0, NAN, 1.0],
        [2.0, NAN, 1.0, NAN, NAN, 2.0],
        [6.0, 3.0, 7.0, 3.0, NAN, 3.0],
        [1.0, 2.0, 9.0, 4.0, NAN, 4.0],
    ];
    let expected = vec![
        "a",
        "b",
        "c",
        "d",
        "f",
        "missingindicator_a",
        "missingindicator_b",
        "missingindicator_d",
        "missingindicator_e",
    ];

    for kind in IMPUTERS {
        let mut imputer = make_imputer(kind, MissingValues::Nan, true);
        let out = imputer.fit_transform(&x.view()).unwrap();
        let names_out = imputer.get_feature_names_out(Some(&names)).unwrap();
        assert_eq!(names_out, expected, "{}", kind);
        assert_eq!(out.ncols(), names_out.len());
    }
}

#[test]
fn test_imputers_recover_masked_clusters() {
    let truth = generate_clustered_data(3, 4, 4, 25, 0.2).unwrap();
    let masked = mask_missing(&truth, 0.1, 3).unwrap();
    let n_masked = masked.iter().filter(|v| v.is_nan()).count();
    assert!(n_masked > 0);

    let rmse = |imputed: &Array2<f64>| {
        let sum: f64 = masked
            .iter()
            .zip(truth.iter().zip(imputed.iter()))
            .filter(|(m, _)| m.is_nan())
            .map(|(_, (t, i))| (t - i) * (t - i))
            .sum();
        (sum / n_masked as f64).sqrt()
    };

    let mut simple = SimpleImputer::default();
    let simple_rmse = rmse(&simple.fit_transform(&masked.view()).unwrap());

    let mut knn = KNNImputer::new(3);
    let knn_rmse = rmse(&knn.fit_transform(&masked.view()).unwrap());

    // Neighbours come from the same cluster, column means mix all four.
    assert!(knn_rmse < simple_rmse, "knn {} vs simple {}", knn_rmse, simple_rmse);
}

#[test]
fn test_pairwise_distances_agrees_with_metric_object() {
    let x = generate_clustered_data(0, 2, 3, 6, 0.5).unwrap();
    let y = x.slice(s![..4, ..]).to_owned();
    for name in ["euclidean", "manhattan", "chebyshev", "canberra", "braycurtis"] {
        let metric = DistanceMetric::get_metric(name, MetricParams::default()).unwrap();
        let a = metric.pairwise(&x.view(), Some(&y.view())).unwrap();
        let b = pairwise_distances(&x.view(), Some(&y.view()), name, MetricParams::default())
            .unwrap();
        assert_relative_eq!(a, b);
        // Self-distances of the leading rows appear on the diagonal.
        for i in 0..4 {
            assert_relative_eq!(a[[i, i]], 0.0, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_nan_euclidean_matches_euclidean_on_complete_data() {
    let x = generate_clustered_data(1, 3, 4, 5, 0.3).unwrap();
    let nan_d = nan_euclidean_distances(&x.view(), None, MissingValues::Nan).unwrap();
    let d = pairwise_distances(&x.view(), None, "euclidean", MetricParams::default()).unwrap();
    assert_relative_eq!(nan_d, d, epsilon = 1e-10);
}

#[test]
fn test_metric_save_load_roundtrip() {
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let path = dir.path().join("metric.json");

    let x = generate_clustered_data(2, 2, 4, 5, 0.4).unwrap();
    let metric = DistanceMetric::get_metric(
        "minkowski",
        MetricParams::new().p(3.0).w(vec![1.0, 2.0, 0.5, 1.0]),
    )
    .unwrap();
    fs::write(&path, serde_json::to_string(&metric).unwrap()).unwrap();

    let loaded: DistanceMetric = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded.name(), metric.name());
    assert_relative_eq!(
        loaded.pairwise(&x.view(), None).unwrap(),
        metric.pairwise(&x.view(), None).unwrap()
    );
}

#[test]
fn test_fitted_imputer_save_load_roundtrip() {
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let path = dir.path().join("imputer.json");

    let train = array![[1.0, 10.0], [NAN, 20.0], [3.0, NAN], [5.0, 40.0]];
    let mut imputer = SimpleImputer::new(ImputeStrategy::Median).with_add_indicator(true);
    imputer.fit(&train.view()).unwrap();
    fs::write(&path, serde_json::to_string(&imputer).unwrap()).unwrap();

    let loaded: SimpleImputer = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let test = array![[NAN, NAN], [2.0, 5.0]];
    assert_relative_eq!(
        loaded.transform(&test.view()).unwrap(),
        imputer.transform(&test.view()).unwrap()
    );
}

#[test]
fn test_mds_separates_clusters() {
    let x = generate_clustered_data(0, 2, 4, 10, 0.1).unwrap();
    let mut mds = MDS::new(2).with_random_state(0);
    let embedding = mds.fit_transform(&x.view(), None).unwrap();
    assert_eq!(embedding.dim(), (20, 2));

    let d = pairwise_distances(&embedding.view(), None, "euclidean", MetricParams::default())
        .unwrap();
    let within = d[[0, 1]].max(d[[10, 11]]);
    let between = d[[0, 10]];
    assert!(between > within);
}

#[test]
fn test_mds_on_precomputed_pairwise_distances() {
    let x = generate_clustered_data(4, 3, 3, 4, 0.3).unwrap();
    let d = pairwise_distances(&x.view(), None, "manhattan", MetricParams::default()).unwrap();
    let mut mds = MDS::new(2)
        .with_dissimilarity(Dissimilarity::Precomputed)
        .with_metric(false)
        .with_normalized_stress(true)
        .with_random_state(1);
    mds.fit(&d.view(), None).unwrap();
    assert!(mds.stress_() >= 0.0 && mds.stress_() <= 1.0);
    assert_eq!(mds.dissimilarity_matrix_().unwrap(), &d);
}

#[test]
fn test_isotonic_feeds_monotone_fit() {
    let x = array![1.0, 2.0, 3.0, 4.0, 5.0];
    let y = array![1.0, 3.0, 2.0, 4.0, 3.5];
    let fitted = isotonic_regression(&x.view(), &y.view()).unwrap();
    assert!(fitted.windows(2).into_iter().all(|w| w[0] <= w[1]));
    assert_relative_eq!(fitted.sum(), y.sum(), epsilon = 1e-12);
}
