//! Nearest-neighbour imputation.

use super::base::{Imputer, MissingIndicator, concatenate_indicator, input_feature_names};
use crate::error::{LearnError, Result};
use crate::metrics::nan_euclidean;
use crate::types::MissingValues;
use crate::utils::{check_missing_input, masked_column_means, missing_mask, shape_str};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How donor values are averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KnnWeights {
    /// Every donor counts equally.
    #[default]
    Uniform,
    /// Donors are weighted by the inverse of their distance.
    Distance,
}

/// Fills each missing entry with the average of its nearest training rows
/// that observed the feature, under the nan-euclidean distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNImputer {
    pub missing_values: MissingValues,
    pub n_neighbors: usize,
    pub weights: KnnWeights,
    pub keep_empty_features: bool,
    pub add_indicator: bool,
    fit_x_: Option<Array2<f64>>,
    valid_features_: Vec<usize>,
    column_means_: Vec<f64>,
    indicator_: Option<MissingIndicator>,
}

impl Default for KNNImputer {
    fn default() -> Self {
        Self {
            missing_values: MissingValues::Nan,
            n_neighbors: 5,
            weights: KnnWeights::Uniform,
            keep_empty_features: false,
            add_indicator: false,
            fit_x_: None,
            valid_features_: Vec::new(),
            column_means_: Vec::new(),
            indicator_: None,
        }
    }
}

impl KNNImputer {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            ..Self::default()
        }
    }

    pub fn with_weights(mut self, weights: KnnWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_missing_values(mut self, missing_values: MissingValues) -> Self {
        self.missing_values = missing_values;
        self
    }

    pub fn with_add_indicator(mut self, add_indicator: bool) -> Self {
        self.add_indicator = add_indicator;
        self
    }

    pub fn with_keep_empty_features(mut self, keep: bool) -> Self {
        self.keep_empty_features = keep;
        self
    }

    fn fit_x(&self) -> Result<&Array2<f64>> {
        self.fit_x_
            .as_ref()
            .ok_or_else(|| LearnError::NotFitted("KNNImputer".to_string()))
    }

    /// Weighted donor average for one missing entry.
    fn impute_entry(&self, donors: &mut [(f64, f64)], fallback: f64) -> f64 {
        if donors.is_empty() {
            return fallback;
        }
        donors.sort_by(|a, b| a.0.total_cmp(&b.0));
        let k = self.n_neighbors.min(donors.len());
        let nearest = &donors[..k];

        match self.weights {
            KnnWeights::Uniform => nearest.iter().map(|(_, v)| v).sum::<f64>() / k as f64,
            KnnWeights::Distance => {
                let zeros: Vec<f64> = nearest
                    .iter()
                    .filter(|(d, _)| *d == 0.0)
                    .map(|(_, v)| *v)
                    .collect();
                if !zeros.is_empty() {
                    return zeros.iter().sum::<f64>() / zeros.len() as f64;
                }
                let (num, den) = nearest
                    .iter()
                    .fold((0.0, 0.0), |(n, d), (dist, v)| (n + v / dist, d + 1.0 / dist));
                num / den
            }
        }
    }
}

impl Imputer for KNNImputer {
    fn fit(&mut self, x: &ArrayView2<f64>) -> Result<()> {
        if self.n_neighbors == 0 {
            return Err(LearnError::InvalidParameter(
                "n_neighbors must be at least 1".to_string(),
            ));
        }
        check_missing_input(x, self.missing_values)?;

        let mask = missing_mask(x, self.missing_values);
        let means = masked_column_means(x, &mask);
        self.valid_features_ = if self.keep_empty_features {
            (0..x.ncols()).collect()
        } else {
            let valid: Vec<usize> = (0..x.ncols()).filter(|&j| !means[j].is_nan()).collect();
            if valid.len() < x.ncols() {
                log::warn!(
                    "Skipping {} feature(s) without any observed values",
                    x.ncols() - valid.len()
                );
            }
            valid
        };
        self.column_means_ = means.iter().map(|m| if m.is_nan() { 0.0 } else { *m }).collect();
        self.fit_x_ = Some(x.to_owned());
        self.indicator_ = if self.add_indicator {
            let mut indicator = MissingIndicator::for_imputer(self.missing_values);
            indicator.fit(x)?;
            Some(indicator)
        } else {
            None
        };
        Ok(())
    }

    fn transform(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        let fit_x = self.fit_x()?;
        if x.ncols() != fit_x.ncols() {
            return Err(LearnError::ShapeMismatch {
                expected_shape: format!("(n_samples, {})", fit_x.ncols()),
                actual_shape: shape_str(x.dim()),
            });
        }
        check_missing_input(x, self.missing_values)?;

        let missing = self.missing_values;
        let valid = &self.valid_features_;
        let rows: Vec<Array1<f64>> = x
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| {
                let mut out = row.to_owned();
                let holes: Vec<usize> = valid
                    .iter()
                    .copied()
                    .filter(|&j| missing.is_missing(row[j]))
                    .collect();
                if holes.is_empty() {
                    return out;
                }
                let distances: Vec<f64> = fit_x
                    .axis_iter(Axis(0))
                    .map(|donor| nan_euclidean(&row, &donor, missing))
                    .collect();
                for j in holes {
                    let mut donors: Vec<(f64, f64)> = fit_x
                        .column(j)
                        .iter()
                        .zip(distances.iter())
                        .filter(|(v, d)| !missing.is_missing(**v) && d.is_finite())
                        .map(|(v, d)| (*d, *v))
                        .collect();
                    out[j] = self.impute_entry(&mut donors, self.column_means_[j]);
                }
                out
            })
            .collect();

        let mut filled = Array2::<f64>::zeros(x.dim());
        for (mut dst, src) in filled.axis_iter_mut(Axis(0)).zip(rows.iter()) {
            dst.assign(src);
        }
        let imputed = filled.select(Axis(1), valid);
        concatenate_indicator(imputed, self.indicator_.as_ref(), x)
    }

    fn get_feature_names_out(&self, input_features: Option<&[String]>) -> Result<Vec<String>> {
        let fit_x = self.fit_x()?;
        let names = input_feature_names(input_features, fit_x.ncols())?;
        let mut out: Vec<String> = self
            .valid_features_
            .iter()
            .map(|&j| names[j].clone())
            .collect();
        if let Some(ind) = &self.indicator_ {
            out.extend(ind.get_feature_names_out(Some(&names))?);
        }
        Ok(out)
    }

    fn indicator(&self) -> Option<&MissingIndicator> {
        self.indicator_.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    const NAN: f64 = f64::NAN;

    #[test]
    fn test_uniform_average_of_nearest() {
        let x = array![
            [1.0, 1.0],
            [1.1, 2.0],
            [5.0, 10.0],
            [1.05, NAN],
        ];
        let mut imp = KNNImputer::new(2);
        let out = imp.fit_transform(&x.view()).unwrap();
        // The two closest donors on feature 0 are rows 1 and 0.
        assert_relative_eq!(out[[3, 1]], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_distance_weights() {
        let x = array![[0.0, 0.0], [1.0, 10.0], [3.0, 30.0], [0.0, NAN]];
        let mut imp = KNNImputer::new(2).with_weights(KnnWeights::Distance);
        let out = imp.fit_transform(&x.view()).unwrap();
        // Row 0 is at distance 0 from the receiver, so it takes all the weight.
        assert_relative_eq!(out[[3, 1]], 0.0, epsilon = 1e-12);

        let x = array![[1.0, 10.0], [3.0, 30.0], [0.0, NAN]];
        let mut imp = KNNImputer::new(2).with_weights(KnnWeights::Distance);
        let out = imp.fit_transform(&x.view()).unwrap();
        // nan-euclidean distances are scaled by sqrt(2/1); weights are 1/d
        let (d1, d2) = (2.0f64.sqrt(), 3.0 * 2.0f64.sqrt());
        let expected = (10.0 / d1 + 30.0 / d2) / (1.0 / d1 + 1.0 / d2);
        assert_relative_eq!(out[[2, 1]], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_no_donor_falls_back_to_mean() {
        let x = array![[NAN, 1.0], [2.0, NAN], [4.0, NAN]];
        let mut imp = KNNImputer::new(1);
        let out = imp.fit_transform(&x.view()).unwrap();
        // Row 0 shares no observed coordinate with the donors for feature 0.
        assert_relative_eq!(out[[0, 0]], 3.0);
    }

    #[test]
    fn test_all_missing_column_dropped() {
        let x = array![[NAN, 1.0], [NAN, 2.0], [NAN, NAN]];
        let mut imp = KNNImputer::default();
        let out = imp.fit_transform(&x.view()).unwrap();
        assert_eq!(out.ncols(), 1);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_transform_new_rows() {
        let train = array![[1.0], [2.0]];
        let test = array![[3.0], [NAN]];
        let mut imp = KNNImputer::default().with_add_indicator(true);
        imp.fit(&train.view()).unwrap();
        let out = imp.transform(&test.view()).unwrap();
        assert_eq!(out.dim(), (2, 1));
        assert_relative_eq!(out[[1, 0]], 1.5);
    }

    #[test]
    fn test_zero_neighbors_rejected() {
        let mut imp = KNNImputer::new(0);
        assert!(imp.fit(&array![[1.0]].view()).is_err());
    }
}
