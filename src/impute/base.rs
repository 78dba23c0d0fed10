//! Imputer protocol and the missing-value indicator shared by all imputers.

use crate::error::{LearnError, Result};
use crate::types::MissingValues;
use crate::utils::{check_missing_input, missing_mask, shape_str};
use ndarray::{Array2, ArrayView2, Axis, concatenate};
use serde::{Deserialize, Serialize};

/// Fit/transform protocol implemented by every imputer.
pub trait Imputer {
    /// Learn the imputation statistics from `x`.
    fn fit(&mut self, x: &ArrayView2<f64>) -> Result<()>;

    /// Fill the missing entries of `x` using the fitted statistics.
    fn transform(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Fit on `x`, then transform it.
    fn fit_transform(&mut self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Output feature names, given the input names (or `x0`, `x1`, ... when absent).
    fn get_feature_names_out(&self, input_features: Option<&[String]>) -> Result<Vec<String>>;

    /// The missing indicator fitted alongside the imputer, if `add_indicator` was set.
    fn indicator(&self) -> Option<&MissingIndicator>;
}

/// Which features a [`MissingIndicator`] reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IndicatorFeatures {
    /// Only the features that had missing values during fit.
    #[default]
    MissingOnly,
    /// Every feature.
    All,
}

/// Binary indicators for missing values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingIndicator {
    pub missing_values: MissingValues,
    pub features: IndicatorFeatures,
    /// Fail in `transform` when a feature outside `features_` has missing values.
    pub error_on_new: bool,
    features_: Option<Vec<usize>>,
    n_features_in_: usize,
}

impl Default for MissingIndicator {
    fn default() -> Self {
        Self {
            missing_values: MissingValues::Nan,
            features: IndicatorFeatures::MissingOnly,
            error_on_new: true,
            features_: None,
            n_features_in_: 0,
        }
    }
}

impl MissingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_values(mut self, missing_values: MissingValues) -> Self {
        self.missing_values = missing_values;
        self
    }

    pub fn with_features(mut self, features: IndicatorFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn with_error_on_new(mut self, error_on_new: bool) -> Self {
        self.error_on_new = error_on_new;
        self
    }

    /// The indicator embedded in an imputer: missing-only, never errors on new features.
    pub(crate) fn for_imputer(missing_values: MissingValues) -> Self {
        Self::new()
            .with_missing_values(missing_values)
            .with_error_on_new(false)
    }

    /// Indices of the features the indicator reports on.
    pub fn features_(&self) -> Result<&[usize]> {
        self.features_
            .as_deref()
            .ok_or_else(|| LearnError::NotFitted("MissingIndicator".to_string()))
    }

    pub fn fit(&mut self, x: &ArrayView2<f64>) -> Result<()> {
        check_missing_input(x, self.missing_values)?;
        let mask = missing_mask(x, self.missing_values);
        let features = match self.features {
            IndicatorFeatures::All => (0..x.ncols()).collect(),
            IndicatorFeatures::MissingOnly => mask
                .axis_iter(Axis(1))
                .enumerate()
                .filter(|(_, col)| col.iter().any(|m| *m))
                .map(|(j, _)| j)
                .collect(),
        };
        self.features_ = Some(features);
        self.n_features_in_ = x.ncols();
        Ok(())
    }

    pub fn transform(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        let features = self.features_()?;
        if x.ncols() != self.n_features_in_ {
            return Err(LearnError::ShapeMismatch {
                expected_shape: format!("(n_samples, {})", self.n_features_in_),
                actual_shape: shape_str(x.dim()),
            });
        }
        check_missing_input(x, self.missing_values)?;
        let mask = missing_mask(x, self.missing_values);

        if self.error_on_new && self.features == IndicatorFeatures::MissingOnly {
            let new: Vec<usize> = mask
                .axis_iter(Axis(1))
                .enumerate()
                .filter(|(j, col)| !features.contains(j) && col.iter().any(|m| *m))
                .map(|(j, _)| j)
                .collect();
            if !new.is_empty() {
                return Err(LearnError::InvalidInput(format!(
                    "The features {:?} have missing values in transform but have no missing values in fit.",
                    new
                )));
            }
        }

        Ok(Array2::from_shape_fn((x.nrows(), features.len()), |(i, k)| {
            if mask[[i, features[k]]] { 1.0 } else { 0.0 }
        }))
    }

    pub fn fit_transform(&mut self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn get_feature_names_out(&self, input_features: Option<&[String]>) -> Result<Vec<String>> {
        let features = self.features_()?;
        let names = input_feature_names(input_features, self.n_features_in_)?;
        Ok(features
            .iter()
            .map(|&j| format!("missingindicator_{}", names[j]))
            .collect())
    }
}

/// Resolve input feature names, defaulting to `x0..x{n-1}`.
pub(crate) fn input_feature_names(
    input_features: Option<&[String]>,
    n_features: usize,
) -> Result<Vec<String>> {
    match input_features {
        Some(names) if names.len() != n_features => Err(LearnError::InvalidInput(format!(
            "input_features should have length equal to number of features ({}), got {}",
            n_features,
            names.len()
        ))),
        Some(names) => Ok(names.to_vec()),
        None => Ok((0..n_features).map(|j| format!("x{}", j)).collect()),
    }
}

/// Append indicator columns to an imputed matrix.
pub(crate) fn concatenate_indicator(
    imputed: Array2<f64>,
    indicator: Option<&MissingIndicator>,
    x: &ArrayView2<f64>,
) -> Result<Array2<f64>> {
    match indicator {
        None => Ok(imputed),
        Some(ind) => {
            let cols = ind.transform(x)?;
            Ok(concatenate(Axis(1), &[imputed.view(), cols.view()])?)
        }
    }
}
