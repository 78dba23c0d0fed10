//! Univariate imputation: every column is filled with one statistic.

use super::base::{Imputer, MissingIndicator, concatenate_indicator, input_feature_names};
use crate::error::{LearnError, Result};
use crate::types::MissingValues;
use crate::utils::{check_missing_input, shape_str};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};

/// Statistic used to fill the missing entries of a column.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ImputeStrategy {
    #[default]
    Mean,
    Median,
    /// Most frequent observed value; ties resolve to the smallest value.
    MostFrequent,
    /// A fixed fill value.
    Constant(f64),
}

impl ImputeStrategy {
    fn name(&self) -> &'static str {
        match self {
            ImputeStrategy::Mean => "mean",
            ImputeStrategy::Median => "median",
            ImputeStrategy::MostFrequent => "most_frequent",
            ImputeStrategy::Constant(_) => "constant",
        }
    }

    /// Statistic over the observed values of one column; NaN when there are none.
    pub(crate) fn statistic(&self, observed: Vec<f64>) -> f64 {
        if let ImputeStrategy::Constant(fill) = self {
            return *fill;
        }
        if observed.is_empty() {
            return f64::NAN;
        }
        match self {
            ImputeStrategy::Mean => observed.iter().sum::<f64>() / observed.len() as f64,
            ImputeStrategy::Median => Data::new(observed).median(),
            ImputeStrategy::MostFrequent => most_frequent(observed),
            ImputeStrategy::Constant(fill) => *fill,
        }
    }
}

fn most_frequent(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mut best = values[0];
    let mut best_count = 0;
    let mut start = 0;
    while start < values.len() {
        let mut end = start + 1;
        while end < values.len() && values[end] == values[start] {
            end += 1;
        }
        if end - start > best_count {
            best = values[start];
            best_count = end - start;
        }
        start = end;
    }
    best
}

/// Fills missing values column-wise with a mean, median, mode or constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleImputer {
    pub missing_values: MissingValues,
    pub strategy: ImputeStrategy,
    /// Impute all-missing columns with 0 instead of dropping them.
    pub keep_empty_features: bool,
    pub add_indicator: bool,
    statistics_: Option<Vec<f64>>,
    indicator_: Option<MissingIndicator>,
}

impl Default for SimpleImputer {
    fn default() -> Self {
        Self {
            missing_values: MissingValues::Nan,
            strategy: ImputeStrategy::Mean,
            keep_empty_features: false,
            add_indicator: false,
            statistics_: None,
            indicator_: None,
        }
    }
}

impl SimpleImputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
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

    /// Per-column fill values; NaN for columns that are dropped.
    pub fn statistics_(&self) -> Result<&[f64]> {
        self.statistics_
            .as_deref()
            .ok_or_else(|| LearnError::NotFitted("SimpleImputer".to_string()))
    }

    /// Indices of the input columns kept in the output.
    pub fn valid_features(&self) -> Result<Vec<usize>> {
        Ok(self
            .statistics_()?
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_nan())
            .map(|(j, _)| j)
            .collect())
    }

    /// Fill the missing entries of `x` in place, without dropping columns.
    ///
    /// Columns whose statistic is NaN keep their missing entries.
    pub(crate) fn fill_in_place(&self, x: &mut Array2<f64>) -> Result<()> {
        let stats = self.statistics_()?;
        for (mut col, &stat) in x.axis_iter_mut(Axis(1)).zip(stats.iter()) {
            for v in col.iter_mut() {
                if self.missing_values.is_missing(*v) {
                    *v = stat;
                }
            }
        }
        Ok(())
    }
}

impl Imputer for SimpleImputer {
    fn fit(&mut self, x: &ArrayView2<f64>) -> Result<()> {
        check_missing_input(x, self.missing_values)?;

        let mut statistics = Vec::with_capacity(x.ncols());
        for col in x.axis_iter(Axis(1)) {
            let observed: Vec<f64> = col
                .iter()
                .copied()
                .filter(|v| !self.missing_values.is_missing(*v))
                .collect();
            let mut stat = self.strategy.statistic(observed);
            if stat.is_nan() && self.keep_empty_features {
                stat = 0.0;
            }
            statistics.push(stat);
        }

        let empty: Vec<usize> = statistics
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_nan())
            .map(|(j, _)| j)
            .collect();
        if !empty.is_empty() {
            log::warn!(
                "Skipping features without any observed values: {:?}. At least one non-missing \
                 value is needed for imputation with strategy='{}'.",
                empty,
                self.strategy.name()
            );
        }

        self.statistics_ = Some(statistics);
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
        let stats = self.statistics_()?;
        if x.ncols() != stats.len() {
            return Err(LearnError::ShapeMismatch {
                expected_shape: format!("(n_samples, {})", stats.len()),
                actual_shape: shape_str(x.dim()),
            });
        }
        check_missing_input(x, self.missing_values)?;

        let mut filled = x.to_owned();
        self.fill_in_place(&mut filled)?;
        let valid = self.valid_features()?;
        let imputed = filled.select(Axis(1), &valid);

        concatenate_indicator(imputed, self.indicator_.as_ref(), x)
    }

    fn get_feature_names_out(&self, input_features: Option<&[String]>) -> Result<Vec<String>> {
        let stats = self.statistics_()?;
        let names = input_feature_names(input_features, stats.len())?;
        let mut out: Vec<String> = self
            .valid_features()?
            .into_iter()
            .map(|j| names[j].clone())
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
