//! Multivariate imputation by round-robin regression.
//!
//! Each feature with missing values is modelled as a function of the other
//! features. Starting from a univariate initial fill, the imputer cycles over
//! the features, refits the regressor on the rows where the feature was
//! observed and overwrites the rows where it was missing. Rounds repeat until
//! the imputed matrix stops changing or `max_iter` is reached.

use super::base::{Imputer, MissingIndicator, concatenate_indicator, input_feature_names};
use super::simple::{ImputeStrategy, SimpleImputer};
use crate::error::{LearnError, Result};
use crate::linear_model::RidgeRegressor;
use crate::types::MissingValues;
use crate::utils::{check_missing_input, missing_mask, shape_str};
use ndarray::{Array2, ArrayView2, Axis};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Order in which features are imputed within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImputationOrder {
    /// Fewest missing values first.
    #[default]
    Ascending,
    /// Most missing values first.
    Descending,
    /// Left to right.
    Roman,
    /// Right to left.
    Arabic,
    /// A fresh random permutation every round.
    Random,
}

/// One fitted regression of a round: predicts `feat_idx` from `neighbor_feat_idx`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputationStep {
    pub feat_idx: usize,
    pub neighbor_feat_idx: Vec<usize>,
    pub estimator: RidgeRegressor,
}

/// Round-robin regression imputer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterativeImputer {
    pub missing_values: MissingValues,
    pub max_iter: usize,
    pub tol: f64,
    pub initial_strategy: ImputeStrategy,
    pub imputation_order: ImputationOrder,
    /// Skip features without missing values during fit.
    pub skip_complete: bool,
    pub min_value: f64,
    pub max_value: f64,
    /// Ridge penalty of the per-feature regressors.
    pub alpha: f64,
    pub random_state: Option<u64>,
    pub keep_empty_features: bool,
    pub add_indicator: bool,
    initial_imputer_: Option<SimpleImputer>,
    imputation_sequence_: Vec<ImputationStep>,
    n_iter_: usize,
    n_features_in_: usize,
    indicator_: Option<MissingIndicator>,
}

impl Default for IterativeImputer {
    fn default() -> Self {
        Self {
            missing_values: MissingValues::Nan,
            max_iter: 10,
            tol: 1e-3,
            initial_strategy: ImputeStrategy::Mean,
            imputation_order: ImputationOrder::Ascending,
            skip_complete: false,
            min_value: f64::NEG_INFINITY,
            max_value: f64::INFINITY,
            alpha: 1.0,
            random_state: None,
            keep_empty_features: false,
            add_indicator: false,
            initial_imputer_: None,
            imputation_sequence_: Vec::new(),
            n_iter_: 0,
            n_features_in_: 0,
            indicator_: None,
        }
    }
}

impl IterativeImputer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_initial_strategy(mut self, strategy: ImputeStrategy) -> Self {
        self.initial_strategy = strategy;
        self
    }

    pub fn with_imputation_order(mut self, order: ImputationOrder) -> Self {
        self.imputation_order = order;
        self
    }

    pub fn with_skip_complete(mut self, skip_complete: bool) -> Self {
        self.skip_complete = skip_complete;
        self
    }

    pub fn with_bounds(mut self, min_value: f64, max_value: f64) -> Self {
        self.min_value = min_value;
        self.max_value = max_value;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
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

    /// Number of rounds run during fit.
    pub fn n_iter_(&self) -> usize {
        self.n_iter_
    }

    /// Every regression fitted during fit, in application order.
    pub fn imputation_sequence_(&self) -> &[ImputationStep] {
        &self.imputation_sequence_
    }

    fn initial_imputer(&self) -> Result<&SimpleImputer> {
        self.initial_imputer_
            .as_ref()
            .ok_or_else(|| LearnError::NotFitted("IterativeImputer".to_string()))
    }

    fn validate_params(&self) -> Result<()> {
        if self.tol.is_nan() || self.tol < 0.0 {
            return Err(LearnError::InvalidParameter(format!(
                "tol must be non-negative, got {}",
                self.tol
            )));
        }
        if self.min_value.is_nan() || self.max_value.is_nan() || self.min_value > self.max_value {
            return Err(LearnError::InvalidParameter(format!(
                "min_value ({}) must be less than or equal to max_value ({})",
                self.min_value, self.max_value
            )));
        }
        Ok(())
    }

    /// Initial fill restricted to the retained columns, with the matching mask.
    fn initial_fill(
        &self,
        imputer: &SimpleImputer,
        x: &ArrayView2<f64>,
    ) -> Result<(Array2<f64>, Array2<bool>)> {
        let valid = imputer.valid_features()?;
        let mut filled = x.to_owned();
        imputer.fill_in_place(&mut filled)?;
        let mask = missing_mask(x, self.missing_values);
        Ok((filled.select(Axis(1), &valid), mask.select(Axis(1), &valid)))
    }

    fn ordered_features(&self, mask: &Array2<bool>, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let counts: Vec<usize> = mask
            .axis_iter(Axis(1))
            .map(|col| col.iter().filter(|m| **m).count())
            .collect();
        let mut order: Vec<usize> = (0..counts.len()).collect();
        match self.imputation_order {
            ImputationOrder::Roman => {}
            ImputationOrder::Arabic => order.reverse(),
            ImputationOrder::Ascending => order.sort_by_key(|&j| counts[j]),
            // Reversed stable ascending sort: ties go to the higher index first.
            ImputationOrder::Descending => {
                order.sort_by_key(|&j| counts[j]);
                order.reverse();
            }
            ImputationOrder::Random => order.shuffle(rng),
        }
        if self.skip_complete {
            order.retain(|&j| counts[j] > 0);
        }
        order
    }

    /// Fit the regressor for one feature and overwrite its missing rows.
    fn impute_one_feature(
        &self,
        xt: &mut Array2<f64>,
        mask: &Array2<bool>,
        feat_idx: usize,
    ) -> Result<Option<ImputationStep>> {
        let neighbor_feat_idx: Vec<usize> = (0..xt.ncols()).filter(|&j| j != feat_idx).collect();
        let observed: Vec<usize> = (0..xt.nrows()).filter(|&i| !mask[[i, feat_idx]]).collect();
        if observed.is_empty() {
            return Ok(None);
        }
        let missing_rows: Vec<usize> = (0..xt.nrows()).filter(|&i| mask[[i, feat_idx]]).collect();

        let predictors = xt.select(Axis(1), &neighbor_feat_idx);
        let x_train = predictors.select(Axis(0), &observed);
        let y_train = xt.column(feat_idx).select(Axis(0), &observed);

        let mut estimator = RidgeRegressor::new(self.alpha);
        estimator.fit(&x_train.view(), &y_train.view())?;

        if !missing_rows.is_empty() {
            let x_test = predictors.select(Axis(0), &missing_rows);
            let predicted = estimator.predict(&x_test.view())?;
            for (&row, value) in missing_rows.iter().zip(predicted.iter()) {
                xt[[row, feat_idx]] = value.clamp(self.min_value, self.max_value);
            }
        }

        Ok(Some(ImputationStep {
            feat_idx,
            neighbor_feat_idx,
            estimator,
        }))
    }

    fn apply_step(&self, xt: &mut Array2<f64>, mask: &Array2<bool>, step: &ImputationStep) -> Result<()> {
        let missing_rows: Vec<usize> = (0..xt.nrows())
            .filter(|&i| mask[[i, step.feat_idx]])
            .collect();
        if missing_rows.is_empty() {
            return Ok(());
        }
        let x_test = xt
            .select(Axis(1), &step.neighbor_feat_idx)
            .select(Axis(0), &missing_rows);
        let predicted = step.estimator.predict(&x_test.view())?;
        for (&row, value) in missing_rows.iter().zip(predicted.iter()) {
            xt[[row, step.feat_idx]] = value.clamp(self.min_value, self.max_value);
        }
        Ok(())
    }
}

/// Infinity norm of a matrix: the largest absolute row sum.
fn inf_norm(m: &Array2<f64>) -> f64 {
    m.axis_iter(Axis(0))
        .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

impl Imputer for IterativeImputer {
    fn fit(&mut self, x: &ArrayView2<f64>) -> Result<()> {
        self.fit_transform(x).map(|_| ())
    }

    fn fit_transform(&mut self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        self.validate_params()?;
        check_missing_input(x, self.missing_values)?;

        let mut initial = SimpleImputer::new(self.initial_strategy)
            .with_missing_values(self.missing_values)
            .with_keep_empty_features(self.keep_empty_features);
        initial.fit(x)?;
        let (mut xt, mask) = self.initial_fill(&initial, x)?;

        self.n_features_in_ = x.ncols();
        self.initial_imputer_ = Some(initial);
        self.imputation_sequence_.clear();
        self.n_iter_ = 0;
        self.indicator_ = if self.add_indicator {
            let mut indicator = MissingIndicator::for_imputer(self.missing_values);
            indicator.fit(x)?;
            Some(indicator)
        } else {
            None
        };

        if self.max_iter == 0 || mask.iter().all(|m| *m) {
            return concatenate_indicator(xt, self.indicator_.as_ref(), x);
        }

        let seed = self.random_state.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut order = self.ordered_features(&mask, &mut rng);

        let max_observed = xt
            .iter()
            .zip(mask.iter())
            .filter(|(_, m)| !**m)
            .map(|(v, _)| v.abs())
            .fold(0.0, f64::max);
        let normalized_tol = self.tol * max_observed;

        let mut sequence = Vec::new();
        let mut converged = false;
        for round in 1..=self.max_iter {
            if self.imputation_order == ImputationOrder::Random && round > 1 {
                order = self.ordered_features(&mask, &mut rng);
            }
            let previous = xt.clone();
            for &feat_idx in &order {
                if let Some(step) = self.impute_one_feature(&mut xt, &mask, feat_idx)? {
                    sequence.push(step);
                }
            }
            self.n_iter_ = round;

            let change = inf_norm(&(&xt - &previous));
            log::debug!(
                "[IterativeImputer] Ending imputation round {}/{}, change: {:.6}, scaled tolerance: {:.6}",
                round,
                self.max_iter,
                change,
                normalized_tol
            );
            if change < normalized_tol {
                log::debug!("[IterativeImputer] Early stopping criterion reached.");
                converged = true;
                break;
            }
        }
        if !converged {
            log::warn!("[IterativeImputer] Early stopping criterion not reached.");
        }
        self.imputation_sequence_ = sequence;

        concatenate_indicator(xt, self.indicator_.as_ref(), x)
    }

    fn transform(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        self.validate_params()?;
        let initial = self.initial_imputer()?;
        if x.ncols() != self.n_features_in_ {
            return Err(LearnError::ShapeMismatch {
                expected_shape: format!("(n_samples, {})", self.n_features_in_),
                actual_shape: shape_str(x.dim()),
            });
        }
        check_missing_input(x, self.missing_values)?;

        let (mut xt, mask) = self.initial_fill(initial, x)?;
        for step in &self.imputation_sequence_ {
            self.apply_step(&mut xt, &mask, step)?;
        }
        concatenate_indicator(xt, self.indicator_.as_ref(), x)
    }

    fn get_feature_names_out(&self, input_features: Option<&[String]>) -> Result<Vec<String>> {
        let initial = self.initial_imputer()?;
        let names = input_feature_names(input_features, self.n_features_in_)?;
        let mut out: Vec<String> = initial
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
