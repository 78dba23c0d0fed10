//! Missing-value imputation.
//!
//! All imputers share the [`Imputer`] protocol and can append binary
//! missing-value indicators to their output (`add_indicator`).

mod base;
mod iterative;
mod knn;
mod simple;

pub use base::{IndicatorFeatures, Imputer, MissingIndicator};
pub use iterative::{ImputationOrder, ImputationStep, IterativeImputer};
pub use knn::{KNNImputer, KnnWeights};
pub use simple::{ImputeStrategy, SimpleImputer};
