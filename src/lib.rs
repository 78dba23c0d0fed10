//! # learnkit
//!
//! Pairwise distance metrics, missing-value imputation and multidimensional
//! scaling on `ndarray` matrices.
//!
//! ## Modules
//!
//! - [`metrics`] - the `DistanceMetric` registry and pairwise distance helpers
//! - [`impute`] - `SimpleImputer`, `KNNImputer`, `IterativeImputer` and `MissingIndicator`
//! - [`manifold`] - SMACOF and the `MDS` estimator
//! - [`isotonic`] - pool-adjacent-violators isotonic regression
//!
//! ## Example
//!
//! ```
//! use learnkit::prelude::*;
//! use ndarray::array;
//!
//! let x = array![[0.0, 0.0], [3.0, 4.0]];
//! let metric = DistanceMetric::get_metric("euclidean", MetricParams::default()).unwrap();
//! let d = metric.pairwise(&x.view(), None).unwrap();
//! assert_eq!(d[[0, 1]], 5.0);
//! ```

pub mod datasets;
pub mod error;
pub mod impute;
pub mod isotonic;
pub mod linear_model;
pub mod manifold;
pub mod metrics;
pub mod types;
pub mod utils;

pub mod prelude {
    //! Convenient re-exports of commonly used types.
    pub use crate::error::{LearnError, Result};
    pub use crate::impute::{
        ImputationOrder, ImputeStrategy, Imputer, IndicatorFeatures, IterativeImputer,
        KNNImputer, KnnWeights, MissingIndicator, SimpleImputer,
    };
    pub use crate::isotonic::isotonic_regression;
    pub use crate::manifold::{Dissimilarity, MDS, SmacofConfig, smacof};
    pub use crate::metrics::{
        DistanceMetric, MetricParams, nan_euclidean_distances, pairwise_distances,
    };
    pub use crate::types::{Float, MissingValues};
}
