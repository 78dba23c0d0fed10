//! Distance metrics and pairwise distance computation.

mod dist_metrics;
mod pairwise;

pub use dist_metrics::{
    BOOL_METRICS, CustomMetric, DistanceMetric, METRIC_NAMES, MetricFn, MetricKind, MetricParams,
};
pub use pairwise::{nan_euclidean, nan_euclidean_distances, pairwise_distances};
