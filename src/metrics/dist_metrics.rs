//! Distance metrics with validated parameters.
//!
//! A [`DistanceMetric`] is created by name through [`DistanceMetric::get_metric`]
//! (or from a closure through [`DistanceMetric::from_fn`]) and evaluates
//! distances between single vectors or full point sets. Built-in metrics can
//! be serialized with serde and restored without loss; the parameters they
//! carry (weights, variances, inverse covariance) travel with them.

use crate::error::{LearnError, Result};
use crate::types::Float;
use crate::utils::{invert, shape_str};
use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Names of the metrics defined on boolean vectors.
pub const BOOL_METRICS: [&str; 8] = [
    "matching",
    "jaccard",
    "dice",
    "kulsinski",
    "rogerstanimoto",
    "russellrao",
    "sokalmichener",
    "sokalsneath",
];

/// Every name accepted by [`DistanceMetric::get_metric`], aliases included.
pub const METRIC_NAMES: [&str; 25] = [
    "euclidean",
    "l2",
    "sqeuclidean",
    "manhattan",
    "cityblock",
    "l1",
    "chebyshev",
    "infinity",
    "minkowski",
    "p",
    "wminkowski",
    "seuclidean",
    "mahalanobis",
    "hamming",
    "canberra",
    "braycurtis",
    "haversine",
    "matching",
    "jaccard",
    "dice",
    "kulsinski",
    "rogerstanimoto",
    "russellrao",
    "sokalmichener",
    "sokalsneath",
];

/// Signature of a user supplied distance function.
pub type MetricFn = dyn Fn(ArrayView1<f64>, ArrayView1<f64>) -> f64 + Send + Sync;

/// A user supplied distance function.
#[derive(Clone)]
pub struct CustomMetric(Arc<MetricFn>);

impl fmt::Debug for CustomMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomMetric(<fn>)")
    }
}

/// Optional parameter bundle for [`DistanceMetric::get_metric`].
#[derive(Debug, Clone, Default)]
pub struct MetricParams {
    /// Minkowski order.
    pub p: Option<f64>,
    /// Per-feature weights (weighted Minkowski).
    pub w: Option<Vec<f64>>,
    /// Per-feature variances (standardized Euclidean).
    pub v: Option<Vec<f64>>,
    /// Full covariance matrix for Mahalanobis; inverted at construction.
    pub v_matrix: Option<Array2<f64>>,
    /// Inverse covariance matrix (Mahalanobis).
    pub vi: Option<Array2<f64>>,
}

impl MetricParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn p(mut self, p: f64) -> Self {
        self.p = Some(p);
        self
    }

    pub fn w(mut self, w: impl Into<Vec<f64>>) -> Self {
        self.w = Some(w.into());
        self
    }

    pub fn v(mut self, v: impl Into<Vec<f64>>) -> Self {
        self.v = Some(v.into());
        self
    }

    pub fn v_matrix(mut self, v: Array2<f64>) -> Self {
        self.v_matrix = Some(v);
        self
    }

    pub fn vi(mut self, vi: Array2<f64>) -> Self {
        self.vi = Some(vi);
        self
    }
}

/// Metric family together with its validated parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "lowercase")]
pub enum MetricKind {
    Euclidean,
    SqEuclidean,
    Manhattan,
    Chebyshev,
    Minkowski {
        p: f64,
        w: Option<Vec<f64>>,
    },
    /// Deprecated: weights are applied before the power, `(Σ|w·(x-y)|^p)^(1/p)`.
    WMinkowski {
        p: f64,
        w: Vec<f64>,
    },
    SEuclidean {
        v: Vec<f64>,
    },
    Mahalanobis {
        vi: Array2<f64>,
    },
    Hamming,
    Canberra,
    BrayCurtis,
    Haversine,
    Matching,
    Jaccard,
    Dice,
    Kulsinski,
    RogersTanimoto,
    RussellRao,
    SokalMichener,
    SokalSneath,
    #[serde(skip)]
    Custom(CustomMetric),
}

/// Public handle over a [`MetricKind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistanceMetric {
    kind: MetricKind,
}

fn validate_weights(w: &[f64]) -> Result<()> {
    if w.is_empty() {
        return Err(LearnError::InvalidParameter(
            "Found array with 0 feature(s) (shape=(0,)) while a minimum of 1 is required."
                .to_string(),
        ));
    }
    if w.iter().any(|v| v.is_nan()) {
        return Err(LearnError::InvalidParameter("w contains NaN".to_string()));
    }
    if w.iter().any(|v| v.is_infinite()) {
        return Err(LearnError::InvalidParameter(
            "w contains infinity".to_string(),
        ));
    }
    if w.iter().any(|&v| v < 0.0) {
        return Err(LearnError::InvalidParameter(
            "w cannot contain negative weights".to_string(),
        ));
    }
    Ok(())
}

fn validate_p(p: f64) -> Result<()> {
    if p.is_nan() || p < 1.0 {
        return Err(LearnError::InvalidParameter(format!(
            "p must be greater than or equal to 1, got {}",
            p
        )));
    }
    Ok(())
}

fn size_mismatch(metric: &str, param: &str, expected: usize, actual: usize) -> LearnError {
    LearnError::InvalidInput(format!(
        "{metric}: the size of {param} must match the number of features ({expected}). \
         Currently len({param})={actual}."
    ))
}

impl DistanceMetric {
    /// Build a metric by name with the given parameters.
    ///
    /// Minkowski collapses to Manhattan (`p = 1`), Euclidean (`p = 2`) or
    /// Chebyshev (`p = inf`) when no weights are supplied.
    pub fn get_metric(name: &str, params: MetricParams) -> Result<Self> {
        let kind = match name {
            "euclidean" | "l2" => MetricKind::Euclidean,
            "sqeuclidean" => MetricKind::SqEuclidean,
            "manhattan" | "cityblock" | "l1" => MetricKind::Manhattan,
            "chebyshev" | "infinity" => MetricKind::Chebyshev,
            "minkowski" | "p" => {
                let p = params.p.unwrap_or(2.0);
                validate_p(p)?;
                match params.w {
                    None if p == 1.0 => MetricKind::Manhattan,
                    None if p == 2.0 => MetricKind::Euclidean,
                    None if p.is_infinite() => MetricKind::Chebyshev,
                    None => MetricKind::Minkowski { p, w: None },
                    Some(w) => {
                        validate_weights(&w)?;
                        if p.is_infinite() {
                            return Err(LearnError::InvalidParameter(
                                "MinkowskiDistance requires finite p. For p=inf, use ChebyshevDistance."
                                    .to_string(),
                            ));
                        }
                        MetricKind::Minkowski { p, w: Some(w) }
                    }
                }
            }
            "wminkowski" => {
                log::warn!(
                    "WMinkowskiDistance is deprecated in version 1.1 and will be removed in 1.3. \
                     Use MinkowskiDistance instead. Note that in MinkowskiDistance, the weights \
                     are applied to the absolute differences raised to the p power."
                );
                let p = params.p.unwrap_or(2.0);
                validate_p(p)?;
                if p.is_infinite() {
                    return Err(LearnError::InvalidParameter(
                        "WMinkowskiDistance requires finite p. For p=inf, use ChebyshevDistance."
                            .to_string(),
                    ));
                }
                let w = params.w.ok_or_else(|| {
                    LearnError::InvalidParameter("WMinkowskiDistance requires w".to_string())
                })?;
                validate_weights(&w)?;
                MetricKind::WMinkowski { p, w }
            }
            "seuclidean" => {
                let v = params.v.ok_or_else(|| {
                    LearnError::InvalidParameter("SEuclideanDistance requires V".to_string())
                })?;
                if v.is_empty() {
                    return Err(LearnError::InvalidParameter(
                        "Found array with 0 feature(s) (shape=(0,)) while a minimum of 1 is required."
                            .to_string(),
                    ));
                }
                if v.iter().any(|x| !x.is_finite() || *x <= 0.0) {
                    return Err(LearnError::InvalidParameter(
                        "V must contain finite, strictly positive variances".to_string(),
                    ));
                }
                MetricKind::SEuclidean { v }
            }
            "mahalanobis" => {
                let vi = match (params.vi, params.v_matrix) {
                    (Some(vi), _) => vi,
                    (None, Some(v)) => {
                        if v.nrows() != v.ncols() {
                            return Err(LearnError::InvalidParameter(
                                "V must be square".to_string(),
                            ));
                        }
                        invert(&v.view())?
                    }
                    (None, None) => {
                        return Err(LearnError::InvalidParameter(
                            "Must provide either V or VI for Mahalanobis distance".to_string(),
                        ));
                    }
                };
                if vi.nrows() != vi.ncols() {
                    return Err(LearnError::InvalidParameter(
                        "VI must be square".to_string(),
                    ));
                }
                if vi.iter().any(|x| !x.is_finite()) {
                    return Err(LearnError::InvalidParameter(
                        "VI contains NaN or infinity".to_string(),
                    ));
                }
                MetricKind::Mahalanobis { vi }
            }
            "hamming" => MetricKind::Hamming,
            "canberra" => MetricKind::Canberra,
            "braycurtis" => MetricKind::BrayCurtis,
            "haversine" => MetricKind::Haversine,
            "matching" => MetricKind::Matching,
            "jaccard" => MetricKind::Jaccard,
            "dice" => MetricKind::Dice,
            "kulsinski" => MetricKind::Kulsinski,
            "rogerstanimoto" => MetricKind::RogersTanimoto,
            "russellrao" => MetricKind::RussellRao,
            "sokalmichener" => MetricKind::SokalMichener,
            "sokalsneath" => MetricKind::SokalSneath,
            other => {
                return Err(LearnError::InvalidParameter(format!(
                    "Unrecognized metric '{}'",
                    other
                )));
            }
        };
        Ok(Self { kind })
    }

    /// Wrap a user supplied distance function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(ArrayView1<f64>, ArrayView1<f64>) -> f64 + Send + Sync + 'static,
    {
        Self {
            kind: MetricKind::Custom(CustomMetric(Arc::new(f))),
        }
    }

    /// The validated metric family and parameters.
    pub fn kind(&self) -> &MetricKind {
        &self.kind
    }

    /// Canonical metric name.
    pub fn name(&self) -> &'static str {
        match &self.kind {
            MetricKind::Euclidean => "euclidean",
            MetricKind::SqEuclidean => "sqeuclidean",
            MetricKind::Manhattan => "manhattan",
            MetricKind::Chebyshev => "chebyshev",
            MetricKind::Minkowski { .. } => "minkowski",
            MetricKind::WMinkowski { .. } => "wminkowski",
            MetricKind::SEuclidean { .. } => "seuclidean",
            MetricKind::Mahalanobis { .. } => "mahalanobis",
            MetricKind::Hamming => "hamming",
            MetricKind::Canberra => "canberra",
            MetricKind::BrayCurtis => "braycurtis",
            MetricKind::Haversine => "haversine",
            MetricKind::Matching => "matching",
            MetricKind::Jaccard => "jaccard",
            MetricKind::Dice => "dice",
            MetricKind::Kulsinski => "kulsinski",
            MetricKind::RogersTanimoto => "rogerstanimoto",
            MetricKind::RussellRao => "russellrao",
            MetricKind::SokalMichener => "sokalmichener",
            MetricKind::SokalSneath => "sokalsneath",
            MetricKind::Custom(_) => "pyfunc",
        }
    }

    /// Whether the metric interprets its inputs as boolean (non-zero = true).
    pub fn is_boolean(&self) -> bool {
        BOOL_METRICS.contains(&self.name())
    }

    /// Check that the metric parameters fit vectors of `n_features`.
    pub fn validate_features(&self, n_features: usize) -> Result<()> {
        match &self.kind {
            MetricKind::Minkowski { w: Some(w), .. } if w.len() != n_features => {
                Err(size_mismatch("MinkowskiDistance", "w", n_features, w.len()))
            }
            MetricKind::WMinkowski { w, .. } if w.len() != n_features => {
                Err(size_mismatch("WMinkowskiDistance", "w", n_features, w.len()))
            }
            MetricKind::SEuclidean { v } if v.len() != n_features => {
                Err(size_mismatch("SEuclideanDistance", "V", n_features, v.len()))
            }
            MetricKind::Mahalanobis { vi } if vi.nrows() != n_features => Err(size_mismatch(
                "MahalanobisDistance",
                "VI",
                n_features,
                vi.nrows(),
            )),
            MetricKind::Haversine if n_features != 2 => Err(LearnError::InvalidInput(
                "Haversine distance only valid in 2 dimensions".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Distance between two vectors.
    pub fn dist<F: Float>(&self, x1: &ArrayView1<F>, x2: &ArrayView1<F>) -> Result<f64> {
        let (a, b) = self.prepare_pair(x1, x2)?;
        Ok(self.kind.dist(&a, &b))
    }

    /// Reduced distance between two vectors: a cheaper, rank-preserving
    /// surrogate (squared Euclidean, unrooted Minkowski, haversine `sin²`).
    pub fn rdist<F: Float>(&self, x1: &ArrayView1<F>, x2: &ArrayView1<F>) -> Result<f64> {
        let (a, b) = self.prepare_pair(x1, x2)?;
        Ok(self.kind.rdist(&a, &b))
    }

    fn prepare_pair<F: Float>(
        &self,
        x1: &ArrayView1<F>,
        x2: &ArrayView1<F>,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        if x1.len() != x2.len() {
            return Err(LearnError::InvalidInput(format!(
                "Vectors must have the same length: got {} and {}",
                x1.len(),
                x2.len()
            )));
        }
        self.validate_features(x1.len())?;
        let a: Vec<f64> = x1.iter().map(|v| v.to_f64()).collect();
        let b: Vec<f64> = x2.iter().map(|v| v.to_f64()).collect();
        if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return Err(LearnError::InvalidInput(
                "Input contains NaN or infinity".to_string(),
            ));
        }
        Ok((a, b))
    }

    /// Convert true distances to reduced distances.
    pub fn dist_to_rdist(&self, d: &ArrayView2<f64>) -> Array2<f64> {
        match &self.kind {
            MetricKind::Euclidean | MetricKind::SEuclidean { .. } | MetricKind::Mahalanobis { .. } => {
                d.mapv(|v| v * v)
            }
            MetricKind::Minkowski { p, .. } | MetricKind::WMinkowski { p, .. } => {
                let p = *p;
                d.mapv(|v| v.powf(p))
            }
            MetricKind::Haversine => d.mapv(|v| {
                let s = (0.5 * v).sin();
                s * s
            }),
            _ => d.to_owned(),
        }
    }

    /// Convert reduced distances back to true distances.
    pub fn rdist_to_dist(&self, rd: &ArrayView2<f64>) -> Array2<f64> {
        match &self.kind {
            MetricKind::Euclidean | MetricKind::SEuclidean { .. } | MetricKind::Mahalanobis { .. } => {
                rd.mapv(f64::sqrt)
            }
            MetricKind::Minkowski { p, .. } | MetricKind::WMinkowski { p, .. } => {
                let inv = 1.0 / *p;
                rd.mapv(|v| v.powf(inv))
            }
            MetricKind::Haversine => rd.mapv(|v| 2.0 * v.sqrt().asin()),
            _ => rd.to_owned(),
        }
    }

    /// Distance matrix between the rows of `x` and the rows of `y`.
    ///
    /// With `y = None` this is the self-distance matrix of `x`.
    pub fn pairwise<F: Float>(
        &self,
        x: &ArrayView2<F>,
        y: Option<&ArrayView2<F>>,
    ) -> Result<Array2<f64>> {
        self.pairwise_with(x, y, |kind, a, b| kind.dist(a, b))
    }

    /// Reduced-distance matrix between the rows of `x` and the rows of `y`.
    pub fn pairwise_rdist<F: Float>(
        &self,
        x: &ArrayView2<F>,
        y: Option<&ArrayView2<F>>,
    ) -> Result<Array2<f64>> {
        self.pairwise_with(x, y, |kind, a, b| kind.rdist(a, b))
    }

    fn pairwise_with<F, G>(
        &self,
        x: &ArrayView2<F>,
        y: Option<&ArrayView2<F>>,
        op: G,
    ) -> Result<Array2<f64>>
    where
        F: Float,
        G: Fn(&MetricKind, &[f64], &[f64]) -> f64 + Sync,
    {
        if let Some(y) = y {
            if x.ncols() != y.ncols() {
                return Err(LearnError::ShapeMismatch {
                    expected_shape: format!("Y with {} features", x.ncols()),
                    actual_shape: shape_str(y.dim()),
                });
            }
        }
        self.validate_features(x.ncols())?;

        let xs = to_rows(x)?;
        let ys = match y {
            Some(y) => Some(to_rows(y)?),
            None => None,
        };
        let ys_ref = ys.as_ref().unwrap_or(&xs);

        let n = xs.len();
        let m = ys_ref.len();
        let flat: Vec<f64> = xs
            .par_iter()
            .flat_map_iter(|a| ys_ref.iter().map(|b| op(&self.kind, a.as_slice(), b.as_slice())))
            .collect();
        Ok(Array2::from_shape_vec((n, m), flat)?)
    }
}

fn to_rows<F: Float>(x: &ArrayView2<F>) -> Result<Vec<Vec<f64>>> {
    let rows: Vec<Vec<f64>> = x
        .rows()
        .into_iter()
        .map(|r| r.iter().map(|v| v.to_f64()).collect())
        .collect();
    if rows.iter().flatten().any(|v| !v.is_finite()) {
        return Err(LearnError::InvalidInput(
            "Input contains NaN or infinity".to_string(),
        ));
    }
    Ok(rows)
}

/// Counts of (true, true) and unequal positions of two boolean vectors.
#[inline]
fn bool_counts(a: &[f64], b: &[f64]) -> (f64, f64, f64) {
    let mut n_tt = 0.0;
    let mut n_neq = 0.0;
    let mut n_nz = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let tx = x != 0.0;
        let ty = y != 0.0;
        if tx && ty {
            n_tt += 1.0;
        }
        if tx != ty {
            n_neq += 1.0;
        }
        if tx || ty {
            n_nz += 1.0;
        }
    }
    (n_tt, n_neq, n_nz)
}

#[inline]
fn ratio_or_zero(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

impl MetricKind {
    /// Reduced distance on raw slices; parameters must already fit.
    fn rdist(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            MetricKind::Euclidean | MetricKind::SqEuclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum(),
            MetricKind::Minkowski { p, w } => match w {
                Some(w) => a
                    .iter()
                    .zip(b)
                    .zip(w)
                    .map(|((x, y), wj)| wj * (x - y).abs().powf(*p))
                    .sum(),
                None => a.iter().zip(b).map(|(x, y)| (x - y).abs().powf(*p)).sum(),
            },
            MetricKind::WMinkowski { p, w } => a
                .iter()
                .zip(b)
                .zip(w)
                .map(|((x, y), wj)| (wj * (x - y)).abs().powf(*p))
                .sum(),
            MetricKind::SEuclidean { v } => a
                .iter()
                .zip(b)
                .zip(v)
                .map(|((x, y), vj)| (x - y) * (x - y) / vj)
                .sum(),
            MetricKind::Mahalanobis { vi } => {
                let diff: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
                let mut acc = 0.0;
                for (i, di) in diff.iter().enumerate() {
                    let row = vi.row(i);
                    let inner: f64 = row.iter().zip(&diff).map(|(v, dj)| v * dj).sum();
                    acc += di * inner;
                }
                acc
            }
            MetricKind::Haversine => {
                let sin_0 = (0.5 * (a[0] - b[0])).sin();
                let sin_1 = (0.5 * (a[1] - b[1])).sin();
                sin_0 * sin_0 + a[0].cos() * b[0].cos() * sin_1 * sin_1
            }
            _ => self.dist(a, b),
        }
    }

    /// True distance on raw slices; parameters must already fit.
    fn dist(&self, a: &[f64], b: &[f64]) -> f64 {
        let n = a.len() as f64;
        match self {
            MetricKind::Euclidean | MetricKind::SEuclidean { .. } => self.rdist(a, b).sqrt(),
            MetricKind::Mahalanobis { .. } => self.rdist(a, b).max(0.0).sqrt(),
            MetricKind::SqEuclidean => self.rdist(a, b),
            MetricKind::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            MetricKind::Chebyshev => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).abs())
                .fold(0.0, f64::max),
            MetricKind::Minkowski { p, .. } | MetricKind::WMinkowski { p, .. } => {
                self.rdist(a, b).powf(1.0 / p)
            }
            MetricKind::Hamming => {
                let n_neq = a.iter().zip(b).filter(|(x, y)| x != y).count() as f64;
                ratio_or_zero(n_neq, n)
            }
            MetricKind::Canberra => a
                .iter()
                .zip(b)
                .map(|(x, y)| ratio_or_zero((x - y).abs(), x.abs() + y.abs()))
                .sum(),
            MetricKind::BrayCurtis => {
                let num: f64 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
                let den: f64 = a.iter().zip(b).map(|(x, y)| (x + y).abs()).sum();
                ratio_or_zero(num, den)
            }
            MetricKind::Haversine => 2.0 * self.rdist(a, b).sqrt().asin(),
            MetricKind::Matching => {
                let (_, n_neq, _) = bool_counts(a, b);
                ratio_or_zero(n_neq, n)
            }
            MetricKind::Jaccard => {
                let (_, n_neq, n_nz) = bool_counts(a, b);
                ratio_or_zero(n_neq, n_nz)
            }
            MetricKind::Dice => {
                let (n_tt, n_neq, _) = bool_counts(a, b);
                ratio_or_zero(n_neq, 2.0 * n_tt + n_neq)
            }
            MetricKind::Kulsinski => {
                let (n_tt, n_neq, _) = bool_counts(a, b);
                ratio_or_zero(n_neq - n_tt + n, n_neq + n)
            }
            MetricKind::RogersTanimoto | MetricKind::SokalMichener => {
                let (_, n_neq, _) = bool_counts(a, b);
                ratio_or_zero(2.0 * n_neq, n + n_neq)
            }
            MetricKind::RussellRao => {
                let (n_tt, _, _) = bool_counts(a, b);
                ratio_or_zero(n - n_tt, n)
            }
            MetricKind::SokalSneath => {
                let (n_tt, n_neq, _) = bool_counts(a, b);
                ratio_or_zero(n_neq, 0.5 * n_tt + n_neq)
            }
            MetricKind::Custom(CustomMetric(f)) => {
                (**f)(ArrayView1::from(a), ArrayView1::from(b))
            }
        }
    }
}
