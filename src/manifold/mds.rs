//! Multidimensional scaling by stress majorization (SMACOF).

use crate::error::{LearnError, Result};
use crate::isotonic::isotonic_regression;
use crate::utils::{check_finite, check_symmetric, euclidean_distances, shape_str};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Lower bound substituted for zero embedding distances in the Guttman transform.
const MIN_DISTANCE: f64 = 1e-5;
const SYMMETRY_TOL: f64 = 1e-8;

/// Settings of a SMACOF run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmacofConfig {
    /// Metric MDS fits the dissimilarities themselves; non-metric MDS only
    /// preserves their rank order.
    pub metric: bool,
    pub n_components: usize,
    /// Number of random restarts; the lowest stress wins.
    pub n_init: usize,
    pub max_iter: usize,
    /// Relative stress improvement below which a run stops.
    pub eps: f64,
    pub random_state: Option<u64>,
    /// Report Kruskal's stress-1 instead of raw stress (non-metric only).
    pub normalized_stress: bool,
}

impl Default for SmacofConfig {
    fn default() -> Self {
        Self {
            metric: true,
            n_components: 2,
            n_init: 8,
            max_iter: 300,
            eps: 1e-3,
            random_state: None,
            normalized_stress: false,
        }
    }
}

/// Outcome of [`smacof`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmacofResult {
    /// Coordinates of the points, `(n_samples, n_components)`.
    pub embedding: Array2<f64>,
    /// Final stress of the best run.
    pub stress: f64,
    /// Iterations run by the best run.
    pub n_iter: usize,
}

/// Compute an embedding whose pairwise distances approximate `dissimilarities`.
///
/// With an explicit `init`, a single run starts from those positions.
pub fn smacof(
    dissimilarities: &ArrayView2<f64>,
    config: &SmacofConfig,
    init: Option<&ArrayView2<f64>>,
) -> Result<SmacofResult> {
    check_finite(dissimilarities, "dissimilarities")?;
    check_symmetric(dissimilarities, SYMMETRY_TOL)?;
    if config.n_components == 0 || config.n_init == 0 || config.max_iter == 0 {
        return Err(LearnError::InvalidParameter(
            "n_components, n_init and max_iter must all be at least 1".to_string(),
        ));
    }
    if config.metric && config.normalized_stress {
        return Err(LearnError::InvalidParameter(
            "Normalized stress is not supported for metric=True.".to_string(),
        ));
    }

    let n_samples = dissimilarities.nrows();
    if let Some(init) = init {
        if init.dim() != (n_samples, config.n_components) {
            return Err(LearnError::InvalidInput(format!(
                "init matrix should be of shape {}, got {}",
                shape_str((n_samples, config.n_components)),
                shape_str(init.dim())
            )));
        }
        check_finite(init, "init")?;
        if config.n_init != 1 {
            log::warn!(
                "Explicit initial positions passed: performing only one init of the MDS instead of {}",
                config.n_init
            );
        }
        return smacof_single(dissimilarities, config, init.to_owned());
    }

    let seed = config.random_state.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let seeds: Vec<u64> = (0..config.n_init).map(|_| rng.random()).collect();

    let runs: Vec<SmacofResult> = seeds
        .par_iter()
        .map(|&run_seed| {
            let mut run_rng = ChaCha8Rng::seed_from_u64(run_seed);
            let start = Array2::from_shape_fn((n_samples, config.n_components), |_| {
                run_rng.random::<f64>()
            });
            smacof_single(dissimilarities, config, start)
        })
        .collect::<Result<Vec<_>>>()?;

    runs.into_iter()
        .min_by(|a, b| a.stress.total_cmp(&b.stress))
        .ok_or_else(|| LearnError::InvalidParameter("n_init must be at least 1".to_string()))
}

/// Disparities of non-metric MDS: a monotone fit of the current distances
/// against the dissimilarities, rescaled to a fixed total.
fn nonmetric_disparities(dissimilarities: &ArrayView2<f64>, dis: &Array2<f64>) -> Result<Array2<f64>> {
    let n = dis.nrows();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .filter(|&(i, j)| dissimilarities[[i, j]] != 0.0)
        .collect();
    let sim_w: Array1<f64> = pairs.iter().map(|&(i, j)| dissimilarities[[i, j]]).collect();
    let dis_w: Array1<f64> = pairs.iter().map(|&(i, j)| dis[[i, j]]).collect();
    let fitted = isotonic_regression(&sim_w.view(), &dis_w.view())?;

    let mut disparities = dis.clone();
    for (&(i, j), &v) in pairs.iter().zip(fitted.iter()) {
        disparities[[i, j]] = v;
        disparities[[j, i]] = v;
    }

    let upper_sq: f64 = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .map(|(i, j)| disparities[[i, j]] * disparities[[i, j]])
        .sum();
    if upper_sq > 0.0 {
        let target = (n * (n - 1)) as f64 / 2.0;
        disparities *= (target / upper_sq).sqrt();
    }
    Ok(disparities)
}

fn smacof_single(
    dissimilarities: &ArrayView2<f64>,
    config: &SmacofConfig,
    mut x: Array2<f64>,
) -> Result<SmacofResult> {
    let n_samples = dissimilarities.nrows();
    let mut old_stress: Option<f64> = None;
    let mut stress = 0.0;
    let mut n_iter = 0;

    for it in 0..config.max_iter {
        n_iter = it + 1;
        let mut dis = euclidean_distances(&x.view());

        let disparities = if config.metric {
            dissimilarities.to_owned()
        } else {
            nonmetric_disparities(dissimilarities, &dis)?
        };

        stress = (&dis - &disparities).mapv(|v| v * v).sum() / 2.0;
        if config.normalized_stress {
            let denom = disparities.mapv(|v| v * v).sum() / 2.0;
            stress = if denom > 0.0 { (stress / denom).sqrt() } else { 0.0 };
        }

        // Guttman transform
        dis.mapv_inplace(|v| if v == 0.0 { MIN_DISTANCE } else { v });
        let ratio = &disparities / &dis;
        let mut b = -&ratio;
        let row_sums = ratio.sum_axis(Axis(1));
        for (i, s) in row_sums.iter().enumerate() {
            b[[i, i]] += s;
        }
        x = b.dot(&x) / n_samples as f64;

        let norm: f64 = x
            .axis_iter(Axis(0))
            .map(|row| row.dot(&row).sqrt())
            .sum();
        log::trace!("SMACOF iteration {}: stress {:.6}", n_iter, stress);

        let scaled = if norm > 0.0 { stress / norm } else { stress };
        if let Some(old) = old_stress {
            if old - scaled < config.eps {
                log::debug!("SMACOF converged at iteration {} with stress {:.6}", n_iter, stress);
                break;
            }
        }
        old_stress = Some(scaled);
    }

    Ok(SmacofResult {
        embedding: x,
        stress,
        n_iter,
    })
}

/// How [`MDS`] obtains its dissimilarity matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Dissimilarity {
    /// Pairwise Euclidean distances between the input rows.
    #[default]
    Euclidean,
    /// The input already is a square dissimilarity matrix.
    Precomputed,
}

/// Multidimensional scaling estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MDS {
    pub n_components: usize,
    pub metric: bool,
    pub n_init: usize,
    pub max_iter: usize,
    pub eps: f64,
    /// Worker threads for the restarts; `None` uses the global rayon pool.
    pub n_jobs: Option<usize>,
    pub random_state: Option<u64>,
    pub dissimilarity: Dissimilarity,
    pub normalized_stress: bool,
    embedding_: Option<Array2<f64>>,
    stress_: f64,
    n_iter_: usize,
    dissimilarity_matrix_: Option<Array2<f64>>,
}

impl Default for MDS {
    fn default() -> Self {
        Self {
            n_components: 2,
            metric: true,
            n_init: 4,
            max_iter: 300,
            eps: 1e-3,
            n_jobs: None,
            random_state: None,
            dissimilarity: Dissimilarity::Euclidean,
            normalized_stress: false,
            embedding_: None,
            stress_: 0.0,
            n_iter_: 0,
            dissimilarity_matrix_: None,
        }
    }
}

impl MDS {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            ..Self::default()
        }
    }

    pub fn with_metric(mut self, metric: bool) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_dissimilarity(mut self, dissimilarity: Dissimilarity) -> Self {
        self.dissimilarity = dissimilarity;
        self
    }

    pub fn with_normalized_stress(mut self, normalized_stress: bool) -> Self {
        self.normalized_stress = normalized_stress;
        self
    }

    pub fn embedding_(&self) -> Result<&Array2<f64>> {
        self.embedding_
            .as_ref()
            .ok_or_else(|| LearnError::NotFitted("MDS".to_string()))
    }

    pub fn dissimilarity_matrix_(&self) -> Result<&Array2<f64>> {
        self.dissimilarity_matrix_
            .as_ref()
            .ok_or_else(|| LearnError::NotFitted("MDS".to_string()))
    }

    pub fn stress_(&self) -> f64 {
        self.stress_
    }

    pub fn n_iter_(&self) -> usize {
        self.n_iter_
    }

    fn smacof_config(&self) -> SmacofConfig {
        SmacofConfig {
            metric: self.metric,
            n_components: self.n_components,
            n_init: self.n_init,
            max_iter: self.max_iter,
            eps: self.eps,
            random_state: self.random_state,
            normalized_stress: self.normalized_stress,
        }
    }

    pub fn fit(&mut self, x: &ArrayView2<f64>, init: Option<&ArrayView2<f64>>) -> Result<()> {
        self.fit_transform(x, init).map(|_| ())
    }

    pub fn fit_transform(
        &mut self,
        x: &ArrayView2<f64>,
        init: Option<&ArrayView2<f64>>,
    ) -> Result<Array2<f64>> {
        let dissimilarities = match self.dissimilarity {
            Dissimilarity::Precomputed => x.to_owned(),
            Dissimilarity::Euclidean => {
                check_finite(x, "X")?;
                if x.nrows() == x.ncols() {
                    log::warn!(
                        "The MDS API has changed. fit now constructs a dissimilarity matrix from \
                         data. To use a custom dissimilarity matrix, set \
                         dissimilarity=Precomputed."
                    );
                }
                euclidean_distances(x)
            }
        };

        let config = self.smacof_config();
        let result = match self.n_jobs {
            Some(n_jobs) if n_jobs > 1 => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(n_jobs).build()?;
                pool.install(|| smacof(&dissimilarities.view(), &config, init))?
            }
            _ => smacof(&dissimilarities.view(), &config, init)?,
        };

        self.stress_ = result.stress;
        self.n_iter_ = result.n_iter;
        self.dissimilarity_matrix_ = Some(dissimilarities);
        self.embedding_ = Some(result.embedding.clone());
        Ok(result.embedding)
    }
}
