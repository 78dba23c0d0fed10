//! Ridge regression used as the per-feature estimator of iterative imputation.

use crate::error::{LearnError, Result};
use crate::utils::{cholesky_solve, shape_str};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// L2-penalized least squares with an unpenalized intercept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegressor {
    /// Penalty strength; must be strictly positive.
    pub alpha: f64,
    coef_: Option<Array1<f64>>,
    intercept_: f64,
}

impl Default for RidgeRegressor {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegressor {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            coef_: None,
            intercept_: 0.0,
        }
    }

    pub fn coef(&self) -> Result<&Array1<f64>> {
        self.coef_
            .as_ref()
            .ok_or_else(|| LearnError::NotFitted("RidgeRegressor".to_string()))
    }

    pub fn intercept(&self) -> f64 {
        self.intercept_
    }

    /// Fit on `x` (n_samples, n_features) and `y` (n_samples).
    ///
    /// With zero features the model reduces to the mean of `y`.
    pub fn fit(&mut self, x: &ArrayView2<f64>, y: &ArrayView1<f64>) -> Result<()> {
        if self.alpha.is_nan() || self.alpha <= 0.0 {
            return Err(LearnError::InvalidParameter(format!(
                "alpha must be strictly positive, got {}",
                self.alpha
            )));
        }
        if x.nrows() != y.len() {
            return Err(LearnError::ShapeMismatch {
                expected_shape: format!("({}, n_features)", y.len()),
                actual_shape: shape_str(x.dim()),
            });
        }
        if y.is_empty() {
            return Err(LearnError::InvalidInput(
                "Cannot fit a regressor on zero samples".to_string(),
            ));
        }

        let y_mean = y.mean().unwrap_or(0.0);
        if x.ncols() == 0 {
            self.coef_ = Some(Array1::zeros(0));
            self.intercept_ = y_mean;
            return Ok(());
        }

        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let xc = x - &x_mean;
        let yc = y - y_mean;

        let mut gram: Array2<f64> = xc.t().dot(&xc);
        gram.diag_mut().mapv_inplace(|v| v + self.alpha);
        let rhs = xc.t().dot(&yc);
        let coef = cholesky_solve(&gram, &rhs.view())?;

        self.intercept_ = y_mean - x_mean.dot(&coef);
        self.coef_ = Some(coef);
        Ok(())
    }

    pub fn predict(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>> {
        let coef = self.coef()?;
        if x.ncols() != coef.len() {
            return Err(LearnError::ShapeMismatch {
                expected_shape: format!("(n_samples, {})", coef.len()),
                actual_shape: shape_str(x.dim()),
            });
        }
        Ok(x.dot(coef) + self.intercept_)
    }
}
