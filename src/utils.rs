//! Input validation and small dense linear algebra helpers.

use crate::error::{LearnError, Result};
use crate::types::MissingValues;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Pivot threshold relative to the largest absolute entry of the matrix.
const PIVOT_EPS: f64 = 1e-12;

/// Render an array shape the way error messages print it.
pub fn shape_str(dim: (usize, usize)) -> String {
    format!("({}, {})", dim.0, dim.1)
}

/// Reject matrices containing NaN or infinity.
pub fn check_finite(x: &ArrayView2<f64>, name: &str) -> Result<()> {
    if x.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(LearnError::InvalidInput(format!(
            "Input {} contains NaN or infinity",
            name
        )))
    }
}

/// Reject inputs that cannot carry the given missing-value marker.
///
/// Infinity is never a valid entry. NaN is only accepted when it is the marker.
pub fn check_missing_input(x: &ArrayView2<f64>, missing: MissingValues) -> Result<()> {
    if x.iter().any(|v| v.is_infinite()) {
        return Err(LearnError::InvalidInput(
            "Input X contains infinity".to_string(),
        ));
    }
    if let MissingValues::Value(v) = missing {
        if v.is_nan() {
            return Err(LearnError::InvalidParameter(
                "missing_values=Value(NaN) never matches; use MissingValues::Nan".to_string(),
            ));
        }
    }
    if !missing.allows_nan() && x.iter().any(|v| v.is_nan()) {
        return Err(LearnError::InvalidInput(
            "Input X contains NaN but missing_values is not NaN".to_string(),
        ));
    }
    Ok(())
}

/// Require a square matrix and return its size.
pub fn check_square(x: &ArrayView2<f64>, name: &str) -> Result<usize> {
    let (rows, cols) = x.dim();
    if rows != cols {
        return Err(LearnError::InvalidInput(format!(
            "{} must be a square matrix, got shape {}",
            name,
            shape_str((rows, cols))
        )));
    }
    Ok(rows)
}

/// Require `x[i, j] == x[j, i]` up to `tol`.
pub fn check_symmetric(x: &ArrayView2<f64>, tol: f64) -> Result<()> {
    let n = check_square(x, "Array")?;
    for i in 0..n {
        for j in (i + 1)..n {
            if (x[[i, j]] - x[[j, i]]).abs() > tol {
                return Err(LearnError::InvalidInput(
                    "Array must be symmetric".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Boolean mask of the missing entries of `x`.
pub fn missing_mask(x: &ArrayView2<f64>, missing: MissingValues) -> Array2<bool> {
    x.mapv(|v| missing.is_missing(v))
}

/// Mean of the observed entries of every column; NaN for empty columns.
pub fn masked_column_means(x: &ArrayView2<f64>, mask: &Array2<bool>) -> Array1<f64> {
    let mut means = Array1::from_elem(x.ncols(), f64::NAN);
    for (j, (col, col_mask)) in x.axis_iter(Axis(1)).zip(mask.axis_iter(Axis(1))).enumerate() {
        let (sum, count) = col
            .iter()
            .zip(col_mask.iter())
            .filter(|(_, m)| !**m)
            .fold((0.0, 0usize), |(s, c), (v, _)| (s + v, c + 1));
        if count > 0 {
            means[j] = sum / count as f64;
        }
    }
    means
}

/// Solve `A x = b` for a symmetric positive definite `A` via Cholesky.
pub fn cholesky_solve(a: &Array2<f64>, b: &ArrayView1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return Err(LearnError::ShapeMismatch {
            expected_shape: format!("({n}, {n}) system with rhs of length {n}"),
            actual_shape: format!("{} with rhs of length {}", shape_str(a.dim()), b.len()),
        });
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 {
                    return Err(LearnError::LinAlg(
                        "matrix is not positive definite".to_string(),
                    ));
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // Forward substitution: L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }

    // Back substitution: L' x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    Ok(x)
}

/// Inverse of a square matrix by Gauss-Jordan elimination with partial pivoting.
pub fn invert(a: &ArrayView2<f64>) -> Result<Array2<f64>> {
    let n = check_square(a, "Matrix")?;
    let mut work = a.to_owned();
    let mut inv = Array2::<f64>::eye(n);
    let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if n > 0 && !(scale.is_finite() && scale > 0.0) {
        return Err(LearnError::LinAlg("singular matrix".to_string()));
    }
    let threshold = PIVOT_EPS * scale;

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&r1, &r2| {
                work[[r1, col]]
                    .abs()
                    .partial_cmp(&work[[r2, col]].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if work[[pivot, col]].abs() <= threshold {
            return Err(LearnError::LinAlg("singular matrix".to_string()));
        }
        if pivot != col {
            for k in 0..n {
                work.swap([pivot, k], [col, k]);
                inv.swap([pivot, k], [col, k]);
            }
        }

        let diag = work[[col, col]];
        for k in 0..n {
            work[[col, k]] /= diag;
            inv[[col, k]] /= diag;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                work[[row, k]] -= factor * work[[col, k]];
                inv[[row, k]] -= factor * inv[[col, k]];
            }
        }
    }
    Ok(inv)
}

/// Dense Euclidean self-distance matrix of the rows of `x`.
pub fn euclidean_distances(x: &ArrayView2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let mut d = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let dist = x
                .row(i)
                .iter()
                .zip(x.row(j).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            d[[i, j]] = dist;
            d[[j, i]] = dist;
        }
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_check_finite() {
        let ok = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(check_finite(&ok.view(), "X").is_ok());

        let bad = array![[1.0, f64::NAN], [3.0, 4.0]];
        let err = check_finite(&bad.view(), "X").unwrap_err();
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn test_check_missing_input() {
        let x = array![[1.0, f64::NAN]];
        assert!(check_missing_input(&x.view(), MissingValues::Nan).is_ok());
        assert!(check_missing_input(&x.view(), MissingValues::Value(-1.0)).is_err());

        let inf = array![[1.0, f64::INFINITY]];
        assert!(check_missing_input(&inf.view(), MissingValues::Nan).is_err());

        let complete = array![[1.0, 2.0]];
        let err = check_missing_input(&complete.view(), MissingValues::Value(f64::NAN)).unwrap_err();
        assert!(matches!(err, LearnError::InvalidParameter(_)));
    }

    #[test]
    fn test_check_symmetric() {
        let sym = array![[0.0, 1.0], [1.0, 0.0]];
        assert!(check_symmetric(&sym.view(), 1e-10).is_ok());

        let asym = array![[0.0, 1.0], [2.0, 0.0]];
        assert!(check_symmetric(&asym.view(), 1e-10).is_err());

        let rect = array![[0.0, 1.0, 2.0], [1.0, 0.0, 3.0]];
        assert!(check_symmetric(&rect.view(), 1e-10).is_err());
    }

    #[test]
    fn test_masked_column_means() {
        let x = array![[1.0, f64::NAN], [3.0, f64::NAN], [f64::NAN, f64::NAN]];
        let mask = missing_mask(&x.view(), MissingValues::Nan);
        let means = masked_column_means(&x.view(), &mask);
        assert_relative_eq!(means[0], 2.0);
        assert!(means[1].is_nan());
    }

    #[test]
    fn test_cholesky_solve() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = cholesky_solve(&a, &b.view()).unwrap();
        // 4x + 2y = 2, 2x + 3y = 1 -> x = 0.5, y = 0
        assert_relative_eq!(x[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-12);

        let indefinite = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(matches!(
            cholesky_solve(&indefinite, &b.view()),
            Err(LearnError::LinAlg(_))
        ));
    }

    #[test]
    fn test_invert() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let inv = invert(&a.view()).unwrap();
        let prod = a.dot(&inv);
        assert_relative_eq!(prod, Array2::eye(2), epsilon = 1e-12);

        let singular = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(invert(&singular.view()).is_err());
        assert!(invert(&Array2::<f64>::zeros((2, 2)).view()).is_err());
    }

    #[test]
    fn test_invert_small_scale_matrix() {
        let a = Array2::<f64>::eye(3) * 1e-13;
        let inv = invert(&a.view()).unwrap();
        assert_relative_eq!(inv, Array2::eye(3) * 1e13, max_relative = 1e-10);
    }

    #[test]
    fn test_euclidean_distances() {
        let x = array![[0.0, 0.0], [3.0, 4.0]];
        let d = euclidean_distances(&x.view());
        assert_relative_eq!(d[[0, 1]], 5.0);
        assert_relative_eq!(d[[1, 0]], 5.0);
        assert_eq!(d[[0, 0]], 0.0);
    }
}
