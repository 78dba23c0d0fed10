//! Core value types shared across estimators.

use serde::{Deserialize, Serialize};

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Floating point element types accepted by distance computations.
///
/// Distances are always accumulated and returned in `f64`, so single and
/// double precision inputs agree up to `f32` rounding of the inputs.
pub trait Float: sealed::Sealed + Copy + Send + Sync + 'static {
    fn to_f64(self) -> f64;
}

impl Float for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Float for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

/// Placeholder that marks an entry of a data matrix as missing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum MissingValues {
    /// Missing entries are NaN.
    #[default]
    Nan,
    /// Missing entries equal this exact value (e.g. `-1.0` or `0.0`).
    /// A NaN value is rejected by the estimators; use [`MissingValues::Nan`].
    Value(f64),
}

impl MissingValues {
    /// Whether `x` is a missing entry under this marker.
    #[inline]
    pub fn is_missing(&self, x: f64) -> bool {
        match self {
            MissingValues::Nan => x.is_nan(),
            MissingValues::Value(v) => x == *v,
        }
    }

    /// Whether NaN may appear in the data as a regular value.
    ///
    /// With a non-NaN marker, a NaN entry is neither observed nor missing and
    /// the input is rejected.
    pub fn allows_nan(&self) -> bool {
        matches!(self, MissingValues::Nan)
    }
}
