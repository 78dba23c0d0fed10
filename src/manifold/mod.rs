//! Manifold learning.

mod mds;

pub use mds::{Dissimilarity, MDS, SmacofConfig, SmacofResult, smacof};
