//! Impute a masked dataset, then embed it in two dimensions with MDS.
//!
//! Run with `RUST_LOG=debug cargo run --example impute_and_embed`.

use learnkit::datasets::{generate_clustered_data, mask_missing};
use learnkit::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    let truth = generate_clustered_data(0, 3, 4, 20, 0.3)?;
    let masked = mask_missing(&truth, 0.15, 0)?;
    println!(
        "{} of {} entries masked",
        masked.iter().filter(|v| v.is_nan()).count(),
        masked.len()
    );

    let mut imputer = IterativeImputer::default()
        .with_random_state(0)
        .with_add_indicator(true);
    let imputed = imputer.fit_transform(&masked.view())?;
    let names = imputer.get_feature_names_out(None)?;
    println!("IterativeImputer ran {} rounds", imputer.n_iter_());
    println!("Output features: {:?}", names);

    let n_features = truth.ncols();
    let features = imputed.slice(ndarray::s![.., ..n_features]).to_owned();
    let metric = DistanceMetric::get_metric("manhattan", MetricParams::default())?;
    let dissimilarities = metric.pairwise(&features.view(), None)?;

    let mut mds = MDS::new(2)
        .with_dissimilarity(Dissimilarity::Precomputed)
        .with_random_state(0);
    let embedding = mds.fit_transform(&dissimilarities.view(), None)?;
    println!(
        "MDS stress {:.4} after {} iterations",
        mds.stress_(),
        mds.n_iter_()
    );
    for (i, row) in embedding.outer_iter().step_by(20).enumerate() {
        println!("cluster {}: ({:.3}, {:.3})", i, row[0], row[1]);
    }
    Ok(())
}
