use clap::{Parser, ValueEnum};
use learnkit::datasets::{generate_clustered_data, mask_missing};
use learnkit::error::Result;
use learnkit::impute::{ImputeStrategy, Imputer, IterativeImputer, KNNImputer, SimpleImputer};
use learnkit::manifold::MDS;
use ndarray::Array2;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Estimator {
    Simple,
    Knn,
    Iterative,
    Mds,
}

#[derive(Parser)]
#[command(name = "learnkit-bench")]
#[command(version)]
#[command(about = "Time imputers and MDS on synthetic clustered data", long_about = None)]
struct Cli {
    /// Estimators to benchmark
    #[arg(short, long, value_enum, num_args = 1.., required = true)]
    estimators: Vec<Estimator>,

    /// Total number of samples (split over 4 clusters)
    #[arg(long, default_value_t = 400)]
    n_samples: usize,

    /// Fraction of entries replaced by NaN
    #[arg(long, default_value_t = 0.1)]
    missing_rate: f64,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

struct BenchRow {
    name: &'static str,
    fit: Duration,
    transform: Option<Duration>,
    metric_name: &'static str,
    metric: f64,
}

/// RMSE of `imputed` against `truth` over the entries missing in `masked`.
fn masked_rmse(truth: &Array2<f64>, masked: &Array2<f64>, imputed: &Array2<f64>) -> f64 {
    if imputed.dim() != truth.dim() {
        return f64::NAN;
    }
    let (sum, count) = masked
        .iter()
        .zip(truth.iter().zip(imputed.iter()))
        .filter(|(m, _)| m.is_nan())
        .fold((0.0, 0usize), |(s, c), (_, (t, i))| (s + (t - i) * (t - i), c + 1));
    if count == 0 { 0.0 } else { (sum / count as f64).sqrt() }
}

fn bench_imputer<I: Imputer>(
    name: &'static str,
    mut imputer: I,
    truth: &Array2<f64>,
    masked: &Array2<f64>,
) -> Result<BenchRow> {
    let start = Instant::now();
    imputer.fit(&masked.view())?;
    let fit = start.elapsed();

    let start = Instant::now();
    let imputed = imputer.transform(&masked.view())?;
    let transform = start.elapsed();

    Ok(BenchRow {
        name,
        fit,
        transform: Some(transform),
        metric_name: "rmse",
        metric: masked_rmse(truth, masked, &imputed),
    })
}

fn bench_mds(truth: &Array2<f64>, seed: u64) -> Result<BenchRow> {
    let mut mds = MDS::new(2).with_random_state(seed);
    let start = Instant::now();
    mds.fit(&truth.view(), None)?;
    let fit = start.elapsed();
    log::debug!("MDS stopped after {} iterations", mds.n_iter_());

    Ok(BenchRow {
        name: "mds",
        fit,
        transform: None,
        metric_name: "stress",
        metric: mds.stress_(),
    })
}

fn print_table(rows: &[BenchRow]) {
    println!(
        "\n{:<12} {:>12} {:>14} {:>8} {:>12}",
        "estimator", "fit (ms)", "transform (ms)", "metric", "value"
    );
    println!("{}", "-".repeat(62));
    for row in rows {
        let transform = row
            .transform
            .map(|d| format!("{:.3}", d.as_secs_f64() * 1e3))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:>12.3} {:>14} {:>8} {:>12.5}",
            row.name,
            row.fit.as_secs_f64() * 1e3,
            transform,
            row.metric_name,
            row.metric
        );
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut estimators = cli.estimators.clone();
    estimators.sort();
    estimators.dedup();

    let per_cluster = (cli.n_samples / 4).max(1);
    let truth = generate_clustered_data(cli.seed, 4, 4, per_cluster, 0.4)?;
    let masked = mask_missing(&truth, cli.missing_rate, cli.seed)?;
    log::info!(
        "Generated {} samples x {} features, {} entries masked",
        truth.nrows(),
        truth.ncols(),
        masked.iter().filter(|v| v.is_nan()).count()
    );

    let mut rows = Vec::with_capacity(estimators.len());
    for estimator in estimators {
        let row = match estimator {
            Estimator::Simple => bench_imputer(
                "simple",
                SimpleImputer::new(ImputeStrategy::Mean),
                &truth,
                &masked,
            )?,
            Estimator::Knn => bench_imputer("knn", KNNImputer::default(), &truth, &masked)?,
            Estimator::Iterative => bench_imputer(
                "iterative",
                IterativeImputer::default().with_random_state(cli.seed),
                &truth,
                &masked,
            )?,
            Estimator::Mds => bench_mds(&truth, cli.seed)?,
        };
        rows.push(row);
    }

    print_table(&rows);
    Ok(())
}
