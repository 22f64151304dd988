use anyhow::Result;
use clap::Parser;
use implicit_als::services::training::TrainingService;
use implicit_als::{init_tracing, Config};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train implicit ALS factors from densified observations", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Overrides `data.observations_path`.
    #[arg(short, long)]
    input: Option<String>,

    /// Overrides `data.model_path`.
    #[arg(short, long)]
    output: Option<String>,

    #[arg(long)]
    rank: Option<usize>,

    #[arg(long)]
    iterations: Option<usize>,

    #[arg(long)]
    alpha: Option<f64>,

    #[arg(long)]
    lambda: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    threads: Option<usize>,

    /// Hold out this fraction of observations and report ranking metrics.
    #[arg(long)]
    holdout: Option<f64>,

    /// Cutoff for holdout metrics.
    #[arg(long, default_value_t = 10)]
    eval_k: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    info!("Starting implicit ALS trainer");

    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };

    if let Some(input) = args.input {
        config.data.observations_path = input;
    }
    if let Some(output) = args.output {
        config.data.model_path = output;
    }
    let training = &mut config.training;
    training.rank = args.rank.unwrap_or(training.rank);
    training.iterations = args.iterations.unwrap_or(training.iterations);
    training.alpha = args.alpha.unwrap_or(training.alpha);
    training.lambda = args.lambda.unwrap_or(training.lambda);
    training.random_seed = args.seed.unwrap_or(training.random_seed);
    if args.threads.is_some() {
        training.num_threads = args.threads;
    }

    info!("Training configuration: {:?}", config.training);

    let service = TrainingService::new(Arc::new(config));
    let outcome = service.run(args.holdout, args.eval_k)?;

    info!(
        "Trained model {} on {} pairs ({} users, {} items) in {:?}",
        outcome.version,
        outcome.train_pairs,
        outcome.num_users,
        outcome.num_items,
        outcome.report.elapsed
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}
