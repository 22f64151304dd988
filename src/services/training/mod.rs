use crate::algorithms::{infer_dimensions, ImplicitAls, InteractionIndex, RecommendationEngine, TrainingReport};
use crate::config::Config;
use crate::models::{ModelSnapshot, Observation};
use crate::utils::metrics::{MetricsCalculator, RecommendationMetrics};
use crate::utils::validation::validate_observation;
use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub version: String,
    pub num_users: usize,
    pub num_items: usize,
    pub train_pairs: usize,
    pub test_observations: usize,
    pub report: TrainingReport,
    pub metrics: Option<RecommendationMetrics>,
}

pub struct TrainingService {
    config: Arc<Config>,
}

impl TrainingService {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Configured dense bounds, falling back to the observed maxima.
    pub fn dimensions(&self, observations: &[Observation]) -> (usize, usize) {
        let (users, items) = infer_dimensions(observations);
        (
            self.config.data.num_users.unwrap_or(users),
            self.config.data.num_items.unwrap_or(items),
        )
    }

    /// Load, optionally hold out a test split, train, evaluate and persist.
    pub fn run(&self, holdout_fraction: Option<f64>, eval_k: usize) -> Result<TrainingOutcome> {
        let data = &self.config.data;
        let training = &self.config.training;

        let mut observations = load_observations(Path::new(&data.observations_path), data.delimiter, data.has_header)?;
        if data.binarize_strength {
            binarize(&mut observations);
        }
        info!("Loaded {} observations from {}", observations.len(), data.observations_path);

        let (num_users, num_items) = self.dimensions(&observations);
        let (train_observations, test_observations) = match holdout_fraction {
            Some(fraction) => holdout_split(observations, fraction, training.random_seed)?,
            None => (observations, Vec::new()),
        };

        let index = InteractionIndex::build(num_users, num_items, train_observations, training.alpha)?;
        let factorization = ImplicitAls::new(training.clone())?.fit(&index)?;
        let (user_factors, item_factors, report) = factorization.into_parts();
        let engine = RecommendationEngine::new(user_factors, item_factors)?;

        let metrics = if test_observations.is_empty() {
            None
        } else {
            let metrics = evaluate(&engine, &index, &test_observations, eval_k)?;
            info!(
                "Holdout metrics over {} users: precision@{}={:.4} recall@{}={:.4} ndcg@{}={:.4} map={:.4}",
                metrics.evaluated_users,
                metrics.k,
                metrics.precision_at_k,
                metrics.k,
                metrics.recall_at_k,
                metrics.k,
                metrics.ndcg_at_k,
                metrics.map_score
            );
            Some(metrics)
        };

        let snapshot = ModelSnapshot::new(
            training.clone(),
            engine.user_factors().to_owned(),
            engine.item_factors().to_owned(),
        );
        save_snapshot(&snapshot, Path::new(&data.model_path))?;

        Ok(TrainingOutcome {
            version: snapshot.version,
            num_users,
            num_items,
            train_pairs: index.nnz(),
            test_observations: test_observations.len(),
            report,
            metrics,
        })
    }
}

/// Reads `user<d>item[<d>strength]` rows of already-densified indices. A
/// missing strength column means a single unit-strength event.
pub fn load_observations(path: &Path, delimiter: char, has_header: bool) -> Result<Vec<Observation>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut observations = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if (has_header && line_number == 0) || line.trim().is_empty() {
            continue;
        }
        let observation = parse_observation(&line, delimiter)
            .with_context(|| format!("{}:{}: malformed row '{}'", path.display(), line_number + 1, line))?;
        validate_observation(&observation)
            .with_context(|| format!("{}:{}", path.display(), line_number + 1))?;
        observations.push(observation);
    }

    Ok(observations)
}

fn parse_observation(line: &str, delimiter: char) -> Result<Observation> {
    let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
    let strength = match fields.len() {
        2 => 1.0,
        3 => fields[2].parse::<f64>()?,
        n => return Err(anyhow!("expected 2 or 3 fields, found {}", n)),
    };
    Ok(Observation::new(fields[0].parse()?, fields[1].parse()?, strength))
}

/// Caller-side policy: every positive strength counts as one event.
pub fn binarize(observations: &mut [Observation]) {
    for observation in observations.iter_mut().filter(|o| o.strength > 0.0) {
        observation.strength = 1.0;
    }
}

/// Seeded shuffle, then the last `fraction` of observations becomes the test
/// split.
pub fn holdout_split(mut observations: Vec<Observation>, fraction: f64, seed: u64) -> Result<(Vec<Observation>, Vec<Observation>)> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(anyhow!("Holdout fraction must be in (0, 1), got {}", fraction));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    observations.shuffle(&mut rng);

    let test_len = (observations.len() as f64 * fraction).round() as usize;
    let test = observations.split_off(observations.len() - test_len);
    Ok((observations, test))
}

/// Ranks unseen items for every test user and scores the held-out positives,
/// using held-out strength as graded relevance. Items the user already has in
/// the training index cannot be recommended and are not counted.
pub fn evaluate(
    engine: &RecommendationEngine,
    train_index: &InteractionIndex,
    test_observations: &[Observation],
    k: usize,
) -> Result<RecommendationMetrics> {
    let mut relevance: BTreeMap<u32, HashMap<u32, f64>> = BTreeMap::new();
    for observation in test_observations.iter().filter(|o| o.strength > 0.0) {
        if train_index.has_interaction(observation.user_id, observation.item_id) {
            continue;
        }
        *relevance
            .entry(observation.user_id)
            .or_default()
            .entry(observation.item_id)
            .or_insert(0.0) += observation.strength;
    }

    if relevance.is_empty() {
        warn!("No held-out interactions left to evaluate");
    }

    let users: Vec<u32> = relevance.keys().copied().collect();
    let recommendations = engine.recommend_batch(&users, k, train_index)?;

    let lists: Vec<(Vec<u32>, HashMap<u32, f64>)> = recommendations
        .into_iter()
        .zip(relevance.into_values())
        .map(|(scored, relevant)| (scored.iter().map(|s| s.item_id).collect(), relevant))
        .collect();

    Ok(MetricsCalculator::new(k).calculate_all_metrics(&lists, engine.num_items()))
}

pub fn save_snapshot(snapshot: &ModelSnapshot, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path).with_context(|| format!("Failed to create {}", path.display()))?);
    serde_json::to_writer(writer, snapshot)?;
    info!("Saved model snapshot {} to {}", snapshot.version, path.display());
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<ModelSnapshot> {
    let reader = BufReader::new(File::open(path).with_context(|| format!("Failed to open {}", path.display()))?);
    let snapshot: ModelSnapshot = serde_json::from_reader(reader)?;
    info!(
        "Loaded model snapshot {} ({} users, {} items, rank {})",
        snapshot.version,
        snapshot.num_users(),
        snapshot.num_items(),
        snapshot.user_factors.ncols()
    );
    Ok(snapshot)
}
