use implicit_als::algorithms::{ImplicitAls, InteractionIndex, RecommendationEngine};
use implicit_als::config::TrainingConfig;
use implicit_als::utils::metrics::MetricsCalculator;
use implicit_als::Observation;
use std::collections::HashSet;

fn main() -> anyhow::Result<()> {
    implicit_als::init_tracing();

    // Play counts for four listeners over six tracks.
    let observations = vec![
        Observation::new(0, 0, 5.0),
        Observation::new(0, 1, 3.0),
        Observation::new(0, 2, 1.0),
        Observation::new(1, 0, 4.0),
        Observation::new(1, 1, 2.0),
        Observation::new(2, 3, 6.0),
        Observation::new(2, 4, 2.0),
        Observation::new(3, 3, 1.0),
        Observation::new(3, 4, 4.0),
        Observation::new(3, 5, 2.0),
    ];

    let config = TrainingConfig {
        rank: 3,
        iterations: 15,
        alpha: 10.0,
        lambda: 0.1,
        ..Default::default()
    };

    let index = InteractionIndex::from_observations(&observations, config.alpha)?;
    println!(
        "Indexed {} pairs for {} users and {} items",
        index.nnz(),
        index.num_users(),
        index.num_items()
    );

    let factorization = ImplicitAls::new(config)?.fit(&index)?;
    println!("Loss per iteration: {:?}", factorization.report.loss_history);
    println!("Training took {:?}", factorization.report.elapsed);

    let engine = RecommendationEngine::from_factorization(factorization);

    println!("Score(user 1, item 2) = {:.4}", engine.predict(1, 2)?);
    println!("Score(user 1, item 5) = {:.4}", engine.predict(1, 5)?);

    for user in 0..index.num_users() as u32 {
        let recommendations = engine.top_k_unseen(user, 2, &index)?;
        println!("User {} unseen top-2: {:?}", user, recommendations);
    }

    let exclude: HashSet<u32> = [0].into_iter().collect();
    println!("User 1 top-3 without item 0: {:?}", engine.top_k(1, 3, &exclude)?);
    println!("Items similar to 3: {:?}", engine.similar_items(3, 2)?);

    let batch = engine.recommend_batch(&[0, 1, 2, 3], 3, &index)?;
    let recommended: Vec<Vec<u32>> = batch
        .iter()
        .map(|items| items.iter().map(|s| s.item_id).collect())
        .collect();
    let calculator = MetricsCalculator::new(3);
    println!(
        "Catalog coverage at 3: {:.2}",
        calculator.calculate_coverage(&recommended, index.num_items())
    );

    Ok(())
}
