use argrank::config::{AppConfig, Task};
use argrank::env::frozen_lake::FrozenLake;
use argrank::env::takeaway::{TakeawayBridge, kind_values};
use argrank::env::{EpisodeRunner, RankingEvaluator};
use argrank::planners::rl::{Learner, RankingPolicy, Trainer, adam};
use burn::backend::{Autodiff, NdArray};
use dotenv::dotenv;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

type Backend = Autodiff<NdArray>;

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("argrank=debug,info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    tracing::info!(
        "Task {:?}, {} decoding, {:?} advantages",
        config.task,
        config.mode,
        config.learner.advantage
    );

    let mut rng = match config.train.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };

    let mut evaluator: Box<dyn RankingEvaluator> = match config.task {
        Task::FrozenLake => {
            let lake = FrozenLake::new(config.lake.clone(), &mut rng)?;
            Box::new(EpisodeRunner::new(lake, StdRng::seed_from_u64(rng.random()))?)
        }
        Task::Takeaway => Box::new(TakeawayBridge::new(config.takeaway.clone())?),
    };
    let names = evaluator.argument_names();

    let mut policy =
        RankingPolicy::<Backend>::new(Default::default(), names.len(), config.mode, &config.policy);
    if let Some(path) = &config.load_checkpoint {
        policy.load(path)?;
    }

    let learner = Learner::new(policy, config.learner.clone(), adam::<Backend>());
    let mut trainer = Trainer::new(
        learner,
        config.train.clone(),
        StdRng::seed_from_u64(rng.random()),
    )?;
    let outcome = trainer.train(evaluator.as_mut())?;

    if config.task == Task::Takeaway {
        tracing::info!("Argument kinds by mean weight:");
        for (kind, value) in kind_values(&outcome.ranking, &names) {
            tracing::info!("  {}: {}", kind, value);
        }
    }
    tracing::info!(
        "Best sampled return {}, final greedy return {:.3}, {} fallbacks",
        outcome
            .best_return
            .map_or_else(|| "-".to_string(), |r| format!("{:.3}", r)),
        outcome.greedy_return,
        evaluator.fallback_count()
    );

    Ok(())
}
