pub mod argumentation;
pub mod config;
pub mod env;
pub mod infra;
pub mod planners;
pub mod utils;

// Re-export commonly used types for convenience
pub use argumentation::{ArgumentTable, ArgumentationFramework, Ranking, ValueBasedFramework};
pub use env::{Environment, EpisodeRunner, RankingEvaluator};
pub use planners::rl::{DecodeMode, Learner, RankingPolicy, Trainer};
