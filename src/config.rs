//! Run configuration from `ARGRANK_*` environment variables

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::env::frozen_lake::FrozenLakeConfig;
use crate::env::takeaway::{self, TakeawayConfig};
use crate::planners::rl::{
    AdvantageMode, BaselineIndex, DecodeMode, LearnerConfig, PolicyConfig, TrainConfig,
};
use crate::utils::estimate_baseline_step_size;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: cannot parse '{value}'")]
    Invalid { key: String, value: String },
    #[error("{key}: {reason}")]
    OutOfRange { key: String, reason: String },
}

/// Which task the rankings are trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    FrozenLake,
    Takeaway,
}

impl Task {
    /// Size of the task's argument universe
    pub fn num_arguments(self) -> usize {
        match self {
            Task::FrozenLake => 8,
            Task::Takeaway => takeaway::TAKERS * (1 + 4 * takeaway::MARKABLE_KEEPERS.len()),
        }
    }
}

impl FromStr for Task {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "frozen_lake" | "frozenlake" | "ffl" => Ok(Task::FrozenLake),
            "takeaway" => Ok(Task::Takeaway),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub task: Task,
    pub mode: DecodeMode,
    pub policy: PolicyConfig,
    pub learner: LearnerConfig,
    pub train: TrainConfig,
    pub lake: FrozenLakeConfig,
    pub takeaway: TakeawayConfig,
    /// Policy parameters to start from
    pub load_checkpoint: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Lookup(&lookup);

        let task = env
            .parse_with("ARGRANK_TASK", |s| s.parse::<Task>().ok())?
            .unwrap_or(Task::FrozenLake);
        let mode = env
            .parse_with("ARGRANK_MODE", |s| match s.to_ascii_lowercase().as_str() {
                "strict" => Some(DecodeMode::Strict),
                "grouped" => Some(DecodeMode::Grouped),
                _ => None,
            })?
            .unwrap_or(DecodeMode::Strict);

        let mut policy = PolicyConfig::default();
        if let Some(scale) = env.parse("ARGRANK_HIDDEN_SCALE")? {
            policy.hidden_scale = scale;
        }
        if let Some(layers) = env.parse("ARGRANK_HIDDEN_LAYERS")? {
            policy.hidden_layers = layers;
        }

        let mut train = TrainConfig {
            ranking_path: Some(PathBuf::from("ranking.txt")),
            ..TrainConfig::default()
        };
        if let Some(iterations) = env.parse("ARGRANK_ITERATIONS")? {
            train.iterations = iterations;
        }
        if let Some(batch_size) = env.parse("ARGRANK_BATCH_SIZE")? {
            train.batch_size = batch_size;
        }
        if let Some(eval_freq) = env.parse("ARGRANK_EVAL_FREQ")? {
            train.eval_freq = eval_freq;
        }
        if let Some(log_freq) = env.parse("ARGRANK_LOG_FREQ")? {
            train.log_freq = log_freq;
        }
        if let Some(path) = env.get("ARGRANK_RANKING_PATH") {
            train.ranking_path = Some(PathBuf::from(path));
        }
        train.checkpoint_path = env.get("ARGRANK_CHECKPOINT").map(PathBuf::from);
        train.log_dir = env.get("ARGRANK_LOG_DIR").map(PathBuf::from);
        train.seed = env.parse("ARGRANK_SEED")?;
        if train.batch_size == 0 {
            return Err(out_of_range("ARGRANK_BATCH_SIZE", "must be at least 1"));
        }

        let mut learner = LearnerConfig {
            baseline_step_size: estimate_baseline_step_size(task.num_arguments(), train.iterations),
            ..LearnerConfig::default()
        };
        if let Some(rate) = env.parse("ARGRANK_LEARNING_RATE")? {
            learner.learning_rate = rate;
        }
        if let Some(advantage) = env.parse_with("ARGRANK_ADVANTAGE", |s| {
            match s.to_ascii_lowercase().as_str() {
                "return" => Some(AdvantageMode::Return),
                "baseline" => Some(AdvantageMode::Baseline),
                _ => None,
            }
        })? {
            learner.advantage = advantage;
        }
        if let Some(index) = env.parse_with("ARGRANK_BASELINE_INDEX", |s| {
            match s.to_ascii_lowercase().as_str() {
                "cells" => Some(BaselineIndex::PrecedenceCells),
                "exact" => Some(BaselineIndex::ExactState),
                _ => None,
            }
        })? {
            learner.baseline_index = index;
        }
        if let Some(step) = env.parse("ARGRANK_BASELINE_STEP")? {
            learner.baseline_step_size = step;
        }

        let mut lake = FrozenLakeConfig::default();
        if let Some(size) = env.parse("ARGRANK_LAKE_SIZE")? {
            lake.size = size;
        }
        if let Some(p) = env.parse::<f64>("ARGRANK_LAKE_P")? {
            if !(p > 0.0 && p <= 1.0) {
                return Err(out_of_range("ARGRANK_LAKE_P", "must be in (0, 1]"));
            }
            lake.frozen_probability = p;
        }
        if let Some(max_steps) = env.parse("ARGRANK_LAKE_MAX_STEPS")? {
            lake.max_steps = max_steps;
        }
        if let Some(revisits) = env.parse("ARGRANK_LAKE_REVISITS")? {
            lake.allow_revisits = revisits;
        }
        if lake.size < 2 {
            return Err(out_of_range("ARGRANK_LAKE_SIZE", "must be at least 2"));
        }

        let mut takeaway = TakeawayConfig::default();
        if let Some(addr) = env.parse::<SocketAddr>("ARGRANK_TAKEAWAY_SEND")? {
            takeaway.send_addr = addr;
        }
        if let Some(addr) = env.parse::<SocketAddr>("ARGRANK_TAKEAWAY_RECV")? {
            takeaway.recv_addr = addr;
        }
        if let Some(path) = env.get("ARGRANK_TAKEAWAY_RANKING_PATH") {
            takeaway.ranking_path = PathBuf::from(path);
        }
        if let Some(secs) = env.parse::<u64>("ARGRANK_TAKEAWAY_TIMEOUT_SECS")? {
            takeaway.timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = env.parse("ARGRANK_TAKEAWAY_ATTEMPTS")? {
            takeaway.max_attempts = attempts;
        }

        Ok(Self {
            task,
            mode,
            policy,
            learner,
            train,
            lake,
            takeaway,
            load_checkpoint: env.get("ARGRANK_LOAD_CHECKPOINT").map(PathBuf::from),
        })
    }
}

struct Lookup<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Lookup<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.parse_with(key, |s| s.parse::<T>().ok())
    }

    fn parse_with<T>(
        &self,
        key: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => parse(value.trim()).map(Some).ok_or(ConfigError::Invalid {
                key: key.to_string(),
                value,
            }),
        }
    }
}

fn out_of_range(key: &str, reason: &str) -> ConfigError {
    ConfigError::OutOfRange {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.task, Task::FrozenLake);
        assert_eq!(config.mode, DecodeMode::Strict);
        assert_eq!(config.learner.advantage, AdvantageMode::Return);
        assert_eq!(config.train.ranking_path, Some(PathBuf::from("ranking.txt")));
        assert_eq!(config.train.checkpoint_path, None);
        assert_eq!(config.train.seed, None);
        assert_eq!(
            config.learner.baseline_step_size,
            estimate_baseline_step_size(8, config.train.iterations)
        );
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("ARGRANK_TASK", "takeaway"),
            ("ARGRANK_MODE", "Grouped"),
            ("ARGRANK_ADVANTAGE", "baseline"),
            ("ARGRANK_BASELINE_INDEX", "exact"),
            ("ARGRANK_ITERATIONS", "20"),
            ("ARGRANK_BATCH_SIZE", "4"),
            ("ARGRANK_LEARNING_RATE", "0.01"),
            ("ARGRANK_SEED", "7"),
            ("ARGRANK_TAKEAWAY_RECV", "127.0.0.1:7001"),
            ("ARGRANK_TAKEAWAY_TIMEOUT_SECS", "3"),
        ])
        .unwrap();
        assert_eq!(config.task, Task::Takeaway);
        assert_eq!(config.mode, DecodeMode::Grouped);
        assert_eq!(config.learner.advantage, AdvantageMode::Baseline);
        assert_eq!(config.learner.baseline_index, BaselineIndex::ExactState);
        assert_eq!(config.train.iterations, 20);
        assert_eq!(config.train.batch_size, 4);
        assert_eq!(config.learner.learning_rate, 0.01);
        assert_eq!(config.train.seed, Some(7));
        assert_eq!(config.takeaway.recv_addr, "127.0.0.1:7001".parse::<SocketAddr>().unwrap());
        assert_eq!(config.takeaway.timeout, Duration::from_secs(3));
        assert_eq!(
            config.learner.baseline_step_size,
            estimate_baseline_step_size(39, 20)
        );
    }

    #[test]
    fn test_takeaway_universe_matches_catalogue() {
        assert_eq!(
            Task::Takeaway.num_arguments(),
            takeaway::taker_arguments().unwrap().len()
        );
    }

    #[test]
    fn test_malformed_values_are_errors() {
        assert_eq!(
            config(&[("ARGRANK_ITERATIONS", "many")]).unwrap_err(),
            ConfigError::Invalid {
                key: "ARGRANK_ITERATIONS".to_string(),
                value: "many".to_string()
            }
        );
        assert!(config(&[("ARGRANK_MODE", "tree")]).is_err());
        assert!(matches!(
            config(&[("ARGRANK_LAKE_P", "0")]),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            config(&[("ARGRANK_BATCH_SIZE", "0")]),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = config(&[("ARGRANK_SEED", "  ")]).unwrap();
        assert_eq!(config.train.seed, None);
    }
}
