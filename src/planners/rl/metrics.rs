//! Metrics and CSV logging for ranking training

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Moving average calculator
#[derive(Debug, Clone)]
pub struct MovingAverage {
    values: VecDeque<f32>,
    window_size: usize,
    sum: f32,
}

impl MovingAverage {
    pub fn new(window_size: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(window_size),
            window_size,
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() >= self.window_size
            && let Some(old) = self.values.pop_front()
        {
            self.sum -= old;
        }
        self.values.push_back(value);
        self.sum += value;
    }

    pub fn average(&self) -> f32 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f32
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Training metrics tracker
#[derive(Debug)]
pub struct TrainingMetrics {
    /// Returns of sampled rankings
    pub episode_returns: MovingAverage,
    /// Policy-gradient loss per batch
    pub policy_loss: MovingAverage,
    /// Mean advantage per batch
    pub advantage: MovingAverage,
    /// Most recent greedy evaluation return
    pub greedy_return: Option<f32>,
    /// Best return seen for any sampled ranking
    pub best_return: Option<f32>,
    /// Current iteration
    pub iteration: usize,
    /// Total episodes played
    pub total_episodes: usize,
    /// Steps decided by a random fallback
    pub fallbacks: usize,
    start_time: Instant,
}

impl TrainingMetrics {
    pub fn new(window_size: usize) -> Self {
        Self {
            episode_returns: MovingAverage::new(window_size),
            policy_loss: MovingAverage::new(window_size),
            advantage: MovingAverage::new(window_size),
            greedy_return: None,
            best_return: None,
            iteration: 0,
            total_episodes: 0,
            fallbacks: 0,
            start_time: Instant::now(),
        }
    }

    pub fn record_episode(&mut self, episode_return: f32) {
        self.episode_returns.push(episode_return);
        self.total_episodes += 1;
        self.best_return = Some(self.best_return.map_or(episode_return, |b| b.max(episode_return)));
    }

    pub fn record_update(&mut self, policy_loss: f32, mean_advantage: f32) {
        self.policy_loss.push(policy_loss);
        self.advantage.push(mean_advantage);
    }

    pub fn training_duration_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn log_to_console(&self) {
        tracing::info!(
            "Iteration {} | Episodes {} | Fallbacks {} | {:.1}s",
            self.iteration,
            self.total_episodes,
            self.fallbacks,
            self.training_duration_secs()
        );
        tracing::info!(
            "  Return: avg={:.3}, best={:.3}, greedy={}",
            self.episode_returns.average(),
            self.best_return.unwrap_or(0.0),
            self.greedy_return
                .map_or_else(|| "-".to_string(), |g| format!("{:.3}", g))
        );
        tracing::info!(
            "  Update: loss={:.4}, advantage={:.4}",
            self.policy_loss.average(),
            self.advantage.average()
        );
    }
}

impl Default for TrainingMetrics {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Appends `step,value` rows to one CSV file per tag
pub struct CsvLogger {
    log_dir: PathBuf,
}

impl CsvLogger {
    pub fn new(log_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        std::fs::create_dir_all(log_dir.as_ref())?;
        Ok(Self {
            log_dir: log_dir.as_ref().to_path_buf(),
        })
    }

    pub fn log_scalar(&self, tag: &str, value: f32, step: usize) -> std::io::Result<()> {
        let csv_path = self.log_dir.join(format!("{}.csv", tag.replace('/', "_")));
        let file_exists = csv_path.exists();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&csv_path)?;
        if !file_exists {
            writeln!(file, "step,value")?;
        }
        writeln!(file, "{},{}", step, value)
    }

    pub fn log_metrics(&self, metrics: &TrainingMetrics) -> std::io::Result<()> {
        let step = metrics.iteration;
        self.log_scalar("episode/return", metrics.episode_returns.average(), step)?;
        self.log_scalar("losses/policy", metrics.policy_loss.average(), step)?;
        self.log_scalar("losses/advantage", metrics.advantage.average(), step)?;
        self.log_scalar("episode/fallbacks", metrics.fallbacks as f32, step)?;
        if let Some(greedy) = metrics.greedy_return {
            self.log_scalar("episode/greedy_return", greedy, step)?;
        }
        Ok(())
    }
}
