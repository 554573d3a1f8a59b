//! REINFORCE learner and the ranking training loop

use std::io;
use std::path::PathBuf;

use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use rand::Rng;
use thiserror::Error;

use crate::argumentation::{Ranking, RankingError};
use crate::env::{EnvError, RankingEvaluator};

use super::PolicyError;
use super::action_space::DecodeMode;
use super::baseline::{BaselineIndex, TabularBaseline};
use super::encoder::{DecodeStep, replay};
use super::metrics::{CsvLogger, TrainingMetrics};
use super::policy::{DecodedRanking, Decoding, RankingNet, RankingPolicy};

/// One played ranking: the ranking, the probability of each decoding action, and its return
#[derive(Debug, Clone)]
pub struct Episode {
    pub ranking: Ranking,
    pub probabilities: Vec<f32>,
    pub episode_return: f32,
}

impl Episode {
    pub fn new(decoded: DecodedRanking, episode_return: f32) -> Self {
        Self {
            ranking: decoded.ranking,
            probabilities: decoded.probabilities,
            episode_return,
        }
    }
}

/// Signal multiplying the log-probability of each decoding step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvantageMode {
    /// The raw episode return
    #[default]
    Return,
    /// Return minus a learned state value
    Baseline,
}

#[derive(Debug, Clone)]
pub struct LearnerConfig {
    /// Adam learning rate for the policy
    pub learning_rate: f64,
    pub advantage: AdvantageMode,
    pub baseline_index: BaselineIndex,
    /// Step size of the baseline update
    pub baseline_step_size: f32,
    /// Largest tolerated gap between recorded and re-evaluated probabilities
    pub probability_tolerance: f32,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            advantage: AdvantageMode::Return,
            baseline_index: BaselineIndex::PrecedenceCells,
            baseline_step_size: 1e-3,
            probability_tolerance: 1e-3,
        }
    }
}

#[derive(Debug, Error)]
pub enum LearnError {
    #[error("empty batch")]
    EmptyBatch,
    #[error("episode {index} is malformed: {reason}")]
    MalformedEpisode { index: usize, reason: String },
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Summary of one policy update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnReport {
    pub loss: f32,
    pub mean_return: f32,
    pub mean_advantage: f32,
    pub steps: usize,
    /// Largest gap between a recorded probability and its re-evaluation before the update
    pub max_probability_drift: f32,
}

/// Adam with default hyper-parameters, typed for the ranking network
pub fn adam<B: AutodiffBackend>() -> impl Optimizer<RankingNet<B>, B> {
    AdamConfig::new().init::<B, RankingNet<B>>()
}

/// Owns the policy, its optimizer, and the optional baseline
pub struct Learner<B: AutodiffBackend, O> {
    policy: RankingPolicy<B>,
    optimizer: O,
    config: LearnerConfig,
    baseline: Option<TabularBaseline>,
}

impl<B, O> Learner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<RankingNet<B>, B>,
{
    pub fn new(policy: RankingPolicy<B>, config: LearnerConfig, optimizer: O) -> Self {
        let baseline = match config.advantage {
            AdvantageMode::Return => None,
            AdvantageMode::Baseline => Some(TabularBaseline::new(
                policy.num_arguments(),
                config.baseline_step_size,
                config.baseline_index,
            )),
        };

        Self {
            policy,
            optimizer,
            config,
            baseline,
        }
    }

    pub fn policy(&self) -> &RankingPolicy<B> {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut RankingPolicy<B> {
        &mut self.policy
    }

    pub fn into_policy(self) -> RankingPolicy<B> {
        self.policy
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn baseline(&self) -> Option<&TabularBaseline> {
        self.baseline.as_ref()
    }

    /// One gradient step on a batch of complete episodes
    pub fn learn(&mut self, batch: &[Episode]) -> Result<LearnReport, LearnError> {
        if batch.is_empty() {
            return Err(LearnError::EmptyBatch);
        }

        let n = self.policy.num_arguments();
        let mut steps = Vec::with_capacity(batch.len() * n);
        let mut recorded = Vec::with_capacity(batch.len() * n);
        for (index, episode) in batch.iter().enumerate() {
            self.check_episode(index, episode)?;
            steps.extend(replay(&episode.ranking, self.policy.strategy(), n));
            recorded.extend_from_slice(&episode.probabilities);
        }

        let advantages = self.advantages(batch, &steps);
        let mean_advantage = advantages.iter().sum::<f32>() / advantages.len() as f32;
        let mean_return =
            batch.iter().map(|e| e.episode_return).sum::<f32>() / batch.len() as f32;

        let probabilities = self.policy.step_probabilities(&steps);
        let current = to_vec(probabilities.clone())?;
        let max_probability_drift = current
            .iter()
            .zip(&recorded)
            .map(|(now, then)| (now - then).abs())
            .fold(0.0f32, f32::max);
        if max_probability_drift > self.config.probability_tolerance {
            tracing::warn!(
                "Off-policy batch: recorded probabilities drift by up to {:.5}",
                max_probability_drift
            );
        }

        let advantages_tensor =
            Tensor::<B, 1>::from_floats(advantages.as_slice(), self.policy.device());
        let loss = -(probabilities.log() * advantages_tensor).sum();
        let loss_value = to_vec(loss.clone())?.first().copied().unwrap_or(0.0);

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, self.policy.net());
        let net = self.optimizer.step(
            self.config.learning_rate,
            self.policy.net().clone(),
            grads,
        );
        self.policy.set_net(net);

        tracing::debug!(
            "Policy update over {} steps: loss={:.4}, mean advantage={:.4}",
            steps.len(),
            loss_value,
            mean_advantage
        );

        Ok(LearnReport {
            loss: loss_value,
            mean_return,
            mean_advantage,
            steps: steps.len(),
            max_probability_drift,
        })
    }

    fn check_episode(&self, index: usize, episode: &Episode) -> Result<(), LearnError> {
        let n = self.policy.num_arguments();
        episode
            .ranking
            .validate(n)
            .map_err(|err| LearnError::MalformedEpisode {
                index,
                reason: err.to_string(),
            })?;
        if self.policy.mode() == DecodeMode::Strict && !episode.ranking.is_strict() {
            return Err(LearnError::MalformedEpisode {
                index,
                reason: "strict decoding produces singleton levels".to_string(),
            });
        }
        if episode.probabilities.len() != n {
            return Err(LearnError::MalformedEpisode {
                index,
                reason: format!(
                    "{} probabilities for {} arguments",
                    episode.probabilities.len(),
                    n
                ),
            });
        }
        Ok(())
    }

    /// Per-step advantages; steps are grouped by episode, `n` each.
    /// The baseline update is committed once, after every advantage is known.
    fn advantages(&mut self, batch: &[Episode], steps: &[DecodeStep]) -> Vec<f32> {
        let n = self.policy.num_arguments();
        let Some(baseline) = self.baseline.as_mut() else {
            return batch
                .iter()
                .flat_map(|e| std::iter::repeat_n(e.episode_return, n))
                .collect();
        };

        let mut update = baseline.begin_update();
        let mut advantages = Vec::with_capacity(steps.len());
        for (episode, episode_steps) in batch.iter().zip(steps.chunks(n)) {
            for step in episode_steps {
                let delta = episode.episode_return - baseline.value(&step.state);
                baseline.accumulate(&mut update, &step.state, delta);
                advantages.push(delta);
            }
        }
        baseline.commit(update);
        advantages
    }
}

fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>, PolicyError> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|err| PolicyError::Tensor(format!("{:?}", err)))
}

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Number of policy updates
    pub iterations: usize,
    /// Rankings sampled per update
    pub batch_size: usize,
    /// Greedy evaluation frequency (iterations); 0 disables it
    pub eval_freq: usize,
    /// Console and CSV logging frequency (iterations); 0 disables it
    pub log_freq: usize,
    /// Where the final greedy ranking is written
    pub ranking_path: Option<PathBuf>,
    /// Where the final policy parameters are written
    pub checkpoint_path: Option<PathBuf>,
    /// CSV metrics directory
    pub log_dir: Option<PathBuf>,
    /// Seed for sampling and tie-breaking
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            batch_size: 10,
            eval_freq: 50,
            log_freq: 10,
            ranking_path: None,
            checkpoint_path: None,
            log_dir: None,
            seed: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Learn(#[from] LearnError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error(transparent)]
    Ranking(#[from] RankingError),
    #[error("metrics: {0}")]
    Io(#[from] io::Error),
    #[error("policy ranks {policy} arguments, evaluator has {evaluator}")]
    UniverseMismatch { policy: usize, evaluator: usize },
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Final greedy ranking
    pub ranking: Ranking,
    pub greedy_return: f32,
    pub best_return: Option<f32>,
}

/// Sample, evaluate, learn; repeated for the configured number of iterations
pub struct Trainer<B: AutodiffBackend, O, R> {
    learner: Learner<B, O>,
    config: TrainConfig,
    rng: R,
    metrics: TrainingMetrics,
    csv: Option<CsvLogger>,
}

impl<B, O, R> Trainer<B, O, R>
where
    B: AutodiffBackend,
    O: Optimizer<RankingNet<B>, B>,
    R: Rng,
{
    pub fn new(learner: Learner<B, O>, config: TrainConfig, rng: R) -> Result<Self, TrainError> {
        let csv = match &config.log_dir {
            Some(dir) => Some(CsvLogger::new(dir)?),
            None => None,
        };

        Ok(Self {
            learner,
            config,
            rng,
            metrics: TrainingMetrics::default(),
            csv,
        })
    }

    pub fn learner(&self) -> &Learner<B, O> {
        &self.learner
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    pub fn into_learner(self) -> Learner<B, O> {
        self.learner
    }

    /// Run the training loop
    pub fn train(&mut self, evaluator: &mut dyn RankingEvaluator) -> Result<TrainOutcome, TrainError> {
        let names = evaluator.argument_names();
        let n = self.learner.policy().num_arguments();
        if names.len() != n {
            return Err(TrainError::UniverseMismatch {
                policy: n,
                evaluator: names.len(),
            });
        }

        tracing::info!(
            "Starting training: {} iterations, batch {}, {} decoding over {} arguments",
            self.config.iterations,
            self.config.batch_size,
            self.learner.policy().mode(),
            n
        );

        for iteration in 0..self.config.iterations {
            self.metrics.iteration = iteration;

            let mut batch = Vec::with_capacity(self.config.batch_size);
            for _ in 0..self.config.batch_size {
                let decoded = self
                    .learner
                    .policy()
                    .decode_ranking(Decoding::Sample, &mut self.rng)?;
                let episode_return = evaluator.evaluate(&decoded.ranking)?;
                self.metrics.record_episode(episode_return);
                batch.push(Episode::new(decoded, episode_return));
            }
            self.metrics.fallbacks = evaluator.fallback_count();

            let report = self.learner.learn(&batch)?;
            self.metrics.record_update(report.loss, report.mean_advantage);

            if self.config.eval_freq > 0 && (iteration + 1) % self.config.eval_freq == 0 {
                let (ranking, greedy_return) = self.evaluate_greedy(evaluator)?;
                tracing::info!(
                    "Greedy ranking after {} iterations (return {:.3}): {}",
                    iteration + 1,
                    greedy_return,
                    ranking.describe(&names)
                );
            }

            if self.config.log_freq > 0 && iteration % self.config.log_freq == 0 {
                self.metrics.log_to_console();
                if let Some(csv) = &self.csv {
                    csv.log_metrics(&self.metrics)?;
                }
            }
        }

        let (ranking, greedy_return) = self.evaluate_greedy(evaluator)?;
        if let Some(path) = &self.config.ranking_path {
            ranking.save(path)?;
            tracing::info!("Saved ranking to {}", path.display());
        }
        if let Some(path) = &self.config.checkpoint_path {
            self.learner.policy().save(path)?;
        }

        tracing::info!(
            "Training complete! Final ranking (return {:.3}): {}",
            greedy_return,
            ranking.describe(&names)
        );

        Ok(TrainOutcome {
            ranking,
            greedy_return,
            best_return: self.metrics.best_return,
        })
    }

    fn evaluate_greedy(
        &mut self,
        evaluator: &mut dyn RankingEvaluator,
    ) -> Result<(Ranking, f32), TrainError> {
        let decoded = self
            .learner
            .policy()
            .decode_ranking(Decoding::Greedy, &mut self.rng)?;
        let greedy_return = evaluator.evaluate(&decoded.ranking)?;
        self.metrics.greedy_return = Some(greedy_return);
        Ok((decoded.ranking, greedy_return))
    }
}
