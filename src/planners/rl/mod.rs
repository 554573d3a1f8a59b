//! Policy-gradient learning of argument rankings
//!
//! The policy builds a ranking one argument at a time. Each complete ranking
//! is played as an episode and its return drives a REINFORCE update.
//!
//! # Architecture
//!
//! ```text
//! partial Ranking
//!     │
//!     ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  PrecedenceMatrix::encode + DecodeStrategy::mask            │
//! │  - n×n state, legality mask over n (strict) or 2n (grouped) │
//! └─────────────────────────────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  RankingNet                                                 │
//! │  - MLP logits, masked softmax                               │
//! └─────────────────────────────────────────────────────────────┘
//!     │  sample / argmax, repeated n times
//!     ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  RankingEvaluator (env)                                     │
//! │  - plays the ranking, returns the episode return            │
//! └─────────────────────────────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Learner                                                    │
//! │  - replays decoding steps, advantages, one Adam step        │
//! │  - optional tabular baseline                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod action_space;
pub mod baseline;
pub mod encoder;
pub mod metrics;
pub mod policy;
pub mod train;

use thiserror::Error;

pub use action_space::{DecodeMode, DecodeStrategy, GroupedDecoding, StrictDecoding};
pub use baseline::{BaselineIndex, BaselineUpdate, TabularBaseline};
pub use encoder::{ActionMask, DecodeStep, PrecedenceMatrix, legal_action_mask, remaining_arguments, replay};
pub use metrics::{CsvLogger, MovingAverage, TrainingMetrics};
pub use policy::{DecodedRanking, Decoding, PolicyConfig, RankingNet, RankingPolicy};
pub use train::{
    AdvantageMode, Episode, LearnError, LearnReport, Learner, LearnerConfig, TrainConfig,
    TrainError, TrainOutcome, Trainer, adam,
};

#[derive(Debug, Error, PartialEq, Clone)]
pub enum PolicyError {
    #[error("policy decodes {configured} rankings, {requested} requested")]
    InvalidMode {
        configured: DecodeMode,
        requested: DecodeMode,
    },
    #[error("illegal action {0}")]
    IllegalAction(usize),
    #[error("no legal action left")]
    NoLegalAction,
    #[error("tensor: {0}")]
    Tensor(String),
    #[error("sampling: {0}")]
    Sampling(String),
    #[error("checkpoint: {0}")]
    Checkpoint(String),
}
