mod extension;
mod framework;
mod ranking;
mod vaf;

pub use extension::{ArgumentationController, Resolution, grounded_extension, resolve_action};
pub use framework::{
    ArgumentTable, ArgumentationFramework, Attack, AttackMatrix, construct_all_attacks,
};
pub use ranking::{Ranking, RankingError};
pub use vaf::ValueBasedFramework;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FrameworkError {
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error("argument already present: {0}")]
    DuplicateArgument(String),
    #[error("argument table is empty")]
    EmptyArgumentTable,
    #[error("argument index {index} outside universe of {size}")]
    IndexOutOfRange { index: usize, size: usize },
    #[error("invalid ranking: {0}")]
    InvalidRanking(String),
}
