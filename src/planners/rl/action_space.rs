//! Decoding strategies - how an action index turns into a ranking update

use std::fmt;

use crate::argumentation::Ranking;

use super::PolicyError;
use super::encoder::{ActionMask, legal_action_mask};

/// Ranking shape produced by the policy, fixed for an agent's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeMode {
    /// One argument per level; `n` actions
    Strict,
    /// Levels may hold several arguments; `2n` actions
    Grouped,
}

impl DecodeMode {
    pub fn strategy(self) -> Box<dyn DecodeStrategy> {
        match self {
            DecodeMode::Strict => Box::new(StrictDecoding),
            DecodeMode::Grouped => Box::new(GroupedDecoding),
        }
    }
}

impl fmt::Display for DecodeMode {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeMode::Strict => write!(formatter, "strict"),
            DecodeMode::Grouped => write!(formatter, "grouped"),
        }
    }
}

pub trait DecodeStrategy: fmt::Debug + Send + Sync {
    fn mode(&self) -> DecodeMode;

    /// Width of the policy output for a universe of `n` arguments
    fn output_width(&self, n: usize) -> usize;

    fn mask(&self, remaining: &[bool], ranking: &Ranking) -> ActionMask {
        legal_action_mask(remaining, self.mode(), !ranking.is_empty())
    }

    /// Apply `action` to `ranking` and return the argument it placed
    fn decode_step(&self, action: usize, ranking: &mut Ranking, n: usize)
    -> Result<usize, PolicyError>;

    /// Action index that places `argument`, opening a new level or joining the last one
    fn action_for(&self, argument: usize, opens_level: bool) -> usize;
}

fn check_unplaced(argument: usize, action: usize, ranking: &Ranking, n: usize) -> Result<(), PolicyError> {
    if argument >= n || ranking.contains(argument) {
        return Err(PolicyError::IllegalAction(action));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StrictDecoding;

impl DecodeStrategy for StrictDecoding {
    fn mode(&self) -> DecodeMode {
        DecodeMode::Strict
    }

    fn output_width(&self, n: usize) -> usize {
        n
    }

    fn decode_step(&self, action: usize, ranking: &mut Ranking, n: usize) -> Result<usize, PolicyError> {
        check_unplaced(action, action, ranking, n)?;
        ranking.push_level(action);
        Ok(action)
    }

    fn action_for(&self, argument: usize, _opens_level: bool) -> usize {
        argument
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupedDecoding;

impl DecodeStrategy for GroupedDecoding {
    fn mode(&self) -> DecodeMode {
        DecodeMode::Grouped
    }

    fn output_width(&self, n: usize) -> usize {
        2 * n
    }

    fn decode_step(&self, action: usize, ranking: &mut Ranking, n: usize) -> Result<usize, PolicyError> {
        let argument = action / 2;
        check_unplaced(argument, action, ranking, n)?;
        if action % 2 == 0 {
            ranking.push_level(argument);
        } else {
            ranking.append_to_last_level(argument);
        }
        Ok(argument)
    }

    fn action_for(&self, argument: usize, opens_level: bool) -> usize {
        if opens_level { 2 * argument } else { 2 * argument + 1 }
    }
}
