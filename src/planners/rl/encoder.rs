//! Ranking codec - converts partial rankings to policy inputs and back

use crate::argumentation::Ranking;

use super::action_space::{DecodeMode, DecodeStrategy};

/// Precedence matrix summarizing a partial ranking.
///
/// Row `i` is set for every argument not placed in a level before `i`'s own
/// level; the diagonal is always clear.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrecedenceMatrix {
    n: usize,
    cells: Vec<bool>,
}

impl PrecedenceMatrix {
    pub fn empty(n: usize) -> Self {
        Self {
            n,
            cells: vec![false; n * n],
        }
    }

    /// Rebuild the matrix from scratch for the ranking placed so far
    pub fn encode(ranking: &Ranking, n: usize) -> Self {
        let mut matrix = Self::empty(n);
        let mut earlier = vec![false; n];
        for level in ranking.levels() {
            for &argument in level {
                for col in 0..n {
                    matrix.cells[argument * n + col] = !earlier[col] && col != argument;
                }
            }
            for &argument in level {
                earlier[argument] = true;
            }
        }
        matrix
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.cells[row * self.n + col]
    }

    /// Indices of set cells in row-major order
    pub fn set_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &set)| set)
            .map(|(i, _)| i)
    }

    /// Flat row-major features for the policy network
    pub fn features(&self) -> Vec<f32> {
        self.cells
            .iter()
            .map(|&v| if v { 1.0 } else { 0.0 })
            .collect()
    }
}

/// Legality of each decoding action (width `n` strict, `2n` grouped)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMask {
    bits: Vec<bool>,
}

impl ActionMask {
    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    pub fn width(&self) -> usize {
        self.bits.len()
    }

    pub fn is_legal(&self, action: usize) -> bool {
        self.bits.get(action).copied().unwrap_or(false)
    }

    pub fn popcount(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// 1.0 = legal, 0.0 = illegal
    pub fn as_floats(&self) -> Vec<f32> {
        self.bits
            .iter()
            .map(|&v| if v { 1.0 } else { 0.0 })
            .collect()
    }
}

/// Arguments of `0..n` not yet placed in `ranking`
pub fn remaining_arguments(ranking: &Ranking, n: usize) -> Vec<bool> {
    let mut remaining = vec![true; n];
    for argument in ranking.placed() {
        remaining[argument] = false;
    }
    remaining
}

/// Legal decoding actions for the remaining arguments
pub fn legal_action_mask(remaining: &[bool], mode: DecodeMode, has_level: bool) -> ActionMask {
    match mode {
        DecodeMode::Strict => ActionMask::from_bits(remaining.to_vec()),
        DecodeMode::Grouped => {
            let mut bits = vec![false; remaining.len() * 2];
            for (k, _) in remaining.iter().enumerate().filter(|&(_, &r)| r) {
                bits[2 * k] = true;
                bits[2 * k + 1] = has_level;
            }
            ActionMask::from_bits(bits)
        }
    }
}

/// One decoding step as the policy saw it
#[derive(Debug, Clone)]
pub struct DecodeStep {
    pub state: PrecedenceMatrix,
    pub mask: ActionMask,
    pub action: usize,
}

/// Reconstruct the decoding steps that produce `ranking`
pub fn replay(ranking: &Ranking, strategy: &dyn DecodeStrategy, n: usize) -> Vec<DecodeStep> {
    let mut partial = Ranking::new();
    let mut steps = Vec::with_capacity(n);
    for level in ranking.levels() {
        for (position, &argument) in level.iter().enumerate() {
            let state = PrecedenceMatrix::encode(&partial, n);
            let mask = strategy.mask(&remaining_arguments(&partial, n), &partial);
            let opens_level = position == 0;
            steps.push(DecodeStep {
                state,
                mask,
                action: strategy.action_for(argument, opens_level),
            });
            if opens_level {
                partial.push_level(argument);
            } else {
                partial.append_to_last_level(argument);
            }
        }
    }
    steps
}
