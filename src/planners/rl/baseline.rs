//! Learned state-value baseline over precedence matrices

use std::collections::HashMap;

use super::encoder::PrecedenceMatrix;

/// How a precedence matrix is mapped to baseline parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaselineIndex {
    /// One weight per matrix cell; the value is the sum over set cells
    #[default]
    PrecedenceCells,
    /// One value per distinct matrix
    ExactState,
}

#[derive(Debug, Clone)]
enum Values {
    Cells(Vec<f32>),
    States(HashMap<PrecedenceMatrix, f32>),
}

/// Pending baseline changes, committed once per batch
#[derive(Debug, Clone)]
pub struct BaselineUpdate {
    cells: Vec<f32>,
    states: HashMap<PrecedenceMatrix, f32>,
}

impl BaselineUpdate {
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&c| c == 0.0) && self.states.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TabularBaseline {
    n: usize,
    step_size: f32,
    values: Values,
}

impl TabularBaseline {
    pub fn new(n: usize, step_size: f32, index: BaselineIndex) -> Self {
        let values = match index {
            BaselineIndex::PrecedenceCells => Values::Cells(vec![0.0; n * n]),
            BaselineIndex::ExactState => Values::States(HashMap::new()),
        };
        Self {
            n,
            step_size,
            values,
        }
    }

    pub fn step_size(&self) -> f32 {
        self.step_size
    }

    pub fn value(&self, state: &PrecedenceMatrix) -> f32 {
        match &self.values {
            Values::Cells(weights) => state.set_cells().map(|i| weights[i]).sum(),
            Values::States(table) => table.get(state).copied().unwrap_or(0.0),
        }
    }

    pub fn begin_update(&self) -> BaselineUpdate {
        BaselineUpdate {
            cells: vec![0.0; self.n * self.n],
            states: HashMap::new(),
        }
    }

    /// Record a move of `state`'s value toward its target by `step_size * delta`
    pub fn accumulate(&self, update: &mut BaselineUpdate, state: &PrecedenceMatrix, delta: f32) {
        let step = self.step_size * delta;
        match self.values {
            Values::Cells(_) => {
                for i in state.set_cells() {
                    update.cells[i] += step;
                }
            }
            Values::States(_) => *update.states.entry(state.clone()).or_insert(0.0) += step,
        }
    }

    pub fn commit(&mut self, update: BaselineUpdate) {
        match &mut self.values {
            Values::Cells(weights) => {
                for (w, d) in weights.iter_mut().zip(update.cells) {
                    *w += d;
                }
            }
            Values::States(table) => {
                for (state, d) in update.states {
                    *table.entry(state).or_insert(0.0) += d;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argumentation::Ranking;

    #[test]
    fn test_empty_state_has_zero_value() {
        let baseline = TabularBaseline::new(3, 0.5, BaselineIndex::PrecedenceCells);
        assert_eq!(baseline.value(&PrecedenceMatrix::empty(3)), 0.0);
    }

    #[test]
    fn test_cell_update_moves_toward_target() {
        let mut baseline = TabularBaseline::new(3, 0.1, BaselineIndex::PrecedenceCells);
        let state = PrecedenceMatrix::encode(&Ranking::strict(&[0]), 3);
        let before = baseline.value(&state);

        let mut update = baseline.begin_update();
        baseline.accumulate(&mut update, &state, 10.0 - before);
        // nothing changes until the batch is committed
        assert_eq!(baseline.value(&state), before);
        baseline.commit(update);

        // two set cells, each moved by 0.1 * 10
        assert!((baseline.value(&state) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_exact_state_update() {
        let mut baseline = TabularBaseline::new(3, 0.5, BaselineIndex::ExactState);
        let state = PrecedenceMatrix::encode(&Ranking::strict(&[1, 2]), 3);
        let other = PrecedenceMatrix::encode(&Ranking::strict(&[2, 1]), 3);

        let mut update = baseline.begin_update();
        baseline.accumulate(&mut update, &state, 4.0);
        assert!(!update.is_empty());
        baseline.commit(update);

        assert!((baseline.value(&state) - 2.0).abs() < 1e-6);
        assert_eq!(baseline.value(&other), 0.0);
    }
}
