//! Grounded extension of a filtered framework and the action it promotes

use std::fmt;

use rand::Rng;
use rand::seq::IndexedRandom;

use super::{ArgumentTable, ArgumentationFramework, FrameworkError, Ranking, ValueBasedFramework};

/// Arguments with no incoming attack, in framework order.
///
/// Under a strict total order over fully opposed arguments this is exactly one argument.
pub fn grounded_extension(framework: &ArgumentationFramework) -> Vec<String> {
    let matrix = framework.matrix();
    framework
        .arguments()
        .iter()
        .enumerate()
        .filter(|&(j, _)| matrix.column_sum(j) == 0)
        .map(|(_, name)| name.clone())
        .collect()
}

/// How an action was obtained from an extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<A> {
    Promoted { argument: String, action: A },
    /// No extension argument maps to an action; drawn uniformly from the table
    Fallback { action: A },
}

impl<A: Copy> Resolution<A> {
    pub fn action(&self) -> A {
        match self {
            Resolution::Promoted { action, .. } | Resolution::Fallback { action } => *action,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback { .. })
    }
}

/// Map an extension to an action, falling back to a uniformly random known action
pub fn resolve_action<A, R>(
    extension: &[String],
    table: &ArgumentTable<A>,
    rng: &mut R,
) -> Resolution<A>
where
    A: Copy + Ord + fmt::Debug,
    R: Rng + ?Sized,
{
    let actions = table.distinct_actions();
    match extension.first() {
        Some(argument) => {
            if let Some(action) = table.action_of(argument) {
                return Resolution::Promoted {
                    argument: argument.clone(),
                    action,
                };
            }
            // ArgumentTable is never empty
            let action = *actions.choose(rng).unwrap_or(&actions[0]);
            tracing::warn!(
                "Extension argument {} has no action in the table, performing random action {:?}",
                argument,
                action
            );
            Resolution::Fallback { action }
        }
        None => {
            let action = *actions.choose(rng).unwrap_or(&actions[0]);
            tracing::warn!("Empty grounded extension, performing random action {:?}", action);
            Resolution::Fallback { action }
        }
    }
}

/// Decision layer between a ranking and a task: builds VAFs and resolves observations to actions
#[derive(Debug)]
pub struct ArgumentationController<A, R> {
    table: ArgumentTable<A>,
    base: ArgumentationFramework,
    rng: R,
    fallbacks: usize,
}

impl<A, R> ArgumentationController<A, R>
where
    A: Copy + Ord + fmt::Debug,
    R: Rng,
{
    pub fn new(table: ArgumentTable<A>, rng: R) -> Result<Self, FrameworkError> {
        let base = table.framework()?;
        Ok(Self {
            table,
            base,
            rng,
            fallbacks: 0,
        })
    }

    pub fn table(&self) -> &ArgumentTable<A> {
        &self.table
    }

    pub fn base(&self) -> &ArgumentationFramework {
        &self.base
    }

    /// VAF of a complete ranking over the table's arguments
    pub fn value_based(&self, ranking: &Ranking) -> Result<ValueBasedFramework, FrameworkError> {
        ranking.validate(self.table.len())?;
        ValueBasedFramework::new(&self.base, ranking.clone())
    }

    /// Resolve the valid arguments of the current observation to one action
    pub fn select_action<S: AsRef<str>>(
        &mut self,
        vaf: &ValueBasedFramework,
        valid_arguments: &[S],
    ) -> Resolution<A> {
        let vsaf = vaf.situation(valid_arguments);
        let extension = grounded_extension(&vsaf);
        let resolution = resolve_action(&extension, &self.table, &mut self.rng);
        match &resolution {
            Resolution::Promoted { argument, action } => {
                tracing::debug!("Extension {:?} promotes {:?} via {}", extension, action, argument);
            }
            Resolution::Fallback { .. } => self.fallbacks += 1,
        }
        resolution
    }

    pub fn fallback_count(&self) -> usize {
        self.fallbacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argumentation::Attack;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn table() -> ArgumentTable<u8> {
        ArgumentTable::new([("a", 0), ("b", 1), ("c", 2)]).unwrap()
    }

    #[test]
    fn test_strict_order_extension_is_top_argument() {
        let controller = ArgumentationController::new(table(), StdRng::seed_from_u64(1)).unwrap();
        let vaf = controller.value_based(&Ranking::strict(&[0, 1, 2])).unwrap();
        assert_eq!(grounded_extension(vaf.framework()), vec!["a".to_string()]);
    }

    #[test]
    fn test_extension_follows_valid_subset() {
        let mut controller =
            ArgumentationController::new(table(), StdRng::seed_from_u64(1)).unwrap();
        let vaf = controller.value_based(&Ranking::strict(&[2, 0, 1])).unwrap();
        let resolution = controller.select_action(&vaf, &["a", "b"]);
        assert_eq!(
            resolution,
            Resolution::Promoted {
                argument: "a".to_string(),
                action: 0
            }
        );
        assert_eq!(controller.fallback_count(), 0);
    }

    #[test]
    fn test_empty_extension_falls_back_once() {
        let mut controller =
            ArgumentationController::new(table(), StdRng::seed_from_u64(7)).unwrap();
        // a and b tie, so their mutual attack survives and neither is unattacked
        let ranking = Ranking::from_levels(vec![vec![0, 1], vec![2]]);
        let vaf = controller.value_based(&ranking).unwrap();
        let resolution = controller.select_action(&vaf, &["a", "b"]);
        assert!(resolution.is_fallback());
        assert!([0, 1, 2].contains(&resolution.action()));
        assert_eq!(controller.fallback_count(), 1);
    }

    #[test]
    fn test_incomplete_ranking_is_rejected() {
        let controller = ArgumentationController::new(table(), StdRng::seed_from_u64(1)).unwrap();
        assert!(matches!(
            controller.value_based(&Ranking::strict(&[2, 0])),
            Err(FrameworkError::InvalidRanking(_))
        ));
        assert!(matches!(
            controller.value_based(&Ranking::strict(&[0, 1, 2, 3])),
            Err(FrameworkError::IndexOutOfRange { index: 3, size: 3 })
        ));
    }

    #[test]
    fn test_unknown_extension_argument_falls_back() {
        let mut rng = StdRng::seed_from_u64(5);
        let resolution = resolve_action(&["z".to_string()], &table(), &mut rng);
        assert!(resolution.is_fallback());
        assert!([0, 1, 2].contains(&resolution.action()));
    }

    #[test]
    fn test_no_valid_arguments_falls_back() {
        let mut rng = StdRng::seed_from_u64(3);
        let resolution = resolve_action(&[], &table(), &mut rng);
        assert!(resolution.is_fallback());
    }

    #[test]
    fn test_cycle_has_empty_extension() {
        let af = ArgumentationFramework::with_attacks(
            ["x", "y"],
            [Attack::new("x", "y"), Attack::new("y", "x")],
        )
        .unwrap();
        assert!(grounded_extension(&af).is_empty());
    }
}
