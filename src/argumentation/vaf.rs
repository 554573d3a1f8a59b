//! Value-based argumentation framework: attacks filtered by a preference ranking

use std::collections::HashSet;

use super::{ArgumentationFramework, FrameworkError, Ranking};

/// A private copy of a base framework with attacks from less preferred
/// arguments removed.
#[derive(Debug, Clone)]
pub struct ValueBasedFramework {
    framework: ArgumentationFramework,
    ranking: Ranking,
}

impl ValueBasedFramework {
    /// Copy `base` and filter it with `ranking`, whose indices follow `base`'s argument order
    pub fn new(base: &ArgumentationFramework, ranking: Ranking) -> Result<Self, FrameworkError> {
        if let Some(index) = ranking.placed().find(|&a| a >= base.len()) {
            return Err(FrameworkError::IndexOutOfRange {
                index,
                size: base.len(),
            });
        }
        let mut vaf = Self {
            framework: base.clone(),
            ranking,
        };
        vaf.reapply();
        Ok(vaf)
    }

    /// Run the preference filter again. Applying it to an already filtered
    /// framework leaves it unchanged.
    pub fn reapply(&mut self) {
        let n = self.framework.len();
        let mut higher_or_equal = vec![false; n];
        for level in self.ranking.levels() {
            for &argument in level {
                higher_or_equal[argument] = true;
            }
            for &attacked in level {
                for attacker in (0..n).filter(|&r| !higher_or_equal[r]) {
                    self.framework.drop_attack_at(attacker, attacked);
                }
            }
        }
    }

    pub fn framework(&self) -> &ArgumentationFramework {
        &self.framework
    }

    pub fn ranking(&self) -> &Ranking {
        &self.ranking
    }

    /// Situation-specific copy restricted to the arguments valid right now
    pub fn situation<S: AsRef<str>>(&self, valid_arguments: &[S]) -> ArgumentationFramework {
        let valid: HashSet<&str> = valid_arguments.iter().map(|a| a.as_ref()).collect();
        for unknown in valid.iter().filter(|a| self.framework.index_of(a).is_none()) {
            tracing::debug!("Ignoring argument outside the framework: {}", unknown);
        }
        let mut vsaf = self.framework.clone();
        vsaf.retain_arguments(&valid);
        vsaf
    }
}
