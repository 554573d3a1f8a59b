//! Argumentation framework à la Dung: arguments, attacks and the attack matrix

use std::collections::HashSet;
use std::fmt;

use super::FrameworkError;

/// A directed attack `attacker -> attacked`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attack {
    pub attacker: String,
    pub attacked: String,
}

impl Attack {
    pub fn new(attacker: impl Into<String>, attacked: impl Into<String>) -> Self {
        Self {
            attacker: attacker.into(),
            attacked: attacked.into(),
        }
    }
}

impl fmt::Display for Attack {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{} -> {}", self.attacker, self.attacked)
    }
}

/// Square boolean matrix where `get(i, j)` means argument `i` attacks argument `j`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttackMatrix {
    dim: usize,
    cells: Vec<bool>,
}

impl AttackMatrix {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            cells: vec![false; dim * dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, attacker: usize, attacked: usize) -> bool {
        self.cells[attacker * self.dim + attacked]
    }

    pub fn set(&mut self, attacker: usize, attacked: usize, value: bool) {
        self.cells[attacker * self.dim + attacked] = value;
    }

    /// Append an empty row and column
    pub fn grow(&mut self) {
        let dim = self.dim + 1;
        let mut cells = vec![false; dim * dim];
        for row in 0..self.dim {
            let src = row * self.dim;
            cells[row * dim..row * dim + self.dim].copy_from_slice(&self.cells[src..src + self.dim]);
        }
        self.dim = dim;
        self.cells = cells;
    }

    /// Delete row and column `index`; higher indices shift down by one
    pub fn remove(&mut self, index: usize) {
        assert!(index < self.dim, "matrix index {} out of range", index);
        let dim = self.dim - 1;
        let mut cells = Vec::with_capacity(dim * dim);
        for row in (0..self.dim).filter(|&r| r != index) {
            for col in (0..self.dim).filter(|&c| c != index) {
                cells.push(self.get(row, col));
            }
        }
        self.dim = dim;
        self.cells = cells;
    }

    /// Number of incoming attacks on `attacked`
    pub fn column_sum(&self, attacked: usize) -> usize {
        (0..self.dim).filter(|&row| self.get(row, attacked)).count()
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

/// Arguments, the attacks between them, and the matrix that mirrors the attacks
#[derive(Debug, Clone, Default)]
pub struct ArgumentationFramework {
    arguments: Vec<String>,
    attacks: Vec<Attack>,
    matrix: AttackMatrix,
}

impl ArgumentationFramework {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attacks<S: Into<String>>(
        arguments: impl IntoIterator<Item = S>,
        attacks: impl IntoIterator<Item = Attack>,
    ) -> Result<Self, FrameworkError> {
        let mut framework = Self::new();
        for argument in arguments {
            framework.add_argument(argument)?;
        }
        for attack in attacks {
            framework.add_attack(&attack.attacker, &attack.attacked)?;
        }
        Ok(framework)
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn attacks(&self) -> &[Attack] {
        &self.attacks
    }

    pub fn matrix(&self) -> &AttackMatrix {
        self.assert_consistent();
        &self.matrix
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    pub fn index_of(&self, argument: &str) -> Option<usize> {
        self.arguments.iter().position(|a| a == argument)
    }

    fn require(&self, argument: &str) -> Result<usize, FrameworkError> {
        self.index_of(argument)
            .ok_or_else(|| FrameworkError::UnknownArgument(argument.to_string()))
    }

    pub fn contains_attack(&self, attacker: &str, attacked: &str) -> bool {
        match (self.index_of(attacker), self.index_of(attacked)) {
            (Some(i), Some(j)) => self.matrix.get(i, j),
            _ => false,
        }
    }

    /// Append a new argument, returning its index
    pub fn add_argument(&mut self, argument: impl Into<String>) -> Result<usize, FrameworkError> {
        let argument = argument.into();
        if self.index_of(&argument).is_some() {
            return Err(FrameworkError::DuplicateArgument(argument));
        }
        self.arguments.push(argument);
        self.matrix.grow();
        self.assert_consistent();
        Ok(self.arguments.len() - 1)
    }

    /// Add an attack between two existing arguments. Returns `false` if it was already present.
    pub fn add_attack(&mut self, attacker: &str, attacked: &str) -> Result<bool, FrameworkError> {
        let i = self.require(attacker)?;
        let j = self.require(attacked)?;
        if self.matrix.get(i, j) {
            return Ok(false);
        }
        self.matrix.set(i, j, true);
        self.attacks.push(Attack::new(attacker, attacked));
        Ok(true)
    }

    /// Remove an attack. Returns `false` if the arguments exist but do not attack.
    pub fn remove_attack(&mut self, attacker: &str, attacked: &str) -> Result<bool, FrameworkError> {
        let i = self.require(attacker)?;
        let j = self.require(attacked)?;
        Ok(self.drop_attack_at(i, j))
    }

    pub(crate) fn drop_attack_at(&mut self, attacker: usize, attacked: usize) -> bool {
        if !self.matrix.get(attacker, attacked) {
            return false;
        }
        self.matrix.set(attacker, attacked, false);
        let (from, to) = (&self.arguments[attacker], &self.arguments[attacked]);
        self.attacks
            .retain(|att| !(&att.attacker == from && &att.attacked == to));
        true
    }

    pub fn remove_argument(&mut self, argument: &str) -> Result<(), FrameworkError> {
        let index = self.require(argument)?;
        self.remove_at(index);
        Ok(())
    }

    /// Remove several arguments at once.
    ///
    /// Every name is resolved before anything is mutated, then rows and columns are
    /// deleted from the highest index down so pending indices stay valid.
    pub fn remove_arguments<S: AsRef<str>>(&mut self, arguments: &[S]) -> Result<(), FrameworkError> {
        let mut indices = arguments
            .iter()
            .map(|a| self.require(a.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.dedup();
        for index in indices {
            self.remove_at(index);
        }
        Ok(())
    }

    fn remove_at(&mut self, index: usize) {
        let removed = self.arguments.remove(index);
        self.attacks
            .retain(|att| att.attacker != removed && att.attacked != removed);
        self.matrix.remove(index);
        self.assert_consistent();
    }

    /// Keep only `valid` arguments, dropping the rest highest index first
    pub fn retain_arguments(&mut self, valid: &HashSet<&str>) {
        let mut doomed: Vec<usize> = (0..self.arguments.len())
            .filter(|&i| !valid.contains(self.arguments[i].as_str()))
            .collect();
        doomed.reverse();
        for index in doomed {
            self.remove_at(index);
        }
    }

    fn assert_consistent(&self) {
        assert_eq!(
            self.matrix.dim(),
            self.arguments.len(),
            "attack matrix out of sync with argument set"
        );
    }
}

/// Static argument -> action table supplied by a task
#[derive(Debug, Clone)]
pub struct ArgumentTable<A> {
    entries: Vec<(String, A)>,
}

impl<A: Copy + Ord + fmt::Debug> ArgumentTable<A> {
    pub fn new<S: Into<String>>(
        entries: impl IntoIterator<Item = (S, A)>,
    ) -> Result<Self, FrameworkError> {
        let mut seen = HashSet::new();
        let mut table = Vec::new();
        for (name, action) in entries {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(FrameworkError::DuplicateArgument(name));
            }
            table.push((name, action));
        }
        if table.is_empty() {
            return Err(FrameworkError::EmptyArgumentTable);
        }
        Ok(Self { entries: table })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn arguments(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn entries(&self) -> &[(String, A)] {
        &self.entries
    }

    pub fn action_of(&self, argument: &str) -> Option<A> {
        self.entries
            .iter()
            .find(|(name, _)| name == argument)
            .map(|(_, action)| *action)
    }

    /// Actions promoted by at least one argument, sorted and de-duplicated
    pub fn distinct_actions(&self) -> Vec<A> {
        let mut actions: Vec<A> = self.entries.iter().map(|(_, a)| *a).collect();
        actions.sort();
        actions.dedup();
        actions
    }

    /// Base framework over the whole table with [`construct_all_attacks`]
    pub fn framework(&self) -> Result<ArgumentationFramework, FrameworkError> {
        ArgumentationFramework::with_attacks(self.arguments(), construct_all_attacks(self))
    }
}

/// Every pair of arguments promoting different actions attacks each other in both directions
pub fn construct_all_attacks<A: Copy + Ord + fmt::Debug>(table: &ArgumentTable<A>) -> Vec<Attack> {
    let entries = table.entries();
    let mut attacks = Vec::new();
    for (attacker, attacker_action) in entries {
        for (attacked, attacked_action) in entries {
            if attacker_action != attacked_action {
                attacks.push(Attack::new(attacker.clone(), attacked.clone()));
            }
        }
    }
    attacks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> ArgumentationFramework {
        ArgumentationFramework::with_attacks(
            ["a", "b", "c"],
            [Attack::new("a", "b"), Attack::new("b", "c"), Attack::new("c", "a")],
        )
        .unwrap()
    }

    #[test]
    fn test_add_argument_grows_matrix() {
        let mut af = abc();
        assert_eq!(af.add_argument("d").unwrap(), 3);
        assert_eq!(af.matrix().dim(), 4);
        assert!(af.matrix().get(0, 1));
        assert!(af.matrix().get(1, 2));
        assert!(af.matrix().get(2, 0));
        assert_eq!(af.matrix().count(), 3);
    }

    #[test]
    fn test_duplicate_argument_rejected() {
        let mut af = abc();
        assert_eq!(
            af.add_argument("b"),
            Err(FrameworkError::DuplicateArgument("b".to_string()))
        );
    }

    #[test]
    fn test_duplicate_attack_is_noop() {
        let mut af = abc();
        assert_eq!(af.add_attack("a", "b"), Ok(false));
        assert_eq!(af.attacks().len(), 3);
    }

    #[test]
    fn test_unknown_argument_errors() {
        let mut af = abc();
        assert_eq!(
            af.add_attack("a", "z"),
            Err(FrameworkError::UnknownArgument("z".to_string()))
        );
        assert_eq!(
            af.remove_argument("z"),
            Err(FrameworkError::UnknownArgument("z".to_string()))
        );
        assert!(af.remove_attack("z", "a").is_err());
    }

    #[test]
    fn test_remove_argument_reindexes() {
        let mut af = abc();
        af.remove_argument("a").unwrap();
        assert_eq!(af.arguments(), &["b".to_string(), "c".to_string()]);
        assert!(af.matrix().get(0, 1));
        assert!(!af.matrix().get(1, 0));
        assert_eq!(af.attacks(), &[Attack::new("b", "c")]);
    }

    #[test]
    fn test_remove_arguments_any_order() {
        let mut af = abc();
        af.add_argument("d").unwrap();
        af.add_attack("d", "b").unwrap();
        af.remove_arguments(&["a", "c"]).unwrap();
        assert_eq!(af.arguments(), &["b".to_string(), "d".to_string()]);
        assert!(af.matrix().get(1, 0));
        assert_eq!(af.matrix().count(), 1);
    }

    #[test]
    fn test_remove_arguments_is_atomic_on_unknown() {
        let mut af = abc();
        assert!(af.remove_arguments(&["a", "nope"]).is_err());
        assert_eq!(af.len(), 3);
    }

    #[test]
    fn test_remove_attack() {
        let mut af = abc();
        assert_eq!(af.remove_attack("a", "b"), Ok(true));
        assert_eq!(af.remove_attack("a", "b"), Ok(false));
        assert!(!af.contains_attack("a", "b"));
        assert_eq!(af.attacks().len(), 2);
    }

    #[test]
    fn test_construct_all_attacks() {
        let table = ArgumentTable::new([("U", 3), ("nU", 3), ("L", 0)]).unwrap();
        let attacks = construct_all_attacks(&table);
        assert_eq!(attacks.len(), 4);
        assert!(attacks.contains(&Attack::new("U", "L")));
        assert!(attacks.contains(&Attack::new("L", "nU")));
        assert!(!attacks.contains(&Attack::new("U", "nU")));
    }

    #[test]
    fn test_argument_table_rejects_duplicates_and_empty() {
        assert!(ArgumentTable::new([("a", 0), ("a", 1)]).is_err());
        assert_eq!(
            ArgumentTable::<u8>::new(Vec::<(String, u8)>::new()).unwrap_err(),
            FrameworkError::EmptyArgumentTable
        );
    }

    #[test]
    fn test_distinct_actions() {
        let table = ArgumentTable::new([("a", 2), ("b", 0), ("c", 2)]).unwrap();
        assert_eq!(table.distinct_actions(), vec![0, 2]);
        assert_eq!(table.action_of("c"), Some(2));
        assert_eq!(table.action_of("x"), None);
    }
}
