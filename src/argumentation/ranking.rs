//! Rankings: ordered partitions of the argument universe, and their text interchange format

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;

use super::FrameworkError;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("ranking io: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error(transparent)]
    Invalid(#[from] FrameworkError),
}

/// Levels of argument indices, most preferred first.
///
/// Indices refer to the universe the ranking was built over (the order of the
/// task's argument table).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Ranking {
    levels: Vec<Vec<usize>>,
}

impl Ranking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_levels(levels: Vec<Vec<usize>>) -> Self {
        Self { levels }
    }

    /// Strict ranking with one argument per level
    pub fn strict(order: &[usize]) -> Self {
        Self {
            levels: order.iter().map(|&a| vec![a]).collect(),
        }
    }

    pub fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn num_placed(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn push_level(&mut self, argument: usize) {
        self.levels.push(vec![argument]);
    }

    /// Add to the most recent level, opening the first one if needed
    pub fn append_to_last_level(&mut self, argument: usize) {
        match self.levels.last_mut() {
            Some(level) => level.push(argument),
            None => self.push_level(argument),
        }
    }

    pub fn contains(&self, argument: usize) -> bool {
        self.level_of(argument).is_some()
    }

    pub fn level_of(&self, argument: usize) -> Option<usize> {
        self.levels.iter().position(|level| level.contains(&argument))
    }

    pub fn is_strict(&self) -> bool {
        self.levels.iter().all(|level| level.len() == 1)
    }

    /// Arguments in placement order
    pub fn placed(&self) -> impl Iterator<Item = usize> + '_ {
        self.levels.iter().flatten().copied()
    }

    /// Check the ranking is a partition of `0..universe` with non-empty levels
    pub fn validate(&self, universe: usize) -> Result<(), FrameworkError> {
        let mut seen = vec![false; universe];
        for level in &self.levels {
            if level.is_empty() {
                return Err(FrameworkError::InvalidRanking("empty level".to_string()));
            }
            for &argument in level {
                if argument >= universe {
                    return Err(FrameworkError::IndexOutOfRange {
                        index: argument,
                        size: universe,
                    });
                }
                if seen[argument] {
                    return Err(FrameworkError::InvalidRanking(format!(
                        "argument {} placed twice",
                        argument
                    )));
                }
                seen[argument] = true;
            }
        }
        if let Some(missing) = seen.iter().position(|&s| !s) {
            return Err(FrameworkError::InvalidRanking(format!(
                "argument {} never placed",
                missing
            )));
        }
        Ok(())
    }

    /// `(argument, weight)` pairs, weight = number of levels minus level position
    pub fn weights(&self) -> Vec<(usize, usize)> {
        let num_levels = self.levels.len();
        self.levels
            .iter()
            .enumerate()
            .flat_map(|(position, level)| level.iter().map(move |&a| (a, num_levels - position)))
            .collect()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for (argument, weight) in self.weights() {
            writeln!(writer, "{} {}", argument, weight)?;
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RankingError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        self.write_to(&mut file)?;
        file.flush()?;
        Ok(())
    }

    /// Parse the interchange format; arguments sharing a weight form one level
    pub fn parse(text: &str) -> Result<Self, RankingError> {
        let mut weighted: Vec<(usize, usize)> = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(argument), Some(weight), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(RankingError::Parse {
                    line: line_no + 1,
                    reason: format!("expected '<argument> <weight>', got '{}'", line),
                });
            };
            let parse = |field: &str| {
                field.parse::<usize>().map_err(|err| RankingError::Parse {
                    line: line_no + 1,
                    reason: format!("'{}': {}", field, err),
                })
            };
            weighted.push((parse(argument)?, parse(weight)?));
        }

        let mut weights: Vec<usize> = weighted.iter().map(|&(_, w)| w).collect();
        weights.sort_unstable_by(|a, b| b.cmp(a));
        weights.dedup();
        let levels = weights
            .into_iter()
            .map(|w| {
                weighted
                    .iter()
                    .filter(|&&(_, weight)| weight == w)
                    .map(|&(a, _)| a)
                    .collect()
            })
            .collect();
        Ok(Self { levels })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RankingError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Render with argument names, e.g. `[nU] > [U, nR]`
    pub fn describe(&self, names: &[String]) -> String {
        let mut out = String::new();
        for (i, level) in self.levels.iter().enumerate() {
            if i > 0 {
                out.push_str(" > ");
            }
            out.push('[');
            for (j, &argument) in level.iter().enumerate() {
                if j > 0 {
                    out.push_str(", ");
                }
                match names.get(argument) {
                    Some(name) => out.push_str(name),
                    None => {
                        let _ = write!(out, "#{}", argument);
                    }
                }
            }
            out.push(']');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_count_down_from_num_levels() {
        let ranking = Ranking::from_levels(vec![vec![2], vec![0, 3], vec![1]]);
        assert_eq!(ranking.weights(), vec![(2, 3), (0, 2), (3, 2), (1, 1)]);
    }

    #[test]
    fn test_interchange_format_bytes() {
        let ranking = Ranking::from_levels(vec![vec![1], vec![0, 2]]);
        let mut buf = Vec::new();
        ranking.write_to(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "1 2\n0 1\n2 1\n");
    }

    #[test]
    fn test_parse_groups_equal_weights() {
        let ranking = Ranking::parse("3 1\n0 3\n2 2\n1 2\n").unwrap();
        assert_eq!(ranking.levels(), &[vec![0], vec![2, 1], vec![3]]);
    }

    #[test]
    fn test_parse_reports_line() {
        match Ranking::parse("0 2\nbogus\n") {
            Err(RankingError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("argrank_ranking_{}.txt", std::process::id()));
        let ranking = Ranking::from_levels(vec![vec![3, 0], vec![1], vec![2]]);
        ranking.save(&path).unwrap();
        assert_eq!(Ranking::load(&path).unwrap(), ranking);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_validate() {
        assert!(Ranking::strict(&[2, 0, 1]).validate(3).is_ok());
        assert!(Ranking::strict(&[2, 0]).validate(3).is_err());
        assert!(Ranking::strict(&[2, 0, 0]).validate(3).is_err());
        assert_eq!(
            Ranking::strict(&[0, 5]).validate(2),
            Err(FrameworkError::IndexOutOfRange { index: 5, size: 2 })
        );
    }

    #[test]
    fn test_append_opens_first_level() {
        let mut ranking = Ranking::new();
        ranking.append_to_last_level(4);
        ranking.append_to_last_level(1);
        ranking.push_level(0);
        assert_eq!(ranking.levels(), &[vec![4, 1], vec![0]]);
        assert!(!ranking.is_strict());
        assert_eq!(ranking.level_of(0), Some(1));
    }

    #[test]
    fn test_describe() {
        let names: Vec<String> = ["U", "D", "nU"].iter().map(|s| s.to_string()).collect();
        let ranking = Ranking::from_levels(vec![vec![2], vec![0, 1]]);
        assert_eq!(ranking.describe(&names), "[nU] > [U, D]");
    }
}
