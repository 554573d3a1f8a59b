//! Foggy frozen lake: a grid world where the agent only sees its four neighbours
//!
//! Arguments `U D L R` propose a safe move; `nU nD nL nR` propose a safe move
//! onto a tile the agent has not acted on yet.

use std::collections::HashMap;
use std::fmt;

use rand::Rng;

use crate::argumentation::ArgumentTable;
use crate::infra::{Bounds, Direction, Position};

use super::{EnvError, Environment, Step};

const MAX_GENERATE_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    Start,
    Frozen,
    Hole,
    Goal,
}

impl Tile {
    fn from_char(c: char) -> Option<Tile> {
        match c {
            'S' => Some(Tile::Start),
            'F' => Some(Tile::Frozen),
            'H' => Some(Tile::Hole),
            'G' => Some(Tile::Goal),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            Tile::Start => 'S',
            Tile::Frozen => 'F',
            Tile::Hole => 'H',
            Tile::Goal => 'G',
        }
    }

    pub fn is_safe(self) -> bool {
        self != Tile::Hole
    }
}

/// Square lake with the start in the top-left and the goal in the bottom-right corner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LakeMap {
    size: usize,
    tiles: Vec<Tile>,
}

impl LakeMap {
    /// Parse rows of `S`, `F`, `H` and `G`
    pub fn parse<S: AsRef<str>>(rows: &[S]) -> Result<Self, EnvError> {
        let size = rows.len();
        if size == 0 {
            return Err(EnvError::InvalidMap("empty map".to_string()));
        }

        let mut tiles = Vec::with_capacity(size * size);
        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            if line.chars().count() != size {
                return Err(EnvError::InvalidMap(format!(
                    "row {} has {} tiles, expected {}",
                    row,
                    line.chars().count(),
                    size
                )));
            }
            for c in line.chars() {
                let tile = Tile::from_char(c)
                    .ok_or_else(|| EnvError::InvalidMap(format!("unknown tile '{}'", c)))?;
                tiles.push(tile);
            }
        }

        let map = Self { size, tiles };
        if map.tiles.iter().filter(|&&t| t == Tile::Start).count() != 1 {
            return Err(EnvError::InvalidMap("expected exactly one start".to_string()));
        }
        if !map.tiles.contains(&Tile::Goal) {
            return Err(EnvError::InvalidMap("no goal".to_string()));
        }
        Ok(map)
    }

    /// Random map where each tile is frozen with probability `p`, regenerated until the goal is reachable.
    ///
    /// Fails with [`EnvError::InvalidMap`] when no attempt produces a path.
    pub fn generate<R: Rng + ?Sized>(size: usize, p: f64, rng: &mut R) -> Result<Self, EnvError> {
        let size = size.max(2);
        let p = p.clamp(0.0, 1.0);
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            let mut tiles: Vec<Tile> = (0..size * size)
                .map(|_| if rng.random_bool(p) { Tile::Frozen } else { Tile::Hole })
                .collect();
            tiles[0] = Tile::Start;
            tiles[size * size - 1] = Tile::Goal;

            let map = Self { size, tiles };
            if map.has_path() {
                return Ok(map);
            }
        }
        Err(EnvError::InvalidMap(format!(
            "no {0}x{0} lake with a path to the goal after {1} attempts at p = {2}",
            size, MAX_GENERATE_ATTEMPTS, p
        )))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::square(self.size)
    }

    /// Tile at `pos`, `None` off the map
    pub fn tile(&self, pos: Position) -> Option<Tile> {
        if !self.bounds().contains(&pos) {
            return None;
        }
        Some(self.tiles[pos.y as usize * self.size + pos.x as usize])
    }

    pub fn start(&self) -> Position {
        self.find(Tile::Start).unwrap_or(Position::new(0, 0))
    }

    fn find(&self, wanted: Tile) -> Option<Position> {
        self.tiles.iter().position(|&t| t == wanted).map(|i| {
            Position::new((i % self.size) as i32, (i / self.size) as i32)
        })
    }

    /// Depth-first search from the start over safe tiles
    pub fn has_path(&self) -> bool {
        let mut frontier = vec![self.start()];
        let mut discovered = vec![false; self.size * self.size];
        while let Some(pos) = frontier.pop() {
            let index = pos.y as usize * self.size + pos.x as usize;
            if discovered[index] {
                continue;
            }
            discovered[index] = true;
            for next in pos.neighbors() {
                match self.tile(next) {
                    Some(Tile::Goal) => return true,
                    Some(tile) if tile.is_safe() => frontier.push(next),
                    _ => {}
                }
            }
        }
        false
    }
}

impl fmt::Display for LakeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.tiles.chunks(self.size) {
            let line: String = row.iter().map(|t| t.as_char()).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// What the agent sees: its position and the four neighbouring tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LakeObservation {
    pub position: Position,
    /// Indexed by [`Direction::index`]; `None` beyond the edge
    pub neighbours: [Option<Tile>; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LakePremises {
    /// Neighbour is on the map and not a hole, per [`Direction::index`]
    pub safe: [bool; 4],
    /// The agent already acted on the neighbouring tile, per [`Direction::index`]
    pub visited: [bool; 4],
}

#[derive(Debug, Clone)]
pub struct FrozenLakeConfig {
    pub size: usize,
    /// Probability that a generated tile is frozen
    pub frozen_probability: f64,
    pub max_steps: usize,
    /// When false, repeating an action on the same tile truncates the episode
    pub allow_revisits: bool,
}

impl Default for FrozenLakeConfig {
    fn default() -> Self {
        Self {
            size: 8,
            frozen_probability: 0.8,
            max_steps: 100,
            allow_revisits: true,
        }
    }
}

/// Positions visited before the last three moves
const OSCILLATION_WINDOW: usize = 6;

const ARGUMENTS: [(&str, Direction); 8] = [
    ("U", Direction::Up),
    ("L", Direction::Left),
    ("R", Direction::Right),
    ("D", Direction::Down),
    ("nD", Direction::Down),
    ("nL", Direction::Left),
    ("nR", Direction::Right),
    ("nU", Direction::Up),
];

pub fn lake_arguments() -> Result<ArgumentTable<Direction>, EnvError> {
    Ok(ArgumentTable::new(ARGUMENTS)?)
}

#[derive(Debug)]
pub struct FrozenLake {
    map: LakeMap,
    config: FrozenLakeConfig,
    table: ArgumentTable<Direction>,
    position: Position,
    steps: usize,
    history: Vec<Position>,
    /// Actions the agent took on each tile in the current episode
    memory: HashMap<Position, [bool; 4]>,
    /// Actions taken per tile, for the no-revisit rule
    taken: HashMap<Position, [bool; 4]>,
}

impl FrozenLake {
    pub fn new<R: Rng + ?Sized>(config: FrozenLakeConfig, rng: &mut R) -> Result<Self, EnvError> {
        let map = LakeMap::generate(config.size, config.frozen_probability, rng)?;
        tracing::info!("Generated {0}x{0} lake:\n{1}", map.size(), map);
        Self::with_map(map, config)
    }

    pub fn with_map(map: LakeMap, config: FrozenLakeConfig) -> Result<Self, EnvError> {
        let position = map.start();
        Ok(Self {
            map,
            config,
            table: lake_arguments()?,
            position,
            steps: 0,
            history: Vec::new(),
            memory: HashMap::new(),
            taken: HashMap::new(),
        })
    }

    pub fn map(&self) -> &LakeMap {
        &self.map
    }

    pub fn position(&self) -> Position {
        self.position
    }

    fn observe(&self) -> LakeObservation {
        LakeObservation {
            position: self.position,
            neighbours: self.position.neighbors().map(|p| self.map.tile(p)),
        }
    }

    /// Same position pair three times in a row
    fn oscillating(&self) -> bool {
        let len = self.history.len();
        if len < OSCILLATION_WINDOW {
            return false;
        }
        let h = &self.history[len - OSCILLATION_WINDOW..];
        h[4..6] == h[2..4] && h[2..4] == h[0..2]
    }

    fn truncated(&self) -> Step<LakeObservation> {
        Step {
            observation: self.observe(),
            reward: 0.0,
            terminated: false,
            truncated: true,
        }
    }
}

impl Environment for FrozenLake {
    type Observation = LakeObservation;
    type Premises = LakePremises;
    type Action = Direction;

    fn argument_table(&self) -> &ArgumentTable<Direction> {
        &self.table
    }

    fn premises(&self, observation: &LakeObservation) -> LakePremises {
        let mut premises = LakePremises::default();
        let neighbours = observation.position.neighbors();
        for direction in Direction::ALL {
            let i = direction.index();
            premises.safe[i] = observation.neighbours[i].is_some_and(Tile::is_safe);
            premises.visited[i] = self
                .memory
                .get(&neighbours[i])
                .is_some_and(|actions| actions.iter().any(|&a| a));
        }
        premises
    }

    fn valid_arguments(&self, premises: &LakePremises) -> Vec<String> {
        let order = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];
        let letter = |d: Direction| match d {
            Direction::Up => "U",
            Direction::Down => "D",
            Direction::Left => "L",
            Direction::Right => "R",
        };

        let mut arguments = Vec::new();
        for d in order {
            if premises.safe[d.index()] {
                arguments.push(letter(d).to_string());
            }
        }
        for d in order {
            if premises.safe[d.index()] && !premises.visited[d.index()] {
                arguments.push(format!("n{}", letter(d)));
            }
        }
        arguments
    }

    fn update_memory(&mut self, observation: &LakeObservation, action: Direction) {
        self.memory.entry(observation.position).or_insert([false; 4])[action.index()] = true;
    }

    fn reset_memory(&mut self) {
        self.memory.clear();
    }

    fn reset(&mut self) -> Result<LakeObservation, EnvError> {
        self.position = self.map.start();
        self.steps = 0;
        self.history.clear();
        self.taken.clear();
        Ok(self.observe())
    }

    fn step(&mut self, action: Direction) -> Result<Step<LakeObservation>, EnvError> {
        self.steps += 1;
        self.history.push(self.position);
        if self.oscillating() {
            tracing::debug!("Oscillation detected at {:?}, truncating", self.position);
            return Ok(self.truncated());
        }

        let taken = self.taken.entry(self.position).or_insert([false; 4]);
        if !self.config.allow_revisits && taken[action.index()] {
            return Ok(self.truncated());
        }
        taken[action.index()] = true;

        let target = self.position.step(action);
        if self.map.tile(target).is_some() {
            self.position = target;
        }

        let (reward, terminated) = match self.map.tile(self.position) {
            Some(Tile::Hole) => (-1.0, true),
            Some(Tile::Goal) => (1.0, true),
            _ => (0.0, false),
        };

        Ok(Step {
            observation: self.observe(),
            reward,
            terminated,
            truncated: !terminated && self.steps >= self.config.max_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argumentation::Ranking;
    use crate::env::{EpisodeRunner, RankingEvaluator};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn lake(rows: &[&str]) -> FrozenLake {
        FrozenLake::with_map(LakeMap::parse(rows).unwrap(), FrozenLakeConfig::default()).unwrap()
    }

    /// Ranking over the argument table order `U L R D nD nL nR nU`
    fn ranking(order: &[&str]) -> Ranking {
        let names: Vec<String> = lake_arguments().unwrap().arguments();
        let indices: Vec<usize> = order
            .iter()
            .map(|name| names.iter().position(|n| n == name).unwrap())
            .collect();
        Ranking::strict(&indices)
    }

    #[test]
    fn test_parse_rejects_bad_maps() {
        assert!(LakeMap::parse::<&str>(&[]).is_err());
        assert!(LakeMap::parse(&["SF", "F"]).is_err());
        assert!(LakeMap::parse(&["SX", "FG"]).is_err());
        assert!(LakeMap::parse(&["FF", "FG"]).is_err());
    }

    #[test]
    fn test_generated_map_is_solvable() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..10 {
            let map = LakeMap::generate(6, 0.6, &mut rng).unwrap();
            assert!(map.has_path());
            assert_eq!(map.tile(Position::new(0, 0)), Some(Tile::Start));
            assert_eq!(map.tile(Position::new(5, 5)), Some(Tile::Goal));
        }
    }

    #[test]
    fn test_generate_gives_up_on_impassable_lakes() {
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            LakeMap::generate(8, 0.05, &mut rng),
            Err(EnvError::InvalidMap(_))
        ));

        let config = FrozenLakeConfig {
            frozen_probability: 0.05,
            ..FrozenLakeConfig::default()
        };
        assert!(FrozenLake::new(config, &mut rng).is_err());
    }

    #[test]
    fn test_has_path_detects_blocked_goal() {
        let map = LakeMap::parse(&["SFH", "FHF", "HFG"]).unwrap();
        assert!(!map.has_path());
    }

    #[test]
    fn test_premises_and_arguments() {
        let mut env = lake(&["SFF", "HFF", "FFG"]);
        let obs = env.reset().unwrap();
        let premises = env.premises(&obs);
        assert!(premises.safe[Direction::Right.index()]);
        assert!(!premises.safe[Direction::Down.index()]);
        assert!(!premises.safe[Direction::Up.index()]);
        assert_eq!(env.valid_arguments(&premises), vec!["R", "nR"]);
    }

    #[test]
    fn test_visited_marks_tiles_acted_on() {
        let mut env = lake(&["SFF", "FFF", "FFG"]);
        let start = env.reset().unwrap();
        env.update_memory(&start, Direction::Right);
        let step = env.step(Direction::Right).unwrap();

        let premises = env.premises(&step.observation);
        assert!(premises.visited[Direction::Left.index()]);
        assert!(!premises.visited[Direction::Right.index()]);
        let arguments = env.valid_arguments(&premises);
        assert!(arguments.contains(&"L".to_string()));
        assert!(!arguments.contains(&"nL".to_string()));
        assert!(arguments.contains(&"nR".to_string()));

        env.reset_memory();
        assert!(!env.premises(&step.observation).visited[Direction::Left.index()]);
    }

    #[test]
    fn test_rewards() {
        let mut env = lake(&["SH", "FG"]);
        env.reset().unwrap();
        let hole = env.step(Direction::Right).unwrap();
        assert_eq!(hole.reward, -1.0);
        assert!(hole.terminated);

        env.reset().unwrap();
        assert_eq!(env.step(Direction::Down).unwrap().reward, 0.0);
        let goal = env.step(Direction::Right).unwrap();
        assert_eq!(goal.reward, 1.0);
        assert!(goal.terminated);
    }

    #[test]
    fn test_wall_keeps_position() {
        let mut env = lake(&["SF", "FG"]);
        env.reset().unwrap();
        let step = env.step(Direction::Up).unwrap();
        assert_eq!(step.observation.position, Position::new(0, 0));
        assert!(!step.is_done());
    }

    #[test]
    fn test_oscillation_truncates() {
        let mut env = lake(&["SFF", "FFF", "FFG"]);
        env.reset().unwrap();
        let mut last = None;
        for i in 0..6 {
            let direction = if i % 2 == 0 { Direction::Right } else { Direction::Left };
            last = Some(env.step(direction).unwrap());
        }
        let last = last.unwrap();
        assert!(last.truncated);
        assert_eq!(last.reward, 0.0);
    }

    #[test]
    fn test_max_steps_truncates() {
        let config = FrozenLakeConfig {
            max_steps: 2,
            ..FrozenLakeConfig::default()
        };
        let mut env =
            FrozenLake::with_map(LakeMap::parse(&["SFF", "FFF", "FFG"]).unwrap(), config).unwrap();
        env.reset().unwrap();
        assert!(!env.step(Direction::Right).unwrap().truncated);
        assert!(env.step(Direction::Down).unwrap().truncated);
    }

    #[test]
    fn test_no_revisit_rule() {
        let config = FrozenLakeConfig {
            allow_revisits: false,
            ..FrozenLakeConfig::default()
        };
        let mut env =
            FrozenLake::with_map(LakeMap::parse(&["SFF", "FFF", "FFG"]).unwrap(), config).unwrap();
        env.reset().unwrap();
        env.step(Direction::Right).unwrap();
        env.step(Direction::Left).unwrap();
        assert!(env.step(Direction::Right).unwrap().truncated);
    }

    #[test]
    fn test_good_ranking_reaches_goal() {
        // a corridor: right along the top, then down the right edge
        let env = lake(&["SFF", "HHF", "HHG"]);
        let mut runner = EpisodeRunner::new(env, StdRng::seed_from_u64(1)).unwrap();
        let total = runner
            .evaluate(&ranking(&["nR", "nD", "R", "D", "nU", "nL", "U", "L"]))
            .unwrap();
        assert_eq!(total, 1.0);
        assert_eq!(runner.fallback_count(), 0);
    }
}
