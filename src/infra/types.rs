use std::fmt;

/// Grid cell; `y` grows downward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn step(&self, direction: Direction) -> Position {
        match direction {
            Direction::Left => Position::new(self.x - 1, self.y),
            Direction::Down => Position::new(self.x, self.y + 1),
            Direction::Right => Position::new(self.x + 1, self.y),
            Direction::Up => Position::new(self.x, self.y - 1),
        }
    }

    /// Neighbours in [`Direction::ALL`] order
    pub fn neighbors(&self) -> [Position; 4] {
        Direction::ALL.map(|d| self.step(d))
    }
}

/// Grid move, numbered the way the lake's action space numbers them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Left = 0,
    Down = 1,
    Right = 2,
    Up = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Down,
        Direction::Right,
        Direction::Up,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Left => "left",
            Direction::Down => "down",
            Direction::Right => "right",
            Direction::Up => "up",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Bounds {
    /// Square `size × size` grid anchored at the origin
    pub fn square(size: usize) -> Self {
        let max = size as i32 - 1;
        Self {
            min_x: 0,
            max_x: max,
            min_y: 0,
            max_y: max,
        }
    }

    pub fn contains(&self, pos: &Position) -> bool {
        pos.x >= self.min_x && pos.x <= self.max_x && pos.y >= self.min_y && pos.y <= self.max_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_directions() {
        let p = Position::new(2, 2);
        assert_eq!(p.step(Direction::Up), Position::new(2, 1));
        assert_eq!(p.step(Direction::Down), Position::new(2, 3));
        assert_eq!(p.step(Direction::Left), Position::new(1, 2));
        assert_eq!(p.step(Direction::Right), Position::new(3, 2));
        assert!(p.neighbors().iter().all(|n| n.distance(&p) == 1));
    }

    #[test]
    fn test_square_bounds() {
        let bounds = Bounds::square(4);
        assert!(bounds.contains(&Position::new(0, 0)));
        assert!(bounds.contains(&Position::new(3, 3)));
        assert!(!bounds.contains(&Position::new(4, 0)));
        assert!(!bounds.contains(&Position::new(0, -1)));
    }
}
