mod types;

pub use types::{Bounds, Direction, Position};
