use serde::{Deserialize, Serialize};

pub mod accumulator;
pub mod agent;
pub mod config;
pub mod episode;
pub mod error;
pub mod features;
pub mod generation;
pub mod map;
pub mod replay;
pub mod reward;
pub mod simulation;

/// Unique identifier for entities (ships and shipyards).
///
/// Ids are handed out by monotonically increasing counters on the simulation
/// and are never reused within an episode.
pub type EntityId = usize;

/// Represents a 2D coordinate. `y` grows downwards, so row 0 is the top row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }
}

/// The four compass directions a ship can move in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Offset of one step in this direction. North moves towards row 0.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }
}
