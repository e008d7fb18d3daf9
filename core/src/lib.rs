#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

use serde::{Deserialize, Serialize};

pub use board::*;
pub use cell::*;
pub use error::*;
pub use generator::*;
pub use session::*;
pub use types::*;

mod board;
mod cell;
mod error;
mod generator;
mod session;
mod types;

/// Board dimensions and mine count.
///
/// A valid config has non-zero dimensions and `0 < mines < rows * cols`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub rows: Coord,
    pub cols: Coord,
    pub mines: CellCount,
}

impl GameConfig {
    pub const fn new_unchecked(rows: Coord, cols: Coord, mines: CellCount) -> Self {
        Self { rows, cols, mines }
    }

    pub fn new(rows: Coord, cols: Coord, mines: CellCount) -> Result<Self> {
        let config = Self::new_unchecked(rows, cols, mines);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 || self.mines == 0 {
            return Err(GameError::InvalidConfig);
        }
        if self.mines >= self.total_cells() {
            return Err(GameError::InvalidConfig);
        }
        Ok(())
    }

    /// Checks that `mines` still fit once the 3x3 block around `safe` is excluded.
    pub fn validate_safe_zone(&self, safe: Coord2) -> Result<()> {
        self.validate()?;
        if safe.0 >= self.rows || safe.1 >= self.cols {
            return Err(GameError::OutOfBounds);
        }
        let excluded = safe_zone(safe, self.size()).len() as CellCount;
        if self.mines > self.total_cells() - excluded {
            return Err(GameError::InvalidConfig);
        }
        Ok(())
    }

    pub const fn size(&self) -> Coord2 {
        (self.rows, self.cols)
    }

    pub const fn total_cells(&self) -> CellCount {
        mult(self.rows, self.cols)
    }
}

/// Named presets offered by the game.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Expert,
    Custom,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Self::Beginner,
        Self::Intermediate,
        Self::Expert,
        Self::Custom,
    ];

    pub const fn config(self) -> GameConfig {
        use Difficulty::*;
        match self {
            Beginner => GameConfig::new_unchecked(9, 9, 10),
            Intermediate => GameConfig::new_unchecked(16, 16, 40),
            Expert => GameConfig::new_unchecked(16, 30, 99),
            Custom => GameConfig::new_unchecked(10, 10, 15),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MarkOutcome {
    NoChange,
    Changed,
}

impl MarkOutcome {
    pub const fn has_update(self) -> bool {
        match self {
            Self::NoChange => false,
            Self::Changed => true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    NoChange,
    Revealed,
    HitMine,
}

impl RevealOutcome {
    pub const fn has_update(self) -> bool {
        use RevealOutcome::*;
        match self {
            NoChange => false,
            Revealed => true,
            HitMine => true,
        }
    }
}
