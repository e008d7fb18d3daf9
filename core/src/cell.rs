use serde::{Deserialize, Serialize};

/// What a cell holds, fixed once the board is built.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellValue {
    Mine,
    /// Number of mines among the (up to) 8 neighbors, `0..=8`.
    Count(u8),
}

impl CellValue {
    pub const fn is_mine(self) -> bool {
        matches!(self, Self::Mine)
    }
}

impl Default for CellValue {
    fn default() -> Self {
        Self::Count(0)
    }
}

/// Player-visible state, the only part of a cell that changes during play.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState {
    Hidden,
    Revealed,
    Flagged,
}

impl Default for CellState {
    fn default() -> Self {
        Self::Hidden
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    pub state: CellState,
}

impl Cell {
    pub const fn is_mine(self) -> bool {
        self.value.is_mine()
    }

    pub const fn is_hidden(self) -> bool {
        matches!(self.state, CellState::Hidden)
    }

    pub const fn is_revealed(self) -> bool {
        matches!(self.state, CellState::Revealed)
    }

    pub const fn is_flagged(self) -> bool {
        matches!(self.state, CellState::Flagged)
    }
}
