use alloc::collections::VecDeque;
use alloc::vec::Vec;
use hashbrown::HashSet;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

/// A rectangular grid of cells addressed by `(row, col)`.
///
/// Mutating operations work in place: the caller owns the single live board and every action goes
/// through `&mut self`. Cell values never change after construction, only cell states do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BoardRepr")]
pub struct Board {
    cells: Array2<Cell>,
    mine_count: CellCount,
    exploded: Option<Coord2>,
}

/// Serialized shape of a [`Board`], checked before it becomes one.
#[derive(Deserialize)]
struct BoardRepr {
    cells: Array2<Cell>,
    mine_count: CellCount,
    exploded: Option<Coord2>,
}

impl TryFrom<BoardRepr> for Board {
    type Error = GameError;

    /// Rebuilds the counts from the mine positions and keeps the stored states only if the stored
    /// values agree with them.
    fn try_from(repr: BoardRepr) -> Result<Self> {
        let (rows, cols) = repr.cells.dim();
        let size: Coord2 = (
            rows.try_into().map_err(|_| GameError::InvalidConfig)?,
            cols.try_into().map_err(|_| GameError::InvalidConfig)?,
        );
        let mine_coords: Vec<Coord2> = repr
            .cells
            .indexed_iter()
            .filter(|(_, cell)| cell.is_mine())
            .map(|((row, col), _)| (row as Coord, col as Coord))
            .collect();

        let mut board = Self::from_mine_coords(size, &mine_coords)?;
        let values_match = board
            .cells
            .iter()
            .zip(repr.cells.iter())
            .all(|(expected, stored)| expected.value == stored.value);
        if !values_match || board.mine_count != repr.mine_count {
            log::warn!("Rejected board with inconsistent mine counts");
            return Err(GameError::InvalidConfig);
        }

        let exploded = repr
            .exploded
            .map(|coords| board.validate_coords(coords))
            .transpose()?;
        board.cells = repr.cells;
        board.exploded = exploded;
        Ok(board)
    }
}

impl Board {
    /// All cells hidden and mine-free, mines are then added with [`Board::place_mine`].
    pub(crate) fn empty(size: Coord2) -> Self {
        Self {
            cells: Array2::default(size.to_nd_index()),
            mine_count: 0,
            exploded: None,
        }
    }

    /// Puts a mine at `coords` and bumps the count of every non-mine neighbor.
    ///
    /// Returns `false` without touching the board when there is a mine there already.
    pub(crate) fn place_mine(&mut self, coords: Coord2) -> bool {
        let cell = &mut self.cells[coords.to_nd_index()];
        if cell.is_mine() {
            return false;
        }
        cell.value = CellValue::Mine;
        self.mine_count += 1;

        for pos in self.cells.iter_neighbors(coords) {
            let neighbor = &mut self.cells[pos.to_nd_index()];
            if let CellValue::Count(count) = neighbor.value {
                neighbor.value = CellValue::Count(count + 1);
            }
        }
        true
    }

    /// Builds a board with mines at exactly the given coordinates, duplicates are counted once.
    pub fn from_mine_coords(size: Coord2, mine_coords: &[Coord2]) -> Result<Self> {
        let mut mine_mask: Array2<bool> = Array2::default(size.to_nd_index());

        for &coords in mine_coords {
            if coords.0 >= size.0 || coords.1 >= size.1 {
                return Err(GameError::OutOfBounds);
            }
            mine_mask[coords.to_nd_index()] = true;
        }

        let mut mine_count = 0;
        let cells = Array2::from_shape_fn(size.to_nd_index(), |(row, col)| {
            let coords = (row as Coord, col as Coord);
            let value = if mine_mask[coords.to_nd_index()] {
                mine_count += 1;
                CellValue::Mine
            } else {
                let adjacent = mine_mask
                    .iter_neighbor_cells(coords)
                    .filter(|&is_mine| is_mine)
                    .count();
                CellValue::Count(adjacent as u8)
            };
            Cell {
                value,
                state: CellState::Hidden,
            }
        });

        Ok(Self {
            cells,
            mine_count,
            exploded: None,
        })
    }

    pub fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        let size = self.size();
        if coords.0 < size.0 && coords.1 < size.1 {
            Ok(coords)
        } else {
            Err(GameError::OutOfBounds)
        }
    }

    pub fn size(&self) -> Coord2 {
        let (rows, cols) = self.cells.dim();
        (
            rows.try_into().unwrap_or(Coord::MAX),
            cols.try_into().unwrap_or(Coord::MAX),
        )
    }

    pub fn rows(&self) -> Coord {
        self.size().0
    }

    pub fn cols(&self) -> Coord {
        self.size().1
    }

    pub fn total_cells(&self) -> CellCount {
        let (rows, cols) = self.size();
        mult(rows, cols)
    }

    /// Mines placed when the board was built.
    pub fn mine_count(&self) -> CellCount {
        self.mine_count
    }

    pub fn safe_cell_count(&self) -> CellCount {
        self.total_cells().saturating_sub(self.mine_count)
    }

    pub fn cell_at(&self, coords: Coord2) -> Result<Cell> {
        let coords = self.validate_coords(coords)?;
        Ok(self.cells[coords.to_nd_index()])
    }

    /// Cells in row-major order together with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (Coord2, Cell)> + '_ {
        self.cells
            .indexed_iter()
            .map(|((row, col), &cell)| ((row as Coord, col as Coord), cell))
    }

    /// The mine that ended the game, as passed to [`Board::reveal_all_mines`].
    pub fn exploded_mine(&self) -> Option<Coord2> {
        self.exploded
    }

    pub fn hidden_count(&self) -> CellCount {
        self.count_cells(|cell| cell.is_hidden())
    }

    pub fn flagged_count(&self) -> CellCount {
        self.count_cells(|cell| cell.is_flagged())
    }

    pub fn revealed_count(&self) -> CellCount {
        self.count_cells(|cell| cell.is_revealed())
    }

    fn flagged_mine_count(&self) -> CellCount {
        self.count_cells(|cell| cell.is_flagged() && cell.is_mine())
    }

    fn count_cells(&self, predicate: impl Fn(&Cell) -> bool) -> CellCount {
        self.cells.iter().filter(|cell| predicate(cell)).count() as CellCount
    }

    /// Whether every cell without a mine has been revealed, regardless of flags.
    pub fn all_safe_revealed(&self) -> bool {
        self.cells
            .iter()
            .all(|cell| cell.is_mine() || cell.is_revealed())
    }

    /// Reveals a hidden cell, cascading through connected zero-count cells.
    ///
    /// Revealed and flagged cells are left alone. A mine is revealed without any cascade; detecting
    /// the loss is up to the caller.
    pub fn reveal(&mut self, coords: Coord2) -> Result<RevealOutcome> {
        let coords = self.validate_coords(coords)?;

        let cell = self.cells[coords.to_nd_index()];
        if !cell.is_hidden() {
            return Ok(RevealOutcome::NoChange);
        }
        self.cells[coords.to_nd_index()].state = CellState::Revealed;

        Ok(match cell.value {
            CellValue::Mine => {
                log::debug!("Revealed mine at {:?}", coords);
                RevealOutcome::HitMine
            }
            CellValue::Count(count) => {
                log::debug!("Revealed cell at {:?}, mine count: {}", coords, count);
                if count == 0 {
                    self.flood_fill(coords);
                }
                RevealOutcome::Revealed
            }
        })
    }

    /// Opens the zero region around an already revealed zero cell plus its numbered border.
    fn flood_fill(&mut self, start: Coord2) {
        let mut visited = HashSet::new();
        visited.insert(start);
        let mut to_visit: VecDeque<_> = self.hidden_neighbors(start).collect();
        log::trace!(
            "Starting flood-fill from {:?}, initial neighbors: {:?}",
            start,
            to_visit
        );

        while let Some(visit_coords) = to_visit.pop_front() {
            if !visited.insert(visit_coords) {
                continue;
            }

            let cell = self.cells[visit_coords.to_nd_index()];
            if !cell.is_hidden() {
                log::trace!("Skipping cell at {:?}", visit_coords);
                continue;
            }

            // neighbors of a zero cell are never mines
            let CellValue::Count(count) = cell.value else {
                continue;
            };

            self.cells[visit_coords.to_nd_index()].state = CellState::Revealed;
            log::trace!(
                "Flood revealed cell at {:?}, mine count: {}",
                visit_coords,
                count
            );

            if count == 0 {
                to_visit.extend(
                    self.hidden_neighbors(visit_coords)
                        .filter(|pos| !visited.contains(pos)),
                );
            }
        }
    }

    fn hidden_neighbors(&self, coords: Coord2) -> impl Iterator<Item = Coord2> + '_ {
        self.cells
            .iter_neighbors(coords)
            .filter(|&pos| self.cells[pos.to_nd_index()].is_hidden())
    }

    /// Flips a cell between hidden and flagged, revealed cells do not change.
    pub fn toggle_flag(&mut self, coords: Coord2) -> Result<MarkOutcome> {
        use CellState::*;
        use MarkOutcome::*;

        let coords = self.validate_coords(coords)?;
        let cell = &mut self.cells[coords.to_nd_index()];

        Ok(match cell.state {
            Hidden => {
                cell.state = Flagged;
                Changed
            }
            Flagged => {
                cell.state = Hidden;
                Changed
            }
            Revealed => NoChange,
        })
    }

    /// Win condition: nothing is left hidden, or every mine is flagged and no other cell is hidden.
    ///
    /// A board whose only hidden cells are unflagged mines does not satisfy this; see
    /// [`Board::all_safe_revealed`] for that case.
    pub fn check_win(&self, total_mines: CellCount) -> bool {
        let hidden_count = self.hidden_count();
        let flagged_mines = self.flagged_mine_count();

        hidden_count == 0
            || (hidden_count + flagged_mines == total_mines && flagged_mines == total_mines)
    }

    /// End-of-game disclosure: reveals unflagged mines and wrongly flagged cells.
    ///
    /// Correct flags stay in place. `exploded` is only recorded, the cell gets no special state.
    pub fn reveal_all_mines(&mut self, exploded: Option<Coord2>) -> Result<()> {
        let exploded = exploded.map(|coords| self.validate_coords(coords)).transpose()?;

        for cell in self.cells.iter_mut() {
            match (cell.value, cell.state) {
                (CellValue::Mine, CellState::Flagged) => {}
                (CellValue::Mine, _) => cell.state = CellState::Revealed,
                (CellValue::Count(_), CellState::Flagged) => cell.state = CellState::Revealed,
                (CellValue::Count(_), _) => {}
            }
        }
        self.exploded = exploded;
        Ok(())
    }

    /// Mines minus placed flags, negative when the player over-flags.
    pub fn remaining_flags(&self, total_mines: CellCount) -> isize {
        (total_mines as isize) - (self.flagged_count() as isize)
    }
}
