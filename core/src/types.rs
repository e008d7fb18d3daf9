use ndarray::Array2;
use smallvec::SmallVec;

/// Single coordinate axis used for board rows, columns, and positions.
pub type Coord = u8;

/// Count type used for mine counts and total-cell counts.
pub type CellCount = u16;

/// Two-dimensional coordinates `(row, col)`.
pub type Coord2 = (Coord, Coord);

pub trait ToNdIndex {
    type Output;
    fn to_nd_index(self) -> Self::Output;
}

impl ToNdIndex for Coord2 {
    type Output = [usize; 2];

    fn to_nd_index(self) -> Self::Output {
        [self.0.into(), self.1.into()]
    }
}

pub const fn mult(a: Coord, b: Coord) -> CellCount {
    let a = a as CellCount;
    let b = b as CellCount;
    a.saturating_mul(b)
}

/// Whether two cells touch, including diagonally (Chebyshev distance of at most 1).
///
/// A cell is adjacent to itself.
pub const fn is_adjacent(a: Coord2, b: Coord2) -> bool {
    a.0.abs_diff(b.0) <= 1 && a.1.abs_diff(b.1) <= 1
}

/// The 3x3 block centered on `center`, clipped to `bounds`, center included.
pub fn safe_zone(center: Coord2, bounds: Coord2) -> SmallVec<[Coord2; 9]> {
    let mut zone = SmallVec::new();
    if center.0 < bounds.0 && center.1 < bounds.1 {
        zone.push(center);
        zone.extend(NeighborIter::new(center, bounds));
    }
    zone
}

pub trait NeighborIterExt {
    fn iter_neighbors(&self, index: Coord2) -> NeighborIter;
}

impl<T> NeighborIterExt for Array2<T> {
    fn iter_neighbors(&self, index: Coord2) -> NeighborIter {
        let (rows, cols) = self.dim();
        let size = (
            rows.try_into().unwrap_or(Coord::MAX),
            cols.try_into().unwrap_or(Coord::MAX),
        );
        NeighborIter::new(index, size)
    }
}

pub trait NeighborCellIterExt<T>: NeighborIterExt {
    fn iter_neighbor_cells_with_index(&self, index: Coord2) -> impl Iterator<Item = (Coord2, T)>;

    fn iter_neighbor_cells(&self, index: Coord2) -> impl Iterator<Item = T> {
        self.iter_neighbor_cells_with_index(index)
            .map(|(_, cell)| cell)
    }
}

impl<T: Copy> NeighborCellIterExt<T> for Array2<T> {
    fn iter_neighbor_cells_with_index(&self, index: Coord2) -> impl Iterator<Item = (Coord2, T)> {
        self.iter_neighbors(index)
            .map(|index| (index, self[index.to_nd_index()]))
    }
}

const DISPLACEMENTS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Applies `delta` to `coords`, returning a value only when it remains in bounds.
fn apply_delta(coords: Coord2, delta: (i8, i8), bounds: Coord2) -> Option<Coord2> {
    let (row, col) = coords;
    let (d_row, d_col) = delta;
    let (rows, cols) = bounds;

    let next_row = row.checked_add_signed(d_row)?;
    if next_row >= rows {
        return None;
    }

    let next_col = col.checked_add_signed(d_col)?;
    if next_col >= cols {
        return None;
    }

    Some((next_row, next_col))
}

/// Iterates the up to 8 in-bounds neighbors of a cell, excluding the cell itself.
#[derive(Debug)]
pub struct NeighborIter {
    center: Coord2,
    bounds: Coord2,
    index: u8,
}

impl NeighborIter {
    pub fn new(center: Coord2, bounds: Coord2) -> Self {
        Self {
            center,
            bounds,
            index: 0,
        }
    }
}

impl Iterator for NeighborIter {
    type Item = Coord2;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if usize::from(self.index) >= DISPLACEMENTS.len() {
                return None;
            }

            let next_item =
                apply_delta(self.center, DISPLACEMENTS[self.index as usize], self.bounds);
            self.index += 1;

            if next_item.is_some() {
                return next_item;
            }
        }
    }
}
