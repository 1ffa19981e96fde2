use crate::constants::GRID_SIZE;
use crate::grid::GridState;
use crate::types::{Cell, Direction};

/// Cells of traversal line `index`, ordered so the edge being moved toward
/// comes first.
pub(super) fn line_cells(direction: Direction, index: usize) -> [Cell; GRID_SIZE] {
    std::array::from_fn(|step| match direction {
        Direction::Left => Cell::new(index, step),
        Direction::Right => Cell::new(index, GRID_SIZE - 1 - step),
        Direction::Up => Cell::new(step, index),
        Direction::Down => Cell::new(GRID_SIZE - 1 - step, index),
    })
}

/// True while any empty cell or equal right/lower neighbour pair exists.
pub fn has_moves(grid: &GridState) -> bool {
    if Cell::all().any(|cell| grid.get(cell) == 0) {
        return true;
    }
    Cell::all().any(|cell| {
        let value = grid.get(cell);
        let right = cell.col + 1 < GRID_SIZE && grid.get(Cell::new(cell.row, cell.col + 1)) == value;
        let below = cell.row + 1 < GRID_SIZE && grid.get(Cell::new(cell.row + 1, cell.col)) == value;
        right || below
    })
}
