use tracing::debug;

use crate::constants::spawn_value;
use crate::grid::GridState;
use crate::rng::RandomSource;
use crate::types::{AnimationTransition, Tile};

use super::tiles::TileBoard;

/// Places a 2 (or, one time in ten, a 4) on a uniformly chosen empty cell.
/// Returns `None` when the board is full.
pub fn spawn_random(
    grid: &mut GridState,
    board: &mut TileBoard,
    rng: &mut dyn RandomSource,
) -> Option<Tile> {
    let empties = grid.empty_cells();
    if empties.is_empty() {
        return None;
    }
    let cell = empties[rng.pick_index(empties.len())];
    let value = spawn_value(rng.next_f32());
    grid.set(cell, value);
    let tile = board.create(cell, value);
    debug!(id = tile.id.0, row = cell.row, col = cell.col, value, "[spawn] tile placed");
    Some(tile)
}

pub fn spawn_transition(tile: &Tile) -> AnimationTransition {
    AnimationTransition::Spawn {
        tile_id: tile.id,
        cell: tile.cell,
        value: tile.value,
    }
}
