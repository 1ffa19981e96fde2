use crate::constants::GRID_SIZE;
use crate::grid::{Cells, GridState};
use crate::types::{Cell, Direction, MoveEvent};

use super::utils::line_cells;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveResolution {
    pub cells: Cells,
    pub score_delta: u64,
    pub events: Vec<MoveEvent>,
    pub any_move: bool,
}

/// Slides and merges every traversal line toward `direction`. The input grid
/// is left untouched; callers commit `cells` only when `any_move` is set.
pub fn resolve_move(grid: &GridState, direction: Direction) -> MoveResolution {
    let mut cells = Cells::default();
    let mut events = Vec::new();
    let mut score_delta = 0u64;

    for index in 0..GRID_SIZE {
        let line = line_cells(direction, index);
        score_delta += resolve_line(grid, &line, &mut cells, &mut events);
    }

    let any_move = events
        .iter()
        .any(|event| event.is_merge() || event.relocates());

    MoveResolution {
        cells,
        score_delta,
        events,
        any_move,
    }
}

fn resolve_line(
    grid: &GridState,
    line: &[Cell; GRID_SIZE],
    out: &mut Cells,
    events: &mut Vec<MoveEvent>,
) -> u64 {
    let entries: Vec<(Cell, u32)> = line
        .iter()
        .map(|cell| (*cell, grid.get(*cell)))
        .filter(|(_, value)| *value != 0)
        .collect();

    let mut score = 0u64;
    let mut slot = 0usize;
    let mut k = 0usize;
    while k < entries.len() {
        let target = line[slot];
        let (source, value) = entries[k];
        let event = match entries.get(k + 1) {
            Some(&(next_source, next_value)) if next_value == value => {
                let merged = value * 2;
                score += merged as u64;
                k += 2;
                MoveEvent {
                    target,
                    value: merged,
                    sources: vec![source, next_source],
                }
            }
            _ => {
                k += 1;
                MoveEvent {
                    target,
                    value,
                    sources: vec![source],
                }
            }
        };
        out[target.row][target.col] = event.value;
        events.push(event);
        slot += 1;
    }
    score
}
