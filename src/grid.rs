use serde::Serialize;

use crate::constants::GRID_SIZE;
use crate::types::Cell;

pub type Cells = [[u32; GRID_SIZE]; GRID_SIZE];

/// The 4x4 board plus the running score. Out-of-range cells panic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GridState {
    cells: Cells,
    score: u64,
}

impl GridState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(cells: Cells) -> Self {
        Self { cells, score: 0 }
    }

    pub fn get(&self, cell: Cell) -> u32 {
        self.cells[cell.row][cell.col]
    }

    pub(crate) fn set(&mut self, cell: Cell, value: u32) {
        debug_assert!(value == 0 || (value >= 2 && value.is_power_of_two()));
        self.cells[cell.row][cell.col] = value;
    }

    pub fn rows(&self) -> &Cells {
        &self.cells
    }

    pub(crate) fn replace_cells(&mut self, cells: Cells) {
        self.cells = cells;
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub(crate) fn add_score(&mut self, delta: u64) {
        self.score += delta;
    }

    pub fn reset(&mut self) {
        self.cells = Cells::default();
        self.score = 0;
    }

    pub fn empty_cells(&self) -> Vec<Cell> {
        Cell::all().filter(|cell| self.get(*cell) == 0).collect()
    }

    pub fn occupied_count(&self) -> usize {
        Cell::all().filter(|cell| self.get(*cell) != 0).count()
    }

    pub fn tile_sum(&self) -> u64 {
        self.cells.iter().flatten().map(|value| *value as u64).sum()
    }

    pub fn max_tile(&self) -> u32 {
        self.cells.iter().flatten().copied().max().unwrap_or(0)
    }
}
