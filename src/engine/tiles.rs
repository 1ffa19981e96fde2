use std::collections::BTreeMap;

use crate::constants::GRID_SIZE;
use crate::types::{Cell, Tile, TileId};

/// Live tiles keyed by identity, with a cell -> identity index kept in step.
#[derive(Clone, Debug)]
pub struct TileBoard {
    tiles: BTreeMap<TileId, Tile>,
    by_cell: [[Option<TileId>; GRID_SIZE]; GRID_SIZE],
    next_id: u64,
}

impl Default for TileBoard {
    fn default() -> Self {
        Self {
            tiles: BTreeMap::new(),
            by_cell: [[None; GRID_SIZE]; GRID_SIZE],
            next_id: 1,
        }
    }
}

impl TileBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every tile. Identities keep counting up.
    pub fn clear(&mut self) {
        self.tiles.clear();
        self.by_cell = [[None; GRID_SIZE]; GRID_SIZE];
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn get(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(&id)
    }

    pub fn id_at(&self, cell: Cell) -> Option<TileId> {
        self.by_cell[cell.row][cell.col]
    }

    pub fn tile_at(&self, cell: Cell) -> Option<&Tile> {
        self.id_at(cell).and_then(|id| self.tiles.get(&id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub(crate) fn create(&mut self, cell: Cell, value: u32) -> Tile {
        let id = TileId(self.next_id);
        self.next_id += 1;
        let tile = Tile { id, cell, value };
        self.tiles.insert(id, tile);
        self.by_cell[cell.row][cell.col] = Some(id);
        tile
    }

    /// Unhooks the tile at `cell` from the index so it cannot be claimed twice.
    /// The tile stays live until it is placed or retired.
    pub(crate) fn take_at(&mut self, cell: Cell) -> Option<Tile> {
        let id = self.by_cell[cell.row][cell.col].take()?;
        self.tiles.get(&id).copied()
    }

    pub(crate) fn place(&mut self, id: TileId, cell: Cell, value: u32) {
        if let Some(tile) = self.tiles.get_mut(&id) {
            tile.cell = cell;
            tile.value = value;
            self.by_cell[cell.row][cell.col] = Some(id);
        }
    }

    pub(crate) fn retire(&mut self, id: TileId) {
        if let Some(tile) = self.tiles.remove(&id) {
            if self.by_cell[tile.cell.row][tile.cell.col] == Some(id) {
                self.by_cell[tile.cell.row][tile.cell.col] = None;
            }
        }
    }

    /// Checks that every indexed cell agrees with the tile map and with the
    /// given grid contents.
    pub fn matches_grid(&self, rows: &[[u32; GRID_SIZE]; GRID_SIZE]) -> bool {
        let mut indexed = 0usize;
        for cell in Cell::all() {
            let value = rows[cell.row][cell.col];
            match self.tile_at(cell) {
                Some(tile) => {
                    indexed += 1;
                    if tile.cell != cell || tile.value != value {
                        return false;
                    }
                }
                None => {
                    if value != 0 {
                        return false;
                    }
                }
            }
        }
        indexed == self.tiles.len()
    }
}
