use serde::{Deserialize, Serialize};

use crate::constants::{GRID_SIZE, MOVE_ANIM_MS, SPAWN_ANIM_MS};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Up,
        Direction::Down,
    ];

    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn all() -> impl Iterator<Item = Cell> {
        (0..GRID_SIZE).flat_map(|row| (0..GRID_SIZE).map(move |col| Cell::new(row, col)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Tile {
    pub id: TileId,
    pub cell: Cell,
    pub value: u32,
}

/// One output entry of a traversal line: `sources` lists the cells that fed
/// `target`, nearest the destination edge first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MoveEvent {
    pub target: Cell,
    pub value: u32,
    pub sources: Vec<Cell>,
}

impl MoveEvent {
    pub fn is_merge(&self) -> bool {
        self.sources.len() > 1
    }

    pub fn relocates(&self) -> bool {
        self.sources.iter().any(|source| *source != self.target)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnimationTransition {
    Move {
        #[serde(rename = "tileId")]
        tile_id: TileId,
        from: Cell,
        to: Cell,
        value: u32,
    },
    Merge {
        #[serde(rename = "survivorId")]
        survivor_id: TileId,
        #[serde(rename = "consumedIds")]
        consumed_ids: Vec<TileId>,
        to: Cell,
        #[serde(rename = "newValue")]
        new_value: u32,
    },
    Spawn {
        #[serde(rename = "tileId")]
        tile_id: TileId,
        cell: Cell,
        value: u32,
    },
}

impl AnimationTransition {
    pub fn duration_ms(&self) -> u64 {
        match self {
            Self::Move { .. } | Self::Merge { .. } => MOVE_ANIM_MS,
            Self::Spawn { .. } => SPAWN_ANIM_MS,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AnimationPlan {
    pub direction: Option<Direction>,
    #[serde(rename = "anyMove")]
    pub any_move: bool,
    pub transitions: Vec<AnimationTransition>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub grid: [[u32; GRID_SIZE]; GRID_SIZE],
    pub score: u64,
    pub best: u64,
    pub tiles: Vec<Tile>,
    pub animating: bool,
    pub terminal: bool,
}

/// What happened when the session finished playing a plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    #[serde(rename = "scoreDelta")]
    pub score_delta: u64,
    pub score: u64,
    pub best: u64,
    #[serde(rename = "newBest")]
    pub new_best: bool,
    pub spawn: Option<AnimationTransition>,
    pub terminal: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveResponse {
    /// A plan is still playing; the intent was dropped.
    Ignored,
    NoChange { terminal: bool },
    Planned(AnimationPlan),
}
