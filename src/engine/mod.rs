use tracing::{debug, info};

use crate::best_score::BestScore;
use crate::constants::INITIAL_TILE_COUNT;
use crate::grid::GridState;
use crate::rng::RandomSource;
use crate::types::{
    AnimationPlan, Direction, MoveResponse, Snapshot, StepOutcome, Tile,
};

mod planner;
mod resolver;
mod spawn_system;
mod tiles;
mod utils;

pub use self::planner::plan_transitions;
pub use self::resolver::{resolve_move, MoveResolution};
pub use self::spawn_system::{spawn_random, spawn_transition};
pub use self::tiles::TileBoard;
pub use self::utils::has_moves;

#[derive(Clone, Debug)]
struct PendingMove {
    score_delta: u64,
}

/// One player's game: grid, live tiles, score and the animation gate.
///
/// A move runs in two halves. `request_move` resolves the grid and tile set
/// and hands back the plan; `finish_move` runs once the plan has been played
/// and applies score, spawn and terminality. Intents arriving in between are
/// dropped.
pub struct GameSession {
    grid: GridState,
    tiles: TileBoard,
    rng: Box<dyn RandomSource + Send>,
    best: BestScore,
    pending: Option<PendingMove>,
    terminal: bool,
    moves_made: u64,
}

impl GameSession {
    /// Builds a session and deals the opening tiles.
    pub fn new(rng: Box<dyn RandomSource + Send>, best: BestScore) -> Self {
        let mut session = Self {
            grid: GridState::new(),
            tiles: TileBoard::new(),
            rng,
            best,
            pending: None,
            terminal: false,
            moves_made: 0,
        };
        session.reset();
        session
    }

    /// Clears everything and places the opening tiles without animation.
    pub fn reset(&mut self) -> Snapshot {
        self.grid.reset();
        self.tiles.clear();
        self.pending = None;
        self.moves_made = 0;
        for _ in 0..INITIAL_TILE_COUNT {
            spawn_random(&mut self.grid, &mut self.tiles, self.rng.as_mut());
        }
        self.terminal = !has_moves(&self.grid);
        info!(best = self.best.get(), "[session] new game");
        self.snapshot()
    }

    pub fn is_animating(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn grid(&self) -> &GridState {
        &self.grid
    }

    pub fn tiles(&self) -> &TileBoard {
        &self.tiles
    }

    pub fn score(&self) -> u64 {
        self.grid.score()
    }

    pub fn best(&self) -> u64 {
        self.best.get()
    }

    pub fn moves_made(&self) -> u64 {
        self.moves_made
    }

    pub fn request_move(&mut self, direction: Direction) -> MoveResponse {
        if self.pending.is_some() {
            debug!(dir = direction.as_str(), "[session] intent dropped while animating");
            return MoveResponse::Ignored;
        }

        let resolution = resolve_move(&self.grid, direction);
        if !resolution.any_move {
            self.terminal = !has_moves(&self.grid);
            if self.terminal {
                info!(score = self.grid.score(), "[session] no moves remain");
            }
            return MoveResponse::NoChange {
                terminal: self.terminal,
            };
        }

        let plan: AnimationPlan = plan_transitions(
            &resolution.events,
            &mut self.tiles,
            Some(direction),
            resolution.any_move,
        );
        self.grid.replace_cells(resolution.cells);
        self.pending = Some(PendingMove {
            score_delta: resolution.score_delta,
        });
        self.moves_made += 1;
        debug!(
            dir = direction.as_str(),
            transitions = plan.transitions.len(),
            score_delta = resolution.score_delta,
            "[session] move resolved"
        );
        MoveResponse::Planned(plan)
    }

    /// Completes the in-flight move. Returns `None` when nothing is pending.
    pub fn finish_move(&mut self) -> Option<StepOutcome> {
        let pending = self.pending.take()?;
        self.grid.add_score(pending.score_delta);
        let score = self.grid.score();
        let new_best = self.best.offer(score);

        let spawned = spawn_random(&mut self.grid, &mut self.tiles, self.rng.as_mut());
        self.terminal = !has_moves(&self.grid);
        if self.terminal {
            info!(score, "[session] no moves remain");
        }

        Some(StepOutcome {
            score_delta: pending.score_delta,
            score,
            best: self.best.get(),
            new_best,
            spawn: spawned.as_ref().map(spawn_transition),
            terminal: self.terminal,
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            grid: *self.grid.rows(),
            score: self.grid.score(),
            best: self.best.get(),
            tiles: self.tiles.iter().copied().collect::<Vec<Tile>>(),
            animating: self.is_animating(),
            terminal: self.terminal,
        }
    }
}
