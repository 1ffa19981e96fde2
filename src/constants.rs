pub const GRID_SIZE: usize = 4;

pub const INITIAL_TILE_COUNT: usize = 2;
pub const SPAWN_TWO_PROBABILITY: f32 = 0.9;

pub const MOVE_ANIM_MS: u64 = 140;
pub const SPAWN_ANIM_MS: u64 = 200;

pub const SWIPE_MIN_DISTANCE: f64 = 24.0;

pub const BEST_SCORE_KEY: &str = "best2048-3d";

pub fn spawn_value(roll: f32) -> u32 {
    if roll < SPAWN_TWO_PROBABILITY {
        2
    } else {
        4
    }
}
