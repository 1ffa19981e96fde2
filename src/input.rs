use crate::constants::SWIPE_MIN_DISTANCE;
use crate::types::Direction;

/// Arrow keys and WASD, matched case-insensitively.
pub fn direction_for_key(key: &str) -> Option<Direction> {
    match key.trim().to_ascii_lowercase().as_str() {
        "arrowleft" | "a" => Some(Direction::Left),
        "arrowright" | "d" => Some(Direction::Right),
        "arrowup" | "w" => Some(Direction::Up),
        "arrowdown" | "s" => Some(Direction::Down),
        _ => None,
    }
}

/// Classifies a swipe by its dominant axis. Screen coordinates: positive `dy`
/// points down. Swipes shorter than the minimum distance are ignored.
pub fn classify_swipe(dx: f64, dy: f64) -> Option<Direction> {
    if !dx.is_finite() || !dy.is_finite() {
        return None;
    }
    if dx.hypot(dy) < SWIPE_MIN_DISTANCE {
        return None;
    }
    if dx.abs() > dy.abs() {
        Some(if dx > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        })
    } else {
        Some(if dy > 0.0 {
            Direction::Down
        } else {
            Direction::Up
        })
    }
}
