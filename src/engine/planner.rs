use tracing::warn;

use crate::types::{AnimationPlan, AnimationTransition, Direction, MoveEvent, Tile};

use super::tiles::TileBoard;

/// Turns resolver events into tile transitions and applies them to `board`.
///
/// Every source cell is unhooked from the cell index before any tile is
/// placed, so each live tile is claimed by at most one event even when a
/// target cell was another event's source.
pub fn plan_transitions(
    events: &[MoveEvent],
    board: &mut TileBoard,
    direction: Option<Direction>,
    any_move: bool,
) -> AnimationPlan {
    let claimed: Vec<Vec<Tile>> = events
        .iter()
        .map(|event| {
            event
                .sources
                .iter()
                .filter_map(|source| {
                    let tile = board.take_at(*source);
                    if tile.is_none() {
                        warn!(?source, "[planner] no live tile at source cell");
                    }
                    tile
                })
                .collect()
        })
        .collect();

    let mut transitions = Vec::with_capacity(events.len());
    for (event, tiles) in events.iter().zip(claimed) {
        let Some((survivor, consumed)) = tiles.split_first() else {
            continue;
        };
        if consumed.is_empty() {
            board.place(survivor.id, event.target, event.value);
            transitions.push(AnimationTransition::Move {
                tile_id: survivor.id,
                from: survivor.cell,
                to: event.target,
                value: event.value,
            });
            continue;
        }

        for tile in consumed {
            board.retire(tile.id);
        }
        board.place(survivor.id, event.target, event.value);
        transitions.push(AnimationTransition::Merge {
            survivor_id: survivor.id,
            consumed_ids: consumed.iter().map(|tile| tile.id).collect(),
            to: event.target,
            new_value: event.value,
        });
    }

    AnimationPlan {
        direction,
        any_move,
        transitions,
    }
}
