use std::time::Duration;

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;

use crate::types::{AnimationPlan, AnimationTransition};

/// Something that animates a single transition and resolves when it is done.
pub trait TransitionSink: Sync {
    fn play(&self, transition: &AnimationTransition) -> BoxFuture<'static, ()>;
}

/// Plays every transition concurrently and resolves only once all have
/// finished. An empty plan resolves immediately.
pub async fn play_plan<S: TransitionSink + ?Sized>(sink: &S, plan: &AnimationPlan) {
    if !plan.any_move {
        return;
    }
    join_all(plan.transitions.iter().map(|transition| sink.play(transition))).await;
}

/// Sink that just waits out each transition's nominal duration.
#[derive(Clone, Copy, Debug)]
pub struct TimedPlayback {
    pub speed: f64,
}

impl Default for TimedPlayback {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

impl TransitionSink for TimedPlayback {
    fn play(&self, transition: &AnimationTransition) -> BoxFuture<'static, ()> {
        let millis = transition.duration_ms() as f64 / self.speed.max(f64::EPSILON);
        tokio::time::sleep(Duration::from_millis(millis.round() as u64)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::types::{Cell, Direction, TileId};

    struct CountingSink {
        finished: Arc<AtomicUsize>,
    }

    impl TransitionSink for CountingSink {
        fn play(&self, transition: &AnimationTransition) -> BoxFuture<'static, ()> {
            let finished = self.finished.clone();
            let wait = Duration::from_millis(transition.duration_ms() / 10);
            async move {
                tokio::time::sleep(wait).await;
                finished.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }
    }

    fn sample_plan() -> AnimationPlan {
        AnimationPlan {
            direction: Some(Direction::Left),
            any_move: true,
            transitions: vec![
                AnimationTransition::Move {
                    tile_id: TileId(1),
                    from: Cell::new(0, 3),
                    to: Cell::new(0, 0),
                    value: 2,
                },
                AnimationTransition::Merge {
                    survivor_id: TileId(2),
                    consumed_ids: vec![TileId(3)],
                    to: Cell::new(1, 0),
                    new_value: 8,
                },
                AnimationTransition::Spawn {
                    tile_id: TileId(4),
                    cell: Cell::new(3, 3),
                    value: 2,
                },
            ],
        }
    }

    #[tokio::test]
    async fn plan_completes_after_every_transition() {
        let finished = Arc::new(AtomicUsize::new(0));
        let sink = CountingSink {
            finished: finished.clone(),
        };
        play_plan(&sink, &sample_plan()).await;
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_move_plan_plays_nothing() {
        let finished = Arc::new(AtomicUsize::new(0));
        let sink = CountingSink {
            finished: finished.clone(),
        };
        let mut plan = sample_plan();
        plan.any_move = false;
        play_plan(&sink, &plan).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn timed_playback_waits_for_longest_transition() {
        let started = tokio::time::Instant::now();
        play_plan(&TimedPlayback { speed: 10.0 }, &sample_plan()).await;
        // Spawn is the longest at 200ms, scaled down tenfold.
        assert!(started.elapsed() >= Duration::from_millis(19));
    }
}
