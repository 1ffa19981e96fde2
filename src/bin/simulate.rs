use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tile_merge_rust_server::best_score::BestScore;
use tile_merge_rust_server::constants::BEST_SCORE_KEY;
use tile_merge_rust_server::engine::{resolve_move, GameSession};
use tile_merge_rust_server::rng::{RandomSource, Rng};
use tile_merge_rust_server::types::{AnimationTransition, Direction, MoveResponse};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
enum Strategy {
    /// Uniformly random direction.
    Random,
    /// Direction with the largest immediate score gain.
    Greedy,
    /// Fixed preference: left, up, right, down.
    Corner,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Number of games to play.
    #[arg(long, default_value_t = 10)]
    games: u32,
    /// Seed for the first game; later games use consecutive seeds.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, value_enum, default_value_t = Strategy::Greedy)]
    strategy: Strategy,
    /// Stop a game after this many applied moves.
    #[arg(long, default_value_t = 20_000)]
    max_moves: u64,
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
    /// Tracing filter, e.g. "info", "debug".
    #[arg(long, default_value = "info")]
    log: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum FinishReason {
    Terminal,
    MoveLimit,
}

#[derive(Clone, Debug, Serialize)]
struct GameResultLine {
    seed: u32,
    strategy: Strategy,
    reason: FinishReason,
    moves: u64,
    score: u64,
    #[serde(rename = "maxTile")]
    max_tile: u32,
    merges: u64,
    spawns: u64,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "gameCount")]
    game_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageScore")]
    average_score: u64,
    #[serde(rename = "bestScore")]
    best_score: u64,
    #[serde(rename = "maxTileCounts")]
    max_tile_counts: BTreeMap<u32, usize>,
    games: Vec<GameResultLine>,
}

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let run_started_at_ms = now_ms();
    let base_seed = normalize_seed(cli.seed.unwrap_or(run_started_at_ms));
    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(base_seed, run_started_at_ms));

    let mut results = Vec::new();
    for index in 0..cli.games {
        let seed = base_seed.wrapping_add(index);
        info!(run = %run_id, seed, strategy = ?cli.strategy, "game_started");
        let result = run_game(seed, cli.strategy, cli.max_moves);
        for anomaly in &result.anomalies {
            warn!(run = %run_id, seed, "anomaly_detected: {anomaly}");
        }
        info!(
            run = %run_id,
            seed,
            score = result.score,
            max_tile = result.max_tile,
            moves = result.moves,
            "game_finished"
        );
        match serde_json::to_string(&result) {
            Ok(line) => println!("{line}"),
            Err(error) => error!("failed to encode result line: {error}"),
        }
        results.push(result);
    }

    let summary = build_run_summary(run_id.clone(), run_started_at_ms, now_ms(), results);
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            error!(run = %run_id, "summary_write_failed: {error:#}");
            std::process::exit(2);
        }
    }

    info!(
        run = %run_id,
        games = summary.game_count,
        anomalies = summary.anomaly_count,
        average_score = summary.average_score,
        "run_finished"
    );
    if summary.anomaly_count > 0 {
        std::process::exit(1);
    }
}

fn run_game(seed: u32, strategy: Strategy, max_moves: u64) -> GameResultLine {
    let mut session = GameSession::new(
        Box::new(Rng::new(seed)),
        BestScore::in_memory(BEST_SCORE_KEY),
    );
    let mut chooser = Rng::new(seed ^ 0x9e37_79b9);
    let mut anomalies = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut merges = 0u64;
    let mut spawns = 0u64;

    let reason = loop {
        if session.moves_made() >= max_moves {
            break FinishReason::MoveLimit;
        }
        let direction = choose_direction(&session, strategy, &mut chooser);
        let sum_before = session.grid().tile_sum();
        let count_before = session.grid().occupied_count();

        let plan = match session.request_move(direction) {
            MoveResponse::Planned(plan) => plan,
            MoveResponse::NoChange { terminal: true } => break FinishReason::Terminal,
            MoveResponse::NoChange { terminal: false } if strategy == Strategy::Random => {
                continue;
            }
            MoveResponse::NoChange { terminal: false } => {
                push_anomaly(
                    &mut anomalies,
                    &mut anomaly_seen,
                    format!("strategy chose a no-op move {}", direction.as_str()),
                );
                break FinishReason::Terminal;
            }
            MoveResponse::Ignored => {
                push_anomaly(
                    &mut anomalies,
                    &mut anomaly_seen,
                    "intent ignored with nothing in flight".to_string(),
                );
                break FinishReason::Terminal;
            }
        };
        let plan_merges = plan
            .transitions
            .iter()
            .filter(|t| matches!(t, AnimationTransition::Merge { .. }))
            .count();
        let merged_value: u64 = plan
            .transitions
            .iter()
            .map(|t| match t {
                AnimationTransition::Merge { new_value, .. } => *new_value as u64,
                _ => 0,
            })
            .sum();
        merges += plan_merges as u64;

        let Some(outcome) = session.finish_move() else {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_seen,
                "planned move had nothing pending".to_string(),
            );
            break FinishReason::Terminal;
        };
        let spawned_value = match outcome.spawn {
            Some(AnimationTransition::Spawn { value, .. }) => {
                spawns += 1;
                value as u64
            }
            _ => 0,
        };
        let expected_count = count_before - plan_merges + usize::from(spawned_value > 0);
        if outcome.score_delta != merged_value {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_seen,
                format!(
                    "score delta {} != merged value {merged_value}",
                    outcome.score_delta
                ),
            );
        }

        for message in check_invariants(&session, sum_before + spawned_value, expected_count) {
            push_anomaly(&mut anomalies, &mut anomaly_seen, message);
        }
        if outcome.terminal {
            break FinishReason::Terminal;
        }
    };

    GameResultLine {
        seed,
        strategy,
        reason,
        moves: session.moves_made(),
        score: session.score(),
        max_tile: session.grid().max_tile(),
        merges,
        spawns,
        anomalies,
    }
}

fn choose_direction(session: &GameSession, strategy: Strategy, chooser: &mut Rng) -> Direction {
    match strategy {
        Strategy::Random => Direction::ALL[chooser.pick_index(Direction::ALL.len())],
        Strategy::Greedy => {
            let mut best: Option<(u64, Direction)> = None;
            for direction in Direction::ALL {
                let resolution = resolve_move(session.grid(), direction);
                if !resolution.any_move {
                    continue;
                }
                if best.map_or(true, |(score, _)| resolution.score_delta > score) {
                    best = Some((resolution.score_delta, direction));
                }
            }
            best.map(|(_, direction)| direction)
                .unwrap_or(Direction::Left)
        }
        Strategy::Corner => [
            Direction::Left,
            Direction::Up,
            Direction::Right,
            Direction::Down,
        ]
        .into_iter()
        .find(|direction| resolve_move(session.grid(), *direction).any_move)
        .unwrap_or(Direction::Left),
    }
}

fn check_invariants(session: &GameSession, expected_sum: u64, expected_count: usize) -> Vec<String> {
    let mut anomalies = Vec::new();
    let grid = session.grid();
    if grid.tile_sum() != expected_sum {
        anomalies.push(format!(
            "tile sum {} != expected {expected_sum}",
            grid.tile_sum()
        ));
    }
    if grid.occupied_count() != expected_count {
        anomalies.push(format!(
            "tile count {} != expected {expected_count}",
            grid.occupied_count()
        ));
    }
    if !session.tiles().matches_grid(grid.rows()) {
        anomalies.push("tile index disagrees with grid".to_string());
    }
    if grid
        .rows()
        .iter()
        .flatten()
        .any(|value| *value != 0 && (*value < 2 || !value.is_power_of_two()))
    {
        anomalies.push("grid holds a value that is not a power of two".to_string());
    }
    anomalies
}

fn push_anomaly(anomalies: &mut Vec<String>, seen: &mut HashSet<String>, message: String) {
    if seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn default_run_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    run_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    games: Vec<GameResultLine>,
) -> RunSummary {
    let game_count = games.len();
    let total_score: u64 = games.iter().map(|game| game.score).sum();
    let average_score = if game_count == 0 {
        0
    } else {
        total_score / game_count as u64
    };
    let mut max_tile_counts = BTreeMap::new();
    for game in &games {
        *max_tile_counts.entry(game.max_tile).or_insert(0) += 1;
    }
    RunSummary {
        run_id,
        started_at_ms,
        finished_at_ms,
        game_count,
        anomaly_count: games.iter().map(|game| game.anomalies.len()).sum(),
        average_score,
        best_score: games.iter().map(|game| game.score).max().unwrap_or(0),
        max_tile_counts,
        games,
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let text = serde_json::to_string_pretty(summary).context("failed to encode run summary")?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}
