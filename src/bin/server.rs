use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tile_merge_rust_server::best_score::{BestScore, JsonFileScoreStore};
use tile_merge_rust_server::config::ServerConfig;
use tile_merge_rust_server::constants::BEST_SCORE_KEY;
use tile_merge_rust_server::engine::GameSession;
use tile_merge_rust_server::playback::{play_plan, TimedPlayback};
use tile_merge_rust_server::rng::Rng;
use tile_merge_rust_server::server_protocol::{
    parse_client_message, ParsedClientMessage, ServerMessage,
};
use tile_merge_rust_server::types::{AnimationPlan, Direction, MoveResponse};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    session: GameSession,
    playback: TimedPlayback,
    /// Bumped on every new game so a plan still playing for the previous
    /// board cannot complete a move on the new one.
    generation: u64,
}

impl ServerState {
    fn new(session: GameSession) -> Self {
        Self {
            clients: HashMap::new(),
            session,
            playback: TimedPlayback::default(),
            generation: 0,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let rng = config.seed.map(Rng::new).unwrap_or_else(Rng::from_entropy);
    let best = BestScore::new(
        Box::new(JsonFileScoreStore::new(config.best_score_path.clone())),
        BEST_SCORE_KEY,
    );
    let state = Arc::new(Mutex::new(ServerState::new(GameSession::new(
        Box::new(rng),
        best,
    ))));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/best", get(best_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = config.resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        info!("[server] static file root: {}", static_dir.display());
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        warn!("[server] static file root not found; serving the websocket api only");
        app
    };

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    info!("[server] listening on :{}", config.port);
    axum::serve(listener, app)
        .await
        .context("server runtime failed")
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn best_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(json!({ "best": guard.session.best() }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<String>(256);

    {
        let mut guard = state.lock().await;
        guard
            .clients
            .insert(client_id.clone(), ClientContext { tx: tx.clone() });
        let snapshot = guard.session.snapshot();
        send_to_client(
            &mut guard,
            &client_id,
            &ServerMessage::State { snapshot },
            QueuePolicy::DisconnectOnFull,
        );
        info!(client = %client_id, clients = guard.clients.len(), "[server] client connected");
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(state.clone(), &client_id, raw.to_string()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = String::from_utf8(raw.to_vec()) {
                    handle_client_message(state.clone(), &client_id, text).await;
                } else {
                    send_error_to_client(&state, &client_id, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    {
        let mut guard = state.lock().await;
        guard.clients.remove(&client_id);
        info!(client = %client_id, "[server] client disconnected");
    }
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: SharedState, client_id: &str, raw: String) {
    let Some(message) = parse_client_message(&raw) else {
        send_error_to_client(&state, client_id, "invalid message").await;
        return;
    };

    match message {
        ParsedClientMessage::Ping { t } => {
            let mut guard = state.lock().await;
            send_to_client(
                &mut guard,
                client_id,
                &ServerMessage::Pong { t },
                QueuePolicy::DisconnectOnFull,
            );
        }
        ParsedClientMessage::NewGame => {
            let mut guard = state.lock().await;
            guard.generation += 1;
            let snapshot = guard.session.reset();
            broadcast(
                &mut guard,
                &ServerMessage::State { snapshot },
                QueuePolicy::DisconnectOnFull,
            );
        }
        other => {
            let Some(direction) = other.intent() else {
                debug!(client = %client_id, "[server] message carries no direction");
                return;
            };
            handle_intent(state, direction).await;
        }
    }
}

async fn handle_intent(state: SharedState, direction: Direction) {
    let mut guard = state.lock().await;
    match guard.session.request_move(direction) {
        MoveResponse::Ignored => {}
        MoveResponse::NoChange { terminal } => {
            broadcast(
                &mut guard,
                &ServerMessage::NoChange { terminal },
                QueuePolicy::DropOnFull,
            );
            if terminal {
                broadcast_game_over(&mut guard);
            }
        }
        MoveResponse::Planned(plan) => {
            broadcast(
                &mut guard,
                &ServerMessage::Plan { plan: plan.clone() },
                QueuePolicy::DisconnectOnFull,
            );
            let generation = guard.generation;
            let playback = guard.playback;
            drop(guard);
            start_playback(state, plan, playback, generation);
        }
    }
}

/// Waits for every transition of `plan`, then completes the move: score,
/// spawn and terminality are applied only after the whole plan has played.
fn start_playback(
    state: SharedState,
    plan: AnimationPlan,
    playback: TimedPlayback,
    generation: u64,
) {
    tokio::spawn(async move {
        play_plan(&playback, &plan).await;

        let mut guard = state.lock().await;
        if guard.generation != generation {
            debug!("[server] plan finished after a new game started");
            return;
        }
        let Some(outcome) = guard.session.finish_move() else {
            return;
        };
        let terminal = outcome.terminal;
        broadcast(
            &mut guard,
            &ServerMessage::Step { outcome },
            QueuePolicy::DisconnectOnFull,
        );
        if terminal {
            broadcast_game_over(&mut guard);
        }
    });
}

fn broadcast_game_over(state: &mut ServerState) {
    let message = ServerMessage::GameOver {
        score: state.session.score(),
        best: state.session.best(),
    };
    broadcast(state, &message, QueuePolicy::DisconnectOnFull);
}

fn send_to_client(
    state: &mut ServerState,
    client_id: &str,
    message: &ServerMessage,
    policy: QueuePolicy,
) {
    let send_failed = if let Some(client) = state.clients.get(client_id) {
        client.tx.try_send(message.to_json()).is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        warn!(client = %client_id, "[server] outbound queue full, dropping client");
        state.clients.remove(client_id);
    }
}

fn broadcast(state: &mut ServerState, message: &ServerMessage, policy: QueuePolicy) {
    let payload = message.to_json();
    let mut failed_clients = Vec::new();
    for (client_id, client) in &state.clients {
        if client.tx.try_send(payload.clone()).is_err() && policy == QueuePolicy::DisconnectOnFull
        {
            failed_clients.push(client_id.clone());
        }
    }
    for client_id in failed_clients {
        warn!(client = %client_id, "[server] outbound queue full, dropping client");
        state.clients.remove(&client_id);
    }
}

async fn send_error_to_client(state: &SharedState, client_id: &str, message: &str) {
    let mut guard = state.lock().await;
    send_to_client(
        &mut guard,
        client_id,
        &ServerMessage::Error {
            message: message.to_string(),
        },
        QueuePolicy::DisconnectOnFull,
    );
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tile_merge_rust_server::constants::MOVE_ANIM_MS;

    fn test_state() -> SharedState {
        let session =
            GameSession::new(Box::new(Rng::new(9)), BestScore::in_memory(BEST_SCORE_KEY));
        Arc::new(Mutex::new(ServerState::new(session)))
    }

    #[test]
    fn make_id_is_prefixed_and_unique() {
        let a = make_id("client");
        let b = make_id("client");
        assert!(a.starts_with("client_"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_client() {
        let state = test_state();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        {
            let mut guard = state.lock().await;
            guard.clients.insert("a".to_string(), ClientContext { tx: tx_a });
            guard.clients.insert("b".to_string(), ClientContext { tx: tx_b });
            broadcast(
                &mut guard,
                &ServerMessage::NoChange { terminal: false },
                QueuePolicy::DisconnectOnFull,
            );
        }
        assert!(rx_a.recv().await.expect("a got message").contains("no_change"));
        assert!(rx_b.recv().await.expect("b got message").contains("no_change"));
    }

    #[tokio::test]
    async fn full_queue_disconnects_when_policy_says_so() {
        let state = test_state();
        let (tx, _rx) = mpsc::channel(1);
        let mut guard = state.lock().await;
        guard.clients.insert("slow".to_string(), ClientContext { tx });
        let message = ServerMessage::Pong { t: 1.0 };
        broadcast(&mut guard, &message, QueuePolicy::DropOnFull);
        broadcast(&mut guard, &message, QueuePolicy::DropOnFull);
        assert!(guard.clients.contains_key("slow"));
        broadcast(&mut guard, &message, QueuePolicy::DisconnectOnFull);
        assert!(!guard.clients.contains_key("slow"));
    }

    fn message_type(raw: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(raw).expect("server sends json");
        value["type"].as_str().unwrap_or_default().to_string()
    }

    async fn join_client(state: &SharedState, client_id: &str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(16);
        state
            .lock()
            .await
            .clients
            .insert(client_id.to_string(), ClientContext { tx });
        rx
    }

    /// Tries each direction until one produces a plan; a fresh board always has one.
    async fn start_any_move(state: &SharedState, client_id: &str, rx: &mut mpsc::Receiver<String>) {
        for direction in Direction::ALL {
            let raw = format!(r#"{{"type":"move","dir":"{}"}}"#, direction.as_str());
            handle_client_message(state.clone(), client_id, raw).await;
            let reply = rx.try_recv().expect("every move gets a reply");
            match message_type(&reply).as_str() {
                "plan" => return,
                "no_change" => continue,
                other => panic!("unexpected reply {other}"),
            }
        }
        panic!("no direction moved on a fresh board");
    }

    #[tokio::test(start_paused = true)]
    async fn step_arrives_only_after_the_plan_has_played() {
        let state = test_state();
        let mut rx = join_client(&state, "c").await;
        start_any_move(&state, "c", &mut rx).await;
        assert!(state.lock().await.session.is_animating());

        let early = tokio::time::timeout(Duration::from_millis(MOVE_ANIM_MS - 1), rx.recv()).await;
        assert!(early.is_err(), "step arrived before the move transitions ended");

        let raw = tokio::time::timeout(Duration::from_millis(10), rx.recv())
            .await
            .expect("step after the plan")
            .expect("channel open");
        assert_eq!(message_type(&raw), "step");

        let guard = state.lock().await;
        assert!(!guard.session.is_animating());
        assert_eq!(guard.session.moves_made(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_game_discards_a_plan_still_playing() {
        let state = test_state();
        let mut rx = join_client(&state, "c").await;
        start_any_move(&state, "c", &mut rx).await;

        handle_client_message(state.clone(), "c", r#"{"type":"new_game"}"#.to_string()).await;
        let reply = rx.try_recv().expect("new game broadcasts state");
        assert_eq!(message_type(&reply), "state");

        let late = tokio::time::timeout(Duration::from_millis(MOVE_ANIM_MS * 4), rx.recv()).await;
        assert!(late.is_err(), "stale plan completed a move on the new board");

        let guard = state.lock().await;
        assert_eq!(guard.session.moves_made(), 0);
        assert_eq!(guard.session.score(), 0);
        assert_eq!(guard.session.snapshot().tiles.len(), 2);
    }

    #[tokio::test]
    async fn new_game_bumps_generation() {
        let state = test_state();
        handle_client_message(state.clone(), "nobody", r#"{"type":"new_game"}"#.to_string())
            .await;
        let guard = state.lock().await;
        assert_eq!(guard.generation, 1);
        assert_eq!(guard.session.snapshot().tiles.len(), 2);
    }
}
