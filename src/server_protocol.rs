use serde::Serialize;
use serde_json::Value;

use crate::input::{classify_swipe, direction_for_key};
use crate::types::{AnimationPlan, Direction, Snapshot, StepOutcome};

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Move { dir: Direction },
    Key { key: String },
    Swipe { dx: f64, dy: f64 },
    NewGame,
    Ping { t: f64 },
}

impl ParsedClientMessage {
    /// The directional intent carried by this message, if any. Unmapped keys
    /// and short swipes carry none.
    pub fn intent(&self) -> Option<Direction> {
        match self {
            Self::Move { dir } => Some(*dir),
            Self::Key { key } => direction_for_key(key),
            Self::Swipe { dx, dy } => classify_swipe(*dx, *dy),
            Self::NewGame | Self::Ping { .. } => None,
        }
    }
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "move" => {
            let dir = Direction::parse_move(object.get("dir")?.as_str()?)?;
            Some(ParsedClientMessage::Move { dir })
        }
        "key" => {
            let key = object.get("key")?.as_str()?.to_string();
            Some(ParsedClientMessage::Key { key })
        }
        "swipe" => {
            let dx = finite_number(object.get("dx")?)?;
            let dy = finite_number(object.get("dy")?)?;
            Some(ParsedClientMessage::Swipe { dx, dy })
        }
        "new_game" => Some(ParsedClientMessage::NewGame),
        "ping" => {
            let t = finite_number(object.get("t")?)?;
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn finite_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|number| number.is_finite())
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    State {
        snapshot: Snapshot,
    },
    Plan {
        plan: AnimationPlan,
    },
    Step {
        outcome: StepOutcome,
    },
    NoChange {
        terminal: bool,
    },
    GameOver {
        score: u64,
        best: u64,
    },
    Pong {
        t: f64,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|error| {
            format!(r#"{{"type":"error","message":"failed to encode message: {error}"}}"#)
        })
    }
}
