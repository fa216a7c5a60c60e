//! Simple test fixtures used across unit tests.

use dealer_shared::{Envelope, ServerEvent};
use serde_json::Value;

use crate::ports::outbound::ApiError;

pub fn api_request_failed(msg: &str) -> ApiError {
    ApiError::RequestFailed(msg.to_string())
}

/// Parses a `{type, data}` literal into a typed event.
pub fn server_event(frame: Value) -> ServerEvent {
    let envelope: Envelope = serde_json::from_value(frame).expect("envelope literal");
    ServerEvent::from_envelope(envelope).expect("event literal")
}

/// A `gamestate` frame seating `(id, hand)` pairs from `player1` on. Hands
/// are space-separated card codes such as `"AS 2C"`.
pub fn gamestate_frame(game_id: &str, seats: &[(&str, &str)]) -> Value {
    let mut state = serde_json::Map::new();
    for (index, (id, hand)) in seats.iter().enumerate() {
        let cards: Vec<Value> = hand
            .split_whitespace()
            .map(|code| {
                let card: dealer_domain::Card = code.parse().expect("card literal");
                serde_json::to_value(card).expect("card json")
            })
            .collect();
        state.insert(
            format!("player{}", index + 1),
            serde_json::json!({ "id": id, "hand": cards, "health": 0 }),
        );
    }
    state.insert("turn".to_string(), Value::from(0));

    let players: Vec<&str> = seats.iter().map(|(id, _)| *id).collect();
    serde_json::json!({
        "type": "gamestate",
        "data": { "GameID": game_id, "Players": players, "State": state }
    })
}
