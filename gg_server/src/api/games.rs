//! Game session API handlers.
//!
//! # Examples
//!
//! Create a session:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/games/join \
//!   -H "Content-Type: application/json" \
//!   -d '{"name": "alice"}'
//! ```
//!
//! Guess:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/games/4821/guess \
//!   -H "Content-Type: application/json" \
//!   -d '{"player_id": 1, "name": "alice", "guess": "50"}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use guessing_game::{
    GameError, GameEvent, GuessOutcome, LobbyView, PlayerId, RoundResult, SessionId, TurnView,
    WaitOutcome,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct JoinGameRequest {
    pub name: String,
    /// Absent or empty creates a new session
    #[serde(default)]
    pub game_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinGameResponse {
    pub game_id: SessionId,
    pub player_id: PlayerId,
}

/// Guess as sent by the client; kept raw so non-integers surface as
/// `400 Bad Request` from the evaluator
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawGuess {
    Integer(i64),
    Text(String),
    /// Fractions, booleans, arrays and anything else JSON allows
    Other(serde_json::Value),
}

impl RawGuess {
    fn into_text(self) -> String {
        match self {
            RawGuess::Integer(value) => value.to_string(),
            RawGuess::Text(text) => text,
            RawGuess::Other(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GuessRequest {
    pub player_id: PlayerId,
    pub name: String,
    pub guess: RawGuess,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    pub event: GameEvent,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// HTTP status for a game error
pub fn status_for(err: &GameError) -> StatusCode {
    match err {
        GameError::NotFound(_) => StatusCode::NOT_FOUND,
        GameError::Conflict(_) => StatusCode::CONFLICT,
        GameError::Forbidden => StatusCode::FORBIDDEN,
        GameError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        GameError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn api_error(operation: &str, game_id: &str, err: GameError) -> ApiError {
    let status = status_for(&err);
    let message = err.client_message();

    if let GameError::Unavailable(source) = &err {
        tracing::error!(operation = operation, game_id = game_id, "Store error: {}", source);
    }
    logging::log_rejected_operation(operation, game_id, status.as_u16(), &message);

    (status, Json(ErrorResponse { error: message }))
}

/// Create a session, or join the one named by `game_id`.
///
/// # Response
///
/// `200 OK` with `{"game_id": "4821", "player_id": 1}`
///
/// # Errors
///
/// - `400 Bad Request`: Empty name
/// - `404 Not Found`: Session absent or already started
/// - `409 Conflict`: Name already taken in the session
pub async fn join_game(
    State(state): State<AppState>,
    Json(payload): Json<JoinGameRequest>,
) -> Result<Json<JoinGameResponse>, ApiError> {
    let requested = payload.game_id.as_deref().filter(|id| !id.is_empty());

    let receipt = state
        .service
        .create_or_join(requested, &payload.name)
        .await
        .map_err(|e| api_error("join", requested.unwrap_or("-"), e))?;

    if requested.is_none() {
        metrics::sessions_created_total();
    }
    metrics::players_joined_total();

    Ok(Json(JoinGameResponse {
        game_id: receipt.session_id,
        player_id: receipt.player_id,
    }))
}

/// Start the round; the response is the opening game state.
///
/// # Errors
///
/// - `404 Not Found`: Session absent or already started
pub async fn start_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Json<TurnView>, ApiError> {
    let session_id = SessionId::new(game_id.as_str());
    state
        .service
        .start_session(&session_id)
        .await
        .map(Json)
        .map_err(|e| api_error("start", &game_id, e))
}

/// Status and roster of a live session.
///
/// # Errors
///
/// - `404 Not Found`: Session absent or finished
pub async fn get_lobby(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Json<LobbyView>, ApiError> {
    let session_id = SessionId::new(game_id.as_str());
    state
        .service
        .lobby_state(&session_id)
        .await
        .map(Json)
        .map_err(|e| api_error("lobby", &game_id, e))
}

/// Range, current player and roster of a started session.
///
/// # Errors
///
/// - `404 Not Found`: Session not started or already won
pub async fn get_state(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Json<TurnView>, ApiError> {
    let session_id = SessionId::new(game_id.as_str());
    state
        .service
        .game_state(&session_id)
        .await
        .map(Json)
        .map_err(|e| api_error("state", &game_id, e))
}

/// Submit a guess.
///
/// # Response
///
/// `200 OK` with either
/// `{"outcome": "continue", "min": 1, "max": 49, "now_playing": 2}` or
/// `{"outcome": "won", "winner_name": "bob", "target": 42}`
///
/// # Errors
///
/// - `400 Bad Request`: Guess is not an integer
/// - `403 Forbidden`: Not the caller's turn
/// - `404 Not Found`: Session not started or already won
pub async fn submit_guess(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(payload): Json<GuessRequest>,
) -> Result<Json<GuessOutcome>, ApiError> {
    let session_id = SessionId::new(game_id.as_str());
    let raw_guess = payload.guess.into_text();

    let outcome = state
        .service
        .submit_guess(&session_id, payload.player_id, &payload.name, &raw_guess)
        .await
        .map_err(|e| {
            let (status, body) = api_error("guess", &game_id, e);
            metrics::guesses_rejected_total(status.as_u16());
            (status, body)
        })?;

    match &outcome {
        GuessOutcome::Continue { .. } => metrics::guesses_total("continue"),
        GuessOutcome::Won { .. } => {
            metrics::guesses_total("won");
            metrics::rounds_won_total();
        }
    }

    Ok(Json(outcome))
}

/// Long-poll for the session's next event.
///
/// Only events published after the request arrives are delivered. A client
/// disconnect drops the wait and its subscription.
///
/// # Response
///
/// - `200 OK`: `{"event": "move"}` or `{"event": "over"}`
/// - `204 No Content`: The configured wait timeout elapsed
/// - `503 Service Unavailable`: The server is shutting down
pub async fn next_event(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Response, ApiError> {
    let session_id = SessionId::new(game_id.as_str());
    let _waiter = metrics::WaiterGuard::new();

    let outcome = state
        .service
        .await_next_event(&session_id, state.shutdown_signal())
        .await
        .map_err(|e| api_error("events", &game_id, e))?;

    Ok(match outcome {
        WaitOutcome::Event(event) => Json(EventResponse { event }).into_response(),
        WaitOutcome::TimedOut => StatusCode::NO_CONTENT.into_response(),
        WaitOutcome::Cancelled => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Server shutting down".to_string(),
            }),
        )
            .into_response(),
    })
}

/// Winner and target of the session's last finished round.
///
/// # Errors
///
/// - `404 Not Found`: No round of this session has finished
pub async fn get_result(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Json<RoundResult>, ApiError> {
    let session_id = SessionId::new(game_id.as_str());
    state
        .service
        .round_result(&session_id)
        .await
        .map(Json)
        .map_err(|e| api_error("result", &game_id, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&GameError::session_not_found("1")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&GameError::Conflict("taken".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(status_for(&GameError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&GameError::InvalidArgument("x".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_raw_guess_accepts_numbers_and_strings() {
        let numeric: GuessRequest =
            serde_json::from_str(r#"{"player_id": 1, "name": "a", "guess": 50}"#).unwrap();
        assert_eq!(numeric.guess.into_text(), "50");

        let text: GuessRequest =
            serde_json::from_str(r#"{"player_id": 1, "name": "a", "guess": "fifty"}"#).unwrap();
        assert_eq!(text.guess.into_text(), "fifty");

        let fraction: GuessRequest =
            serde_json::from_str(r#"{"player_id": 1, "name": "a", "guess": 4.2}"#).unwrap();
        assert_eq!(fraction.guess.into_text(), "4.2");

        let flag: GuessRequest =
            serde_json::from_str(r#"{"player_id": 1, "name": "a", "guess": true}"#).unwrap();
        assert_eq!(flag.guess.into_text(), "true");
    }

    #[test]
    fn test_join_request_game_id_optional() {
        let request: JoinGameRequest = serde_json::from_str(r#"{"name": "alice"}"#).unwrap();
        assert!(request.game_id.is_none());
    }
}
