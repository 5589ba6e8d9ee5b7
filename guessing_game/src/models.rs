//! Session, player, turn and event models shared by every component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Player identity within a session, assigned from 1 upwards
pub type PlayerId = i64;

/// Short numeric session identifier (e.g. `"4821"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a raw identifier as received from a caller
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build the identifier for a freshly drawn number
    pub fn from_number(number: u32) -> Self {
        Self(number.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Lifecycle phase of a session.
///
/// `Absent` covers both "never existed" and "removed after a win"; the two
/// are indistinguishable to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Absent,
    Created,
    Started,
}

impl SessionStatus {
    /// Stored representation (`created` | `started`); `Absent` is never stored
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Absent => "absent",
            SessionStatus::Created => "created",
            SessionStatus::Started => "started",
        }
    }

    /// Parse a stored status; unknown values read as absent
    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw {
            Some("created") => SessionStatus::Created,
            Some("started") => SessionStatus::Started,
            _ => SessionStatus::Absent,
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, SessionStatus::Absent)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: PlayerId,
    pub name: String,
    /// Most recent guess; `None` until the player has moved
    pub last_entered: Option<i64>,
}

/// Live state of a started round.
///
/// `revision` increments on every committed move and is the compare-and-set
/// token for concurrent guess application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    pub min: i64,
    pub max: i64,
    pub target: i64,
    pub now_playing: PlayerId,
    pub revision: i64,
}

/// Read-only snapshot of a started round, target excluded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnView {
    pub min: i64,
    pub max: i64,
    pub now_playing: PlayerId,
    pub players: Vec<Player>,
}

/// Lobby snapshot of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyView {
    pub status: SessionStatus,
    pub players: Vec<Player>,
}

/// Outcome retained after a round ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub winner_name: String,
    pub target: i64,
    pub finished_at: DateTime<Utc>,
}

/// Result of a successful join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReceipt {
    pub session_id: SessionId,
    pub player_id: PlayerId,
}

/// Result of an accepted guess
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GuessOutcome {
    /// Guess missed; range narrowed and turn passed on
    Continue {
        min: i64,
        max: i64,
        now_playing: PlayerId,
    },
    /// Guess hit the target; session torn down
    Won { winner_name: String, target: i64 },
}

/// Signal broadcast on a session's event channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameEvent {
    /// A non-winning guess was applied; re-read the game state
    Move,
    /// The round was won; read the round result
    Over,
}

impl GameEvent {
    /// Channel payload
    pub fn as_str(&self) -> &'static str {
        match self {
            GameEvent::Move => "move",
            GameEvent::Over => "over",
        }
    }

    /// Decode a channel payload. Payloads are matched on their suffix.
    pub fn from_payload(payload: &str) -> Option<Self> {
        let payload = payload.trim_end();
        if payload.ends_with("move") {
            Some(GameEvent::Move)
        } else if payload.ends_with("over") {
            Some(GameEvent::Over)
        } else {
            None
        }
    }
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_status_from_stored() {
        assert_eq!(
            SessionStatus::from_stored(Some("created")),
            SessionStatus::Created
        );
        assert_eq!(
            SessionStatus::from_stored(Some("started")),
            SessionStatus::Started
        );
        assert_eq!(SessionStatus::from_stored(None), SessionStatus::Absent);
        assert_eq!(
            SessionStatus::from_stored(Some("finished")),
            SessionStatus::Absent
        );
    }

    #[test]
    fn test_event_payload_suffix_matching() {
        assert_eq!(GameEvent::from_payload("move"), Some(GameEvent::Move));
        assert_eq!(
            GameEvent::from_payload("Message<game_12_channel: over>\n"),
            None
        );
        assert_eq!(
            GameEvent::from_payload("game_12_channel: over"),
            Some(GameEvent::Over)
        );
        assert_eq!(GameEvent::from_payload("noise"), None);
    }

    #[test]
    fn test_guess_outcome_serialization() {
        let json = serde_json::to_value(GuessOutcome::Won {
            winner_name: "bob".to_string(),
            target: 42,
        })
        .unwrap();
        assert_eq!(json["outcome"], "won");
        assert_eq!(json["target"], 42);
    }
}
