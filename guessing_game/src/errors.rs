//! Game error types.

use thiserror::Error;

/// Errors surfaced by every game operation.
///
/// `NotFound`, `Conflict`, `Forbidden` and `InvalidArgument` are expected
/// conditions that leave session state untouched. `Unavailable` means the
/// backing store could not be reached and the in-flight operation was
/// abandoned.
#[derive(Debug, Error)]
pub enum GameError {
    /// Session or resource absent, or in the wrong lifecycle state
    #[error("{0}")]
    NotFound(String),

    /// Player name already taken in this session
    #[error("{0}")]
    Conflict(String),

    /// Guess submitted out of turn
    #[error("Not your turn")]
    Forbidden,

    /// Malformed input (non-integer guess, empty name)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Store unreachable
    #[error("Store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

impl GameError {
    /// Shorthand for a missing session.
    pub fn session_not_found(session_id: impl std::fmt::Display) -> Self {
        GameError::NotFound(format!("game {} not found", session_id))
    }

    /// Get a client-safe error message that doesn't leak store details
    pub fn client_message(&self) -> String {
        match self {
            // Sanitize store errors - don't expose SQL or connection details
            GameError::Unavailable(_) => "Service temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether the caller can recover by changing its request.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, GameError::Unavailable(_))
    }
}

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_store_details() {
        let err = GameError::Unavailable(sqlx::Error::PoolTimedOut);
        assert_eq!(err.client_message(), "Service temporarily unavailable");
        assert!(!err.is_caller_error());
    }

    #[test]
    fn test_client_message_passes_through_caller_errors() {
        let err = GameError::session_not_found("1234");
        assert_eq!(err.client_message(), "game 1234 not found");
        assert!(err.is_caller_error());
        assert_eq!(GameError::Forbidden.client_message(), "Not your turn");
    }
}
