//! Player roster: sequential player identities within a session.

use std::sync::Arc;

use crate::errors::{GameError, GameResult};
use crate::models::{Player, PlayerId, SessionId};
use crate::store::GameStore;

/// Player roster
#[derive(Clone)]
pub struct PlayerRoster {
    store: Arc<dyn GameStore>,
}

impl PlayerRoster {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Admit `name` into a `Created` session.
    ///
    /// Count, name reservation and id assignment happen in one store
    /// operation, so concurrent joins receive distinct, gap-free ids.
    ///
    /// # Errors
    ///
    /// * `GameError::InvalidArgument` - empty name
    /// * `GameError::Conflict` - name already in the roster
    /// * `GameError::NotFound` - session absent or already started
    pub async fn join(&self, session_id: &SessionId, name: &str) -> GameResult<PlayerId> {
        if name.is_empty() {
            return Err(GameError::InvalidArgument(
                "player name must not be empty".to_string(),
            ));
        }

        let player_id = self.store.join_player(session_id, name).await?;
        log::info!(
            "Player {} joined game {} as #{}",
            name,
            session_id,
            player_id
        );
        Ok(player_id)
    }

    /// Players ordered by id
    pub async fn roster_of(&self, session_id: &SessionId) -> GameResult<Vec<Player>> {
        self.store.roster(session_id).await
    }

    pub async fn count(&self, session_id: &SessionId) -> GameResult<usize> {
        self.store.player_count(session_id).await
    }
}
