//! Turn engine: guessable range, hidden target and turn order.
//!
//! A started session is `Active` while its turn state exists; once a guess
//! wins, the state is deleted and every read fails with `NotFound`.

use std::sync::Arc;

use crate::errors::{GameError, GameResult};
use crate::models::{PlayerId, SessionId, TurnState, TurnView};
use crate::random::RandomSource;
use crate::store::GameStore;

/// First player to move in every round
pub const FIRST_PLAYER: PlayerId = 1;

impl TurnState {
    /// Fresh round over `[min, max]` with player 1 to move
    pub fn new(min: i64, max: i64, target: i64) -> Self {
        Self {
            min,
            max,
            target,
            now_playing: FIRST_PLAYER,
            revision: 0,
        }
    }

    /// Whose turn follows `now_playing` with `player_count` players
    pub fn next_player(now_playing: PlayerId, player_count: usize) -> PlayerId {
        let next = now_playing + 1;
        if next > player_count as PlayerId {
            FIRST_PLAYER
        } else {
            next
        }
    }

    /// Pass the turn on and bump the revision
    pub fn advanced(self, player_count: usize) -> Self {
        Self {
            now_playing: Self::next_player(self.now_playing, player_count),
            revision: self.revision + 1,
            ..self
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Turn engine
#[derive(Clone)]
pub struct TurnEngine {
    store: Arc<dyn GameStore>,
    targets: Arc<dyn RandomSource>,
}

impl TurnEngine {
    pub fn new(store: Arc<dyn GameStore>, targets: Arc<dyn RandomSource>) -> Self {
        Self { store, targets }
    }

    /// Opening state of a round over `[range_min, range_max]`: a uniformly
    /// drawn target and player 1 to move. Installed by
    /// [`SessionRegistry::mark_started`](crate::registry::SessionRegistry::mark_started).
    ///
    /// # Errors
    ///
    /// * `GameError::InvalidArgument` - `range_min > range_max`
    pub fn opening_state(&self, range_min: i64, range_max: i64) -> GameResult<TurnState> {
        if range_min > range_max {
            return Err(GameError::InvalidArgument(format!(
                "range [{}, {}] is empty",
                range_min, range_max
            )));
        }

        let target = self.targets.draw(range_min, range_max);
        Ok(TurnState::new(range_min, range_max, target))
    }

    /// Authoritative turn state, target included
    ///
    /// # Errors
    ///
    /// * `GameError::NotFound` - session not started or already finished
    pub async fn state(&self, session_id: &SessionId) -> GameResult<TurnState> {
        self.store
            .turn_state(session_id)
            .await?
            .ok_or_else(|| GameError::session_not_found(session_id))
    }

    /// Snapshot for rendering: range, current player and roster
    pub async fn current_view(&self, session_id: &SessionId) -> GameResult<TurnView> {
        let state = self.state(session_id).await?;
        let players = self.store.roster(session_id).await?;

        Ok(TurnView {
            min: state.min,
            max: state.max,
            now_playing: state.now_playing,
            players,
        })
    }
}
