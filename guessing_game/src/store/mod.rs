//! Storage contract for session state and event channels.
//!
//! Every [`GameStore`] method executes as one atomic step against the backing
//! store. The components built on top never hold locks of their own, so the
//! same guarantees hold whether one engine process or many share a store.
//!
//! Two implementations are provided:
//! - [`MemoryGameStore`]: in-process maps behind a single async mutex, with
//!   per-session broadcast channels
//! - [`PgGameStore`]: PostgreSQL tables with row locks and conditional
//!   updates, events over `LISTEN`/`NOTIFY`

use async_trait::async_trait;

use crate::errors::GameResult;
use crate::models::{GameEvent, Player, PlayerId, RoundResult, SessionId, SessionStatus, TurnState};

pub mod memory;
pub mod postgres;

pub use memory::MemoryGameStore;
pub use postgres::PgGameStore;

/// Name of the publish/subscribe topic for a session
pub fn channel_name(session_id: &SessionId) -> String {
    format!("game_{}_channel", session_id)
}

/// Atomic operations over per-session state
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Mark `session_id` as created unless an entry already exists.
    /// Returns `true` if this call inserted it.
    async fn insert_session_if_absent(&self, session_id: &SessionId) -> GameResult<bool>;

    /// Current lifecycle status
    async fn session_status(&self, session_id: &SessionId) -> GameResult<SessionStatus>;

    /// Move the session `Created -> Started` and write its opening turn
    /// state in the same step. Returns `false`, writing nothing, unless the
    /// session was `Created`.
    async fn start_round(&self, session_id: &SessionId, opening: &TurnState) -> GameResult<bool>;

    /// Delete the registry entry
    async fn remove_session(&self, session_id: &SessionId) -> GameResult<()>;

    /// Admit `name`, assigning the next sequential player id.
    ///
    /// # Errors
    ///
    /// * `GameError::NotFound` - session absent or not in `Created`
    /// * `GameError::Conflict` - name already admitted
    async fn join_player(&self, session_id: &SessionId, name: &str) -> GameResult<PlayerId>;

    /// Roster ordered by player id
    async fn roster(&self, session_id: &SessionId) -> GameResult<Vec<Player>>;

    async fn player_count(&self, session_id: &SessionId) -> GameResult<usize>;

    async fn turn_state(&self, session_id: &SessionId) -> GameResult<Option<TurnState>>;

    /// Replace the turn state with `next` and record `guess` as `name`'s last
    /// entry, provided the stored revision still equals `expected_revision`.
    /// Returns `false` when another move got there first.
    async fn commit_move(
        &self,
        session_id: &SessionId,
        expected_revision: i64,
        next: &TurnState,
        name: &str,
        guess: i64,
    ) -> GameResult<bool>;

    /// Record `result` and delete the turn state, roster and registry entry,
    /// provided the stored revision still equals `expected_revision`.
    async fn finish_round(
        &self,
        session_id: &SessionId,
        expected_revision: i64,
        result: &RoundResult,
    ) -> GameResult<bool>;

    /// Result of the last finished round of this session, if any
    async fn round_result(&self, session_id: &SessionId) -> GameResult<Option<RoundResult>>;

    /// Broadcast `event` to current subscribers. Not persisted.
    async fn publish(&self, session_id: &SessionId, event: GameEvent) -> GameResult<()>;

    /// Register interest in the session's channel. Events published before
    /// this returns are not delivered.
    async fn subscribe(&self, session_id: &SessionId) -> GameResult<Subscription>;

    /// Check the store is reachable
    async fn health_check(&self) -> GameResult<()>;
}

/// Backend-specific event receiver
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next decodable event
    async fn recv(&mut self) -> GameResult<GameEvent>;
}

/// A live registration on a session's event channel.
///
/// Dropping it unsubscribes.
pub struct Subscription {
    session_id: SessionId,
    source: Box<dyn EventSource>,
}

impl Subscription {
    pub fn new(session_id: SessionId, source: Box<dyn EventSource>) -> Self {
        Self { session_id, source }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Wait for the next event
    pub async fn next(&mut self) -> GameResult<GameEvent> {
        self.source.recv().await
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}
