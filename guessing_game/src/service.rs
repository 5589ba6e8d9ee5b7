//! Caller-facing game operations composed from the core components.

use std::future::Future;
use std::sync::Arc;

use crate::errors::{GameError, GameResult};
use crate::evaluator::GuessEvaluator;
use crate::models::{
    GuessOutcome, JoinReceipt, LobbyView, PlayerId, RoundResult, SessionId, SessionStatus,
    TurnView,
};
use crate::notifier::{EventNotifier, WaitOutcome};
use crate::random::{RandomSource, ThreadRandom};
use crate::registry::SessionRegistry;
use crate::roster::PlayerRoster;
use crate::settings::GameSettings;
use crate::store::GameStore;
use crate::turn::TurnEngine;

/// Game service
///
/// Cheap to clone; every component shares the same store handle.
#[derive(Clone)]
pub struct GameService {
    store: Arc<dyn GameStore>,
    settings: GameSettings,
    registry: SessionRegistry,
    roster: PlayerRoster,
    turns: TurnEngine,
    evaluator: GuessEvaluator,
    notifier: EventNotifier,
}

impl GameService {
    /// Create a service drawing ids and targets from the thread RNG
    pub fn new(store: Arc<dyn GameStore>, settings: GameSettings) -> Self {
        Self::with_randomness(
            store,
            settings,
            Arc::new(ThreadRandom),
            Arc::new(ThreadRandom),
        )
    }

    /// Create a service with explicit randomness for session ids and targets
    ///
    /// # Arguments
    ///
    /// * `store` - Backing store
    /// * `settings` - Range and id space
    /// * `ids` - Source of session id candidates
    /// * `targets` - Source of hidden targets
    pub fn with_randomness(
        store: Arc<dyn GameStore>,
        settings: GameSettings,
        ids: Arc<dyn RandomSource>,
        targets: Arc<dyn RandomSource>,
    ) -> Self {
        let registry = SessionRegistry::new(store.clone(), ids, &settings);
        let roster = PlayerRoster::new(store.clone());
        let turns = TurnEngine::new(store.clone(), targets);
        let notifier = EventNotifier::new(store.clone());
        let evaluator = GuessEvaluator::new(
            store.clone(),
            turns.clone(),
            roster.clone(),
            notifier.clone(),
        );

        Self {
            store,
            settings,
            registry,
            roster,
            turns,
            evaluator,
            notifier,
        }
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn roster(&self) -> &PlayerRoster {
        &self.roster
    }

    pub fn turns(&self) -> &TurnEngine {
        &self.turns
    }

    pub fn notifier(&self) -> &EventNotifier {
        &self.notifier
    }

    /// Join an existing session, or create one when `requested` is empty.
    ///
    /// # Errors
    ///
    /// * `GameError::NotFound` - requested session absent or already started
    /// * `GameError::Conflict` - name already taken in the session
    /// * `GameError::InvalidArgument` - empty name
    pub async fn create_or_join(
        &self,
        requested: Option<&str>,
        name: &str,
    ) -> GameResult<JoinReceipt> {
        let session_id = self.registry.create_or_validate(requested).await?;
        let player_id = self.roster.join(&session_id, name).await?;

        Ok(JoinReceipt {
            session_id,
            player_id,
        })
    }

    /// Start the round with the configured range.
    ///
    /// The status change and the opening turn state land together; a failed
    /// start leaves the session `Created`.
    ///
    /// # Errors
    ///
    /// * `GameError::NotFound` - session absent or already started
    /// * `GameError::Unavailable` - store unreachable, nothing changed
    pub async fn start_session(&self, session_id: &SessionId) -> GameResult<TurnView> {
        let opening = self
            .turns
            .opening_state(self.settings.range_min, self.settings.range_max)?;
        self.registry.mark_started(session_id, &opening).await?;
        self.turns.current_view(session_id).await
    }

    /// Status and roster of a live session
    pub async fn lobby_state(&self, session_id: &SessionId) -> GameResult<LobbyView> {
        let status = self.registry.status_of(session_id).await?;
        if status == SessionStatus::Absent {
            return Err(GameError::session_not_found(session_id));
        }

        let players = self.roster.roster_of(session_id).await?;
        Ok(LobbyView { status, players })
    }

    /// Range, current player and roster of a started session
    pub async fn game_state(&self, session_id: &SessionId) -> GameResult<TurnView> {
        self.turns.current_view(session_id).await
    }

    pub async fn submit_guess(
        &self,
        session_id: &SessionId,
        player_id: PlayerId,
        name: &str,
        raw_guess: &str,
    ) -> GameResult<GuessOutcome> {
        self.evaluator
            .submit_guess(session_id, player_id, name, raw_guess)
            .await
    }

    /// Wait for the next move/over event, bounded by `cancel` and the
    /// configured wait timeout
    pub async fn await_next_event<F>(
        &self,
        session_id: &SessionId,
        cancel: F,
    ) -> GameResult<WaitOutcome>
    where
        F: Future<Output = ()> + Send,
    {
        self.notifier
            .wait_next_until(session_id, cancel, self.settings.event_wait_timeout())
            .await
    }

    /// Winner and target of the session's last finished round
    ///
    /// # Errors
    ///
    /// * `GameError::NotFound` - no round of this session has finished
    pub async fn round_result(&self, session_id: &SessionId) -> GameResult<RoundResult> {
        self.store
            .round_result(session_id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("no result for game {}", session_id)))
    }

    /// Check the backing store is reachable
    pub async fn health_check(&self) -> GameResult<()> {
        self.store.health_check().await
    }
}
