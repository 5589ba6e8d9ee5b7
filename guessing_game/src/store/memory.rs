//! In-process store for single-instance deployments and tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, broadcast};

use super::{EventSource, GameStore, Subscription, channel_name};
use crate::errors::{GameError, GameResult};
use crate::models::{GameEvent, Player, PlayerId, RoundResult, SessionId, SessionStatus, TurnState};

/// Default per-session broadcast buffer
const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Roster indexed by player id and by name
#[derive(Debug, Default)]
struct Roster {
    /// `player_id -> name`
    by_id: BTreeMap<PlayerId, String>,
    /// `name -> last_entered`
    by_name: HashMap<String, Option<i64>>,
}

#[derive(Default)]
struct MemoryState {
    statuses: HashMap<SessionId, SessionStatus>,
    rosters: HashMap<SessionId, Roster>,
    turns: HashMap<SessionId, TurnState>,
    results: HashMap<SessionId, RoundResult>,
}

/// Event channels keyed by channel name.
///
/// Behind a blocking mutex so a dropped subscription can prune its channel
/// without an async context.
type Channels = Arc<std::sync::Mutex<HashMap<String, broadcast::Sender<GameEvent>>>>;

fn lock_channels(
    channels: &Channels,
) -> std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<GameEvent>>> {
    channels.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Store backed by in-process maps.
///
/// A single async mutex serializes every state operation, which makes each
/// trait method atomic within this process. Not shared across processes.
///
/// Round results are kept for the lifetime of the store, one per session id
/// that ever finished a round; nothing evicts them.
pub struct MemoryGameStore {
    state: Mutex<MemoryState>,
    channels: Channels,
    channel_capacity: usize,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::with_channel_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a store whose event channels buffer `capacity` events per
    /// session
    pub fn with_channel_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            channels: Channels::default(),
            channel_capacity: capacity.max(1),
        }
    }

    /// Number of sessions with a registry entry
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.statuses.len()
    }

    /// Number of live subscribers on a session channel
    pub fn subscriber_count(&self, session_id: &SessionId) -> usize {
        lock_channels(&self.channels)
            .get(&channel_name(session_id))
            .map_or(0, |sender| sender.receiver_count())
    }

    /// Number of session channels with at least one live subscriber
    pub fn channel_count(&self) -> usize {
        lock_channels(&self.channels).len()
    }
}

impl Default for MemoryGameStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn insert_session_if_absent(&self, session_id: &SessionId) -> GameResult<bool> {
        let mut state = self.state.lock().await;
        if state.statuses.contains_key(session_id) {
            return Ok(false);
        }
        state
            .statuses
            .insert(session_id.clone(), SessionStatus::Created);
        Ok(true)
    }

    async fn session_status(&self, session_id: &SessionId) -> GameResult<SessionStatus> {
        let state = self.state.lock().await;
        Ok(state
            .statuses
            .get(session_id)
            .copied()
            .unwrap_or(SessionStatus::Absent))
    }

    async fn start_round(&self, session_id: &SessionId, opening: &TurnState) -> GameResult<bool> {
        let mut state = self.state.lock().await;
        match state.statuses.get_mut(session_id) {
            Some(status) if *status == SessionStatus::Created => {
                *status = SessionStatus::Started;
            }
            _ => return Ok(false),
        }

        state.turns.insert(session_id.clone(), *opening);
        Ok(true)
    }

    async fn remove_session(&self, session_id: &SessionId) -> GameResult<()> {
        let mut state = self.state.lock().await;
        state.statuses.remove(session_id);
        Ok(())
    }

    async fn join_player(&self, session_id: &SessionId, name: &str) -> GameResult<PlayerId> {
        let mut state = self.state.lock().await;

        if state.statuses.get(session_id) != Some(&SessionStatus::Created) {
            return Err(GameError::session_not_found(session_id));
        }

        let roster = state.rosters.entry(session_id.clone()).or_default();
        if roster.by_name.contains_key(name) {
            return Err(GameError::Conflict(format!("player {} already exists", name)));
        }

        let player_id = roster.by_name.len() as PlayerId + 1;
        roster.by_name.insert(name.to_string(), None);
        roster.by_id.insert(player_id, name.to_string());

        Ok(player_id)
    }

    async fn roster(&self, session_id: &SessionId) -> GameResult<Vec<Player>> {
        let state = self.state.lock().await;
        let Some(roster) = state.rosters.get(session_id) else {
            return Ok(Vec::new());
        };

        Ok(roster
            .by_id
            .iter()
            .map(|(player_id, name)| Player {
                player_id: *player_id,
                name: name.clone(),
                last_entered: roster.by_name.get(name).copied().flatten(),
            })
            .collect())
    }

    async fn player_count(&self, session_id: &SessionId) -> GameResult<usize> {
        let state = self.state.lock().await;
        Ok(state
            .rosters
            .get(session_id)
            .map_or(0, |roster| roster.by_id.len()))
    }

    async fn turn_state(&self, session_id: &SessionId) -> GameResult<Option<TurnState>> {
        let state = self.state.lock().await;
        Ok(state.turns.get(session_id).copied())
    }

    async fn commit_move(
        &self,
        session_id: &SessionId,
        expected_revision: i64,
        next: &TurnState,
        name: &str,
        guess: i64,
    ) -> GameResult<bool> {
        let mut state = self.state.lock().await;

        match state.turns.get_mut(session_id) {
            Some(turn) if turn.revision == expected_revision => *turn = *next,
            _ => return Ok(false),
        }

        if let Some(last_entered) = state
            .rosters
            .get_mut(session_id)
            .and_then(|roster| roster.by_name.get_mut(name))
        {
            *last_entered = Some(guess);
        }

        Ok(true)
    }

    async fn finish_round(
        &self,
        session_id: &SessionId,
        expected_revision: i64,
        result: &RoundResult,
    ) -> GameResult<bool> {
        let mut state = self.state.lock().await;

        match state.turns.get(session_id) {
            Some(turn) if turn.revision == expected_revision => {}
            _ => return Ok(false),
        }

        state.results.insert(session_id.clone(), result.clone());
        state.turns.remove(session_id);
        state.rosters.remove(session_id);
        state.statuses.remove(session_id);

        Ok(true)
    }

    async fn round_result(&self, session_id: &SessionId) -> GameResult<Option<RoundResult>> {
        let state = self.state.lock().await;
        Ok(state.results.get(session_id).cloned())
    }

    async fn publish(&self, session_id: &SessionId, event: GameEvent) -> GameResult<()> {
        let mut channels = lock_channels(&self.channels);
        let channel = channel_name(session_id);

        let Some(sender) = channels.get(&channel) else {
            return Ok(());
        };

        // No receivers is not an error: the event is simply lost
        let delivered = sender.send(event).unwrap_or(0);
        log::debug!("Published {} on {} to {} subscriber(s)", event, channel, delivered);

        if sender.receiver_count() == 0 {
            channels.remove(&channel);
        }

        Ok(())
    }

    async fn subscribe(&self, session_id: &SessionId) -> GameResult<Subscription> {
        let mut channels = lock_channels(&self.channels);
        let channel = channel_name(session_id);
        let capacity = self.channel_capacity;

        let receiver = channels
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe();

        Ok(Subscription::new(
            session_id.clone(),
            Box::new(BroadcastSource {
                receiver,
                _prune: ChannelPrune {
                    channel,
                    channels: self.channels.clone(),
                },
            }),
        ))
    }

    async fn health_check(&self) -> GameResult<()> {
        Ok(())
    }
}

/// Event source over a tokio broadcast receiver
struct BroadcastSource {
    receiver: broadcast::Receiver<GameEvent>,
    /// Declared after `receiver` so it runs once the receiver is gone
    _prune: ChannelPrune,
}

/// Removes a session channel when its last subscriber goes away
struct ChannelPrune {
    channel: String,
    channels: Channels,
}

impl Drop for ChannelPrune {
    fn drop(&mut self) {
        let mut channels = lock_channels(&self.channels);
        if channels
            .get(&self.channel)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&self.channel);
            log::debug!("Pruned idle channel {}", self.channel);
        }
    }
}

#[async_trait]
impl EventSource for BroadcastSource {
    async fn recv(&mut self) -> GameResult<GameEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Event subscriber lagged, skipped {} event(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(GameError::NotFound("event channel closed".to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    fn turn(revision: i64) -> TurnState {
        TurnState {
            min: 1,
            max: 100,
            target: 42,
            now_playing: 1,
            revision,
        }
    }

    #[tokio::test]
    async fn test_insert_session_if_absent_is_exclusive() {
        let store = MemoryGameStore::new();
        let id = SessionId::new("12");

        assert!(store.insert_session_if_absent(&id).await.unwrap());
        assert!(!store.insert_session_if_absent(&id).await.unwrap());
        assert_eq!(
            store.session_status(&id).await.unwrap(),
            SessionStatus::Created
        );
    }

    #[tokio::test]
    async fn test_start_round_requires_created() {
        let store = MemoryGameStore::new();
        let id = SessionId::new("12");

        assert!(!store.start_round(&id, &turn(0)).await.unwrap());
        assert_eq!(store.turn_state(&id).await.unwrap(), None);

        store.insert_session_if_absent(&id).await.unwrap();
        assert!(store.start_round(&id, &turn(0)).await.unwrap());
        assert_eq!(
            store.session_status(&id).await.unwrap(),
            SessionStatus::Started
        );
        assert_eq!(store.turn_state(&id).await.unwrap(), Some(turn(0)));

        // A second start leaves the live round alone
        let replay = TurnState {
            target: 7,
            ..turn(0)
        };
        assert!(!store.start_round(&id, &replay).await.unwrap());
        assert_eq!(store.turn_state(&id).await.unwrap(), Some(turn(0)));
    }

    #[tokio::test]
    async fn test_join_assigns_sequential_ids() {
        let store = MemoryGameStore::new();
        let id = SessionId::new("12");
        store.insert_session_if_absent(&id).await.unwrap();

        assert_eq!(store.join_player(&id, "alice").await.unwrap(), 1);
        assert_eq!(store.join_player(&id, "bob").await.unwrap(), 2);
        assert!(matches!(
            store.join_player(&id, "alice").await,
            Err(GameError::Conflict(_))
        ));
        assert_eq!(store.player_count(&id).await.unwrap(), 2);

        let names: Vec<String> = store
            .roster(&id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_join_rejected_after_start() {
        let store = MemoryGameStore::new();
        let id = SessionId::new("12");
        store.insert_session_if_absent(&id).await.unwrap();
        store.start_round(&id, &turn(0)).await.unwrap();

        assert!(matches!(
            store.join_player(&id, "late").await,
            Err(GameError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_move_checks_revision() {
        let store = MemoryGameStore::new();
        let id = SessionId::new("12");
        store.insert_session_if_absent(&id).await.unwrap();
        store.join_player(&id, "alice").await.unwrap();
        store.start_round(&id, &turn(0)).await.unwrap();

        let next = TurnState {
            max: 49,
            revision: 1,
            ..turn(0)
        };
        assert!(store.commit_move(&id, 0, &next, "alice", 50).await.unwrap());
        assert!(!store.commit_move(&id, 0, &next, "alice", 50).await.unwrap());

        assert_eq!(store.turn_state(&id).await.unwrap(), Some(next));
        let roster = store.roster(&id).await.unwrap();
        assert_eq!(roster[0].last_entered, Some(50));
    }

    #[tokio::test]
    async fn test_finish_round_tears_down_and_keeps_result() {
        let store = MemoryGameStore::new();
        let id = SessionId::new("12");
        store.insert_session_if_absent(&id).await.unwrap();
        store.join_player(&id, "alice").await.unwrap();
        store.start_round(&id, &turn(3)).await.unwrap();

        let result = RoundResult {
            winner_name: "alice".to_string(),
            target: 42,
            finished_at: Utc::now(),
        };
        assert!(!store.finish_round(&id, 2, &result).await.unwrap());
        assert!(store.finish_round(&id, 3, &result).await.unwrap());

        assert_eq!(
            store.session_status(&id).await.unwrap(),
            SessionStatus::Absent
        );
        assert_eq!(store.turn_state(&id).await.unwrap(), None);
        assert!(store.roster(&id).await.unwrap().is_empty());
        assert_eq!(store.round_result(&id).await.unwrap(), Some(result));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_lost() {
        let store = MemoryGameStore::new();
        let id = SessionId::new("12");

        store.publish(&id, GameEvent::Move).await.unwrap();

        let mut subscription = store.subscribe(&id).await.unwrap();
        let waited =
            tokio::time::timeout(Duration::from_millis(50), subscription.next()).await;
        assert!(waited.is_err(), "event published before subscribe must not replay");
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber_once() {
        let store = Arc::new(MemoryGameStore::new());
        let id = SessionId::new("12");

        let mut first = store.subscribe(&id).await.unwrap();
        let mut second = store.subscribe(&id).await.unwrap();
        assert_eq!(store.subscriber_count(&id), 2);

        store.publish(&id, GameEvent::Over).await.unwrap();

        assert_eq!(first.next().await.unwrap(), GameEvent::Over);
        assert_eq!(second.next().await.unwrap(), GameEvent::Over);

        let again = tokio::time::timeout(Duration::from_millis(50), first.next()).await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_pruned() {
        let store = MemoryGameStore::new();
        let id = SessionId::new("12");

        let subscription = store.subscribe(&id).await.unwrap();
        drop(subscription);
        assert_eq!(store.subscriber_count(&id), 0);

        assert_eq!(store.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_channels_released_after_finished_waits() {
        let store = MemoryGameStore::new();

        for n in 0..100 {
            let id = SessionId::new(n.to_string());
            let mut subscription = store.subscribe(&id).await.unwrap();
            store.publish(&id, GameEvent::Over).await.unwrap();
            assert_eq!(subscription.next().await.unwrap(), GameEvent::Over);
        }

        assert_eq!(store.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_channel_survives_while_any_subscriber_remains() {
        let store = MemoryGameStore::new();
        let id = SessionId::new("12");

        let first = store.subscribe(&id).await.unwrap();
        let mut second = store.subscribe(&id).await.unwrap();
        drop(first);
        assert_eq!(store.channel_count(), 1);

        store.publish(&id, GameEvent::Move).await.unwrap();
        assert_eq!(second.next().await.unwrap(), GameEvent::Move);

        drop(second);
        assert_eq!(store.channel_count(), 0);
    }
}
