//! Session registry: allocates session identifiers and tracks their status.

use std::sync::Arc;

use crate::errors::{GameError, GameResult};
use crate::models::{SessionId, SessionStatus, TurnState};
use crate::random::RandomSource;
use crate::settings::GameSettings;
use crate::store::GameStore;

/// Session registry
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn GameStore>,
    ids: Arc<dyn RandomSource>,
    id_space: (u32, u32),
}

impl SessionRegistry {
    /// Create a new registry
    ///
    /// # Arguments
    ///
    /// * `store` - Backing store
    /// * `ids` - Source of candidate identifiers
    /// * `settings` - Determines the identifier space
    pub fn new(
        store: Arc<dyn GameStore>,
        ids: Arc<dyn RandomSource>,
        settings: &GameSettings,
    ) -> Self {
        Self {
            store,
            ids,
            id_space: settings.session_id_space(),
        }
    }

    /// Allocate a fresh session, or validate a requested one.
    ///
    /// With no requested id, candidates are drawn uniformly from the id space
    /// until one is inserted; the insert is conditional so two callers can
    /// never claim the same candidate. A requested id must name a session
    /// that is still `Created`.
    ///
    /// # Errors
    ///
    /// * `GameError::NotFound` - requested session absent or already started
    pub async fn create_or_validate(&self, requested: Option<&str>) -> GameResult<SessionId> {
        match requested.filter(|raw| !raw.is_empty()) {
            Some(raw) => {
                let session_id = SessionId::new(raw);
                match self.store.session_status(&session_id).await? {
                    SessionStatus::Created => Ok(session_id),
                    _ => Err(GameError::session_not_found(&session_id)),
                }
            }
            None => self.allocate().await,
        }
    }

    async fn allocate(&self) -> GameResult<SessionId> {
        let (low, high) = self.id_space;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let candidate = self.ids.draw(i64::from(low), i64::from(high));
            let session_id = SessionId::from_number(candidate as u32);

            if self.store.insert_session_if_absent(&session_id).await? {
                log::info!("Created game {} after {} draw(s)", session_id, attempts);
                return Ok(session_id);
            }

            log::debug!("Game id {} already in use, redrawing", session_id);
        }
    }

    /// Transition `Created -> Started`, installing `opening` as the round's
    /// turn state in the same store step. On any error the session stays
    /// `Created` and can be started again.
    ///
    /// # Errors
    ///
    /// * `GameError::NotFound` - session absent or not in `Created`
    pub async fn mark_started(
        &self,
        session_id: &SessionId,
        opening: &TurnState,
    ) -> GameResult<()> {
        let applied = self.store.start_round(session_id, opening).await?;

        if !applied {
            return Err(GameError::session_not_found(session_id));
        }

        log::info!(
            "Game {} started over [{}, {}]",
            session_id,
            opening.min,
            opening.max
        );
        Ok(())
    }

    /// Current status; removed sessions read as `Absent`
    pub async fn status_of(&self, session_id: &SessionId) -> GameResult<SessionStatus> {
        self.store.session_status(session_id).await
    }

    pub async fn exists(&self, session_id: &SessionId) -> GameResult<bool> {
        Ok(self.status_of(session_id).await?.is_present())
    }

    /// Delete the registry entry
    pub async fn remove(&self, session_id: &SessionId) -> GameResult<()> {
        self.store.remove_session(session_id).await?;
        log::info!("Game {} removed", session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;
    use crate::store::MemoryGameStore;

    fn opening() -> TurnState {
        TurnState::new(1, 100, 42)
    }

    fn registry(script: Vec<i64>) -> (SessionRegistry, Arc<MemoryGameStore>) {
        let store = Arc::new(MemoryGameStore::new());
        let registry = SessionRegistry::new(
            store.clone(),
            Arc::new(ScriptedRandom::new(script)),
            &GameSettings::default(),
        );
        (registry, store)
    }

    #[tokio::test]
    async fn test_create_draws_unused_id() {
        let (registry, _) = registry(vec![1234]);
        let id = registry.create_or_validate(None).await.unwrap();
        assert_eq!(id.as_str(), "1234");
        assert_eq!(
            registry.status_of(&id).await.unwrap(),
            SessionStatus::Created
        );
    }

    #[tokio::test]
    async fn test_create_redraws_on_collision() {
        let (registry, store) = registry(vec![7, 7, 7, 8]);
        store
            .insert_session_if_absent(&SessionId::new("7"))
            .await
            .unwrap();

        let id = registry.create_or_validate(Some("")).await.unwrap();
        assert_eq!(id.as_str(), "8");
        assert_eq!(store.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_validate_requires_created() {
        let (registry, _) = registry(vec![55]);

        assert!(matches!(
            registry.create_or_validate(Some("999")).await,
            Err(GameError::NotFound(_))
        ));

        let id = registry.create_or_validate(None).await.unwrap();
        assert_eq!(
            registry.create_or_validate(Some("55")).await.unwrap(),
            id
        );

        registry.mark_started(&id, &opening()).await.unwrap();
        assert!(matches!(
            registry.create_or_validate(Some("55")).await,
            Err(GameError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_started_only_once() {
        let (registry, _) = registry(vec![3]);
        let id = registry.create_or_validate(None).await.unwrap();

        registry.mark_started(&id, &opening()).await.unwrap();
        assert!(matches!(
            registry.mark_started(&id, &opening()).await,
            Err(GameError::NotFound(_))
        ));
        assert!(matches!(
            registry.mark_started(&SessionId::new("404"), &opening()).await,
            Err(GameError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_makes_session_absent() {
        let (registry, _) = registry(vec![9]);
        let id = registry.create_or_validate(None).await.unwrap();
        assert!(registry.exists(&id).await.unwrap());

        registry.remove(&id).await.unwrap();
        assert!(!registry.exists(&id).await.unwrap());
    }
}
