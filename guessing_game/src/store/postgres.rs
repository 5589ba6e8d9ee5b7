//! PostgreSQL-backed store safe for multiple engine processes.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::{PgPool, Row};
use std::sync::Arc;

use super::{EventSource, GameStore, Subscription, channel_name};
use crate::errors::{GameError, GameResult};
use crate::models::{GameEvent, Player, PlayerId, RoundResult, SessionId, SessionStatus, TurnState};

/// Schema applied by [`PgGameStore::ensure_schema`]
const SCHEMA: &str = include_str!("../../migrations/0001_guess_schema.sql");

/// Store backed by PostgreSQL.
///
/// Joins lock the session row (`SELECT ... FOR UPDATE`) so id assignment is
/// serialized across every process sharing the database. Moves and round
/// teardown are conditional on the turn revision. Events travel over
/// `NOTIFY` and are never persisted.
#[derive(Clone)]
pub struct PgGameStore {
    pool: Arc<PgPool>,
}

impl PgGameStore {
    /// Create a new store
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create tables if they do not exist
    pub async fn ensure_schema(&self) -> GameResult<()> {
        sqlx::raw_sql(SCHEMA).execute(self.pool.as_ref()).await?;
        log::info!("Game schema ready");
        Ok(())
    }
}

fn turn_from_row(row: &sqlx::postgres::PgRow) -> TurnState {
    TurnState {
        min: row.get("min_value"),
        max: row.get("max_value"),
        target: row.get("target"),
        now_playing: row.get("now_playing"),
        revision: row.get("revision"),
    }
}

#[async_trait]
impl GameStore for PgGameStore {
    async fn insert_session_if_absent(&self, session_id: &SessionId) -> GameResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO games (session_id, status)
            VALUES ($1, 'created')
            ON CONFLICT (session_id) DO NOTHING
            "#,
        )
        .bind(session_id.as_str())
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn session_status(&self, session_id: &SessionId) -> GameResult<SessionStatus> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM games WHERE session_id = $1")
                .bind(session_id.as_str())
                .fetch_optional(self.pool.as_ref())
                .await?;

        Ok(SessionStatus::from_stored(status.as_deref()))
    }

    async fn start_round(&self, session_id: &SessionId, opening: &TurnState) -> GameResult<bool> {
        let mut tx = self.pool.begin().await?;

        let started = sqlx::query(
            "UPDATE games SET status = $2, updated_at = NOW()
             WHERE session_id = $1 AND status = $3",
        )
        .bind(session_id.as_str())
        .bind(SessionStatus::Started.as_str())
        .bind(SessionStatus::Created.as_str())
        .execute(&mut *tx)
        .await?;

        if started.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO game_turns (session_id, min_value, max_value, target, now_playing, revision)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (session_id) DO UPDATE
            SET min_value = EXCLUDED.min_value,
                max_value = EXCLUDED.max_value,
                target = EXCLUDED.target,
                now_playing = EXCLUDED.now_playing,
                revision = EXCLUDED.revision
            "#,
        )
        .bind(session_id.as_str())
        .bind(opening.min)
        .bind(opening.max)
        .bind(opening.target)
        .bind(opening.now_playing)
        .bind(opening.revision)
        .execute(&mut *tx)
        .await?;

        // Status and opening turn commit together
        tx.commit().await?;

        Ok(true)
    }

    async fn remove_session(&self, session_id: &SessionId) -> GameResult<()> {
        sqlx::query("DELETE FROM games WHERE session_id = $1")
            .bind(session_id.as_str())
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn join_player(&self, session_id: &SessionId, name: &str) -> GameResult<PlayerId> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent joins to this session
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM games WHERE session_id = $1 FOR UPDATE")
                .bind(session_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;

        if SessionStatus::from_stored(status.as_deref()) != SessionStatus::Created {
            return Err(GameError::session_not_found(session_id));
        }

        let taken = sqlx::query("SELECT 1 FROM game_players WHERE session_id = $1 AND name = $2")
            .bind(session_id.as_str())
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;

        if taken.is_some() {
            return Err(GameError::Conflict(format!("player {} already exists", name)));
        }

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM game_players WHERE session_id = $1")
                .bind(session_id.as_str())
                .fetch_one(&mut *tx)
                .await?;

        let player_id = count + 1;

        sqlx::query(
            r#"
            INSERT INTO game_players (session_id, player_id, name)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(session_id.as_str())
        .bind(player_id)
        .bind(name)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(player_id)
    }

    async fn roster(&self, session_id: &SessionId) -> GameResult<Vec<Player>> {
        let rows = sqlx::query(
            r#"
            SELECT player_id, name, last_entered
            FROM game_players
            WHERE session_id = $1
            ORDER BY player_id ASC
            "#,
        )
        .bind(session_id.as_str())
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Player {
                player_id: row.get("player_id"),
                name: row.get("name"),
                last_entered: row.get("last_entered"),
            })
            .collect())
    }

    async fn player_count(&self, session_id: &SessionId) -> GameResult<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM game_players WHERE session_id = $1")
                .bind(session_id.as_str())
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(count.max(0) as usize)
    }

    async fn turn_state(&self, session_id: &SessionId) -> GameResult<Option<TurnState>> {
        let row = sqlx::query(
            r#"
            SELECT min_value, max_value, target, now_playing, revision
            FROM game_turns
            WHERE session_id = $1
            "#,
        )
        .bind(session_id.as_str())
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.as_ref().map(turn_from_row))
    }

    async fn commit_move(
        &self,
        session_id: &SessionId,
        expected_revision: i64,
        next: &TurnState,
        name: &str,
        guess: i64,
    ) -> GameResult<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE game_turns
            SET min_value = $3, max_value = $4, now_playing = $5, revision = $6
            WHERE session_id = $1 AND revision = $2
            "#,
        )
        .bind(session_id.as_str())
        .bind(expected_revision)
        .bind(next.min)
        .bind(next.max)
        .bind(next.now_playing)
        .bind(next.revision)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Ok(false);
        }

        sqlx::query(
            "UPDATE game_players SET last_entered = $3 WHERE session_id = $1 AND name = $2",
        )
        .bind(session_id.as_str())
        .bind(name)
        .bind(guess)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn finish_round(
        &self,
        session_id: &SessionId,
        expected_revision: i64,
        result: &RoundResult,
    ) -> GameResult<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted =
            sqlx::query("DELETE FROM game_turns WHERE session_id = $1 AND revision = $2")
                .bind(session_id.as_str())
                .bind(expected_revision)
                .execute(&mut *tx)
                .await?;

        if deleted.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO game_results (session_id, winner_name, target, finished_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (session_id) DO UPDATE
            SET winner_name = EXCLUDED.winner_name,
                target = EXCLUDED.target,
                finished_at = EXCLUDED.finished_at
            "#,
        )
        .bind(session_id.as_str())
        .bind(&result.winner_name)
        .bind(result.target)
        .bind(result.finished_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM game_players WHERE session_id = $1")
            .bind(session_id.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM games WHERE session_id = $1")
            .bind(session_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn round_result(&self, session_id: &SessionId) -> GameResult<Option<RoundResult>> {
        let row = sqlx::query(
            "SELECT winner_name, target, finished_at FROM game_results WHERE session_id = $1",
        )
        .bind(session_id.as_str())
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|row| RoundResult {
            winner_name: row.get("winner_name"),
            target: row.get("target"),
            finished_at: row.get("finished_at"),
        }))
    }

    async fn publish(&self, session_id: &SessionId, event: GameEvent) -> GameResult<()> {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(channel_name(session_id))
            .bind(event.as_str())
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn subscribe(&self, session_id: &SessionId) -> GameResult<Subscription> {
        let channel = channel_name(session_id);
        let mut listener = PgListener::connect_with(self.pool.as_ref()).await?;
        listener.listen(&channel).await?;

        log::debug!("Listening on {}", channel);

        Ok(Subscription::new(
            session_id.clone(),
            Box::new(NotifySource { listener }),
        ))
    }

    async fn health_check(&self) -> GameResult<()> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }
}

/// Event source over a dedicated `LISTEN` connection
struct NotifySource {
    listener: PgListener,
}

#[async_trait]
impl EventSource for NotifySource {
    async fn recv(&mut self) -> GameResult<GameEvent> {
        loop {
            let notification = self.listener.recv().await?;
            match GameEvent::from_payload(notification.payload()) {
                Some(event) => return Ok(event),
                None => log::warn!(
                    "Unexpected payload {:?} on {}",
                    notification.payload(),
                    notification.channel()
                ),
            }
        }
    }
}
