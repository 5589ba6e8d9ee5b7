//! Guess evaluator: applies a guess to the turn state.

use chrono::Utc;
use std::sync::Arc;

use crate::errors::{GameError, GameResult};
use crate::models::{GameEvent, GuessOutcome, PlayerId, RoundResult, SessionId, TurnState};
use crate::notifier::EventNotifier;
use crate::roster::PlayerRoster;
use crate::store::GameStore;
use crate::turn::TurnEngine;

/// What a guess does to the live range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Guess equals the target
    Hit,
    /// Guess missed; range narrowed to the contained state (turn not yet
    /// advanced)
    Miss(TurnState),
}

/// Apply `guess` to `state`.
///
/// A low guess raises `min` to `guess + 1`, a high guess lowers `max` to
/// `guess - 1`. Bounds only ever tighten: a guess already outside the live
/// range leaves that side unchanged.
pub fn judge(state: &TurnState, guess: i64) -> Verdict {
    use std::cmp::Ordering;

    match guess.cmp(&state.target) {
        Ordering::Equal => Verdict::Hit,
        Ordering::Less => Verdict::Miss(TurnState {
            min: state.min.max(guess.saturating_add(1)),
            ..*state
        }),
        Ordering::Greater => Verdict::Miss(TurnState {
            max: state.max.min(guess.saturating_sub(1)),
            ..*state
        }),
    }
}

/// Parse a raw guess
///
/// # Errors
///
/// * `GameError::InvalidArgument` - not an integer
pub fn parse_guess(raw: &str) -> GameResult<i64> {
    raw.trim()
        .parse()
        .map_err(|_| GameError::InvalidArgument(format!("guess {:?} is not an integer", raw)))
}

/// Guess evaluator
#[derive(Clone)]
pub struct GuessEvaluator {
    store: Arc<dyn GameStore>,
    turns: TurnEngine,
    roster: PlayerRoster,
    notifier: EventNotifier,
}

impl GuessEvaluator {
    pub fn new(
        store: Arc<dyn GameStore>,
        turns: TurnEngine,
        roster: PlayerRoster,
        notifier: EventNotifier,
    ) -> Self {
        Self {
            store,
            turns,
            roster,
            notifier,
        }
    }

    /// Submit `player_id`'s guess.
    ///
    /// The turn state is read, judged and written back conditionally on its
    /// revision; if another move lands in between, the whole evaluation is
    /// repeated against the fresh state (which then usually fails the turn
    /// check).
    ///
    /// # Errors
    ///
    /// * `GameError::NotFound` - session not started or already won
    /// * `GameError::Forbidden` - `player_id` is not the player to move
    /// * `GameError::InvalidArgument` - `raw_guess` is not an integer
    /// * `GameError::Unavailable` - store unreachable. When this comes from
    ///   the event publish, the move or win is already committed; re-read
    ///   the state before retrying.
    pub async fn submit_guess(
        &self,
        session_id: &SessionId,
        player_id: PlayerId,
        name: &str,
        raw_guess: &str,
    ) -> GameResult<GuessOutcome> {
        loop {
            let state = self.turns.state(session_id).await?;

            if player_id != state.now_playing {
                log::debug!(
                    "Game {}: player {} guessed out of turn (now playing {})",
                    session_id,
                    player_id,
                    state.now_playing
                );
                return Err(GameError::Forbidden);
            }

            let guess = parse_guess(raw_guess)?;

            match judge(&state, guess) {
                Verdict::Hit => {
                    let result = RoundResult {
                        winner_name: name.to_string(),
                        target: state.target,
                        finished_at: Utc::now(),
                    };

                    if self
                        .store
                        .finish_round(session_id, state.revision, &result)
                        .await?
                    {
                        log::info!(
                            "Game {} won by {} with {}",
                            session_id,
                            name,
                            state.target
                        );
                        self.notifier.publish(session_id, GameEvent::Over).await?;
                        return Ok(GuessOutcome::Won {
                            winner_name: result.winner_name,
                            target: result.target,
                        });
                    }
                }
                Verdict::Miss(narrowed) => {
                    // Counted at guess time, not at round start
                    let player_count = self.roster.count(session_id).await?;
                    let next = narrowed.advanced(player_count);

                    if self
                        .store
                        .commit_move(session_id, state.revision, &next, name, guess)
                        .await?
                    {
                        log::info!(
                            "Game {}: {} guessed {}, range now [{}, {}], player {} to move",
                            session_id,
                            name,
                            guess,
                            next.min,
                            next.max,
                            next.now_playing
                        );
                        self.notifier.publish(session_id, GameEvent::Move).await?;
                        return Ok(GuessOutcome::Continue {
                            min: next.min,
                            max: next.max,
                            now_playing: next.now_playing,
                        });
                    }
                }
            }

            log::debug!(
                "Game {}: turn state changed under guess, re-evaluating",
                session_id
            );
        }
    }
}
