//! # Guessing Game
//!
//! Session state machine and turn synchronization engine for multiplayer,
//! turn-based number guessing.
//!
//! Players join a session, the session is started, and players then take
//! turns guessing a hidden integer. Every miss narrows the guessable range
//! and passes the turn on; the first exact guess wins the round and tears
//! down its live state.
//!
//! ## Lifecycle
//!
//! - **Absent**: no session under this id
//! - **Created**: accepting players
//! - **Started**: turn state exists, guesses accepted
//! - **Finished**: a guess hit; turn state and registry entry are gone, the
//!   round result remains readable
//!
//! ## Core Modules
//!
//! - [`registry`]: session id allocation and lifecycle status
//! - [`roster`]: sequential player ids and name uniqueness
//! - [`turn`]: range, hidden target and turn order
//! - [`evaluator`]: applies guesses and decides the round
//! - [`notifier`]: per-session move/over events
//! - [`store`]: atomic storage contract with in-memory and PostgreSQL backends
//! - [`service`]: the caller-facing operations composed from the above
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use guessing_game::{GameService, GameSettings, MemoryGameStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), guessing_game::GameError> {
//! let service = GameService::new(Arc::new(MemoryGameStore::new()), GameSettings::default());
//! let alice = service.create_or_join(None, "alice").await?;
//! let bob = service
//!     .create_or_join(Some(alice.session_id.as_str()), "bob")
//!     .await?;
//! assert_eq!(bob.player_id, 2);
//!
//! let view = service.start_session(&alice.session_id).await?;
//! assert_eq!(view.now_playing, 1);
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod errors;
pub mod evaluator;
pub mod models;
pub mod notifier;
pub mod random;
pub mod registry;
pub mod roster;
pub mod service;
pub mod settings;
pub mod store;
pub mod turn;

pub use errors::{GameError, GameResult};
pub use models::{
    GameEvent, GuessOutcome, JoinReceipt, LobbyView, Player, PlayerId, RoundResult, SessionId,
    SessionStatus, TurnState, TurnView,
};
pub use notifier::WaitOutcome;
pub use random::{RandomSource, ScriptedRandom, SeededRandom, ThreadRandom};
pub use service::GameService;
pub use settings::GameSettings;
pub use store::{GameStore, MemoryGameStore, PgGameStore, Subscription};
