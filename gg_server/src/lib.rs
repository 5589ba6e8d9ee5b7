//! HTTP server for the multiplayer number guessing game.
//!
//! Wraps [`guessing_game::GameService`] in a JSON API and carries the
//! server-side concerns: configuration, structured logging, metrics and
//! request correlation.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
