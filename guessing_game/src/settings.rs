//! Game settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest supported session identifier width
pub const MAX_SESSION_ID_DIGITS: u32 = 9;

/// Tunables shared by every session served by one engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Lower bound of the initial guessable range (inclusive)
    pub range_min: i64,

    /// Upper bound of the initial guessable range (inclusive)
    pub range_max: i64,

    /// Width of drawn session identifiers (4 → `1..=9999`)
    pub session_id_digits: u32,

    /// How long an event waiter may block; 0 waits forever
    pub event_wait_timeout_secs: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            range_min: 1,
            range_max: 100,
            session_id_digits: 4,
            event_wait_timeout_secs: 0,
        }
    }
}

impl GameSettings {
    /// Create settings from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - `GUESS_RANGE_MIN`: lower bound (default: 1)
    /// - `GUESS_RANGE_MAX`: upper bound (default: 100)
    /// - `SESSION_ID_DIGITS`: session id width (default: 4)
    /// - `EVENT_WAIT_TIMEOUT_SECS`: waiter timeout, 0 disables (default: 0)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            range_min: parse_env_or("GUESS_RANGE_MIN", defaults.range_min),
            range_max: parse_env_or("GUESS_RANGE_MAX", defaults.range_max),
            session_id_digits: parse_env_or("SESSION_ID_DIGITS", defaults.session_id_digits),
            event_wait_timeout_secs: parse_env_or(
                "EVENT_WAIT_TIMEOUT_SECS",
                defaults.event_wait_timeout_secs,
            ),
        }
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), String> {
        if self.range_min > self.range_max {
            return Err(format!(
                "Range min ({}) must not exceed range max ({})",
                self.range_min, self.range_max
            ));
        }

        if self.session_id_digits == 0 || self.session_id_digits > MAX_SESSION_ID_DIGITS {
            return Err(format!(
                "Session id digits must be between 1 and {}",
                MAX_SESSION_ID_DIGITS
            ));
        }

        Ok(())
    }

    /// Inclusive bounds of the session identifier space
    pub fn session_id_space(&self) -> (u32, u32) {
        let digits = self.session_id_digits.clamp(1, MAX_SESSION_ID_DIGITS);
        (1, 10u32.pow(digits) - 1)
    }

    /// Waiter timeout, if any
    pub fn event_wait_timeout(&self) -> Option<Duration> {
        (self.event_wait_timeout_secs > 0).then(|| Duration::from_secs(self.event_wait_timeout_secs))
    }
}

fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
