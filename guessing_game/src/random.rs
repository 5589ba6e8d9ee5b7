//! Injectable randomness for session ids and hidden targets.

use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Uniform draws from an inclusive range
pub trait RandomSource: Send + Sync {
    /// Draw a value from `low..=high`. Callers guarantee `low <= high`.
    fn draw(&self, low: i64, high: i64) -> i64;
}

/// Thread-local OS-seeded generator
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn draw(&self, low: i64, high: i64) -> i64 {
        rand::rng().random_range(low..=high)
    }
}

/// Deterministic generator for reproducible runs
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn draw(&self, low: i64, high: i64) -> i64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_range(low..=high)
    }
}

/// Replays a fixed script of values.
///
/// Each draw pops the next scripted value clamped into the requested range;
/// once the script runs out every draw returns `low`.
pub struct ScriptedRandom {
    values: Mutex<VecDeque<i64>>,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = i64>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
        }
    }

    /// Number of scripted values not yet drawn
    pub fn remaining(&self) -> usize {
        self.values.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl RandomSource for ScriptedRandom {
    fn draw(&self, low: i64, high: i64) -> i64 {
        let next = self
            .values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        next.map_or(low, |value| value.clamp(low, high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_random_stays_in_range() {
        let source = ThreadRandom;
        for _ in 0..1000 {
            let value = source.draw(1, 9999);
            assert!((1..=9999).contains(&value));
        }
        assert_eq!(source.draw(5, 5), 5);
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let a = SeededRandom::new(7);
        let b = SeededRandom::new(7);
        let left: Vec<i64> = (0..20).map(|_| a.draw(1, 100)).collect();
        let right: Vec<i64> = (0..20).map(|_| b.draw(1, 100)).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_scripted_random_replays_then_falls_back() {
        let source = ScriptedRandom::new([42, 500, -3]);
        assert_eq!(source.draw(1, 100), 42);
        assert_eq!(source.draw(1, 100), 100);
        assert_eq!(source.draw(1, 100), 1);
        assert_eq!(source.remaining(), 0);
        assert_eq!(source.draw(10, 20), 10);
    }
}
