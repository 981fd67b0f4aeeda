//! Request id and timestamp generation.
//!
//! The upstream checks that a request id looks client-generated and that the
//! timestamp is a multiple of one more than the number of `i` letters in the
//! submitted text. Both sources of entropy (randomness and the wall clock) are
//! behind traits so tests can pin them.

use rand::Rng;

/// Lower bound of the id base range (inclusive).
pub const ID_BASE_MIN: u32 = 8_300_000;

/// Upper bound of the id base range (inclusive).
pub const ID_BASE_MAX: u32 = 8_399_999;

/// Multiplier applied to the base to get a millisecond-scale id.
pub const ID_SCALE: u64 = 1000;

/// Source of uniformly distributed integers.
pub trait RandomSource: Send + Sync {
    /// Returns an integer in `low..=high`.
    fn next_in_range(&self, low: u32, high: u32) -> u32;
}

/// Source of the current time in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// [`RandomSource`] backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_in_range(&self, low: u32, high: u32) -> u32 {
        rand::thread_rng().gen_range(low..=high)
    }
}

/// [`Clock`] reading the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Generates a JSON-RPC request id.
pub fn generate_request_id(rng: &dyn RandomSource) -> u64 {
    u64::from(rng.next_in_range(ID_BASE_MIN, ID_BASE_MAX)) * ID_SCALE
}

/// Counts occurrences of the lowercase letter `i`.
pub fn count_marker_letter(text: &str) -> usize {
    text.matches('i').count()
}

/// Derives the `params.timestamp` value for a given marker count.
///
/// A zero count yields the clock value unchanged. Otherwise the result is the
/// next multiple of `count + 1` strictly after the previous one at or below now.
pub fn derive_timestamp(clock: &dyn Clock, marker_count: usize) -> u64 {
    let now = clock.now_millis();
    if marker_count == 0 {
        return now;
    }
    let n = marker_count as u64 + 1;
    now - (now % n) + n
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Clock frozen at a fixed instant.
    pub struct FixedClock(pub u64);

    impl Clock for FixedClock {
        fn now_millis(&self) -> u64 {
            self.0
        }
    }

    /// Random source that always returns the same base value.
    pub struct FixedRandom(pub u32);

    impl RandomSource for FixedRandom {
        fn next_in_range(&self, low: u32, high: u32) -> u32 {
            self.0.clamp(low, high)
        }
    }
}
