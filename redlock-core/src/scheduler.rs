use rand::Rng;
use rand::rngs::ThreadRng;
use std::time::Duration;

/// Bounded sequence of jittered retry delays.
///
/// Yields at most `count` delays, each drawn uniformly from
/// `[delay_ms / 2, delay_ms]`. Jitter keeps competing clients that failed
/// together from retrying in lockstep.
pub struct RetryScheduler<R = ThreadRng> {
    delay_ms: u64,
    remaining: u32,
    rng: R,
}

impl RetryScheduler<ThreadRng> {
    pub fn new(delay_ms: u64, count: u32) -> Self {
        Self::with_rng(delay_ms, count, rand::rng())
    }
}

impl<R: Rng> RetryScheduler<R> {
    pub fn with_rng(delay_ms: u64, count: u32, rng: R) -> Self {
        Self {
            delay_ms,
            remaining: count,
            rng,
        }
    }

    /// Inclusive bounds of every delay, in milliseconds.
    pub fn bounds(&self) -> (u64, u64) {
        (self.delay_ms / 2, self.delay_ms)
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl<R: Rng> Iterator for RetryScheduler<R> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let (low, high) = self.bounds();
        Some(Duration::from_millis(self.rng.random_range(low..=high)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}
