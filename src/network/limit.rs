//! Per-session flood protection.
//!
//! Token bucket: tokens refill at `rate` per second up to `capacity`, and
//! each inbound frame costs one token.

use std::time::Instant;

/// Token bucket rate limiter, owned by a single session.
#[derive(Debug)]
pub struct RateLimiter {
    tokens: f32,
    last_check: Instant,
    rate: f32,
    capacity: f32,
}

impl RateLimiter {
    /// Create a full bucket.
    ///
    /// # Arguments
    /// * `rate` - Tokens added per second
    /// * `capacity` - Maximum token capacity (burst size)
    pub fn new(rate: f32, capacity: f32) -> Self {
        Self {
            tokens: capacity,
            last_check: Instant::now(),
            rate,
            capacity,
        }
    }

    /// Take a token if one is available.
    pub fn check(&mut self) -> bool {
        self.check_at(Instant::now())
    }

    fn check_at(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_check).as_secs_f32();
        self.last_check = now;

        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
