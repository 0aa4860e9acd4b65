//! Token bucket limiter.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use super::limiter::RateLimiter;
use super::rate::Rate;
use crate::context::Context;
use crate::error::{LimiterError, Result};

/// Shortest refill sleep. Matches the timer resolution, so a float shortfall
/// that rounds to zero still lets the clock move between rechecks.
const MIN_REFILL_WAIT: Duration = Duration::from_millis(1);

/// Mutable token state. Only touched while holding the bucket's state lock.
#[derive(Debug)]
struct Bucket {
    /// Tokens currently available, always within `[0, burst]`
    tokens: f64,
    /// When `tokens` was last brought up to date
    last_refill: Instant,
    /// Waiters currently sleeping for a refill
    sleepers: usize,
}

impl Bucket {
    fn refill(&mut self, now: Instant, rate: Rate, burst: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + rate.tokens_over(elapsed)).min(burst);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    /// Debit one token, or return how long until one accrues (`None` if never).
    fn take(&mut self, now: Instant, rate: Rate, burst: f64) -> std::result::Result<(), Option<Duration>> {
        self.refill(now, rate, burst);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(rate
                .duration_for(1.0 - self.tokens)
                .map(|delay| delay.max(MIN_REFILL_WAIT)))
        }
    }
}

/// Marks a waiter as sleeping for a refill until dropped.
struct Sleeping<'a>(&'a Mutex<Bucket>);

impl Drop for Sleeping<'_> {
    fn drop(&mut self) {
        self.0.lock().sleepers -= 1;
    }
}

/// A limiter enforcing one (rate, burst) pair.
///
/// The bucket starts full. Each granted wait spends one token and tokens
/// refill continuously at `rate`, capped at `burst`. Callers that have to
/// block are served in arrival order.
#[derive(Debug)]
pub struct TokenBucket {
    rate: Rate,
    burst: u32,
    state: Mutex<Bucket>,
    /// Turnstile held by the waiter at the head of the line
    queue: tokio::sync::Mutex<()>,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// Fails if `burst` is zero or `rate` is negative or NaN.
    pub fn new(rate: Rate, burst: u32) -> Result<Self> {
        if burst == 0 {
            return Err(LimiterError::Config(
                "token bucket burst must be at least 1".to_string(),
            ));
        }
        if !rate.is_valid() {
            return Err(LimiterError::Config(format!(
                "token bucket rate must be non-negative, got {}",
                rate.as_per_second()
            )));
        }

        debug!(rate = %rate, burst = burst, "Creating token bucket");

        Ok(Self {
            rate,
            burst,
            state: Mutex::new(Bucket {
                tokens: burst as f64,
                last_refill: Instant::now(),
                sleepers: 0,
            }),
            queue: tokio::sync::Mutex::new(()),
        })
    }

    /// Maximum number of tokens the bucket holds.
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Tokens available right now.
    pub fn tokens(&self) -> f64 {
        let mut state = self.state.lock();
        state.refill(Instant::now(), self.rate, self.burst as f64);
        state.tokens
    }

    /// Take a token without blocking.
    ///
    /// Returns `false` if no token is available or a waiter is already
    /// sleeping for the next refill, so blocked callers are not overtaken.
    pub fn try_acquire(&self) -> bool {
        if self.rate.is_infinite() {
            return true;
        }
        let mut state = self.state.lock();
        if state.sleepers > 0 {
            return false;
        }
        state
            .take(Instant::now(), self.rate, self.burst as f64)
            .is_ok()
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn wait(&self, ctx: &Context) -> Result<()> {
        ctx.check()?;

        if self.rate.is_infinite() {
            return Ok(());
        }

        let _turn = tokio::select! {
            biased;
            turn = self.queue.lock() => turn,
            err = ctx.done() => return Err(err),
        };

        loop {
            let now = Instant::now();
            let taken = {
                let mut state = self.state.lock();
                let taken = state.take(now, self.rate, self.burst as f64);
                if taken.is_err() {
                    state.sleepers += 1;
                }
                taken
            };
            let _sleeping = taken.is_err().then(|| Sleeping(&self.state));

            let delay = match taken {
                Ok(()) => {
                    trace!(rate = %self.rate, burst = self.burst, "Token granted");
                    return Ok(());
                }
                Err(delay) => delay,
            };

            let ready_at = delay.and_then(|delay| now.checked_add(delay));

            if let Some(deadline) = ctx.deadline() {
                if ready_at.map_or(true, |ready_at| ready_at > deadline) {
                    debug!(
                        rate = %self.rate,
                        "Token would not be available before the deadline"
                    );
                    return Err(LimiterError::DeadlineExceeded);
                }
            }

            let Some(delay) = delay else {
                debug!(rate = %self.rate, "Waiting on a bucket that never refills");
                return Err(ctx.done().await);
            };

            trace!(
                rate = %self.rate,
                delay_ms = delay.as_secs_f64() * 1000.0,
                "Waiting for token refill"
            );

            // A refill landing exactly on the deadline is granted
            tokio::select! {
                biased;
                _ = sleep(delay) => {}
                err = ctx.done() => {
                    debug!(rate = %self.rate, error = %err, "Wait aborted");
                    return Err(err);
                }
            }
        }
    }

    fn limit(&self) -> Rate {
        self.rate
    }
}
