//! Multilimiter - Composable Rate Limiting
//!
//! This crate implements token-bucket rate limiters that can be composed into
//! a single limiter enforcing the most restrictive of all member limits while
//! still charging every member. Waits are asynchronous and cancellable through
//! a caller-supplied [`Context`].

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod ratelimit;

pub use context::{CancelHandle, Context};
pub use error::{LimiterError, Result};
pub use ratelimit::{MultiLimiter, Rate, RateLimiter, TokenBucket};
